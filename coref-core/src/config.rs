//! # Configuração
//!
//! Parâmetros do pipeline e da avaliação. Campos ausentes no JSON recebem os
//! valores padrão, então `{}` é uma configuração válida.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CorefError, Result};
use crate::evaluator::MetricKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorefConfig {
    /// Menções mantidas por palavra do documento.
    pub spans_per_word: f64,
    /// Candidatos a antecedente pontuados por menção (`K`).
    pub max_antecedents: usize,
    /// Janela de distância cabeça/palavra na expansão de spans. Deve ser par.
    pub max_distance: usize,
    /// Expande as cabeças dos clusters previstos em spans completos.
    pub expand_heads: bool,
    /// Guarda as contagens de cada documento nos avaliadores.
    pub keep_aggregated_values: bool,
    pub metrics: Vec<MetricKind>,
}

impl Default for CorefConfig {
    fn default() -> Self {
        Self {
            spans_per_word: 0.4,
            max_antecedents: 50,
            max_distance: 128,
            expand_heads: false,
            keep_aggregated_values: false,
            metrics: MetricKind::ALL.to_vec(),
        }
    }
}

impl CorefConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_distance == 0 || self.max_distance % 2 != 0 {
            return Err(CorefError::OddMaxDistance(self.max_distance));
        }
        if !self.spans_per_word.is_finite() || self.spans_per_word <= 0.0 {
            return Err(CorefError::InvalidConfig(format!(
                "spans_per_word deve ser positivo, recebido {}",
                self.spans_per_word
            )));
        }
        if self.max_antecedents == 0 {
            return Err(CorefError::InvalidConfig(
                "max_antecedents deve ser maior que zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Lê e valida uma configuração em JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CorefConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(?config, "configuração carregada");
        Ok(config)
    }
}
