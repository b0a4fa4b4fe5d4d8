//! # Perda de Verossimilhança Marginal
//!
//! Uma menção como "ele" em um cluster `{Lula, o presidente, ele}` tem **dois**
//! antecedentes igualmente corretos. Em vez de escolher um rótulo fixo, tratamos o
//! antecedente verdadeiro como variável latente e maximizamos a probabilidade
//! marginal de **qualquer** antecedente gold:
//!
//! ```text
//! alvo          = [placeholder_gold, gold_1, ..., gold_K]     (0.0 / 1.0)
//! log_marginal  = softmax(scores + log(alvo))                  log(0) = -inf
//! log_norm      = softmax(scores)
//! gradiente     = log_norm - log_marginal
//! perda         = Σ gradiente²
//! ```
//!
//! O placeholder é gold exatamente quando nenhum candidato pontuado é gold.
//! Somar `-inf` às colunas não-gold zera sua massa depois do softmax; a massa
//! restante se distribui só entre os antecedentes gold. O `-inf` é esperado e
//! representado explicitamente por [`masked_log`], sem aviso ao chamador.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::antecedent::{ScoreMatrix, ScoredAntecedents};
use crate::error::{CorefError, Result};
use crate::gold::{gather_gold_rows, GoldScoreMatrix};

/// Resultado da perda para um documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossOutput {
    /// Soma dos gradientes ao quadrado (monitoramento).
    pub loss: f64,
    /// Gradiente com o mesmo formato da matriz de scores, repassado ao otimizador.
    pub gradient: Vec<Vec<f64>>,
}

/// `log` de um alvo binário: `0.0` para verdadeiro, `-inf` para falso.
pub fn masked_log(target: bool) -> f64 {
    if target {
        0.0
    } else {
        f64::NEG_INFINITY
    }
}

/// Softmax estável que aceita entradas `-inf` (massa zero).
///
/// Uma linha inteira em `-inf` não tem massa alguma e resulta em zeros.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return vec![0.0; scores.len()];
    }
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Gradiente de uma linha: `softmax(scores) - softmax(scores + log(alvo))`.
///
/// `gold_row` cobre apenas as colunas de candidatos; o placeholder é derivado.
pub fn row_gradient(score_row: &[f64], gold_row: &[bool]) -> Vec<f64> {
    let gold_placeholder = !gold_row.iter().any(|&g| g);
    let masked: Vec<f64> = std::iter::once(gold_placeholder)
        .chain(gold_row.iter().copied())
        .zip(score_row)
        .map(|(target, &score)| score + masked_log(target))
        .collect();

    let log_marginal = softmax(&masked);
    let log_norm = softmax(score_row);
    log_norm
        .iter()
        .zip(&log_marginal)
        .map(|(norm, marginal)| norm - marginal)
        .collect()
}

/// Perda marginal sobre antecedentes latentes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterLoss;

impl ClusterLoss {
    /// Calcula perda e gradiente a partir dos scores `[N, 1 + K]` e das linhas gold `[N, K]`.
    pub fn compute(&self, scores: &ScoreMatrix, gold_rows: &[Vec<bool>]) -> Result<LossOutput> {
        if scores.len() != gold_rows.len() {
            return Err(CorefError::ShapeMismatch(format!(
                "{} linhas de score para {} linhas gold",
                scores.len(),
                gold_rows.len()
            )));
        }

        let mut loss = 0.0;
        let mut gradient = Vec::with_capacity(scores.len());
        for (i, (score_row, gold_row)) in scores.iter().zip(gold_rows).enumerate() {
            if score_row.len() != gold_row.len() + 1 {
                return Err(CorefError::ShapeMismatch(format!(
                    "linha {i}: {} scores para {} alvos gold (+1 placeholder)",
                    score_row.len(),
                    gold_row.len()
                )));
            }
            let row = row_gradient(score_row, gold_row);
            loss += row.iter().map(|g| g * g).sum::<f64>();
            gradient.push(row);
        }

        debug!(mentions = scores.len(), loss, "perda marginal calculada");
        Ok(LossOutput { loss, gradient })
    }
}

/// Recolhe a supervisão dos candidatos pontuados e calcula a perda em uma chamada.
pub fn coref_loss(scored: &ScoredAntecedents, gold: &GoldScoreMatrix) -> Result<LossOutput> {
    if gold.len() != scored.len() {
        return Err(CorefError::ShapeMismatch(format!(
            "matriz gold com {} linhas para {} menções pontuadas",
            gold.len(),
            scored.len()
        )));
    }
    let gold_rows = gather_gold_rows(gold, scored.indices());
    ClusterLoss.compute(scored.scores(), &gold_rows)
}
