//! # Erros do Sistema de Correferência
//!
//! Apenas condições **recuperáveis** viram [`CorefError`]: configuração inválida,
//! matrizes com formatos incompatíveis, spans malformados vindos de anotação.
//!
//! Violações de invariante (ex: um antecedente que não precede a menção) indicam
//! bug no colaborador que produziu os dados e interrompem o processamento com `panic!`.

use thiserror::Error;

/// Tipo de resultado usado em todo o crate.
pub type Result<T> = std::result::Result<T, CorefError>;

/// Erros recuperáveis do motor de correferência.
#[derive(Debug, Error)]
pub enum CorefError {
    /// Um span precisa satisfazer `start < end` (offsets semiabertos).
    #[error("span inválido: início {start} não é menor que o fim {end}")]
    InvalidSpan { start: usize, end: usize },

    /// O bucket "longe demais" exige `max_distance` par.
    #[error("max_distance deve ser um número par maior que zero, recebido {0}")]
    OddMaxDistance(usize),

    /// Algum campo da configuração está fora do domínio válido.
    #[error("configuração inválida: {0}")]
    InvalidConfig(String),

    /// Matriz de scores, tabela de antecedentes ou supervisão com formatos incompatíveis.
    #[error("dimensões incompatíveis: {0}")]
    ShapeMismatch(String),

    /// Falha ao interpretar a configuração em JSON.
    #[error("falha ao ler configuração JSON: {0}")]
    Json(#[from] serde_json::Error),
}
