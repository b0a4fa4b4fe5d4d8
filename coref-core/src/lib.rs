//! # coref-core: Motor de Resolução de Correferência
//!
//! Este crate agrupa menções textuais (spans de tokens) que se referem à mesma entidade
//! do mundo real. Ele recebe documentos já tokenizados e os scores de um modelo externo,
//! e cuida de tudo o que fica entre esses scores e os clusters avaliados.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: candidatos a menção com seus scores ([`pipeline::DocumentInput`]).
//! 2.  **Filtro** ([`span_filter`]): mantém os melhores candidatos sem spans cruzados.
//! 3.  **Antecedentes** ([`antecedent`]): poda top-K, arg-max com placeholder e clusters.
//! 4.  **Treino** ([`gold`], [`loss`]): supervisão gold e perda marginal sobre antecedentes latentes.
//! 5.  **Expansão** ([`span_boundary`]): cabeças viram spans completos.
//! 6.  **Avaliação** ([`metrics`], [`evaluator`]): MUC, B³, CEAFe, CEAFm e LEA, acumuláveis por corpus.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use coref_core::{CorefConfig, CorefPipeline, DocumentInput, Mention};
//!
//! // "Lula visitou o Recife. Ele elogiou a cidade."
//! let doc = DocumentInput {
//!     sentence_ids: vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
//!     candidates: vec![Mention::new(0, 1), Mention::new(2, 4), Mention::new(5, 6)],
//!     candidate_scores: None,
//! };
//!
//! // Modelo de brinquedo: "Ele" (5, 6) liga em "Lula" (0, 1)
//! let scorer = |m: &Mention, a: &Mention| {
//!     if (m.start, a.start) == (5, 0) { 3.0 } else { -1.0 }
//! };
//!
//! let pipeline = CorefPipeline::new(CorefConfig::default()).unwrap();
//! let resolution = pipeline.resolve(&doc, &scorer, None).unwrap();
//! assert_eq!(resolution.clusters, vec![vec![Mention::new(0, 1), Mention::new(5, 6)]]);
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador que conecta todos os estágios.
//! - [`evaluator`]: acumuladores por métrica e avaliação de corpus (sequencial ou com `rayon`).
//! - [`corpus`]: documentos anotados de demonstração.

pub mod antecedent;
pub mod assignment;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluator;
pub mod gold;
pub mod loss;
pub mod mention;
pub mod metrics;
pub mod pipeline;
pub mod span_boundary;
pub mod span_filter;

pub use antecedent::{predicted_clusters, ScoredAntecedents};
pub use config::CorefConfig;
pub use error::{CorefError, Result};
pub use evaluator::{
    get_cluster_info, score_corpus, score_corpus_par, CorefScorer, Evaluator, MetricKind, Prf,
    ScoreReport,
};
pub use mention::{Cluster, Mention};
pub use pipeline::{AntecedentScorer, CorefPipeline, DocumentInput, PipelineEvent, Resolution};
pub use span_boundary::{BoundaryScorer, SpanBoundaryExpander};
