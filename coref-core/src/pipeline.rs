//! # Pipeline de Correferência: Orquestrador com Eventos Observáveis
//!
//! O pipeline encadeia os estágios do motor e emite eventos em cada passo via um
//! canal Rust (`mpsc`), permitindo que quem o embute acompanhe o progresso:
//!
//! ```text
//! candidatos ──filtro sem cruzamentos──▶ menções
//!          ──AntecedentScorer + poda top-K──▶ scores [N, 1 + K]
//!          ──arg-max──▶ antecedentes ──▶ clusters
//!          ──(opcional) BoundaryScorer──▶ clusters com spans completos
//! ```
//!
//! No treino, o mesmo caminho até os scores alimenta a supervisão gold e a perda
//! marginal ([`CorefPipeline::train_step`]).

use std::sync::mpsc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::antecedent::{
    add_placeholder, predicted_antecedents, predicted_clusters, top_k_antecedents,
    ScoredAntecedents,
};
use crate::config::CorefConfig;
use crate::error::{CorefError, Result};
use crate::gold::gold_scores;
use crate::loss::{coref_loss, LossOutput};
use crate::mention::{Cluster, Mention};
use crate::span_boundary::{
    expand_clusters, BoundaryLossOutput, BoundaryScorer, ScoringMode, SpanBoundaryExpander,
};
use crate::span_filter::{mention_limit, select_non_crossing_spans, select_top_spans};

/// Modelo externo que pontua a ligação de uma menção a um antecedente anterior.
///
/// O placeholder ("sem antecedente") tem score fixo 0.0; valores positivos favorecem a ligação.
pub trait AntecedentScorer {
    fn score(&self, mention: &Mention, antecedent: &Mention) -> f64;
}

impl<F> AntecedentScorer for F
where
    F: Fn(&Mention, &Mention) -> f64,
{
    fn score(&self, mention: &Mention, antecedent: &Mention) -> f64 {
        self(mention, antecedent)
    }
}

/// Documento já tokenizado e com candidatos gerados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Sentença de cada token; o tamanho define o número de tokens.
    pub sentence_ids: Vec<usize>,
    pub candidates: Vec<Mention>,
    /// Scores do gerador de menções. Sem eles, a ordem de `candidates` é o ranking.
    pub candidate_scores: Option<Vec<f64>>,
}

impl DocumentInput {
    pub fn n_tokens(&self) -> usize {
        self.sentence_ids.len()
    }

    fn validate(&self) -> Result<()> {
        if let Some(scores) = &self.candidate_scores {
            if scores.len() != self.candidates.len() {
                return Err(CorefError::ShapeMismatch(format!(
                    "{} scores para {} candidatos",
                    scores.len(),
                    self.candidates.len()
                )));
            }
        }
        if let Some(m) = self.candidates.iter().find(|m| m.start >= m.end) {
            return Err(CorefError::InvalidSpan {
                start: m.start,
                end: m.end,
            });
        }
        if let Some(m) = self.candidates.iter().find(|m| m.end > self.n_tokens()) {
            return Err(CorefError::ShapeMismatch(format!(
                "candidato {m} excede o documento de {} tokens",
                self.n_tokens()
            )));
        }
        Ok(())
    }
}

/// Resultado da resolução de um documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Menções mantidas pelo filtro, em ordem de documento.
    pub mentions: Vec<Mention>,
    /// Antecedente previsto (índice em `mentions`) de cada menção.
    pub antecedents: Vec<Option<usize>>,
    pub clusters: Vec<Cluster>,
}

/// Eventos emitidos pelo pipeline durante o processamento.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: candidatos filtrados em um conjunto sem cruzamentos.
    CandidatesFiltered {
        mentions: Vec<Mention>,
        total_candidates: usize,
    },
    /// **Passo 2**: decisão de antecedente de uma menção.
    AntecedentPredicted {
        mention_index: usize,
        mention: Mention,
        antecedent: Option<Mention>,
        score: f64,
    },
    /// **Passo 3**: clusters montados a partir das ligações.
    ClustersBuilt { clusters: Vec<Cluster> },
    /// **Passo 4 (Opcional)**: uma cabeça foi expandida em span.
    SpanExpanded { head: usize, span: Mention },
    /// **Conclusão**
    Done {
        clusters: Vec<Cluster>,
        total_mentions: usize,
        processing_ms: u64,
    },
    /// **Falha**: entrada inválida para este documento.
    Error { message: String },
}

/// O pipeline de correferência principal.
///
/// # Modos de Uso
/// - **Sync**: [`CorefPipeline::resolve`].
/// - **Streaming**: [`CorefPipeline::resolve_streaming`], que empurra [`PipelineEvent`]s
///   por um canal.
/// - **Treino**: [`CorefPipeline::train_step`] e [`CorefPipeline::train_boundaries`].
#[derive(Debug, Clone)]
pub struct CorefPipeline {
    config: CorefConfig,
    expander: SpanBoundaryExpander,
}

impl CorefPipeline {
    /// Valida a configuração e monta o pipeline.
    pub fn new(config: CorefConfig) -> Result<Self> {
        config.validate()?;
        let expander = SpanBoundaryExpander::new(config.max_distance)?;
        Ok(Self { config, expander })
    }

    pub fn config(&self) -> &CorefConfig {
        &self.config
    }

    /// Resolve um documento de forma síncrona.
    ///
    /// `boundary` só é usado com `expand_heads` ligado, e nesse caso é obrigatório.
    pub fn resolve<S: AntecedentScorer + ?Sized>(
        &self,
        doc: &DocumentInput,
        scorer: &S,
        boundary: Option<&dyn BoundaryScorer>,
    ) -> Result<Resolution> {
        self.run(doc, scorer, boundary, &mut |_| {})
    }

    /// Resolve um documento enviando eventos de progresso em tempo real.
    ///
    /// # Fluxo de Eventos
    /// 1. `CandidatesFiltered`
    /// 2. `AntecedentPredicted` (uma vez por menção)
    /// 3. `ClustersBuilt`
    /// 4. `SpanExpanded` (uma vez por cabeça, se `expand_heads`)
    /// 5. `Done`, ou `Error` se a entrada for inválida
    pub fn resolve_streaming<S: AntecedentScorer + ?Sized>(
        &self,
        doc: &DocumentInput,
        scorer: &S,
        boundary: Option<&dyn BoundaryScorer>,
        tx: mpsc::Sender<PipelineEvent>,
    ) {
        let start = Instant::now();
        let result = self.run(doc, scorer, boundary, &mut |event| {
            let _ = tx.send(event);
        });
        let _ = match result {
            Ok(resolution) => tx.send(PipelineEvent::Done {
                total_mentions: resolution.mentions.len(),
                clusters: resolution.clusters,
                processing_ms: start.elapsed().as_millis() as u64,
            }),
            Err(err) => {
                warn!(%err, "documento rejeitado pelo pipeline");
                tx.send(PipelineEvent::Error {
                    message: err.to_string(),
                })
            }
        };
    }

    /// Menções mantidas pelo filtro, em ordem de documento.
    fn filter_candidates(&self, doc: &DocumentInput) -> Vec<Mention> {
        match &doc.candidate_scores {
            Some(scores) => select_top_spans(
                &doc.candidates,
                scores,
                doc.n_tokens(),
                self.config.spans_per_word,
            ),
            None => select_non_crossing_spans(
                &doc.candidates,
                mention_limit(doc.n_tokens(), self.config.spans_per_word),
            ),
        }
    }

    /// Pontua todos os pares `(i, j < i)`, poda para os `K` melhores e adiciona o placeholder.
    fn score_antecedents<S: AntecedentScorer + ?Sized>(
        &self,
        mentions: &[Mention],
        scorer: &S,
    ) -> Result<ScoredAntecedents> {
        let pairwise: Vec<Vec<f64>> = mentions
            .iter()
            .enumerate()
            .map(|(i, mention)| {
                mentions
                    .iter()
                    .enumerate()
                    .map(|(j, antecedent)| {
                        if j < i {
                            scorer.score(mention, antecedent)
                        } else {
                            f64::NEG_INFINITY
                        }
                    })
                    .collect()
            })
            .collect();

        let (fine, indices) = top_k_antecedents(&pairwise, self.config.max_antecedents);
        ScoredAntecedents::new(add_placeholder(&fine), indices)
    }

    fn run<S: AntecedentScorer + ?Sized>(
        &self,
        doc: &DocumentInput,
        scorer: &S,
        boundary: Option<&dyn BoundaryScorer>,
        emit: &mut dyn FnMut(PipelineEvent),
    ) -> Result<Resolution> {
        doc.validate()?;
        let boundary = match (self.config.expand_heads, boundary) {
            (true, None) => {
                return Err(CorefError::InvalidConfig(
                    "expand_heads exige um BoundaryScorer".to_string(),
                ))
            }
            (true, Some(b)) => Some(b),
            (false, _) => None,
        };

        // === Passo 1: Filtro de candidatos ===
        let mentions = self.filter_candidates(doc);
        emit(PipelineEvent::CandidatesFiltered {
            mentions: mentions.clone(),
            total_candidates: doc.candidates.len(),
        });
        if mentions.is_empty() {
            debug!(candidatos = doc.candidates.len(), "nenhuma menção mantida");
        }

        // === Passo 2: Antecedentes ===
        let scored = self.score_antecedents(&mentions, scorer)?;
        let antecedents = predicted_antecedents(&scored);
        for (i, (antecedent, row)) in antecedents.iter().zip(scored.scores()).enumerate() {
            emit(PipelineEvent::AntecedentPredicted {
                mention_index: i,
                mention: mentions[i],
                antecedent: antecedent.map(|a| mentions[a]),
                score: row.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            });
        }

        // === Passo 3: Clusters ===
        let mut clusters = predicted_clusters(&mentions, &scored);
        emit(PipelineEvent::ClustersBuilt {
            clusters: clusters.clone(),
        });

        // === Passo 4: Expansão de cabeças ===
        if let Some(boundary) = boundary {
            let mut heads: Vec<usize> = clusters.iter().flatten().map(|m| m.start).collect();
            heads.sort_unstable();
            heads.dedup();

            let scores =
                self.expander
                    .score_heads(&heads, &doc.sentence_ids, boundary, ScoringMode::Inference);
            let spans = self.expander.predict_spans(&heads, &scores);
            for (&head, &span) in heads.iter().zip(&spans) {
                emit(PipelineEvent::SpanExpanded { head, span });
            }
            clusters = expand_clusters(&clusters, &heads, &spans);
        }

        info!(
            mencoes = mentions.len(),
            clusters = clusters.len(),
            "documento resolvido"
        );
        Ok(Resolution {
            mentions,
            antecedents,
            clusters,
        })
    }

    /// Um passo de treino: perda marginal dos scores do documento contra os clusters gold.
    pub fn train_step<S: AntecedentScorer + ?Sized>(
        &self,
        doc: &DocumentInput,
        gold_clusters: &[Cluster],
        scorer: &S,
    ) -> Result<LossOutput> {
        doc.validate()?;
        let mentions = self.filter_candidates(doc);
        let scored = self.score_antecedents(&mentions, scorer)?;
        let gold = gold_scores(&mentions, gold_clusters);
        let output = coref_loss(&scored, &gold)?;
        debug!(mencoes = mentions.len(), loss = output.loss, "passo de treino");
        Ok(output)
    }

    /// Perda de fronteira das cabeças gold, sem a restrição monotônica.
    pub fn train_boundaries<S: BoundaryScorer + ?Sized>(
        &self,
        heads: &[usize],
        sentence_ids: &[usize],
        gold_spans: &[Mention],
        scorer: &S,
    ) -> Result<BoundaryLossOutput> {
        if let Some(&head) = heads.iter().find(|&&h| h >= sentence_ids.len()) {
            return Err(CorefError::ShapeMismatch(format!(
                "cabeça {head} fora do documento de {} tokens",
                sentence_ids.len()
            )));
        }
        let scores = self
            .expander
            .score_heads(heads, sentence_ids, scorer, ScoringMode::Training);
        self.expander.boundary_loss(&scores, gold_spans)
    }
}
