//! # Expansão de Cabeças em Spans
//!
//! A resolução de correferência pode operar apenas sobre **palavras-cabeça**
//! ("presidente" em "o presidente da República"). Este estágio recupera o span
//! completo de cada cabeça escolhendo a melhor palavra de início e a melhor de fim.
//!
//! ## Pontuação
//!
//! Para cada par (cabeça `h`, palavra `w`) o modelo externo ([`BoundaryScorer`])
//! devolve dois scores: "w começa o span" e "w termina o span". Ele recebe também
//! um **bucket de distância relativa**:
//!
//! ```text
//! relativo = h - w
//! bucket   = relativo + (max_distance - 2) / 2      se cair em [0, max_distance - 2]
//!          = max_distance - 1                       caso contrário ("longe demais")
//! ```
//!
//! Palavras de **outra sentença** recebem `-inf` e nunca são escolhidas.
//!
//! ## Restrição Monotônica (só na inferência)
//!
//! Na inferência exigimos `start ≤ h ≤ end` somando `log(relativo ≥ 0)` aos scores
//! de início e `log(relativo ≤ 0)` aos de fim. No treino a restrição **não** é
//! aplicada: o modelo aprende a respeitá-la a partir da supervisão gold.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::antecedent::argmax;
use crate::error::{CorefError, Result};
use crate::loss::{masked_log, softmax};
use crate::mention::{Cluster, Mention};

/// Scores `[num_heads][num_words]`, cada entrada `[início, fim]`.
pub type BoundaryScores = Vec<Vec<[f64; 2]>>;

/// Fase em que os scores são produzidos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Sem restrição monotônica: gradientes passam pelas violações.
    Training,
    /// Com restrição `start ≤ h ≤ end`.
    Inference,
}

/// Modelo externo que pontua uma palavra como início/fim do span de uma cabeça.
pub trait BoundaryScorer {
    /// Retorna `[score_início, score_fim]` para a palavra `word` relativa à cabeça `head`.
    fn score(&self, head: usize, word: usize, distance_bucket: usize) -> [f64; 2];
}

impl<F> BoundaryScorer for F
where
    F: Fn(usize, usize, usize) -> [f64; 2],
{
    fn score(&self, head: usize, word: usize, distance_bucket: usize) -> [f64; 2] {
        self(head, word, distance_bucket)
    }
}

/// Perda de fronteira para um documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLossOutput {
    pub loss: f64,
    /// Mesmo formato de [`BoundaryScores`].
    pub gradient: BoundaryScores,
}

/// Expande cabeças em spans `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanBoundaryExpander {
    max_distance: usize,
}

impl SpanBoundaryExpander {
    /// Cria o expansor. `max_distance` precisa ser par e positivo; a verificação
    /// acontece aqui, antes de qualquer documento ser processado.
    pub fn new(max_distance: usize) -> Result<Self> {
        if max_distance == 0 || max_distance % 2 != 0 {
            return Err(CorefError::OddMaxDistance(max_distance));
        }
        Ok(Self { max_distance })
    }

    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    /// Bucket compartilhado por todas as distâncias fora da janela.
    pub fn too_far_bucket(&self) -> usize {
        self.max_distance - 1
    }

    /// Bucket de distância relativa entre a cabeça e uma palavra.
    pub fn distance_bucket(&self, head: usize, word: usize) -> usize {
        let relative = head as i64 - word as i64;
        let shifted = relative + (self.max_distance as i64 - 2) / 2;
        if (0..=self.max_distance as i64 - 2).contains(&shifted) {
            shifted as usize
        } else {
            self.too_far_bucket()
        }
    }

    /// Pontua todas as palavras do documento para cada cabeça.
    ///
    /// `sentence_ids[w]` é a sentença da palavra `w`; só palavras da mesma sentença
    /// da cabeça são enviadas ao `scorer`.
    pub fn score_heads<S: BoundaryScorer + ?Sized>(
        &self,
        heads: &[usize],
        sentence_ids: &[usize],
        scorer: &S,
        mode: ScoringMode,
    ) -> BoundaryScores {
        heads
            .iter()
            .map(|&head| {
                self.score_row(head, sentence_ids, mode, |word, bucket| {
                    scorer.score(head, word, bucket)
                })
            })
            .collect()
    }

    /// Aplica a máscara de sentença (e a restrição, na inferência) a scores já calculados.
    pub fn mask_scores(
        &self,
        heads: &[usize],
        sentence_ids: &[usize],
        raw: &BoundaryScores,
        mode: ScoringMode,
    ) -> Result<BoundaryScores> {
        if raw.len() != heads.len() {
            return Err(CorefError::ShapeMismatch(format!(
                "{} linhas de scores para {} cabeças",
                raw.len(),
                heads.len()
            )));
        }
        if let Some(row) = raw.iter().find(|row| row.len() != sentence_ids.len()) {
            return Err(CorefError::ShapeMismatch(format!(
                "{} palavras pontuadas em um documento de {} palavras",
                row.len(),
                sentence_ids.len()
            )));
        }
        Ok(heads
            .iter()
            .zip(raw)
            .map(|(&head, raw_row)| {
                self.score_row(head, sentence_ids, mode, |word, _bucket| raw_row[word])
            })
            .collect())
    }

    /// Linha de scores de uma cabeça: `-inf` fora da sentença, restrição na inferência.
    ///
    /// # Panics
    /// Se a cabeça estiver fora do documento.
    fn score_row(
        &self,
        head: usize,
        sentence_ids: &[usize],
        mode: ScoringMode,
        score: impl Fn(usize, usize) -> [f64; 2],
    ) -> Vec<[f64; 2]> {
        assert!(head < sentence_ids.len(), "cabeça {head} fora do documento");
        let mut row: Vec<[f64; 2]> = sentence_ids
            .iter()
            .enumerate()
            .map(|(word, &sentence)| {
                if sentence == sentence_ids[head] {
                    score(word, self.distance_bucket(head, word))
                } else {
                    [f64::NEG_INFINITY; 2]
                }
            })
            .collect();
        if mode == ScoringMode::Inference {
            apply_monotonic_constraint(head, &mut row);
        }
        row
    }

    /// Escolhe, para cada cabeça, a melhor palavra de início e a melhor de fim.
    ///
    /// O span resultante sempre contém a cabeça: com scores de inferência isso já
    /// vale pela restrição; com scores de treino a cabeça é usada como limite.
    pub fn predict_spans(&self, heads: &[usize], scores: &BoundaryScores) -> Vec<Mention> {
        let spans: Vec<Mention> = heads
            .iter()
            .zip(scores)
            .map(|(&head, row)| {
                let starts: Vec<f64> = row.iter().map(|s| s[0]).collect();
                let ends: Vec<f64> = row.iter().map(|s| s[1]).collect();
                let start = argmax(&starts).min(head);
                let end = argmax(&ends).max(head);
                Mention::new(start, end + 1)
            })
            .collect();
        debug!(heads = heads.len(), "cabeças expandidas em spans");
        spans
    }

    /// Entropia cruzada sobre início e fim: `grad = softmax(scores) - one_hot(gold)`.
    ///
    /// `gold_spans[i]` é o span gold (semiaberto) da cabeça `i`.
    pub fn boundary_loss(
        &self,
        scores: &BoundaryScores,
        gold_spans: &[Mention],
    ) -> Result<BoundaryLossOutput> {
        if scores.len() != gold_spans.len() {
            return Err(CorefError::ShapeMismatch(format!(
                "{} cabeças pontuadas para {} spans gold",
                scores.len(),
                gold_spans.len()
            )));
        }

        let mut loss = 0.0;
        let mut gradient = Vec::with_capacity(scores.len());
        for (row, gold) in scores.iter().zip(gold_spans) {
            if gold.end > row.len() {
                return Err(CorefError::ShapeMismatch(format!(
                    "span gold {gold} excede o documento de {} palavras",
                    row.len()
                )));
            }
            let starts: Vec<f64> = row.iter().map(|s| s[0]).collect();
            let ends: Vec<f64> = row.iter().map(|s| s[1]).collect();
            let start_probs = softmax(&starts);
            let end_probs = softmax(&ends);

            let grad_row: Vec<[f64; 2]> = (0..row.len())
                .map(|w| {
                    let start_target = if w == gold.start { 1.0 } else { 0.0 };
                    let end_target = if w == gold.end - 1 { 1.0 } else { 0.0 };
                    [start_probs[w] - start_target, end_probs[w] - end_target]
                })
                .collect();
            loss += grad_row.iter().map(|g| g[0] * g[0] + g[1] * g[1]).sum::<f64>();
            gradient.push(grad_row);
        }

        Ok(BoundaryLossOutput { loss, gradient })
    }
}

/// Soma `log(h - w ≥ 0)` aos inícios e `log(h - w ≤ 0)` aos fins.
pub fn apply_monotonic_constraint(head: usize, row: &mut [[f64; 2]]) {
    for (word, scores) in row.iter_mut().enumerate() {
        scores[0] += masked_log(word <= head);
        scores[1] += masked_log(word >= head);
    }
}

/// Substitui cada cabeça de um cluster pelo span previsto para ela.
///
/// `heads[i]` foi expandida em `spans[i]`. Menções cujo token inicial não é uma
/// cabeça conhecida permanecem como estão.
pub fn expand_clusters(head_clusters: &[Cluster], heads: &[usize], spans: &[Mention]) -> Vec<Cluster> {
    let head_to_span: HashMap<usize, Mention> =
        heads.iter().copied().zip(spans.iter().copied()).collect();
    head_clusters
        .iter()
        .map(|cluster| {
            cluster
                .iter()
                .map(|m| head_to_span.get(&m.start).copied().unwrap_or(*m))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG: f64 = f64::NEG_INFINITY;

    #[test]
    fn test_odd_max_distance_rejected() {
        assert!(matches!(
            SpanBoundaryExpander::new(7),
            Err(CorefError::OddMaxDistance(7))
        ));
        assert!(SpanBoundaryExpander::new(0).is_err());
        assert!(SpanBoundaryExpander::new(8).is_ok());
    }

    #[test]
    fn test_distance_buckets() {
        let expander = SpanBoundaryExpander::new(8).unwrap();
        // deslocamento (8 - 2) / 2 = 3, janela válida [0, 6], longe demais = 7
        assert_eq!(expander.distance_bucket(10, 10), 3);
        assert_eq!(expander.distance_bucket(10, 7), 6);
        assert_eq!(expander.distance_bucket(10, 13), 0);
        assert_eq!(expander.distance_bucket(10, 6), 7);
        assert_eq!(expander.distance_bucket(10, 14), 7);
    }

    #[test]
    fn test_cross_sentence_words_are_masked() {
        let expander = SpanBoundaryExpander::new(8).unwrap();
        let sentence_ids = [0, 0, 0, 1, 1];
        let scorer = |_h: usize, _w: usize, _b: usize| [1.0, 1.0];
        let scores = expander.score_heads(&[1], &sentence_ids, &scorer, ScoringMode::Training);
        assert_eq!(scores[0][0], [1.0, 1.0]);
        assert_eq!(scores[0][3], [NEG, NEG]);
        assert_eq!(scores[0][4], [NEG, NEG]);
    }

    #[test]
    fn test_constraint_only_at_inference() {
        let expander = SpanBoundaryExpander::new(8).unwrap();
        let sentence_ids = [0; 5];
        // O modelo "prefere" começar depois da cabeça e terminar antes dela
        let scorer = |h: usize, w: usize, _b: usize| {
            if w > h {
                [5.0, 0.0]
            } else if w < h {
                [0.0, 5.0]
            } else {
                [1.0, 1.0]
            }
        };
        let training = expander.score_heads(&[2], &sentence_ids, &scorer, ScoringMode::Training);
        assert_eq!(training[0][4], [5.0, 0.0]);

        let inference = expander.score_heads(&[2], &sentence_ids, &scorer, ScoringMode::Inference);
        assert_eq!(inference[0][4][0], NEG);
        assert_eq!(inference[0][0][1], NEG);
        let spans = expander.predict_spans(&[2], &inference);
        assert_eq!(spans, vec![Mention::new(2, 3)]);
    }

    #[test]
    fn test_predict_spans_uses_best_boundaries() {
        let expander = SpanBoundaryExpander::new(8).unwrap();
        let sentence_ids = [0, 0, 0, 0, 0, 1];
        // "o presidente da República": início em 0, fim em 3
        let scorer = |_h: usize, w: usize, _b: usize| match w {
            0 => [3.0, 0.0],
            3 => [0.0, 3.0],
            _ => [0.0, 0.0],
        };
        let scores = expander.score_heads(&[1], &sentence_ids, &scorer, ScoringMode::Inference);
        assert_eq!(expander.predict_spans(&[1], &scores), vec![Mention::new(0, 4)]);
    }

    #[test]
    fn test_mask_scores_validates_shape() {
        let expander = SpanBoundaryExpander::new(4).unwrap();
        let raw = vec![vec![[0.0, 0.0]; 3]];
        assert!(expander.mask_scores(&[0, 1], &[0, 0, 0], &raw, ScoringMode::Training).is_err());
        assert!(expander.mask_scores(&[0], &[0, 0], &raw, ScoringMode::Training).is_err());

        let masked = expander
            .mask_scores(&[0], &[0, 0, 1], &raw, ScoringMode::Inference)
            .unwrap();
        assert_eq!(masked[0][2], [NEG, NEG]);
        assert_eq!(masked[0][1][0], NEG);
        assert_eq!(masked[0][0], [0.0, 0.0]);
    }

    #[test]
    fn test_boundary_loss_gradient() {
        let expander = SpanBoundaryExpander::new(4).unwrap();
        let scores = vec![vec![[0.0, 0.0], [0.0, 0.0], [NEG, NEG]]];
        let out = expander.boundary_loss(&scores, &[Mention::new(0, 2)]).unwrap();
        let g = &out.gradient[0];
        assert!((g[0][0] - (0.5 - 1.0)).abs() < 1e-12);
        assert!((g[1][0] - 0.5).abs() < 1e-12);
        assert!((g[1][1] - (0.5 - 1.0)).abs() < 1e-12);
        assert_eq!(g[2], [0.0, 0.0]);
        assert!((out.loss - 1.0).abs() < 1e-12);

        assert!(expander.boundary_loss(&scores, &[Mention::new(0, 4)]).is_err());
    }

    #[test]
    fn test_expand_clusters() {
        let head_clusters = vec![vec![Mention::head(1), Mention::head(6)]];
        let spans = vec![Mention::new(0, 4), Mention::new(6, 7)];
        let expanded = expand_clusters(&head_clusters, &[1, 6], &spans);
        assert_eq!(expanded, vec![vec![Mention::new(0, 4), Mention::new(6, 7)]]);
    }
}
