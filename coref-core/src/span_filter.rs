//! # Filtro de Spans Não-Cruzados
//!
//! O gerador de menções propõe muito mais candidatos do que menções reais, e vários
//! deles se sobrepõem de forma inconsistente. Este módulo escolhe, em ordem de
//! prioridade, um subconjunto em que **nenhum par se cruza**.
//!
//! ## Cruzamento vs Aninhamento
//!
//! ```text
//! (0,5) e (1,3)  → aninhados: permitido   [0 [1 . 3] . 5]
//! (0,5) e (4,6)  → cruzados: proibido     [0 . . [4 5] 6]
//! (0,5) e (5,8)  → disjuntos: permitido   [0 . . . 5)[5 . . 8)
//! ```
//!
//! ## Algoritmo
//!
//! Guardamos dois mapas indexados por posição de token:
//! - `start_to_max_end[t]`: maior fim entre os spans aceitos que começam em `t`;
//! - `end_to_min_start[t]`: menor início entre os spans aceitos que terminam em `t`.
//!
//! Para um candidato `(s, e)`, basta olhar os tokens estritamente internos `s < t < e`:
//! um span aceito que começa em `t` e termina depois de `e`, ou que termina em `t` e
//! começa antes de `s`, cruza o candidato. Custo `O(L)` por candidato, com `L` o
//! tamanho do span.

use std::collections::HashMap;

use tracing::debug;

use crate::mention::Mention;

/// Estado explícito do filtro durante a varredura dos candidatos.
#[derive(Debug, Default)]
struct CrossingState {
    start_to_max_end: HashMap<usize, usize>,
    end_to_min_start: HashMap<usize, usize>,
}

impl CrossingState {
    /// Verifica se `candidate` cruza algum span já aceito.
    fn crosses(&self, candidate: &Mention) -> bool {
        ((candidate.start + 1)..candidate.end).any(|t| {
            let starts_inside_ends_after = self
                .start_to_max_end
                .get(&t)
                .is_some_and(|&max_end| max_end > candidate.end);
            let ends_inside_starts_before = self
                .end_to_min_start
                .get(&t)
                .is_some_and(|&min_start| min_start < candidate.start);
            starts_inside_ends_after || ends_inside_starts_before
        })
    }

    fn accept(&mut self, span: &Mention) {
        let max_end = self.start_to_max_end.entry(span.start).or_insert(span.end);
        *max_end = (*max_end).max(span.end);
        let min_start = self.end_to_min_start.entry(span.end).or_insert(span.start);
        *min_start = (*min_start).min(span.start);
    }
}

/// Seleciona até `limit` candidatos sem cruzamentos, retornando **índices** de `ranked`.
///
/// `ranked` deve estar em ordem decrescente de prioridade; empates já vêm resolvidos
/// pela ordem de entrada. O resultado é reordenado pela posição no documento
/// `(start, end)`, e não pela prioridade.
pub fn select_non_crossing_indices(ranked: &[Mention], limit: usize) -> Vec<usize> {
    let mut state = CrossingState::default();
    let mut selected = Vec::with_capacity(limit.min(ranked.len()));

    for (idx, candidate) in ranked.iter().enumerate() {
        if selected.len() >= limit {
            break;
        }
        if state.crosses(candidate) {
            continue;
        }
        state.accept(candidate);
        selected.push(idx);
    }

    selected.sort_by_key(|&idx| (ranked[idx], idx));
    debug!(
        candidates = ranked.len(),
        selected = selected.len(),
        limit,
        "filtro de spans não-cruzados concluído"
    );
    selected
}

/// Seleciona até `limit` spans sem cruzamentos a partir de uma lista ranqueada.
///
/// # Exemplo
/// ```rust
/// use coref_core::mention::Mention;
/// use coref_core::span_filter::select_non_crossing_spans;
///
/// let ranked = vec![Mention::new(0, 5), Mention::new(1, 3), Mention::new(4, 6)];
/// let kept = select_non_crossing_spans(&ranked, 3);
/// assert_eq!(kept, vec![Mention::new(0, 5), Mention::new(1, 3)]);
/// ```
pub fn select_non_crossing_spans(ranked: &[Mention], limit: usize) -> Vec<Mention> {
    select_non_crossing_indices(ranked, limit)
        .into_iter()
        .map(|idx| ranked[idx])
        .collect()
}

/// Número máximo de menções mantidas para um documento de `n_tokens` tokens.
///
/// `spans_per_word` é a razão "menções por palavra" (tipicamente 0.4).
pub fn mention_limit(n_tokens: usize, spans_per_word: f64) -> usize {
    (n_tokens as f64 * spans_per_word).floor() as usize
}

/// Ordena candidatos por score decrescente (ordenação estável).
///
/// # Panics
/// Se `candidates` e `scores` tiverem tamanhos diferentes.
pub fn rank_by_score(candidates: &[Mention], scores: &[f64]) -> Vec<Mention> {
    assert_eq!(
        candidates.len(),
        scores.len(),
        "cada candidato precisa de exatamente um score"
    );
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.into_iter().map(|i| candidates[i]).collect()
}

/// Ranqueia pelos scores do gerador de menções e aplica o filtro com o limite
/// derivado do tamanho do documento.
pub fn select_top_spans(
    candidates: &[Mention],
    scores: &[f64],
    n_tokens: usize,
    spans_per_word: f64,
) -> Vec<Mention> {
    let ranked = rank_by_score(candidates, scores);
    select_non_crossing_spans(&ranked, mention_limit(n_tokens, spans_per_word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(start: usize, end: usize) -> Mention {
        Mention::new(start, end)
    }

    #[test]
    fn test_nested_kept_crossing_dropped() {
        let ranked = vec![m(0, 5), m(1, 3), m(4, 6)];
        assert_eq!(select_non_crossing_spans(&ranked, 3), vec![m(0, 5), m(1, 3)]);
    }

    #[test]
    fn test_crossing_from_the_left_is_dropped() {
        // (3,8) aceito primeiro; (1,5) começa antes e termina dentro
        let ranked = vec![m(3, 8), m(1, 5)];
        assert_eq!(select_non_crossing_spans(&ranked, 10), vec![m(3, 8)]);
    }

    #[test]
    fn test_adjacent_spans_do_not_cross() {
        let ranked = vec![m(0, 5), m(5, 8)];
        assert_eq!(select_non_crossing_spans(&ranked, 10), vec![m(0, 5), m(5, 8)]);
    }

    #[test]
    fn test_limit_is_respected() {
        let ranked = vec![m(6, 7), m(0, 1), m(2, 3)];
        // Os dois primeiros da prioridade, reordenados por posição
        assert_eq!(select_non_crossing_spans(&ranked, 2), vec![m(0, 1), m(6, 7)]);
        assert!(select_non_crossing_spans(&ranked, 0).is_empty());
    }

    #[test]
    fn test_identical_span_accepted_within_limit() {
        let ranked = vec![m(2, 4), m(2, 4)];
        assert_eq!(select_non_crossing_spans(&ranked, 2), vec![m(2, 4), m(2, 4)]);
        assert_eq!(select_non_crossing_spans(&ranked, 1), vec![m(2, 4)]);
    }

    #[test]
    fn test_rank_by_score_is_stable() {
        let candidates = vec![m(0, 1), m(1, 2), m(2, 3)];
        let ranked = rank_by_score(&candidates, &[0.5, 0.9, 0.5]);
        assert_eq!(ranked, vec![m(1, 2), m(0, 1), m(2, 3)]);
    }

    #[test]
    fn test_select_top_spans_uses_ratio() {
        let candidates = vec![m(0, 2), m(1, 3), m(3, 4), m(5, 6)];
        let scores = [0.1, 0.8, 0.7, 0.9];
        // 5 tokens * 0.4 = 2 menções
        let kept = select_top_spans(&candidates, &scores, 5, 0.4);
        assert_eq!(kept, vec![m(1, 3), m(5, 6)]);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select_non_crossing_spans(&[], 5).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn span_strategy() -> impl Strategy<Value = Mention> {
            (0usize..30, 1usize..8).prop_map(|(start, len)| Mention::new(start, start + len))
        }

        proptest! {
            #[test]
            fn selected_spans_never_cross(
                ranked in prop::collection::vec(span_strategy(), 0..40),
                limit in 0usize..40,
            ) {
                let kept = select_non_crossing_spans(&ranked, limit);
                prop_assert!(kept.len() <= limit);
                for (i, a) in kept.iter().enumerate() {
                    for b in &kept[i + 1..] {
                        prop_assert!(!a.crosses(b), "{} cruza {}", a, b);
                    }
                }
                prop_assert!(kept.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
