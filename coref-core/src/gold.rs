//! # Supervisão Gold
//!
//! Transforma os clusters anotados (gold) na matriz booleana usada como alvo do treino.
//!
//! ```text
//! gold[i][j] = true  ⇔  j < i  e  i, j pertencem ao mesmo cluster gold
//! ```
//!
//! Uma menção fora de qualquer cluster gold recebe uma linha toda `false`: o único
//! alvo correto para ela é o placeholder. A coluna do placeholder **não** é gerada
//! aqui; ela é sintetizada na perda ([`crate::loss`]) como "nenhum candidato é gold".

use crate::antecedent::AntecedentIndexTable;
use crate::mention::{mention_to_cluster_id, Cluster, Mention};

/// Matriz `[N, N]` de alvos: `gold[i][j]` indica se `j` é antecedente gold de `i`.
pub type GoldScoreMatrix = Vec<Vec<bool>>;

/// Constrói a matriz de supervisão para as menções candidatas de um documento.
///
/// `candidates` deve estar em ordem de documento. Os clusters gold devem formar uma
/// partição; se uma menção aparecer em dois clusters, vale o primeiro.
pub fn gold_scores(candidates: &[Mention], gold_clusters: &[Cluster]) -> GoldScoreMatrix {
    let mention_to_gold = mention_to_cluster_id(gold_clusters);
    let n = candidates.len();

    candidates
        .iter()
        .enumerate()
        .map(|(i, mention)| {
            let Some(&cluster_id) = mention_to_gold.get(mention) else {
                return vec![false; n];
            };
            candidates
                .iter()
                .enumerate()
                .map(|(j, antecedent)| {
                    j < i && mention_to_gold.get(antecedent) == Some(&cluster_id)
                })
                .collect()
        })
        .collect()
}

/// Seleciona, para cada menção, apenas os candidatos que foram de fato pontuados.
///
/// O resultado tem o formato da tabela de índices `[N, K]`, alinhado com as colunas
/// de candidatos da matriz de scores (sem o placeholder).
///
/// # Panics
/// Se a tabela referir uma menção fora da matriz gold.
pub fn gather_gold_rows(gold: &GoldScoreMatrix, indices: &AntecedentIndexTable) -> Vec<Vec<bool>> {
    assert_eq!(gold.len(), indices.len(), "uma linha gold por menção");
    gold.iter()
        .zip(indices)
        .map(|(gold_row, index_row)| index_row.iter().map(|&j| gold_row[j]).collect())
        .collect()
}

/// Atalho: constrói a matriz gold e já recolhe as linhas dos candidatos pontuados.
pub fn gold_antecedent_rows(
    candidates: &[Mention],
    gold_clusters: &[Cluster],
    indices: &AntecedentIndexTable,
) -> Vec<Vec<bool>> {
    gather_gold_rows(&gold_scores(candidates, gold_clusters), indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(start: usize, end: usize) -> Mention {
        Mention::new(start, end)
    }

    #[test]
    fn test_gold_scores_lower_triangular() {
        let candidates = vec![m(0, 1), m(2, 3), m(4, 5), m(6, 7)];
        let gold = vec![vec![m(0, 1), m(4, 5), m(6, 7)]];
        let scores = gold_scores(&candidates, &gold);

        assert_eq!(scores[0], vec![false, false, false, false]);
        // m(2,3) não pertence a nenhum cluster gold
        assert_eq!(scores[1], vec![false, false, false, false]);
        assert_eq!(scores[2], vec![true, false, false, false]);
        assert_eq!(scores[3], vec![true, false, true, false]);
    }

    #[test]
    fn test_mention_outside_gold_has_all_false_row() {
        let candidates = vec![m(0, 1), m(1, 2), m(2, 3)];
        let gold = vec![vec![m(0, 1), m(1, 2)]];
        let scores = gold_scores(&candidates, &gold);
        assert!(scores[2].iter().all(|&v| !v));
    }

    #[test]
    fn test_gather_follows_index_table() {
        let candidates = vec![m(0, 1), m(2, 3), m(4, 5)];
        let gold = vec![vec![m(0, 1), m(4, 5)]];
        let indices = vec![vec![0, 0], vec![0, 0], vec![1, 0]];
        let rows = gold_antecedent_rows(&candidates, &gold, &indices);
        assert_eq!(rows, vec![vec![false, false], vec![false, false], vec![false, true]]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(gold_scores(&[], &[]).is_empty());
        let candidates = vec![m(0, 1)];
        assert_eq!(gold_scores(&candidates, &[]), vec![vec![false]]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rows_outside_gold_are_all_false(
                n in 1usize..15,
                gold_members in prop::collection::vec(0usize..15, 0..10),
            ) {
                let candidates: Vec<Mention> = (0..n).map(|i| Mention::new(i, i + 1)).collect();
                let mut cluster: Cluster = gold_members
                    .iter()
                    .filter(|&&i| i < n)
                    .map(|&i| Mention::new(i, i + 1))
                    .collect();
                cluster.sort();
                cluster.dedup();
                let gold = vec![cluster.clone()];
                let scores = gold_scores(&candidates, &gold);
                for (i, mention) in candidates.iter().enumerate() {
                    if !cluster.contains(mention) {
                        prop_assert!(scores[i].iter().all(|&v| !v));
                    }
                    prop_assert!(scores[i][i..].iter().all(|&v| !v));
                }
            }
        }
    }
}
