//! # Métricas de Correferência
//!
//! Cada métrica define de forma diferente o que é uma "unidade" corretamente prevista:
//!
//! | Métrica | Unidade | Observação |
//! |---------|---------|------------|
//! | MUC     | Links   | Ignora singletons; favorece clusters grandes |
//! | B³      | Menções | Média por menção do overlap com o cluster gold |
//! | CEAFe   | Entidades | Alinhamento 1:1 de clusters com similaridade Dice (`phi4`) |
//! | CEAFm   | Menções | Alinhamento 1:1 com overlap bruto (`phi3`) |
//! | LEA     | Links + singletons | Pondera cada entidade pelo seu tamanho |
//!
//! Todas as funções devolvem **numeradores e denominadores**, nunca razões: somar
//! contagens entre documentos é associativo, e a razão só é calculada no final
//! pelo [`crate::evaluator::Evaluator`].
//!
//! ```text
//! b_cubed / muc / mentions / lea:  (num, den)         chamadas uma vez por direção
//! ceafe / ceafm:                   (p_num, p_den, r_num, r_den)
//! ```
//!
//! Os mapas `menção → id de cluster` são os da outra clusterização (ver
//! [`crate::evaluator::get_cluster_info`]). Entradas vazias resultam em zeros.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::assignment::{assignment_weight, max_weight_assignment};
use crate::evaluator::Prf;
use crate::mention::{Cluster, Mention};

/// Mapa de cada menção para o índice do cluster que a contém na outra clusterização.
pub type MentionMap = HashMap<Mention, usize>;

/// Overlap bruto: `|c1 ∩ c2|`.
pub fn phi3(c1: &[Mention], c2: &[Mention]) -> f64 {
    let other: HashSet<&Mention> = c2.iter().collect();
    c1.iter().filter(|m| other.contains(m)).count() as f64
}

/// Coeficiente de Dice: `2·|c1 ∩ c2| / (|c1| + |c2|)`.
pub fn phi4(c1: &[Mention], c2: &[Mention]) -> f64 {
    let total = c1.len() + c2.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * phi3(c1, c2) / total as f64
}

/// Fração das menções de `clusters` presentes no mapa (detecção de menções).
pub fn mentions(clusters: &[Cluster], mention_to_gold: &MentionMap) -> (f64, f64) {
    let all: HashSet<&Mention> = clusters.iter().flatten().collect();
    let correct = all.iter().filter(|&&m| mention_to_gold.contains_key(m)).count();
    (correct as f64, all.len() as f64)
}

/// B³: para cada cluster, `Σ_g contagem[g]² / |c|` sobre os clusters gold `g` tocados.
pub fn b_cubed(clusters: &[Cluster], mention_to_gold: &MentionMap) -> (f64, f64) {
    let mut num = 0.0;
    let mut den = 0.0;

    for cluster in clusters.iter().filter(|c| !c.is_empty()) {
        let mut gold_counts: HashMap<usize, usize> = HashMap::new();
        for mention in cluster {
            if let Some(&gold_id) = mention_to_gold.get(mention) {
                *gold_counts.entry(gold_id).or_insert(0) += 1;
            }
        }
        let correct: usize = gold_counts.values().map(|count| count * count).sum();
        num += correct as f64 / cluster.len() as f64;
        den += cluster.len() as f64;
    }

    (num, den)
}

/// MUC: links de cada cluster (`n - 1`) menos as partições que ele sofre na outra
/// clusterização.
///
/// ```text
/// p  += n - 1
/// tp += n - |ids distintos| - |menções fora do mapa|
/// ```
pub fn muc(clusters: &[Cluster], mention_to_gold: &MentionMap) -> (f64, f64) {
    let mut tp = 0i64;
    let mut p = 0i64;

    for cluster in clusters.iter().filter(|c| !c.is_empty()) {
        p += cluster.len() as i64 - 1;
        tp += cluster.len() as i64;
        let mut linked = HashSet::new();
        for mention in cluster {
            match mention_to_gold.get(mention) {
                Some(&gold_id) => {
                    linked.insert(gold_id);
                }
                None => tp -= 1,
            }
        }
        tp -= linked.len() as i64;
    }

    (tp as f64, p as f64)
}

/// Similaridade total do melhor alinhamento 1:1 entre clusters gold e previstos.
fn optimal_similarity(
    clusters: &[Cluster],
    gold_clusters: &[Cluster],
    phi: fn(&[Mention], &[Mention]) -> f64,
) -> f64 {
    let scores: Vec<Vec<f64>> = gold_clusters
        .iter()
        .map(|gold| clusters.iter().map(|pred| phi(gold, pred)).collect())
        .collect();
    let pairs = max_weight_assignment(&scores);
    trace!(pares = pairs.len(), "alinhamento CEAF resolvido");
    assignment_weight(&scores, &pairs)
}

/// CEAF por entidade (`phi4`): denominadores são os números de clusters.
pub fn ceafe(clusters: &[Cluster], gold_clusters: &[Cluster]) -> (f64, f64, f64, f64) {
    let similarity = optimal_similarity(clusters, gold_clusters, phi4);
    (
        similarity,
        clusters.len() as f64,
        similarity,
        gold_clusters.len() as f64,
    )
}

/// CEAF por menção (`phi3`): denominadores são os números de clusters, como em `ceafe`.
pub fn ceafm(clusters: &[Cluster], gold_clusters: &[Cluster]) -> (f64, f64, f64, f64) {
    let similarity = optimal_similarity(clusters, gold_clusters, phi3);
    (
        similarity,
        clusters.len() as f64,
        similarity,
        gold_clusters.len() as f64,
    )
}

/// LEA: importância de cada entidade (`n`) vezes a fração de seus links resolvidos.
///
/// Singletons têm um único "auto-link", resolvido quando a menção também é singleton
/// do outro lado.
pub fn lea(
    input_clusters: &[Cluster],
    output_clusters: &[Cluster],
    mention_to_gold: &MentionMap,
) -> (f64, f64) {
    let mut num = 0.0;
    let mut den = 0.0;

    for cluster in input_clusters.iter().filter(|c| !c.is_empty()) {
        let n = cluster.len();
        let (common_links, all_links) = if n == 1 {
            let resolved = mention_to_gold
                .get(&cluster[0])
                .and_then(|&id| output_clusters.get(id))
                .is_some_and(|other| other.len() == 1);
            (usize::from(resolved), 1)
        } else {
            let mut common = 0;
            for (i, a) in cluster.iter().enumerate() {
                let Some(id_a) = mention_to_gold.get(a) else {
                    continue;
                };
                common += cluster[i + 1..]
                    .iter()
                    .filter(|&b| mention_to_gold.get(b) == Some(id_a))
                    .count();
            }
            (common, n * (n - 1) / 2)
        };
        num += n as f64 * common_links as f64 / all_links as f64;
        den += n as f64;
    }

    (num, den)
}

/// Menções não-referenciais (sem antecedente) de um documento: anotadas e previstas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonReferringInfo {
    pub key: HashSet<Mention>,
    pub sys: HashSet<Mention>,
}

/// Precisão/cobertura/F1 da detecção de menções não-referenciais em um conjunto de documentos.
pub fn evaluate_non_referrings(docs: &[NonReferringInfo]) -> Prf {
    let mut tp = 0usize;
    let mut fn_ = 0usize;
    let mut fp = 0usize;

    for doc in docs {
        let hits = doc.key.intersection(&doc.sys).count();
        tp += hits;
        fn_ += doc.key.len() - hits;
        fp += doc.sys.len() - hits;
    }

    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Prf {
        precision,
        recall,
        f1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::mention_to_cluster_id;

    fn m(i: usize) -> Mention {
        Mention::new(i, i + 1)
    }

    fn cluster(ids: &[usize]) -> Cluster {
        ids.iter().map(|&i| m(i)).collect()
    }

    /// Mapa de cada menção de `from` para o cluster de `to` que a contém.
    fn map_into(from: &[Cluster], to: &[Cluster]) -> MentionMap {
        let index = mention_to_cluster_id(to);
        from.iter()
            .flatten()
            .filter_map(|mention| index.get(mention).map(|&id| (*mention, id)))
            .collect()
    }

    #[test]
    fn test_phi() {
        let a = cluster(&[1, 2, 3]);
        let b = cluster(&[2, 3, 4, 5]);
        assert!((phi3(&a, &b) - 2.0).abs() < 1e-9);
        assert!((phi4(&a, &b) - 4.0 / 7.0).abs() < 1e-9);
        assert_eq!(phi4(&[], &[]), 0.0);
    }

    #[test]
    fn test_b_cubed_over_merged_cluster() {
        let pred = vec![cluster(&[1, 2, 3])];
        let gold = vec![cluster(&[1, 2]), cluster(&[3])];

        let (p_num, p_den) = b_cubed(&pred, &map_into(&pred, &gold));
        let (r_num, r_den) = b_cubed(&gold, &map_into(&gold, &pred));
        assert!((p_num / p_den - 5.0 / 9.0).abs() < 1e-9);
        assert!((r_num / r_den - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_muc_over_merged_cluster() {
        let pred = vec![cluster(&[1, 2, 3])];
        let gold = vec![cluster(&[1, 2]), cluster(&[3])];

        let (p_num, p_den) = muc(&pred, &map_into(&pred, &gold));
        let (r_num, r_den) = muc(&gold, &map_into(&gold, &pred));
        assert_eq!((p_num, p_den), (1.0, 2.0));
        assert_eq!((r_num, r_den), (1.0, 1.0));
    }

    #[test]
    fn test_muc_missing_mentions_cost_links() {
        let pred = vec![cluster(&[1, 2, 9])];
        let gold = vec![cluster(&[1, 2])];
        // 3 - 1 (menção 9 fora do gold) - 1 (um id distinto) = 1
        let (tp, p) = muc(&pred, &map_into(&pred, &gold));
        assert_eq!((tp, p), (1.0, 2.0));
    }

    #[test]
    fn test_ceafe_perfect_match() {
        let gold = vec![cluster(&[1, 2]), cluster(&[3])];
        let (p_num, p_den, r_num, r_den) = ceafe(&gold, &gold);
        assert!((p_num - 2.0).abs() < 1e-9);
        assert_eq!((p_den, r_den), (2.0, 2.0));
        assert!((r_num - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ceafm_uses_cluster_counts() {
        let pred = vec![cluster(&[1, 2, 3])];
        let gold = vec![cluster(&[1, 2]), cluster(&[3])];
        let (p_num, p_den, r_num, r_den) = ceafm(&pred, &gold);
        // {1,2,3} casa com {1,2}: duas menções em comum
        assert!((p_num - 2.0).abs() < 1e-9);
        assert!((r_num - 2.0).abs() < 1e-9);
        assert_eq!((p_den, r_den), (1.0, 2.0));
    }

    #[test]
    fn test_lea_singletons_and_links() {
        let pred = vec![cluster(&[1, 2, 3])];
        let gold = vec![cluster(&[1, 2]), cluster(&[3])];

        // Precisão: 1 de 3 links resolvidos, peso 3
        let (p_num, p_den) = lea(&pred, &gold, &map_into(&pred, &gold));
        assert!((p_num - 1.0).abs() < 1e-9);
        assert_eq!(p_den, 3.0);

        // Cobertura: {1,2} resolvido (peso 2); {3} não é singleton na previsão
        let (r_num, r_den) = lea(&gold, &pred, &map_into(&gold, &pred));
        assert!((r_num - 2.0).abs() < 1e-9);
        assert_eq!(r_den, 3.0);
    }

    #[test]
    fn test_lea_matching_singleton() {
        let clusters = vec![cluster(&[4])];
        let (num, den) = lea(&clusters, &clusters, &map_into(&clusters, &clusters));
        assert_eq!((num, den), (1.0, 1.0));
    }

    #[test]
    fn test_mentions_detection() {
        let pred = vec![cluster(&[1, 2]), cluster(&[7])];
        let gold = vec![cluster(&[1, 2, 3])];
        assert_eq!(mentions(&pred, &map_into(&pred, &gold)), (2.0, 3.0));
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        let empty = MentionMap::new();
        assert_eq!(b_cubed(&[], &empty), (0.0, 0.0));
        assert_eq!(muc(&[], &empty), (0.0, 0.0));
        assert_eq!(lea(&[], &[], &empty), (0.0, 0.0));
        assert_eq!(ceafe(&[], &[]), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(ceafm(&[], &[]), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(evaluate_non_referrings(&[]), Prf::default());
    }

    #[test]
    fn test_non_referrings() {
        let docs = vec![NonReferringInfo {
            key: [m(1), m(2)].into_iter().collect(),
            sys: [m(2), m(5), m(6)].into_iter().collect(),
        }];
        let prf = evaluate_non_referrings(&docs);
        assert!((prf.recall - 0.5).abs() < 1e-9);
        assert!((prf.precision - 1.0 / 3.0).abs() < 1e-9);
        assert!((prf.f1 - 0.4).abs() < 1e-9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Partição aleatória das menções `0..n` em até `k` clusters não vazios.
        fn clustering(n: usize, k: usize) -> impl Strategy<Value = Vec<Cluster>> {
            prop::collection::vec(0..k, n).prop_map(move |labels| {
                let mut clusters: Vec<Cluster> = vec![Vec::new(); k];
                for (i, label) in labels.into_iter().enumerate() {
                    clusters[label].push(m(i));
                }
                clusters.retain(|c| !c.is_empty());
                clusters
            })
        }

        proptest! {
            #[test]
            fn ceaf_beats_any_fixed_assignment(
                pred in clustering(10, 4),
                gold in clustering(10, 4),
                shift in 0usize..4,
            ) {
                let (similarity, _, _, _) = ceafe(&pred, &gold);
                // Alinhamento fixo: gold i -> pred (i + shift) mod |pred|, sem repetição
                let width = pred.len().min(gold.len());
                let fixed: f64 = (0..width)
                    .map(|i| phi4(&gold[i], &pred[(i + shift) % width]))
                    .sum();
                prop_assert!(similarity + 1e-9 >= fixed);

                let (similarity_m, _, _, _) = ceafm(&pred, &gold);
                let fixed_m: f64 = (0..width)
                    .map(|i| phi3(&gold[i], &pred[(i + shift) % width]))
                    .sum();
                prop_assert!(similarity_m + 1e-9 >= fixed_m);
            }
        }
    }
}
