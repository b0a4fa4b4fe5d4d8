//! # Resolução de Antecedentes: Scores → Clusters
//!
//! O modelo de pontuação (externo a este crate) devolve, para cada menção, um score
//! para cada antecedente candidato **mais** um score para o *placeholder*
//! ("nenhum antecedente válido"):
//!
//! ```text
//!              placeholder  cand_1  cand_2  ...  cand_K
//! menção 0   [    0.0,      -inf,   -inf,  ... ]
//! menção 1   [    0.0,       2.3,   -inf,  ... ]      indices[1] = [0, 0, ...]
//! menção 2   [    0.0,      -1.2,    0.7,  ... ]      indices[2] = [0, 1, ...]
//! ```
//!
//! A coluna `c > 0` da linha `i` refere-se à menção `indices[i][c - 1]`, que precisa
//! vir **antes** de `i` no documento.
//!
//! ## Decodificação
//!
//! 1. Para cada menção, arg-max sobre a linha inteira. Coluna 0 → sem antecedente.
//! 2. Cada ligação `i → a` junta `i` ao cluster de `a`, criando o cluster se `a` ainda
//!    não tiver um.
//! 3. Menções que nunca participam de uma ligação **não** viram clusters unitários.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CorefError, Result};
use crate::mention::{Cluster, Mention};

/// Scores `[num_mentions, 1 + K]`: coluna 0 é o placeholder.
pub type ScoreMatrix = Vec<Vec<f64>>;

/// Índices `[num_mentions, K]`: menção real referida por cada coluna candidata.
pub type AntecedentIndexTable = Vec<Vec<usize>>;

/// Saída do modelo de pontuação para um documento: scores e tabela de índices,
/// com formatos validados na construção.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAntecedents {
    scores: ScoreMatrix,
    indices: AntecedentIndexTable,
}

impl ScoredAntecedents {
    /// Valida e agrupa a matriz de scores com a tabela de índices.
    ///
    /// Exige o mesmo número de linhas, e `scores[i].len() == indices[i].len() + 1`
    /// com `K` constante entre as linhas.
    pub fn new(scores: ScoreMatrix, indices: AntecedentIndexTable) -> Result<Self> {
        if scores.len() != indices.len() {
            return Err(CorefError::ShapeMismatch(format!(
                "{} linhas de score para {} linhas de índices",
                scores.len(),
                indices.len()
            )));
        }
        let width = indices.first().map(Vec::len).unwrap_or(0);
        for (i, (score_row, index_row)) in scores.iter().zip(&indices).enumerate() {
            if index_row.len() != width {
                return Err(CorefError::ShapeMismatch(format!(
                    "linha {i} tem {} candidatos, esperado {width}",
                    index_row.len()
                )));
            }
            if score_row.len() != index_row.len() + 1 {
                return Err(CorefError::ShapeMismatch(format!(
                    "linha {i}: {} scores para {} candidatos (+1 placeholder)",
                    score_row.len(),
                    index_row.len()
                )));
            }
        }
        Ok(Self { scores, indices })
    }

    /// Número de menções (linhas).
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Número `K` de antecedentes candidatos por menção.
    pub fn num_candidates(&self) -> usize {
        self.indices.first().map(Vec::len).unwrap_or(0)
    }

    pub fn scores(&self) -> &ScoreMatrix {
        &self.scores
    }

    pub fn indices(&self) -> &AntecedentIndexTable {
        &self.indices
    }
}

/// Índice do primeiro máximo (desempate pela menor posição).
pub(crate) fn argmax(row: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in row.iter().enumerate().skip(1) {
        if value > row[best] {
            best = i;
        }
    }
    best
}

/// Antecedente previsto para uma linha: `None` quando o placeholder vence.
pub fn predicted_antecedent(score_row: &[f64], index_row: &[usize]) -> Option<usize> {
    match argmax(score_row) {
        0 => None,
        column => Some(index_row[column - 1]),
    }
}

/// Antecedente previsto de cada menção, em ordem de documento.
pub fn predicted_antecedents(scored: &ScoredAntecedents) -> Vec<Option<usize>> {
    scored
        .scores
        .iter()
        .zip(&scored.indices)
        .map(|(score_row, index_row)| predicted_antecedent(score_row, index_row))
        .collect()
}

/// Converte scores de antecedentes em clusters discretos.
///
/// `mentions[i]` é a menção da linha `i` de `scored`, em ordem de documento.
///
/// # Panics
/// - Se `mentions` e `scored` tiverem tamanhos diferentes.
/// - Se algum antecedente previsto não preceder sua menção: isso indica erro na
///   produção dos scores/índices, não uma condição recuperável.
pub fn predicted_clusters(mentions: &[Mention], scored: &ScoredAntecedents) -> Vec<Cluster> {
    assert_eq!(
        mentions.len(),
        scored.len(),
        "uma linha de scores por menção"
    );

    let antecedents = predicted_antecedents(scored);
    let mut mention_to_cluster: HashMap<Mention, usize> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for (i, antecedent) in antecedents.into_iter().enumerate() {
        let Some(a) = antecedent else {
            continue;
        };
        assert!(i > a, "antecedente {a} não precede a menção {i}");

        let antecedent_mention = mentions[a];
        let cluster_id = *mention_to_cluster.entry(antecedent_mention).or_insert_with(|| {
            clusters.push(vec![antecedent_mention]);
            clusters.len() - 1
        });
        clusters[cluster_id].push(mentions[i]);
        mention_to_cluster.insert(mentions[i], cluster_id);
    }

    debug!(
        mentions = mentions.len(),
        clusters = clusters.len(),
        "clusters previstos a partir dos antecedentes"
    );
    clusters
}

/// Poda grosseira: mantém os `k` melhores antecedentes anteriores de cada menção.
///
/// `pairwise[i][j]` é o score grosseiro da ligação `i → j`; apenas `j < i` é considerado.
/// Os candidatos vêm em ordem decrescente de score (empate: menor índice primeiro).
/// Linhas com menos de `K = min(k, n - 1)` antecedentes possíveis são completadas
/// com índice 0 e score `-inf`, que jamais vence o placeholder no arg-max.
///
/// # Panics
/// Se `pairwise` não for quadrada.
pub fn top_k_antecedents(pairwise: &[Vec<f64>], k: usize) -> (ScoreMatrix, AntecedentIndexTable) {
    let n = pairwise.len();
    let width = k.min(n.saturating_sub(1));
    let mut top_scores = Vec::with_capacity(n);
    let mut top_indices = Vec::with_capacity(n);

    for (i, row) in pairwise.iter().enumerate() {
        assert_eq!(row.len(), n, "a matriz de scores par-a-par deve ser quadrada");

        let mut candidates: Vec<usize> = (0..i).collect();
        candidates.sort_by(|&a, &b| {
            row[b]
                .partial_cmp(&row[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(width);

        let mut scores: Vec<f64> = candidates.iter().map(|&j| row[j]).collect();
        scores.resize(width, f64::NEG_INFINITY);
        candidates.resize(width, 0);

        top_scores.push(scores);
        top_indices.push(candidates);
    }

    (top_scores, top_indices)
}

/// Prepende a coluna do placeholder (score 0.0) a cada linha.
pub fn add_placeholder(candidate_scores: &[Vec<f64>]) -> ScoreMatrix {
    candidate_scores
        .iter()
        .map(|row| std::iter::once(0.0).chain(row.iter().copied()).collect())
        .collect()
}
