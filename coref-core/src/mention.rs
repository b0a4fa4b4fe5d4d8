//! # Menções e Clusters
//!
//! Uma **menção** é um trecho de tokens que pode se referir a uma entidade do mundo real.
//! Um **cluster** é o conjunto de menções que se referem à mesma entidade.
//!
//! ## Convenção de Offsets
//!
//! Os offsets são índices de **tokens** do documento (não de caracteres) e seguem a
//! convenção semiaberta `[start, end)`, a mesma de `Span` no NER:
//!
//! ```text
//! tokens:  Lula(0) disse(1) que(2) ele(3) viaja(4)
//! "Lula" = Mention { start: 0, end: 1 }
//! "ele"  = Mention { start: 3, end: 4 }
//! ```
//!
//! ## Cabeças (heads)
//!
//! Quando o sistema trabalha com palavras-cabeça em vez de spans completos, a cabeça
//! `h` é representada pela menção de um único token `(h, h + 1)`; veja [`Mention::head`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CorefError, Result};

/// Um span de tokens `[start, end)` candidato a referir uma entidade.
///
/// Imutável depois de criado. A ordenação derivada é a ordem de documento:
/// primeiro por `start`, depois por `end`. A desserialização passa por
/// [`Mention::try_new`], então `{"start": 5, "end": 0}` é rejeitado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawMention")]
pub struct Mention {
    /// Índice do token inicial (inclusivo)
    pub start: usize,
    /// Índice do token final (exclusivo)
    pub end: usize,
}

/// Forma serializada de uma menção, ainda sem validação.
#[derive(Deserialize)]
struct RawMention {
    start: usize,
    end: usize,
}

impl TryFrom<RawMention> for Mention {
    type Error = CorefError;

    fn try_from(raw: RawMention) -> Result<Self> {
        Mention::try_new(raw.start, raw.end)
    }
}

impl Mention {
    /// Cria uma menção.
    ///
    /// # Panics
    /// Se `start >= end`. Para dados de anotação não confiáveis use [`Mention::try_new`].
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start < end, "menção inválida: start={start} >= end={end}");
        Self { start, end }
    }

    /// Versão falível de [`Mention::new`].
    pub fn try_new(start: usize, end: usize) -> Result<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(CorefError::InvalidSpan { start, end })
        }
    }

    /// Menção de um único token representando a palavra-cabeça `h`.
    pub fn head(h: usize) -> Self {
        Self { start: h, end: h + 1 }
    }

    /// Número de tokens cobertos.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Sempre falso: uma menção válida cobre ao menos um token.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Verdadeiro se a menção cobre exatamente um token.
    pub fn is_head_only(&self) -> bool {
        self.len() == 1
    }

    /// `self` contém `other` (spans idênticos contam como contidos).
    pub fn contains(&self, other: &Mention) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Dois spans se **cruzam** quando se sobrepõem sem que um contenha o outro.
    pub fn crosses(&self, other: &Mention) -> bool {
        let overlap = self.start < other.end && other.start < self.end;
        overlap && !self.contains(other) && !other.contains(self)
    }
}

impl From<(usize, usize)> for Mention {
    fn from((start, end): (usize, usize)) -> Self {
        Mention::new(start, end)
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// Um cluster: menções que denotam a mesma entidade.
pub type Cluster = Vec<Mention>;

/// Mapeia cada menção para o índice do cluster que a contém.
///
/// Se uma menção aparecer em mais de um cluster (entrada não particionada),
/// vence a **primeira** ocorrência.
pub fn mention_to_cluster_id(clusters: &[Cluster]) -> HashMap<Mention, usize> {
    let mut map = HashMap::new();
    for (cluster_id, cluster) in clusters.iter().enumerate() {
        for mention in cluster {
            map.entry(*mention).or_insert(cluster_id);
        }
    }
    map
}

/// Converte clusters de spans em clusters de cabeças.
///
/// `heads` informa a palavra-cabeça de cada span; menções ausentes do mapa usam
/// o último token do span, heurística comum para sintagmas nominais.
pub fn head_only_clusters(clusters: &[Cluster], heads: &HashMap<Mention, usize>) -> Vec<Cluster> {
    clusters
        .iter()
        .map(|cluster| {
            cluster
                .iter()
                .map(|m| Mention::head(heads.get(m).copied().unwrap_or(m.end - 1)))
                .collect()
        })
        .collect()
}

/// Constrói clusters a partir de tuplas `(start, end)`, o formato trocado com os colaboradores.
pub fn clusters_from_tuples(raw: &[Vec<(usize, usize)>]) -> Vec<Cluster> {
    raw.iter()
        .map(|c| c.iter().map(|&t| Mention::from(t)).collect())
        .collect()
}

/// Inverso de [`clusters_from_tuples`].
pub fn clusters_to_tuples(clusters: &[Cluster]) -> Vec<Vec<(usize, usize)>> {
    clusters
        .iter()
        .map(|c| c.iter().map(|m| (m.start, m.end)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_empty_span() {
        assert!(Mention::try_new(3, 3).is_err());
        assert!(Mention::try_new(4, 2).is_err());
        assert_eq!(Mention::try_new(1, 2).unwrap(), Mention::new(1, 2));
    }

    #[test]
    fn test_deserialize_validates_span() {
        let mention: Mention = serde_json::from_str(r#"{"start": 2, "end": 4}"#).unwrap();
        assert_eq!(mention, Mention::new(2, 4));
        assert!(serde_json::from_str::<Mention>(r#"{"start": 5, "end": 0}"#).is_err());
        assert!(serde_json::from_str::<Mention>(r#"{"start": 3, "end": 3}"#).is_err());
        assert_eq!(serde_json::to_string(&mention).unwrap(), r#"{"start":2,"end":4}"#);
    }

    #[test]
    #[should_panic]
    fn test_new_panics_on_inverted_span() {
        let _ = Mention::new(5, 1);
    }

    #[test]
    fn test_crossing_vs_nesting() {
        let outer = Mention::new(0, 5);
        assert!(!outer.crosses(&Mention::new(1, 3)));
        assert!(outer.crosses(&Mention::new(4, 6)));
        assert!(!outer.crosses(&Mention::new(5, 8)));
        assert!(!outer.crosses(&outer));
    }

    #[test]
    fn test_mention_to_cluster_id_first_wins() {
        let clusters = vec![
            vec![Mention::new(0, 1), Mention::new(3, 4)],
            vec![Mention::new(3, 4), Mention::new(6, 7)],
        ];
        let map = mention_to_cluster_id(&clusters);
        assert_eq!(map[&Mention::new(3, 4)], 0);
        assert_eq!(map[&Mention::new(6, 7)], 1);
    }

    #[test]
    fn test_head_only_clusters() {
        let clusters = vec![vec![Mention::new(0, 3), Mention::new(5, 6)]];
        let mut heads = HashMap::new();
        heads.insert(Mention::new(0, 3), 1);
        let heads_only = head_only_clusters(&clusters, &heads);
        assert_eq!(heads_only, vec![vec![Mention::head(1), Mention::head(5)]]);
    }

    #[test]
    fn test_tuple_conversion() {
        let raw = vec![vec![(0, 2), (4, 5)]];
        let clusters = clusters_from_tuples(&raw);
        assert_eq!(clusters_to_tuples(&clusters), raw);
    }
}
