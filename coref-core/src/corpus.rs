//! # Corpus de Demonstração com Correferência Anotada
//!
//! Pequenos documentos em português brasileiro com clusters gold e a palavra-cabeça
//! de cada menção. Servem para testes e para demonstrar o pipeline de ponta a ponta.
//!
//! Offsets são índices de tokens, semiabertos: `(2, 4)` cobre os tokens 2 e 3.

use std::collections::HashMap;

use crate::mention::{head_only_clusters, Cluster, Mention};
use crate::pipeline::DocumentInput;

/// Um documento tokenizado com anotação de correferência.
pub struct AnnotatedDocument {
    pub text: &'static str,
    pub domain: &'static str,
    pub tokens: &'static [&'static str],
    /// Sentença de cada token.
    pub sentence_ids: &'static [usize],
    /// Clusters gold como tuplas `(start, end)`.
    pub clusters: &'static [&'static [(usize, usize)]],
    /// Palavra-cabeça de cada menção gold.
    pub heads: &'static [((usize, usize), usize)],
}

impl AnnotatedDocument {
    pub fn n_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn gold_clusters(&self) -> Vec<Cluster> {
        self.clusters
            .iter()
            .map(|c| c.iter().map(|&t| Mention::from(t)).collect())
            .collect()
    }

    /// Menções gold em ordem de documento.
    pub fn gold_mentions(&self) -> Vec<Mention> {
        let mut mentions: Vec<Mention> = self.gold_clusters().into_iter().flatten().collect();
        mentions.sort();
        mentions
    }

    pub fn head_map(&self) -> HashMap<Mention, usize> {
        self.heads
            .iter()
            .map(|&(span, head)| (Mention::from(span), head))
            .collect()
    }

    /// Clusters gold reduzidos às cabeças.
    pub fn gold_head_clusters(&self) -> Vec<Cluster> {
        head_only_clusters(&self.gold_clusters(), &self.head_map())
    }

    /// Entrada do pipeline com as menções gold como candidatas.
    pub fn gold_input(&self) -> DocumentInput {
        DocumentInput {
            sentence_ids: self.sentence_ids.to_vec(),
            candidates: self.gold_mentions(),
            candidate_scores: None,
        }
    }

    /// Entrada do pipeline com as cabeças gold como candidatas (menções de um token).
    pub fn head_input(&self) -> DocumentInput {
        let mut heads: Vec<Mention> = self.gold_head_clusters().into_iter().flatten().collect();
        heads.sort();
        DocumentInput {
            sentence_ids: self.sentence_ids.to_vec(),
            candidates: heads,
            candidate_scores: None,
        }
    }
}

/// Retorna o corpus de demonstração completo.
pub fn demo_documents() -> Vec<AnnotatedDocument> {
    vec![
        // ===== POLÍTICA =====
        AnnotatedDocument {
            text: "Lula visitou o Recife. Ele elogiou a cidade.",
            domain: "política",
            tokens: &[
                "Lula", "visitou", "o", "Recife", ".", "Ele", "elogiou", "a", "cidade", ".",
            ],
            sentence_ids: &[0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
            clusters: &[&[(0, 1), (5, 6)], &[(2, 4), (7, 9)]],
            heads: &[((0, 1), 0), ((5, 6), 5), ((2, 4), 3), ((7, 9), 8)],
        },
        // ===== ECONOMIA =====
        AnnotatedDocument {
            text: "A Petrobras anunciou lucro recorde. A empresa vai distribuir dividendos.",
            domain: "economia",
            tokens: &[
                "A", "Petrobras", "anunciou", "lucro", "recorde", ".", "A", "empresa", "vai",
                "distribuir", "dividendos", ".",
            ],
            sentence_ids: &[0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1],
            clusters: &[&[(0, 2), (6, 8)]],
            heads: &[((0, 2), 1), ((6, 8), 7)],
        },
        // ===== COTIDIANO =====
        AnnotatedDocument {
            text: "Maria disse a João que ela o ajudaria.",
            domain: "cotidiano",
            tokens: &["Maria", "disse", "a", "João", "que", "ela", "o", "ajudaria", "."],
            sentence_ids: &[0, 0, 0, 0, 0, 0, 0, 0, 0],
            clusters: &[&[(0, 1), (5, 6)], &[(3, 4), (6, 7)]],
            heads: &[((0, 1), 0), ((5, 6), 5), ((3, 4), 3), ((6, 7), 6)],
        },
        // ===== ESPORTES =====
        AnnotatedDocument {
            text: "O Flamengo venceu o clássico. O técnico do clube comemorou a vitória do Flamengo.",
            domain: "esportes",
            tokens: &[
                "O", "Flamengo", "venceu", "o", "clássico", ".", "O", "técnico", "do", "clube",
                "comemorou", "a", "vitória", "do", "Flamengo", ".",
            ],
            sentence_ids: &[0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
            clusters: &[&[(0, 2), (9, 10), (14, 15)]],
            heads: &[((0, 2), 1), ((9, 10), 9), ((14, 15), 14)],
        },
    ]
}
