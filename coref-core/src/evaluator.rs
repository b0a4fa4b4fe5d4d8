//! # Avaliador Acumulativo
//!
//! Um [`Evaluator`] por métrica acumula numeradores e denominadores documento a
//! documento. A razão só é calculada na leitura, então avaliar um corpus em
//! pedaços e somar os acumuladores dá o mesmo resultado que avaliar em sequência:
//!
//! ```text
//! update(A); update(B)  ≡  merge(acumulador(A), acumulador(B))
//!
//! precisão = p_num / (p_den + ε)        ε = 1e-100
//! cobertura = r_num / (r_den + ε)
//! F_β      = (1 + β²)·P·R / (β²·P + R + ε)
//! ```
//!
//! O F1 "coref" reportado é a média de MUC, B³ e CEAFe; LEA é reportado à parte.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CorefConfig;
use crate::error::Result;
use crate::mention::{mention_to_cluster_id, Cluster, Mention};
use crate::metrics::{b_cubed, ceafe, ceafm, lea, mentions, muc, MentionMap};

const EPSILON: f64 = 1e-100;

/// Métricas suportadas. A variante decide a convenção de chamada em [`Evaluator::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    BCubed,
    Muc,
    Ceafe,
    Ceafm,
    Lea,
    Mentions,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::BCubed,
        MetricKind::Muc,
        MetricKind::Ceafe,
        MetricKind::Ceafm,
        MetricKind::Lea,
        MetricKind::Mentions,
    ];

    /// Nome usado nos relatórios.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::BCubed => "b_cubed",
            MetricKind::Muc => "muc",
            MetricKind::Ceafe => "ceafe",
            MetricKind::Ceafm => "ceafm",
            MetricKind::Lea => "lea",
            MetricKind::Mentions => "mentions",
        }
    }
}

/// Numeradores e denominadores de precisão e cobertura.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub p_num: f64,
    pub p_den: f64,
    pub r_num: f64,
    pub r_den: f64,
}

impl Counts {
    pub fn new(p_num: f64, p_den: f64, r_num: f64, r_den: f64) -> Self {
        Self {
            p_num,
            p_den,
            r_num,
            r_den,
        }
    }

    pub fn precision(&self) -> f64 {
        self.p_num / (self.p_den + EPSILON)
    }

    pub fn recall(&self) -> f64 {
        self.r_num / (self.r_den + EPSILON)
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Counts) -> Counts {
        Counts {
            p_num: self.p_num + rhs.p_num,
            p_den: self.p_den + rhs.p_den,
            r_num: self.r_num + rhs.r_num,
            r_den: self.r_den + rhs.r_den,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

/// `F_β` com divisão protegida; `f1(counts, 1.0)` é o F1 usual.
pub fn f1(counts: &Counts, beta: f64) -> f64 {
    let p = counts.precision();
    let r = counts.recall();
    let beta2 = beta * beta;
    (1.0 + beta2) * p * r / (beta2 * p + r + EPSILON)
}

/// Precisão, cobertura e F1 de uma métrica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Prf {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Clusterizações gold (key) e prevista (sys) de um documento, com os mapas cruzados.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterInfo {
    pub key_clusters: Vec<Cluster>,
    pub sys_clusters: Vec<Cluster>,
    /// Menção gold → índice do cluster previsto que a contém.
    pub key_mention_sys_cluster: MentionMap,
    /// Menção prevista → índice do cluster gold que a contém.
    pub sys_mention_key_cluster: MentionMap,
}

/// Atribui a cada menção de `from` o cluster de `to` com uma menção idêntica.
fn markable_assignments(from: &[Cluster], to: &[Cluster]) -> MentionMap {
    let index = mention_to_cluster_id(to);
    from.iter()
        .flatten()
        .filter_map(|mention| index.get(mention).map(|&id| (*mention, id)))
        .collect()
}

/// Monta o [`ClusterInfo`] de um documento.
///
/// Se uma menção aparecer em mais de um cluster, vale o primeiro.
pub fn get_cluster_info(predicted: &[Cluster], gold: &[Cluster]) -> ClusterInfo {
    ClusterInfo {
        key_mention_sys_cluster: markable_assignments(gold, predicted),
        sys_mention_key_cluster: markable_assignments(predicted, gold),
        key_clusters: gold.to_vec(),
        sys_clusters: predicted.to_vec(),
    }
}

/// Acumulador de uma métrica ao longo de documentos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluator {
    kind: MetricKind,
    beta: f64,
    counts: Counts,
    history: Option<Vec<Counts>>,
}

impl Evaluator {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            beta: 1.0,
            counts: Counts::default(),
            history: None,
        }
    }

    /// Como [`Evaluator::new`], mas guarda as contagens de cada documento.
    pub fn with_history(kind: MetricKind) -> Self {
        Self {
            history: Some(Vec::new()),
            ..Self::new(kind)
        }
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Contagens de um documento segundo a convenção de chamada da métrica.
    pub fn document_counts(kind: MetricKind, info: &ClusterInfo) -> Counts {
        let key = &info.key_clusters;
        let sys = &info.sys_clusters;
        match kind {
            MetricKind::Ceafe => {
                let (pn, pd, rn, rd) = ceafe(sys, key);
                Counts::new(pn, pd, rn, rd)
            }
            MetricKind::Ceafm => {
                let (pn, pd, rn, rd) = ceafm(sys, key);
                Counts::new(pn, pd, rn, rd)
            }
            MetricKind::Lea => {
                let (pn, pd) = lea(sys, key, &info.sys_mention_key_cluster);
                let (rn, rd) = lea(key, sys, &info.key_mention_sys_cluster);
                Counts::new(pn, pd, rn, rd)
            }
            MetricKind::BCubed | MetricKind::Muc | MetricKind::Mentions => {
                let metric: fn(&[Cluster], &MentionMap) -> (f64, f64) = match kind {
                    MetricKind::BCubed => b_cubed,
                    MetricKind::Muc => muc,
                    _ => mentions,
                };
                let (pn, pd) = metric(sys, &info.sys_mention_key_cluster);
                let (rn, rd) = metric(key, &info.key_mention_sys_cluster);
                Counts::new(pn, pd, rn, rd)
            }
        }
    }

    /// Soma as contagens de um documento ao acumulador e as devolve.
    pub fn update(&mut self, info: &ClusterInfo) -> Counts {
        let doc = Self::document_counts(self.kind, info);
        self.counts += doc;
        if let Some(history) = self.history.as_mut() {
            history.push(doc);
        }
        doc
    }

    /// Incorpora um acumulador independente da mesma métrica.
    ///
    /// # Panics
    /// Se as métricas forem diferentes.
    pub fn merge(&mut self, other: &Evaluator) {
        assert_eq!(self.kind, other.kind, "só é possível somar acumuladores da mesma métrica");
        self.counts += other.counts;
        if let (Some(mine), Some(theirs)) = (self.history.as_mut(), other.history.as_ref()) {
            mine.extend_from_slice(theirs);
        }
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    /// Contagens por documento, quando o acumulador foi criado com histórico.
    pub fn history(&self) -> Option<&[Counts]> {
        self.history.as_deref()
    }

    pub fn get_precision(&self) -> f64 {
        self.counts.precision()
    }

    pub fn get_recall(&self) -> f64 {
        self.counts.recall()
    }

    pub fn get_f1(&self) -> f64 {
        f1(&self.counts, self.beta)
    }

    pub fn get_prf(&self) -> Prf {
        Prf {
            precision: self.get_precision(),
            recall: self.get_recall(),
            f1: self.get_f1(),
        }
    }
}

/// Relatório `nome da métrica → {precision, recall, f1}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreReport {
    pub scores: BTreeMap<String, Prf>,
}

impl ScoreReport {
    pub fn get(&self, name: &str) -> Option<&Prf> {
        self.scores.get(name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Conjunto de avaliadores, um por métrica configurada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorefScorer {
    evaluators: Vec<Evaluator>,
}

/// Métricas cuja média forma o F1 "coref".
const CONLL_METRICS: [MetricKind; 3] = [MetricKind::Muc, MetricKind::BCubed, MetricKind::Ceafe];

impl CorefScorer {
    pub fn new(metrics: &[MetricKind], keep_history: bool) -> Self {
        let evaluators = metrics
            .iter()
            .map(|&kind| {
                if keep_history {
                    Evaluator::with_history(kind)
                } else {
                    Evaluator::new(kind)
                }
            })
            .collect();
        Self { evaluators }
    }

    pub fn from_config(config: &CorefConfig) -> Self {
        Self::new(&config.metrics, config.keep_aggregated_values)
    }

    /// Avalia um documento em todas as métricas.
    pub fn update(&mut self, predicted: &[Cluster], gold: &[Cluster]) {
        let info = get_cluster_info(predicted, gold);
        for evaluator in &mut self.evaluators {
            evaluator.update(&info);
        }
    }

    /// # Panics
    /// Se os dois avaliadores não tiverem as mesmas métricas na mesma ordem.
    pub fn merge(&mut self, other: &CorefScorer) {
        assert_eq!(
            self.evaluators.len(),
            other.evaluators.len(),
            "avaliadores com conjuntos de métricas diferentes"
        );
        for (mine, theirs) in self.evaluators.iter_mut().zip(&other.evaluators) {
            mine.merge(theirs);
        }
    }

    pub fn evaluator(&self, kind: MetricKind) -> Option<&Evaluator> {
        self.evaluators.iter().find(|e| e.kind() == kind)
    }

    pub fn evaluators(&self) -> &[Evaluator] {
        &self.evaluators
    }

    /// Média de MUC, B³ e CEAFe, quando as três estão configuradas.
    pub fn conll_average(&self) -> Option<Prf> {
        let parts: Vec<Prf> = CONLL_METRICS
            .iter()
            .map(|&kind| self.evaluator(kind).map(Evaluator::get_prf))
            .collect::<Option<_>>()?;
        let n = parts.len() as f64;
        Some(Prf {
            precision: parts.iter().map(|p| p.precision).sum::<f64>() / n,
            recall: parts.iter().map(|p| p.recall).sum::<f64>() / n,
            f1: parts.iter().map(|p| p.f1).sum::<f64>() / n,
        })
    }

    pub fn report(&self) -> ScoreReport {
        let mut scores: BTreeMap<String, Prf> = self
            .evaluators
            .iter()
            .map(|e| (e.kind().name().to_string(), e.get_prf()))
            .collect();
        if let Some(average) = self.conll_average() {
            scores.insert("coref".to_string(), average);
        }
        ScoreReport { scores }
    }
}

/// Avalia um corpus em sequência.
///
/// # Panics
/// Se `predicted` e `gold` tiverem números diferentes de documentos.
pub fn score_corpus(
    predicted: &[Vec<Cluster>],
    gold: &[Vec<Cluster>],
    metrics: &[MetricKind],
) -> CorefScorer {
    assert_eq!(predicted.len(), gold.len(), "um documento previsto por documento gold");
    let mut scorer = CorefScorer::new(metrics, false);
    for (doc_pred, doc_gold) in predicted.iter().zip(gold) {
        scorer.update(doc_pred, doc_gold);
    }
    info!(documentos = gold.len(), "corpus avaliado");
    scorer
}

/// Avalia um corpus em paralelo: cada worker acumula sozinho e os acumuladores são somados.
///
/// # Panics
/// Se `predicted` e `gold` tiverem números diferentes de documentos.
pub fn score_corpus_par(
    predicted: &[Vec<Cluster>],
    gold: &[Vec<Cluster>],
    metrics: &[MetricKind],
) -> CorefScorer {
    assert_eq!(predicted.len(), gold.len(), "um documento previsto por documento gold");
    let scorer = predicted
        .par_iter()
        .zip(gold)
        .fold(
            || CorefScorer::new(metrics, false),
            |mut acc, (doc_pred, doc_gold)| {
                acc.update(doc_pred, doc_gold);
                acc
            },
        )
        .reduce(
            || CorefScorer::new(metrics, false),
            |mut a, b| {
                a.merge(&b);
                a
            },
        );
    info!(documentos = gold.len(), "corpus avaliado em paralelo");
    scorer
}

/// Taxa de acerto exato das fronteiras de spans, média por documento.
///
/// Documentos sem spans gold são ignorados; `None` quando nada foi pontuado.
///
/// # Panics
/// Se os lotes tiverem números diferentes de documentos.
pub fn span_accuracy(gold_spans: &[Vec<Mention>], predicted_spans: &[Vec<Mention>]) -> Option<f64> {
    assert_eq!(
        gold_spans.len(),
        predicted_spans.len(),
        "um lote previsto por lote gold"
    );
    let per_doc: Vec<f64> = gold_spans
        .iter()
        .zip(predicted_spans)
        .filter(|(gold, _)| !gold.is_empty())
        .map(|(gold, pred)| {
            let hits = gold.iter().zip(pred).filter(|(g, p)| g == p).count();
            hits as f64 / gold.len() as f64
        })
        .collect();

    if per_doc.is_empty() {
        debug!("nenhum span gold para pontuar");
        return None;
    }
    Some(per_doc.iter().sum::<f64>() / per_doc.len() as f64)
}
