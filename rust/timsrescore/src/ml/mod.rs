//! Semi-supervised learning over target-decoy labelled PSMs.
//!
//! The pieces, leaf first:
//! * [`qvalues`]: target-decoy competition q-values.
//! * [`folds`]: spectrum-aware k-fold partitioning.
//! * [`direction`]: picks the feature that starts the ranking.
//! * [`classifier`]: the classifier seam and the default linear SVM.
//! * [`model`]: the iterative pseudo-labelling trainer.
//! * [`cv`]: cross-validated training and held-out scoring.

pub mod classifier;
pub mod cv;
pub mod direction;
pub mod folds;
pub mod model;
pub mod qvalues;

use serde::{
    Deserialize,
    Serialize,
};

pub use classifier::{
    Classifier,
    ClassifierBuilder,
    LinearSvm,
    LinearSvmConfig,
};
pub use cv::{
    BrewOutput,
    BrewParams,
    CrossValidatedScorer,
    brew,
    rescore,
    rescore_default,
    rescore_one,
};
pub use direction::BestFeature;
pub use folds::Folds;
pub use model::{
    FitReport,
    SemiSupervisedModel,
    TrainingParams,
    TrainingState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetDecoy {
    Target,
    Decoy,
}

impl TargetDecoy {
    /// Parses a PIN style label: `1` is a target, `0` or `-1` a decoy.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim() {
            "1" | "+1" => Some(TargetDecoy::Target),
            "0" | "-1" => Some(TargetDecoy::Decoy),
            _ => None,
        }
    }

    pub fn is_target(&self) -> bool {
        matches!(self, TargetDecoy::Target)
    }

    pub fn is_decoy(&self) -> bool {
        matches!(self, TargetDecoy::Decoy)
    }

    /// The PIN encoding of the label.
    pub fn as_label(&self) -> i8 {
        match self {
            TargetDecoy::Target => 1,
            TargetDecoy::Decoy => -1,
        }
    }
}

/// Training label of a PSM in one iteration of the semi-supervised loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PseudoLabel {
    /// Target that passes the training FDR.
    Positive,
    /// Decoy, always a negative example.
    Negative,
    /// Target that does not pass, left out of the next fit.
    Unlabeled,
}

/// Derives the pseudo labels for the next fit from the current q-values.
pub fn pseudo_labels(qvals: &[f64], labels: &[TargetDecoy], fdr: f64) -> Vec<PseudoLabel> {
    debug_assert_eq!(qvals.len(), labels.len());
    qvals
        .iter()
        .zip(labels.iter())
        .map(|(&q, label)| match label {
            TargetDecoy::Decoy => PseudoLabel::Negative,
            TargetDecoy::Target if q <= fdr => PseudoLabel::Positive,
            TargetDecoy::Target => PseudoLabel::Unlabeled,
        })
        .collect()
}

pub fn count_positives(labels: &[PseudoLabel]) -> usize {
    labels
        .iter()
        .filter(|x| matches!(x, PseudoLabel::Positive))
        .count()
}
