//! The binary classifier used inside the semi-supervised loop.
//!
//! The trainer only ever talks to a classifier through [`Classifier`], and a
//! fresh one is made per fold from an immutable [`ClassifierBuilder`].

mod linear_svm;

use crate::errors::ClassifierError;
use crate::models::FeatureMatrix;

pub use linear_svm::{
    LinearSvm,
    LinearSvmConfig,
};

pub trait Classifier {
    /// Fits on the given rows. `positives[i]` is true for a positive example.
    fn fit(&mut self, features: &FeatureMatrix, positives: &[bool]) -> Result<(), ClassifierError>;

    /// One score per row, higher means more likely positive.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError>;
}

pub trait ClassifierBuilder: Sync {
    type Classifier: Classifier + Send;

    /// Builds an unfitted classifier. `seed` is specific to the fold the
    /// classifier will be trained on.
    fn build(&self, seed: u64) -> Self::Classifier;
}
