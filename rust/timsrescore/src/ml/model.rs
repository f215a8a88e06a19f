use super::classifier::Classifier;
use super::direction::{
    BestFeature,
    find_best_feature,
    use_named_feature,
};
use super::qvalues::tdc;
use super::{
    PseudoLabel,
    count_positives,
    pseudo_labels,
};
use crate::errors::TrainError;
use crate::models::{
    FeatureMatrix,
    TrainingSet,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingParams {
    /// Targets at or below this q-value are positives in the next fit.
    pub train_fdr: f64,
    /// Maximum number of classifier fits.
    pub max_iter: usize,
    /// Feature to start from. When `None` the best one is searched for.
    pub direction: Option<String>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            train_fdr: 0.01,
            max_iter: 10,
            direction: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingState {
    /// Stopped early after this many fits.
    Converged { iteration: usize },
    /// Used every allowed fit.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub initial_feature: String,
    pub initial_passing: usize,
    /// Targets passing the training FDR after each fit.
    pub passing: Vec<usize>,
    pub state: TrainingState,
}

impl FitReport {
    pub fn iterations(&self) -> usize {
        self.passing.len()
    }
}

/// Percolator style semi-supervised training around a [`Classifier`].
///
/// Starting from the ranking of a single feature, the classifier is fit on
/// the targets that pass the training FDR (positives) against all decoys,
/// then everything is re-scored and re-labelled. Targets that do not pass
/// are left out of the fit.
#[derive(Debug)]
pub struct SemiSupervisedModel<C> {
    classifier: C,
    params: TrainingParams,
    report: Option<FitReport>,
}

impl<C: Classifier> SemiSupervisedModel<C> {
    pub fn new(classifier: C, params: TrainingParams) -> Self {
        Self {
            classifier,
            params,
            report: None,
        }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    pub fn report(&self) -> Option<&FitReport> {
        self.report.as_ref()
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    fn initial_direction(&self, train: &TrainingSet) -> Result<BestFeature, TrainError> {
        let out = match &self.params.direction {
            Some(name) => use_named_feature(train, name, self.params.train_fdr)?,
            None => find_best_feature(train, self.params.train_fdr)?,
        };
        info!(
            "Initial direction: {} with {} targets at q <= {}",
            out.name, out.passing, self.params.train_fdr
        );
        Ok(out)
    }

    fn fit_labels(&mut self, train: &TrainingSet, labels: &[PseudoLabel]) -> Result<(), TrainError> {
        let mut rows = Vec::with_capacity(labels.len());
        let mut positives = Vec::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            match label {
                PseudoLabel::Positive => positives.push(true),
                PseudoLabel::Negative => positives.push(false),
                PseudoLabel::Unlabeled => continue,
            }
            rows.push(i);
        }
        let subset = train.features().select_rows(&rows);
        self.classifier.fit(&subset, &positives)?;
        Ok(())
    }

    /// Runs the label, fit, re-score loop on `train`.
    ///
    /// From the second fit on, training stops as soon as a fit leaves the
    /// labels unchanged or does not increase the number of positives.
    pub fn fit(&mut self, train: &TrainingSet) -> Result<FitReport, TrainError> {
        if self.params.max_iter == 0 {
            return Err(TrainError::InvalidIterations);
        }
        if train.len() <= train.num_features() {
            warn!(
                "Training set has {} PSMs for {} features, the classifier will likely fail",
                train.len(),
                train.num_features()
            );
        }

        let initial = self.initial_direction(train)?;
        let mut labels = initial.labels;
        let mut passing: Vec<usize> = Vec::with_capacity(self.params.max_iter);
        let mut state = TrainingState::Exhausted;

        for iteration in 1..=self.params.max_iter {
            self.fit_labels(train, &labels)?;
            let scores = self.classifier.predict(train.features())?;
            let qvals = tdc(&scores, train.labels())?;
            let new_labels = pseudo_labels(&qvals, train.labels(), self.params.train_fdr);
            let n_positive = count_positives(&new_labels);
            info!(
                "Iteration {}: {} targets at q <= {}",
                iteration, n_positive, self.params.train_fdr
            );

            let stalled = match passing.last() {
                Some(&previous) if iteration > 1 => {
                    new_labels == labels || n_positive <= previous
                }
                _ => false,
            };
            passing.push(n_positive);
            labels = new_labels;

            if stalled {
                debug!("Training converged after {} iterations", iteration);
                state = TrainingState::Converged { iteration };
                break;
            }
        }

        let report = FitReport {
            initial_feature: initial.name,
            initial_passing: initial.passing,
            passing,
            state,
        };
        self.report = Some(report.clone());
        Ok(report)
    }

    /// Scores rows with the classifier of the last fit.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, TrainError> {
        if self.report.is_none() {
            return Err(TrainError::NotFitted);
        }
        Ok(self.classifier.predict(features)?)
    }
}
