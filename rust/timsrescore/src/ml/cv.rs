//! Cross-validated training and held-out scoring.
//!
//! Every dataset is split into folds on its own. The model of fold `i` is
//! trained on the rows outside fold `i` of every dataset at once, and is only
//! ever used to score the rows of fold `i`. So no PSM is scored by a model
//! that saw it during training.

use super::TargetDecoy;
use super::classifier::{
    Classifier,
    ClassifierBuilder,
    LinearSvmConfig,
};
use super::folds::{
    Folds,
    shuffle_rng,
};
use super::model::{
    SemiSupervisedModel,
    TrainingParams,
};
use super::qvalues::tdc;
use crate::confidence::ConfidenceAssigner;
use crate::errors::{
    BrewError,
    DegenerateReason,
    TrainError,
};
use crate::models::{
    PsmDataset,
    TrainingSet,
};
use rand::{
    RngCore,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

/// Dataset shuffles use stream `dataset_idx`, fold seeds come from this one.
const CLASSIFIER_STREAM: u64 = u64::MAX;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrewParams {
    /// FDR used to pick positive examples while training.
    pub train_fdr: f64,
    /// FDR at which the held-out scores of each fold are calibrated.
    pub test_fdr: f64,
    pub max_iter: usize,
    pub folds: usize,
    /// Feature to start training from, searched for when `None`.
    pub direction: Option<String>,
    /// Upper bound on the number of folds trained at the same time.
    pub max_workers: usize,
    pub seed: u64,
}

impl Default for BrewParams {
    fn default() -> Self {
        Self {
            train_fdr: 0.01,
            test_fdr: 0.01,
            max_iter: 10,
            folds: 3,
            direction: None,
            max_workers: 1,
            seed: 42,
        }
    }
}

impl BrewParams {
    pub fn validate(&self) -> Result<(), BrewError> {
        for (name, value) in [("train_fdr", self.train_fdr), ("test_fdr", self.test_fdr)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(BrewError::InvalidParameter {
                    name,
                    value: format!("{} (must be in (0, 1])", value),
                });
            }
        }
        if self.folds < 2 {
            return Err(BrewError::InvalidParameter {
                name: "folds",
                value: format!("{} (at least two folds are required)", self.folds),
            });
        }
        if self.max_workers < 1 {
            return Err(BrewError::InvalidParameter {
                name: "max_workers",
                value: "0 (at least one worker is required)".into(),
            });
        }
        Ok(())
    }

    pub fn training_params(&self) -> TrainingParams {
        TrainingParams {
            train_fdr: self.train_fdr,
            max_iter: self.max_iter,
            direction: self.direction.clone(),
        }
    }
}

/// Held-out scores, one vector per dataset in input order, plus the model of
/// every fold.
#[derive(Debug)]
pub struct BrewOutput<C> {
    pub scores: Vec<Vec<f64>>,
    pub models: Vec<SemiSupervisedModel<C>>,
}

/// Training of one fold, owns everything it touches so it can run on any
/// worker.
struct FoldJob<C> {
    fold: usize,
    model: SemiSupervisedModel<C>,
    train: TrainingSet,
}

impl<C: Classifier> FoldJob<C> {
    fn run(mut self) -> Result<SemiSupervisedModel<C>, BrewError> {
        info!("=== Analyzing Fold {} ===", self.fold + 1);
        let report = self
            .model
            .fit(&self.train)
            .map_err(|source| BrewError::FoldTraining {
                fold: self.fold,
                source,
            })?;
        debug!("Fold {} finished training: {:?}", self.fold + 1, report);
        Ok(self.model)
    }
}

pub struct CrossValidatedScorer<'a, B> {
    datasets: &'a [PsmDataset],
    template: &'a B,
    params: &'a BrewParams,
    folds: Vec<Folds>,
}

impl<'a, B: ClassifierBuilder> CrossValidatedScorer<'a, B> {
    /// Checks the inputs and splits every dataset into folds.
    pub fn new(
        datasets: &'a [PsmDataset],
        template: &'a B,
        params: &'a BrewParams,
    ) -> Result<Self, BrewError> {
        params.validate()?;
        let first = datasets.first().ok_or(BrewError::NoDatasets)?;
        if let Some(dataset) = datasets
            .iter()
            .position(|x| x.feature_names() != first.feature_names())
        {
            return Err(BrewError::FeatureMismatch { dataset });
        }

        info!("Splitting PSMs into {} folds...", params.folds);
        let folds: Vec<Folds> = datasets
            .iter()
            .enumerate()
            .map(|(i, dataset)| {
                let mut rng = shuffle_rng(params.seed, i);
                Folds::split(dataset, params.folds, &mut rng)
            })
            .collect();

        Ok(Self {
            datasets,
            template,
            params,
            folds,
        })
    }

    pub fn folds(&self) -> &[Folds] {
        &self.folds
    }

    /// One model per fold of the dataset with the most folds.
    pub fn n_models(&self) -> usize {
        self.folds.iter().map(|x| x.len()).max().unwrap_or(0)
    }

    /// Rows outside fold `fold` of every dataset, in dataset order.
    fn training_set(&self, fold: usize) -> TrainingSet {
        let mut out = TrainingSet::new(self.datasets[0].feature_names().to_vec());
        for (dataset, folds) in self.datasets.iter().zip(self.folds.iter()) {
            let rows = folds.train(fold);
            out.extend_from_view(&dataset.view(&rows));
        }
        out
    }

    fn fold_seeds(&self) -> Vec<u64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        rng.set_stream(CLASSIFIER_STREAM);
        (0..self.n_models()).map(|_| rng.next_u64()).collect()
    }

    fn jobs(&self) -> Vec<FoldJob<B::Classifier>> {
        self.fold_seeds()
            .into_iter()
            .enumerate()
            .map(|(fold, seed)| FoldJob {
                fold,
                model: SemiSupervisedModel::new(
                    self.template.build(seed),
                    self.params.training_params(),
                ),
                train: self.training_set(fold),
            })
            .collect()
    }

    /// Trains the model of every fold, returned in fold order.
    pub fn fit(&self) -> Result<Vec<SemiSupervisedModel<B::Classifier>>, BrewError> {
        let n_models = self.n_models();
        if n_models == 0 {
            return Err(BrewError::DegenerateFold {
                dataset: 0,
                fold: 0,
                reason: DegenerateReason::Empty,
            });
        }

        let jobs = self.jobs();
        // Happens when every dataset collapses into a single fold.
        if let Some(job) = jobs.iter().find(|x| x.train.is_empty()) {
            return Err(BrewError::EmptyTrainingSet { fold: job.fold });
        }
        let workers = self.params.max_workers.min(n_models);
        if workers == 1 {
            return jobs.into_iter().map(FoldJob::run).collect();
        }

        debug!("Training {} folds on {} workers", n_models, workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| BrewError::ThreadPool(e.to_string()))?;
        pool.install(|| {
            jobs.into_par_iter()
                .map(FoldJob::run)
                .collect::<Result<Vec<_>, _>>()
        })
    }

    /// Calibrated held-out scores of every dataset, in original row order.
    pub fn score(
        &self,
        models: &[SemiSupervisedModel<B::Classifier>],
    ) -> Result<Vec<Vec<f64>>, BrewError> {
        let mut out = Vec::with_capacity(self.datasets.len());
        for (dataset_idx, (dataset, folds)) in
            self.datasets.iter().zip(self.folds.iter()).enumerate()
        {
            let mut scores = vec![f64::NAN; dataset.len()];
            for (fold, test) in folds.test_sets().iter().enumerate() {
                let view = dataset.view(test);
                let model = models.get(fold).ok_or(BrewError::FoldScoring {
                    dataset: dataset_idx,
                    fold,
                    source: TrainError::NotFitted,
                })?;
                let raw = model.predict(&view.to_matrix()).map_err(|source| {
                    BrewError::FoldScoring {
                        dataset: dataset_idx,
                        fold,
                        source,
                    }
                })?;
                let calibrated = calibrate(&raw, &view.labels(), self.params.test_fdr)
                    .map_err(|reason| BrewError::DegenerateFold {
                        dataset: dataset_idx,
                        fold,
                        reason,
                    })?;
                for (&row, score) in test.iter().zip(calibrated) {
                    scores[row] = score;
                }
            }
            out.push(scores);
        }
        Ok(out)
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Rescales held-out scores so that scores of different folds compare.
///
/// After calibration the lowest scoring target passing `fdr` sits at 0 and
/// the median decoy at -1.
pub fn calibrate(
    scores: &[f64],
    labels: &[TargetDecoy],
    fdr: f64,
) -> Result<Vec<f64>, DegenerateReason> {
    if scores.is_empty() {
        return Err(DegenerateReason::Empty);
    }
    let mut decoys: Vec<f64> = scores
        .iter()
        .zip(labels.iter())
        .filter(|(_, label)| label.is_decoy())
        .map(|(s, _)| *s)
        .collect();
    if decoys.is_empty() {
        return Err(DegenerateReason::NoDecoys);
    }
    let qvals = tdc(scores, labels).map_err(|_| DegenerateReason::NoTargets)?;

    let target_score = scores
        .iter()
        .zip(labels.iter().zip(qvals.iter()))
        .filter(|(_, (label, q))| label.is_target() && **q <= fdr)
        .map(|(s, _)| *s)
        .min_by(|a, b| a.total_cmp(b))
        .ok_or(DegenerateReason::NoPassingTargets)?;
    let decoy_score = median(&mut decoys);

    if !(target_score > decoy_score) {
        return Err(DegenerateReason::NoSeparation);
    }
    let span = target_score - decoy_score;
    Ok(scores.iter().map(|s| (s - target_score) / span).collect())
}

/// Trains on every dataset with cross-validation and scores every PSM with
/// the model that did not see it.
pub fn brew<B: ClassifierBuilder>(
    datasets: &[PsmDataset],
    template: &B,
    params: &BrewParams,
) -> Result<BrewOutput<B::Classifier>, BrewError> {
    let scorer = CrossValidatedScorer::new(datasets, template, params)?;
    let models = scorer.fit()?;
    let scores = scorer.score(&models)?;
    Ok(BrewOutput { scores, models })
}

/// [`brew`] followed by confidence estimation, one result per dataset in
/// input order.
pub fn rescore<B, A>(
    datasets: &[PsmDataset],
    template: &B,
    params: &BrewParams,
    assigner: &A,
) -> Result<Vec<A::Output>, BrewError>
where
    B: ClassifierBuilder,
    A: ConfidenceAssigner,
{
    let output = brew(datasets, template, params)?;
    datasets
        .iter()
        .zip(output.scores.iter())
        .enumerate()
        .map(|(dataset_idx, (dataset, scores))| {
            assigner
                .assign(dataset, scores)
                .map_err(|source| BrewError::Confidence {
                    dataset: dataset_idx,
                    source,
                })
        })
        .collect()
}

/// [`rescore`] with the default linear SVM as the classifier template.
pub fn rescore_default<A: ConfidenceAssigner>(
    datasets: &[PsmDataset],
    params: &BrewParams,
    assigner: &A,
) -> Result<Vec<A::Output>, BrewError> {
    rescore(datasets, &LinearSvmConfig::default(), params, assigner)
}

/// [`rescore`] for a single dataset.
pub fn rescore_one<B, A>(
    dataset: &PsmDataset,
    template: &B,
    params: &BrewParams,
    assigner: &A,
) -> Result<A::Output, BrewError>
where
    B: ClassifierBuilder,
    A: ConfidenceAssigner,
{
    let mut out = rescore(std::slice::from_ref(dataset), template, params, assigner)?;
    out.pop().ok_or(BrewError::NoDatasets)
}
