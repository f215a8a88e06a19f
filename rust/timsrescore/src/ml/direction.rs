use super::qvalues::{
    count_passing,
    tdc,
};
use super::{
    PseudoLabel,
    pseudo_labels,
};
use crate::errors::DirectionError;
use crate::models::TrainingSet;
use rayon::prelude::*;
use tracing::debug;

/// The feature used to rank PSMs before any classifier has been fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BestFeature {
    pub index: usize,
    pub name: String,
    /// Targets passing the training FDR when ranking by this feature.
    pub passing: usize,
    /// Starting labels derived from that ranking.
    pub labels: Vec<PseudoLabel>,
}

fn evaluate(train: &TrainingSet, index: usize, fdr: f64) -> Result<BestFeature, DirectionError> {
    let column = train.features().column(index);
    let qvals = tdc(&column, train.labels())?;
    let passing = count_passing(&qvals, train.labels(), fdr);
    Ok(BestFeature {
        index,
        name: train.feature_names()[index].clone(),
        passing,
        labels: pseudo_labels(&qvals, train.labels(), fdr),
    })
}

/// Picks the feature column that finds the most targets at `fdr`.
///
/// Features are taken as-is, higher values rank first. Ties go to the
/// column that comes first.
pub fn find_best_feature(train: &TrainingSet, fdr: f64) -> Result<BestFeature, DirectionError> {
    let passing = (0..train.num_features())
        .into_par_iter()
        .map(|i| -> Result<usize, DirectionError> {
            let column = train.features().column(i);
            let qvals = tdc(&column, train.labels())?;
            Ok(count_passing(&qvals, train.labels(), fdr))
        })
        .collect::<Result<Vec<usize>, DirectionError>>()?;

    for (name, count) in train.feature_names().iter().zip(passing.iter()) {
        debug!("Feature {} finds {} targets at q <= {}", name, count, fdr);
    }

    let mut best: Option<(usize, usize)> = None;
    for (i, &count) in passing.iter().enumerate() {
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((i, count)),
        }
    }

    match best {
        Some((index, count)) if count > 0 => evaluate(train, index, fdr),
        _ => Err(DirectionError::NoViableDirection { fdr }),
    }
}

/// Same as [`find_best_feature`] but for a feature chosen by the caller.
pub fn use_named_feature(
    train: &TrainingSet,
    name: &str,
    fdr: f64,
) -> Result<BestFeature, DirectionError> {
    let index = train
        .feature_names()
        .iter()
        .position(|x| x == name)
        .ok_or_else(|| DirectionError::UnknownFeature {
            name: name.to_string(),
        })?;

    let out = evaluate(train, index, fdr)?;
    if out.passing == 0 {
        return Err(DirectionError::NoViableDirection { fdr });
    }
    Ok(out)
}
