use super::TargetDecoy;
use crate::errors::QValueError;
use std::cmp::Ordering;

pub trait LabelledScore {
    fn get_score(&self) -> f64;
    fn get_label(&self) -> TargetDecoy;
    fn assign_qval(&mut self, q: f64);
    fn get_qval(&self) -> f64;
}

impl LabelledScore for (f64, TargetDecoy, f64) {
    fn get_score(&self) -> f64 {
        self.0
    }

    fn get_label(&self) -> TargetDecoy {
        self.1
    }

    fn assign_qval(&mut self, q: f64) {
        self.2 = q
    }

    fn get_qval(&self) -> f64 {
        self.2
    }
}

#[derive(Debug)]
struct RankedScore {
    index: usize,
    score: f64,
    label: TargetDecoy,
    qval: f64,
}

impl LabelledScore for RankedScore {
    fn get_score(&self) -> f64 {
        self.score
    }

    fn get_label(&self) -> TargetDecoy {
        self.label
    }

    fn assign_qval(&mut self, q: f64) {
        self.qval = q
    }

    fn get_qval(&self) -> f64 {
        self.qval
    }
}

/// NaN scores rank below everything else.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Best first. Inside a block of tied scores decoys go first, then input order.
fn rank_order(a: &RankedScore, b: &RankedScore) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then_with(|| b.label.is_decoy().cmp(&a.label.is_decoy()))
        .then_with(|| a.index.cmp(&b.index))
}

/// Assign q_values in place.
///
/// # Invariants
/// * `scores` must be sorted in descending order (e.g. best PSM is first)
///
/// PSMs with the same score share the FDR estimated at the end of their
/// tied block, so the result does not depend on the order inside the block.
///
/// Implementation derived from the Sage implementation of qval (github.com/lazear/sage)
pub fn assign_qval<T: LabelledScore>(scores: &mut [T]) {
    // FDR Calculation:
    // * Sort by score, descending
    // * Estimate FDR
    // * Calculate q-value
    //
    if scores.is_empty() {
        return;
    }
    debug_assert!(
        rank_key(scores[0].get_score()) >= rank_key(scores[scores.len() - 1].get_score())
    );

    let mut decoy = 0usize;
    let mut target = 0usize;
    let mut block_start = 0;

    while block_start < scores.len() {
        let block_score = rank_key(scores[block_start].get_score());
        let mut block_end = block_start;
        while block_end < scores.len() && rank_key(scores[block_end].get_score()) == block_score {
            match scores[block_end].get_label() {
                TargetDecoy::Decoy => decoy += 1,
                TargetDecoy::Target => target += 1,
            }
            block_end += 1;
        }

        // No target yet means nothing has been accepted, count it as all false.
        let fdr = if target == 0 {
            1.0
        } else {
            (decoy as f64 / target as f64).min(1.0)
        };
        for score in scores[block_start..block_end].iter_mut() {
            score.assign_qval(fdr);
        }
        block_start = block_end;
    }

    // Reverse slice, and calculate the cumulative minimum
    let mut q_min = 1.0f64;
    for score in scores.iter_mut().rev() {
        q_min = q_min.min(score.get_qval());
        score.assign_qval(q_min);
    }
}

/// Target-decoy competition q-values.
///
/// Returns one q-value per input score, in input order. Higher scores are
/// better.
pub fn tdc(scores: &[f64], labels: &[TargetDecoy]) -> Result<Vec<f64>, QValueError> {
    if scores.len() != labels.len() {
        return Err(QValueError::LengthMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    if !labels.iter().any(|x| x.is_target()) {
        return Err(QValueError::NoTargets);
    }

    let mut ranked: Vec<RankedScore> = scores
        .iter()
        .zip(labels.iter())
        .enumerate()
        .map(|(index, (&score, &label))| RankedScore {
            index,
            score,
            label,
            qval: 1.0,
        })
        .collect();
    ranked.sort_unstable_by(rank_order);
    assign_qval(&mut ranked);

    let mut out = vec![1.0; scores.len()];
    for r in ranked {
        out[r.index] = r.qval;
    }
    Ok(out)
}

/// Number of targets at or below the given q-value threshold.
pub fn count_passing(qvals: &[f64], labels: &[TargetDecoy], fdr: f64) -> usize {
    qvals
        .iter()
        .zip(labels.iter())
        .filter(|(q, label)| label.is_target() && **q <= fdr)
        .count()
}
