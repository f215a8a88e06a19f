//! Confidence estimates from the final scores.
//!
//! Anything implementing [`ConfidenceAssigner`] can be plugged into
//! [`crate::ml::rescore`]. [`LevelConfidence`] is the default: target-decoy
//! q-values at the PSM level (best match per spectrum) and the peptide level
//! (best match per peptide).

use crate::errors::ConfidenceError;
use crate::ml::TargetDecoy;
use crate::ml::qvalues::tdc;
use crate::models::PsmDataset;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tracing::info;

pub trait ConfidenceAssigner: Sync {
    type Output;

    /// `scores` has one entry per row of `dataset`, higher is better.
    fn assign(&self, dataset: &PsmDataset, scores: &[f64]) -> Result<Self::Output, ConfidenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Psm,
    Peptide,
}

impl ConfidenceLevel {
    /// Plural name, used in file names and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceLevel::Psm => "psms",
            ConfidenceLevel::Peptide => "peptides",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    /// Row of the dataset this entry comes from.
    pub row: usize,
    pub spec_id: String,
    pub label: TargetDecoy,
    pub score: f64,
    pub qvalue: f64,
    pub peptide: String,
    pub proteins: String,
}

/// The entries kept at one level, best score first.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    pub level: ConfidenceLevel,
    pub rows: Vec<ScoredRow>,
}

impl LevelTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Targets at or below `fdr`.
    pub fn passing(&self, fdr: f64) -> usize {
        self.rows
            .iter()
            .filter(|x| x.label.is_target() && x.qvalue <= fdr)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confidence {
    /// The scores the estimates were made from, in dataset order.
    pub scores: Vec<f64>,
    pub levels: Vec<LevelTable>,
}

impl Confidence {
    pub fn level(&self, level: ConfidenceLevel) -> Option<&LevelTable> {
        self.levels.iter().find(|x| x.level == level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfidence {
    pub levels: Vec<ConfidenceLevel>,
    /// Only used to report how many entries pass.
    pub eval_fdr: f64,
}

impl Default for LevelConfidence {
    fn default() -> Self {
        Self {
            levels: vec![ConfidenceLevel::Psm, ConfidenceLevel::Peptide],
            eval_fdr: 0.01,
        }
    }
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Best scoring row per key, first row wins ties. Returned in row order.
fn best_per_key<'a>(rows: &[usize], key: impl Fn(usize) -> &'a str, scores: &[f64]) -> Vec<usize> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for &row in rows {
        best.entry(key(row))
            .and_modify(|current| {
                if rank_key(scores[row]) > rank_key(scores[*current]) {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    let mut out: Vec<usize> = best.into_values().collect();
    out.sort_unstable();
    out
}

impl LevelConfidence {
    fn level_table(
        &self,
        level: ConfidenceLevel,
        dataset: &PsmDataset,
        scores: &[f64],
        psm_rows: &[usize],
    ) -> Result<LevelTable, ConfidenceError> {
        let mut rows = match level {
            ConfidenceLevel::Psm => psm_rows.to_vec(),
            ConfidenceLevel::Peptide => {
                best_per_key(psm_rows, |r| dataset.peptides()[r].as_str(), scores)
            }
        };
        rows.sort_by(|&a, &b| {
            rank_key(scores[b])
                .total_cmp(&rank_key(scores[a]))
                .then(a.cmp(&b))
        });

        let level_scores: Vec<f64> = rows.iter().map(|&r| scores[r]).collect();
        let labels: Vec<TargetDecoy> = rows.iter().map(|&r| dataset.labels()[r]).collect();
        let qvals = tdc(&level_scores, &labels)?;

        let rows = rows
            .iter()
            .zip(qvals)
            .map(|(&row, qvalue)| ScoredRow {
                row,
                spec_id: dataset.spec_ids()[row].clone(),
                label: dataset.labels()[row],
                score: scores[row],
                qvalue,
                peptide: dataset.peptides()[row].clone(),
                proteins: dataset.proteins()[row].clone(),
            })
            .collect();
        let table = LevelTable { level, rows };
        info!(
            "Found {} {} at q <= {}",
            table.passing(self.eval_fdr),
            level.name(),
            self.eval_fdr
        );
        Ok(table)
    }
}

impl ConfidenceAssigner for LevelConfidence {
    type Output = Confidence;

    fn assign(&self, dataset: &PsmDataset, scores: &[f64]) -> Result<Confidence, ConfidenceError> {
        if scores.len() != dataset.len() {
            return Err(ConfidenceError::LengthMismatch {
                scores: scores.len(),
                rows: dataset.len(),
            });
        }

        // Peptides compete among the PSM level winners.
        let all_rows: Vec<usize> = (0..dataset.len()).collect();
        let psm_rows = best_per_key(&all_rows, |r| dataset.spectrum_keys()[r].as_str(), scores);

        let levels = self
            .levels
            .iter()
            .map(|&level| self.level_table(level, dataset, scores, &psm_rows))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Confidence {
            scores: scores.to_vec(),
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QValueError;
    use crate::models::psm_dataset::tests::table;

    fn dataset() -> PsmDataset {
        PsmDataset::try_new(table(
            &["SpecId", "Label", "ScanNr", "Score", "Peptide", "Proteins"],
            &[
                // Two matches to scan 1, the second one is better.
                &["a", "1", "1", "0", "PEPA", "p1"],
                &["b", "1", "1", "0", "PEPB", "p2"],
                // PEPB again from another scan, lower score.
                &["c", "1", "2", "0", "PEPB", "p2"],
                &["d", "-1", "3", "0", "DECOY", "d1"],
                &["e", "1", "4", "0", "PEPC", "p3"],
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_levels() {
        let ds = dataset();
        let scores = [1.0, 5.0, 4.0, 2.0, 0.5];
        let out = LevelConfidence::default().assign(&ds, &scores).unwrap();
        assert_eq!(out.scores, scores.to_vec());

        let psms = out.level(ConfidenceLevel::Psm).unwrap();
        let rows: Vec<usize> = psms.rows.iter().map(|x| x.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4]);
        let qvals: Vec<f64> = psms.rows.iter().map(|x| x.qvalue).collect();
        assert_eq!(qvals, vec![0.0, 0.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert_eq!(psms.passing(0.01), 2);

        let peptides = out.level(ConfidenceLevel::Peptide).unwrap();
        let names: Vec<&str> = peptides.rows.iter().map(|x| x.peptide.as_str()).collect();
        assert_eq!(names, vec!["PEPB", "DECOY", "PEPC"]);
        assert_eq!(peptides.rows[0].spec_id, "b");
        assert_eq!(peptides.passing(0.01), 1);
    }

    #[test]
    fn test_errors() {
        let ds = dataset();
        assert_eq!(
            LevelConfidence::default().assign(&ds, &[1.0]),
            Err(ConfidenceError::LengthMismatch { scores: 1, rows: 5 })
        );

        let decoys = PsmDataset::try_new(table(
            &["Label", "ScanNr", "Score", "Peptide", "Proteins"],
            &[&["-1", "1", "0", "PEP", "d"]],
        ))
        .unwrap();
        assert_eq!(
            LevelConfidence::default().assign(&decoys, &[1.0]),
            Err(ConfidenceError::QValue(QValueError::NoTargets))
        );
    }
}
