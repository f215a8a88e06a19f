use crate::models::PsmDataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::debug;

/// Cross-validation split of one dataset.
///
/// `test[i]` holds the row indices scored by the model of fold `i`, the model
/// itself is trained on every other row. Test sets are disjoint and together
/// hold every row exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folds {
    test: Vec<Vec<usize>>,
    nrows: usize,
}

impl Folds {
    /// Splits the dataset into (up to) `n_folds` folds.
    ///
    /// PSMs are grouped by spectrum before shuffling, so all matches to one
    /// spectrum land in the same fold.
    pub fn split(dataset: &PsmDataset, n_folds: usize, rng: &mut ChaCha8Rng) -> Self {
        Self::split_keys(dataset.spectrum_keys(), n_folds, rng)
    }

    /// Splits rows by their spectrum key, see [`Folds::split`].
    ///
    /// # Panics
    ///
    /// If `n_folds` is 0. [`crate::BrewParams::validate`] rejects fewer than
    /// two folds before any split.
    pub fn split_keys<K: AsRef<str>>(keys: &[K], n_folds: usize, rng: &mut ChaCha8Rng) -> Self {
        assert!(n_folds > 0, "At least one fold is required");
        let nrows = keys.len();

        let mut group_of: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (row, key) in keys.iter().enumerate() {
            let next = groups.len();
            let group = *group_of.entry(key.as_ref()).or_insert(next);
            if group == next {
                groups.push(Vec::new());
            }
            groups[group].push(row);
        }
        groups.shuffle(rng);

        // Same sizes as an even split of the rows: the first `nrows % n_folds`
        // chunks are one row larger.
        let base = nrows / n_folds;
        let extra = nrows % n_folds;
        let mut boundaries = Vec::with_capacity(n_folds);
        let mut acc = 0;
        for i in 0..n_folds {
            acc += base + usize::from(i < extra);
            boundaries.push(acc);
        }

        let mut chunks: Vec<Vec<usize>> = vec![Vec::new(); n_folds];
        let mut current = 0;
        let mut assigned = 0;
        for group in groups {
            while current + 1 < n_folds && assigned >= boundaries[current] {
                current += 1;
            }
            assigned += group.len();
            chunks[current].extend(group);
        }

        // A short trailing chunk is folded into the one before it.
        if n_folds > 1 && chunks[n_folds - 1].len() < base.max(1) {
            if let Some(last) = chunks.pop() {
                if let Some(prev) = chunks.last_mut() {
                    prev.extend(last);
                }
            }
            debug!(
                "Merged the last fold into the previous one, {} folds remain",
                chunks.len()
            );
        }

        // An empty dataset has no folds at all.
        chunks.retain(|c| !c.is_empty());

        Self {
            test: chunks,
            nrows,
        }
    }

    pub fn len(&self) -> usize {
        self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test.is_empty()
    }

    /// Number of rows of the partitioned dataset.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Test rows of fold `fold`; empty when this dataset has fewer folds.
    pub fn test(&self, fold: usize) -> &[usize] {
        self.test.get(fold).map(|x| x.as_slice()).unwrap_or(&[])
    }

    /// Every row not held out in fold `fold`, in ascending order.
    pub fn train(&self, fold: usize) -> Vec<usize> {
        let mut held_out = vec![false; self.nrows];
        for &r in self.test(fold) {
            held_out[r] = true;
        }
        (0..self.nrows).filter(|&r| !held_out[r]).collect()
    }

    pub fn test_sets(&self) -> &[Vec<usize>] {
        &self.test
    }
}

/// Shuffling RNG of the dataset at position `dataset_idx`.
pub fn shuffle_rng(seed: u64, dataset_idx: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(dataset_idx as u64);
    rng
}
