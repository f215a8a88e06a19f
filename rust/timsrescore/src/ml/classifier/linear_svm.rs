//! Linear L2-SVM trained with the Modified Finite Newton method.
//!
//! Minimizes `0.5 * lambda * |w|^2 + 0.5 * sum_i C_i * max(0, 1 - y_i * w'x_i)^2`
//! over standardized features plus an unregularized bias. Each Newton step
//! solves the regularized least squares problem restricted to the examples
//! inside the margin, followed by an exact line search along the step.

use super::{
    Classifier,
    ClassifierBuilder,
};
use crate::errors::ClassifierError;
use crate::models::FeatureMatrix;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

/// Keeps the bias row of the normal equations positive definite.
const BIAS_RIDGE: f64 = 1e-8;
const RELATIVE_STOP_EPS: f64 = 1e-9;
/// Standard deviations below this are treated as constant features.
const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinearSvmConfig {
    pub lambda: f64,
    pub c_pos: f64,
    pub c_neg: f64,
    pub max_iter: usize,
    pub epsilon: f64,
}

impl Default for LinearSvmConfig {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            c_pos: 1.0,
            c_neg: 1.0,
            max_iter: 50,
            epsilon: 1e-7,
        }
    }
}

impl ClassifierBuilder for LinearSvmConfig {
    type Classifier = LinearSvm;

    // The solver is deterministic, the seed has nothing to drive.
    fn build(&self, _seed: u64) -> LinearSvm {
        LinearSvm::new(self.clone())
    }
}

#[derive(Debug, Clone)]
struct FittedSvm {
    means: Vec<f64>,
    stds: Vec<f64>,
    /// Weights on the standardized features, the bias is the last element.
    weights: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearSvm {
    config: LinearSvmConfig,
    fitted: Option<FittedSvm>,
}

impl LinearSvm {
    pub fn new(config: LinearSvmConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &LinearSvmConfig {
        &self.config
    }

    /// Weights on the standardized features followed by the bias.
    pub fn weights(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|x| x.weights.as_slice())
    }
}

/// Standardized rows with a trailing 1.0 for the bias.
fn augment(features: &FeatureMatrix, means: &[f64], stds: &[f64]) -> Vec<Vec<f64>> {
    features
        .rows()
        .map(|row| {
            row.iter()
                .zip(means.iter().zip(stds.iter()))
                .map(|(x, (m, s))| (x - m) / s)
                .chain(std::iter::once(1.0))
                .collect()
        })
        .collect()
}

fn column_stats(features: &FeatureMatrix) -> (Vec<f64>, Vec<f64>) {
    let n = features.nrows() as f64;
    let ncols = features.ncols();
    let mut means = vec![0.0; ncols];
    for row in features.rows() {
        for (m, x) in means.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut stds = vec![0.0; ncols];
    for row in features.rows() {
        for ((s, x), m) in stds.iter_mut().zip(row.iter()).zip(means.iter()) {
            *s += (x - m) * (x - m);
        }
    }
    stds.iter_mut().for_each(|s| {
        *s = (*s / n).sqrt();
        if *s < MIN_STD {
            *s = 1.0;
        }
    });
    (means, stds)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Solves `a * x = b` for a symmetric positive definite, row-major `a`.
fn solve_spd(mut a: Vec<f64>, mut b: Vec<f64>, d: usize) -> Option<Vec<f64>> {
    // In place Cholesky, the lower triangle of `a` becomes L.
    for j in 0..d {
        let mut diag = a[j * d + j];
        for k in 0..j {
            diag -= a[j * d + k] * a[j * d + k];
        }
        if !(diag > 0.0) || !diag.is_finite() {
            return None;
        }
        let ljj = diag.sqrt();
        a[j * d + j] = ljj;
        for i in (j + 1)..d {
            let mut s = a[i * d + j];
            for k in 0..j {
                s -= a[i * d + k] * a[j * d + k];
            }
            a[i * d + j] = s / ljj;
        }
    }

    for i in 0..d {
        let mut s = b[i];
        for k in 0..i {
            s -= a[i * d + k] * b[k];
        }
        b[i] = s / a[i * d + i];
    }
    for i in (0..d).rev() {
        let mut s = b[i];
        for k in (i + 1)..d {
            s -= a[k * d + i] * b[k];
        }
        b[i] = s / a[i * d + i];
    }
    Some(b)
}

struct Problem<'a> {
    x: &'a [Vec<f64>],
    y: Vec<f64>,
    cost: Vec<f64>,
    lambda: f64,
    dim: usize,
}

impl Problem<'_> {
    fn regularizer(&self, w: &[f64]) -> f64 {
        // Bias is the last weight and is not penalized.
        0.5 * self.lambda * w[..self.dim - 1].iter().map(|x| x * x).sum::<f64>()
    }

    fn objective(&self, w: &[f64], outputs: &[f64]) -> f64 {
        let loss: f64 = outputs
            .iter()
            .zip(self.y.iter().zip(self.cost.iter()))
            .map(|(o, (y, c))| {
                let margin = 1.0 - y * o;
                if margin > 0.0 {
                    0.5 * c * margin * margin
                } else {
                    0.0
                }
            })
            .sum();
        self.regularizer(w) + loss
    }

    fn active_set(&self, outputs: &[f64]) -> Vec<usize> {
        (0..outputs.len())
            .filter(|&i| self.y[i] * outputs[i] < 1.0)
            .collect()
    }

    /// Regularized least squares on the active examples.
    fn newton_step(&self, active: &[usize]) -> Option<Vec<f64>> {
        let d = self.dim;
        let mut a = vec![0.0; d * d];
        let mut b = vec![0.0; d];
        for &i in active {
            let xi = &self.x[i];
            let c = self.cost[i];
            for r in 0..d {
                let cx = c * xi[r];
                b[r] += cx * self.y[i];
                for s in 0..=r {
                    a[r * d + s] += cx * xi[s];
                }
            }
        }
        for r in 0..d {
            for s in 0..r {
                a[s * d + r] = a[r * d + s];
            }
        }
        for j in 0..d - 1 {
            a[j * d + j] += self.lambda;
        }
        a[(d - 1) * d + (d - 1)] += BIAS_RIDGE;
        solve_spd(a, b, d)
    }

    /// Exact minimizer of the objective on the segment `w + t * (w_bar - w)`,
    /// `t` in `[0, 1]`.
    fn line_search(&self, w: &[f64], w_bar: &[f64], o: &[f64], o_bar: &[f64]) -> f64 {
        let reg = &w[..self.dim - 1];
        let reg_bar = &w_bar[..self.dim - 1];
        let mut left: f64 = self.lambda
            * reg
                .iter()
                .zip(reg_bar.iter())
                .map(|(a, b)| a * (b - a))
                .sum::<f64>();
        let mut right: f64 = self.lambda
            * reg
                .iter()
                .zip(reg_bar.iter())
                .map(|(a, b)| b * (b - a))
                .sum::<f64>();

        // (t, example, +1 enters / -1 leaves the margin)
        let mut breakpoints: Vec<(f64, usize, f64)> = Vec::new();
        for i in 0..o.len() {
            let y = self.y[i];
            let diff = o_bar[i] - o[i];
            let moving = y * diff;
            if y * o[i] < 1.0 {
                let d2 = self.cost[i] * diff;
                left += (o[i] - y) * d2;
                right += (o_bar[i] - y) * d2;
                if moving > 0.0 {
                    breakpoints.push(((1.0 - y * o[i]) / moving, i, -1.0));
                }
            } else if moving < 0.0 {
                breakpoints.push(((1.0 - y * o[i]) / moving, i, 1.0));
            }
        }
        breakpoints.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (t, i, sign) in breakpoints {
            if t >= 1.0 {
                break;
            }
            if left + t * (right - left) >= 0.0 {
                break;
            }
            let d2 = sign * self.cost[i] * (o_bar[i] - o[i]);
            left += (o[i] - self.y[i]) * d2;
            right += (o_bar[i] - self.y[i]) * d2;
        }

        if right - left <= 0.0 {
            return 1.0;
        }
        (-left / (right - left)).clamp(0.0, 1.0)
    }
}

impl Classifier for LinearSvm {
    fn fit(&mut self, features: &FeatureMatrix, positives: &[bool]) -> Result<(), ClassifierError> {
        if features.nrows() != positives.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: features.nrows(),
                found: positives.len(),
            });
        }
        if features.nrows() <= features.ncols() {
            return Err(ClassifierError::TooFewExamples {
                examples: features.nrows(),
                features: features.ncols(),
            });
        }
        let n_pos = positives.iter().filter(|&&x| x).count();
        let n_neg = positives.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(ClassifierError::SingleClass {
                positives: n_pos,
                negatives: n_neg,
            });
        }
        if let Some(row) = features
            .rows()
            .position(|r| r.iter().any(|x| !x.is_finite()))
        {
            return Err(ClassifierError::NonFiniteInput { row });
        }

        let (means, stds) = column_stats(features);
        let x = augment(features, &means, &stds);
        let problem = Problem {
            x: &x,
            y: positives
                .iter()
                .map(|&p| if p { 1.0 } else { -1.0 })
                .collect(),
            cost: positives
                .iter()
                .map(|&p| if p { self.config.c_pos } else { self.config.c_neg })
                .collect(),
            lambda: self.config.lambda,
            dim: features.ncols() + 1,
        };

        let mut w = vec![0.0; problem.dim];
        let mut outputs = vec![0.0; x.len()];
        let mut active = problem.active_set(&outputs);
        let mut f = problem.objective(&w, &outputs);

        for iter in 0..self.config.max_iter {
            let w_bar = problem
                .newton_step(&active)
                .ok_or(ClassifierError::IllConditioned)?;
            let o_bar: Vec<f64> = x.iter().map(|xi| dot(xi, &w_bar)).collect();

            // Optimal once the active set of the step agrees with the current one.
            let eps = self.config.epsilon;
            let mut is_active = vec![false; outputs.len()];
            active.iter().for_each(|&i| is_active[i] = true);
            let optimal = (0..o_bar.len()).all(|i| {
                let margin = problem.y[i] * o_bar[i];
                if is_active[i] {
                    margin <= 1.0 + eps
                } else {
                    margin >= 1.0 - eps
                }
            });
            if optimal {
                w = w_bar;
                debug!("L2-SVM converged (optimality) after {} iterations", iter + 1);
                break;
            }

            let step = problem.line_search(&w, &w_bar, &outputs, &o_bar);
            for (wi, wb) in w.iter_mut().zip(w_bar.iter()) {
                *wi += step * (wb - *wi);
            }
            for (oi, ob) in outputs.iter_mut().zip(o_bar.iter()) {
                *oi += step * (ob - *oi);
            }

            let f_old = f;
            f = problem.objective(&w, &outputs);
            active = problem.active_set(&outputs);
            if (f - f_old).abs() < RELATIVE_STOP_EPS * f_old.abs() {
                debug!(
                    "L2-SVM converged (relative improvement) after {} iterations",
                    iter + 1
                );
                break;
            }
        }

        self.fitted = Some(FittedSvm {
            means,
            stds,
            weights: w,
        });
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError> {
        let fitted = self.fitted.as_ref().ok_or(ClassifierError::NotFitted)?;
        if features.ncols() != fitted.means.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: fitted.means.len(),
                found: features.ncols(),
            });
        }
        let bias = fitted.weights[fitted.means.len()];
        Ok(features
            .rows()
            .map(|row| {
                row.iter()
                    .zip(fitted.means.iter().zip(fitted.stds.iter()))
                    .zip(fitted.weights.iter())
                    .map(|((x, (m, s)), w)| w * (x - m) / s)
                    .sum::<f64>()
                    + bias
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{
        Rng,
        SeedableRng,
    };
    use rand_chacha::ChaCha8Rng;

    fn blobs(n: usize, seed: u64) -> (FeatureMatrix, Vec<bool>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut mat = FeatureMatrix::with_columns(3);
        let mut labels = Vec::new();
        for i in 0..n {
            let pos = i % 2 == 0;
            let shift = if pos { 2.0 } else { -2.0 };
            mat.push_row(&[
                rng.gen_range(-1.0..1.0) + shift,
                rng.gen_range(-1.0..1.0) - shift,
                rng.gen_range(-5.0..5.0),
            ]);
            labels.push(pos);
        }
        (mat, labels)
    }

    #[test]
    fn test_separates_blobs() {
        let (mat, labels) = blobs(200, 1);
        let mut svm = LinearSvmConfig::default().build(0);
        svm.fit(&mat, &labels).unwrap();
        let scores = svm.predict(&mat).unwrap();
        let correct = scores
            .iter()
            .zip(labels.iter())
            .filter(|(s, l)| (**s > 0.0) == **l)
            .count();
        assert_eq!(correct, 200);

        // The uninformative feature gets a small weight.
        let w = svm.weights().unwrap();
        assert_eq!(w.len(), 4);
        assert!(w[2].abs() < w[0].abs());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (mat, labels) = blobs(100, 2);
        let mut a = LinearSvmConfig::default().build(0);
        let mut b = LinearSvmConfig::default().build(99);
        a.fit(&mat, &labels).unwrap();
        b.fit(&mat, &labels).unwrap();
        assert_eq!(a.predict(&mat).unwrap(), b.predict(&mat).unwrap());
    }

    #[test]
    fn test_constant_feature_is_fine() {
        let mut mat = FeatureMatrix::with_columns(2);
        let mut labels = Vec::new();
        for i in 0..20 {
            mat.push_row(&[i as f64, 1.0]);
            labels.push(i >= 10);
        }
        let mut svm = LinearSvmConfig::default().build(0);
        svm.fit(&mat, &labels).unwrap();
        let scores = svm.predict(&mat).unwrap();
        assert!(scores[19] > scores[0]);
    }

    #[test]
    fn test_degenerate_inputs() {
        let mut svm = LinearSvmConfig::default().build(0);

        let mut wide = FeatureMatrix::with_columns(3);
        wide.push_row(&[1.0, 2.0, 3.0]);
        wide.push_row(&[3.0, 2.0, 1.0]);
        assert_eq!(
            svm.fit(&wide, &[true, false]),
            Err(ClassifierError::TooFewExamples {
                examples: 2,
                features: 3
            })
        );

        let (mat, _) = blobs(10, 3);
        assert!(matches!(
            svm.fit(&mat, &[true; 10]),
            Err(ClassifierError::SingleClass { positives: 10, negatives: 0 })
        ));

        let mut bad = FeatureMatrix::with_columns(1);
        for v in [1.0, f64::NAN, 2.0, 3.0] {
            bad.push_row(&[v]);
        }
        assert_eq!(
            svm.fit(&bad, &[true, false, true, false]),
            Err(ClassifierError::NonFiniteInput { row: 1 })
        );
    }

    #[test]
    fn test_predict_before_fit() {
        let svm = LinearSvmConfig::default().build(0);
        let (mat, _) = blobs(4, 0);
        assert_eq!(svm.predict(&mat), Err(ClassifierError::NotFitted));
    }
}
