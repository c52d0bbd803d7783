use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RidgeParams {
    pub l2: f64,
    pub learning_rate: f64,
    pub max_iters: usize,
    pub tolerance: f64,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self {
            l2: 0.01,
            learning_rate: 0.1,
            max_iters: 2_000,
            tolerance: 1e-9,
        }
    }
}

/// Linear model over standardized features. The intercept is not penalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub intercept: f64,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub iterations: usize,
}

impl LinearModel {
    /// Batch gradient descent on half the mean squared error plus an L2 term.
    /// `x` rows must all have the same width; `y` is aligned with `x`.
    pub fn fit(x: &[&[f64]], y: &[f64], params: &RidgeParams) -> Self {
        let width = x.first().map(|row| row.len()).unwrap_or(0);
        let (feature_means, feature_stds) = norm_stats(x, width);
        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, v)| standardized(*v, feature_means[j], feature_stds[j]))
                    .collect()
            })
            .collect();

        let n = y.len().max(1) as f64;
        let mut intercept = y.iter().sum::<f64>() / n;
        let mut coeffs = vec![0.0; width];
        let mut iterations = 0;

        for iter in 0..params.max_iters {
            iterations = iter + 1;
            let mut grad = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, target) in z.iter().zip(y) {
                let err = intercept + dot(&coeffs, row) - target;
                grad_b += err;
                for j in 0..width {
                    grad[j] += err * row[j];
                }
            }

            let lr = params.learning_rate / (1.0 + iter as f64 * 0.001);
            let mut max_step = (lr * grad_b / n).abs();
            intercept -= lr * grad_b / n;
            for j in 0..width {
                let g = grad[j] / n + params.l2 * coeffs[j];
                let step = lr * g;
                coeffs[j] -= step;
                max_step = max_step.max(step.abs());
            }
            if max_step < params.tolerance {
                break;
            }
        }

        Self {
            feature_means,
            feature_stds,
            intercept,
            coeffs,
            iterations,
        }
    }

    /// Number of inputs the model reads, `None` when the normalization stats
    /// and coefficients disagree.
    pub fn width(&self) -> Option<usize> {
        let width = self.coeffs.len();
        (self.feature_means.len() == width && self.feature_stds.len() == width).then_some(width)
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut out = self.intercept;
        for (j, c) in self.coeffs.iter().enumerate() {
            let Some(v) = x.get(j) else {
                break;
            };
            let mu = self.feature_means.get(j).copied().unwrap_or(0.0);
            let sigma = self.feature_stds.get(j).copied().unwrap_or(1.0);
            out += c * standardized(*v, mu, sigma);
        }
        out
    }
}

fn norm_stats(x: &[&[f64]], width: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mean = vec![0.0; width];
    let mut std = vec![1.0; width];
    if x.is_empty() {
        return (mean, std);
    }
    let n = x.len() as f64;
    for row in x {
        for j in 0..width {
            mean[j] += row[j];
        }
    }
    for v in &mut mean {
        *v /= n;
    }
    let mut var = vec![0.0; width];
    for row in x {
        for j in 0..width {
            let d = row[j] - mean[j];
            var[j] += d * d;
        }
    }
    for j in 0..width {
        std[j] = (var[j] / n).sqrt().max(1e-6);
    }
    (mean, std)
}

fn standardized(x: f64, mean: f64, std: f64) -> f64 {
    (x - mean) / std.max(1e-6)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use assert_float_eq::assert_float_absolute_eq;

    use super::*;

    #[test]
    fn recovers_a_linear_relationship() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64 / 10.0, ((i * 7) % 11) as f64])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] - 0.5 * r[1] + 1.0).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();

        let model = LinearModel::fit(
            &x,
            &y,
            &RidgeParams {
                l2: 0.0,
                ..RidgeParams::default()
            },
        );
        assert_float_absolute_eq!(model.predict(&[3.0, 4.0]), 5.0, 1e-3);
    }

    #[test]
    fn constant_feature_does_not_blow_up() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let model = LinearModel::fit(&x, &y, &RidgeParams::default());
        assert!(model.predict(&[1.0, 5.0]).is_finite());
    }

    #[test]
    fn width_needs_matching_stats() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 2.0, (i % 4) as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let mut model = LinearModel::fit(&x, &y, &RidgeParams::default());
        assert_eq!(model.width(), Some(3));
        model.feature_stds.truncate(2);
        assert_eq!(model.width(), None);
    }
}
