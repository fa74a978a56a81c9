use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use super::HmmError;

/// Variance floor applied to every diagonal entry after each update.
const MIN_VARIANCE: f64 = 1e-3;

/// Hidden Markov Model with diagonal-covariance Gaussian emissions and a
/// variable number of hidden states.
///
/// Training data is a concatenated feature matrix plus a list of
/// per-sequence lengths; each sequence gets its own forward/backward pass
/// and the Baum-Welch statistics are pooled across sequences. All
/// probability arithmetic runs in log space.
#[derive(Debug, Clone)]
pub struct GaussianHMM {
    /// Number of hidden states
    pub n_states: usize,
    /// Number of features (observation dimensions)
    pub n_features: usize,
    /// State transition matrix (n_states x n_states)
    pub transition: Array2<f64>,
    /// Initial state probabilities
    pub start_prob: Array1<f64>,
    /// Mean vectors for each state (n_states x n_features)
    pub means: Array2<f64>,
    /// Diagonal variances for each state (n_states x n_features)
    pub variances: Array2<f64>,
    /// Convergence tolerance for EM
    pub tol: f64,
    /// Maximum EM iterations
    pub max_iter: usize,
}

impl GaussianHMM {
    /// Create an untrained HMM with uniform start probabilities and a
    /// self-persistence-biased transition matrix.
    pub fn new(n_states: usize, n_features: usize) -> Self {
        let start_prob = Array1::from_elem(n_states, 1.0 / n_states as f64);

        let off_diag = if n_states > 1 {
            0.5 / (n_states - 1) as f64
        } else {
            0.0
        };
        let mut transition = Array2::from_elem((n_states, n_states), off_diag);
        for i in 0..n_states {
            transition[[i, i]] = if n_states > 1 { 0.5 } else { 1.0 };
        }

        Self {
            n_states,
            n_features,
            transition,
            start_prob,
            means: Array2::zeros((n_states, n_features)),
            variances: Array2::ones((n_states, n_features)),
            tol: 1e-4,
            max_iter: 100,
        }
    }

    fn validate(&self, x: &Array2<f64>, lengths: &[usize]) -> Result<(), HmmError> {
        if x.ncols() != self.n_features {
            return Err(HmmError::DimensionMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        if lengths.iter().any(|&len| len == 0) {
            return Err(HmmError::EmptySequence);
        }
        let sum: usize = lengths.iter().sum();
        if lengths.is_empty() || sum != x.nrows() {
            return Err(HmmError::LengthMismatch { sum, rows: x.nrows() });
        }
        Ok(())
    }

    /// Seeded initialization: state means are drawn from random observation
    /// frames, every state starts with the global per-feature variance.
    fn init_params(&mut self, x: &Array2<f64>, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_obs = x.nrows();

        let mut global_mean = vec![0.0; self.n_features];
        let mut global_sq = vec![0.0; self.n_features];
        for t in 0..n_obs {
            for j in 0..self.n_features {
                global_mean[j] += x[[t, j]];
                global_sq[j] += x[[t, j]] * x[[t, j]];
            }
        }
        for j in 0..self.n_features {
            global_mean[j] /= n_obs as f64;
            global_sq[j] /= n_obs as f64;
        }

        for state in 0..self.n_states {
            let row = rng.gen_range(0..n_obs);
            for j in 0..self.n_features {
                self.means[[state, j]] = x[[row, j]];
                let var = global_sq[j] - global_mean[j] * global_mean[j];
                self.variances[[state, j]] = var.max(MIN_VARIANCE);
            }
        }
    }

    /// Log density of one observation frame under one state's Gaussian.
    fn log_emission_prob(&self, obs: &ArrayView1<f64>, state: usize) -> f64 {
        let mut log_p = 0.0;
        for j in 0..self.n_features {
            let var = self.variances[[state, j]];
            let diff = obs[j] - self.means[[state, j]];
            log_p -= 0.5 * ((2.0 * PI * var).ln() + diff * diff / var);
        }
        log_p
    }

    /// Forward algorithm over one sequence, in log space.
    fn forward(&self, seq: &ArrayView2<f64>) -> (Array2<f64>, f64) {
        let n_obs = seq.nrows();
        let mut log_alpha = Array2::from_elem((n_obs, self.n_states), f64::NEG_INFINITY);

        for state in 0..self.n_states {
            log_alpha[[0, state]] = self.start_prob[state].ln()
                + self.log_emission_prob(&seq.row(0), state);
        }

        for t in 1..n_obs {
            let obs = seq.row(t);
            for j in 0..self.n_states {
                let mut log_sum_terms = Vec::with_capacity(self.n_states);
                for i in 0..self.n_states {
                    log_sum_terms.push(log_alpha[[t - 1, i]] + self.transition[[i, j]].ln());
                }
                log_alpha[[t, j]] = log_sum_exp(&log_sum_terms)
                    + self.log_emission_prob(&obs, j);
            }
        }

        let log_prob = log_sum_exp(&log_alpha.row(n_obs - 1).to_vec());

        (log_alpha, log_prob)
    }

    /// Backward algorithm over one sequence, in log space.
    fn backward(&self, seq: &ArrayView2<f64>) -> Array2<f64> {
        let n_obs = seq.nrows();
        let mut log_beta = Array2::from_elem((n_obs, self.n_states), f64::NEG_INFINITY);

        for state in 0..self.n_states {
            log_beta[[n_obs - 1, state]] = 0.0; // log(1)
        }

        for t in (0..n_obs - 1).rev() {
            let obs_next = seq.row(t + 1);
            for i in 0..self.n_states {
                let mut log_sum_terms = Vec::with_capacity(self.n_states);
                for j in 0..self.n_states {
                    log_sum_terms.push(
                        self.transition[[i, j]].ln()
                            + self.log_emission_prob(&obs_next, j)
                            + log_beta[[t + 1, j]],
                    );
                }
                log_beta[[t, i]] = log_sum_exp(&log_sum_terms);
            }
        }

        log_beta
    }

    /// Fit the model with Baum-Welch EM on length-delimited sequences.
    /// Returns the total log-likelihood of the training data.
    ///
    /// The same `seed` always produces the same fitted parameters; the
    /// iteration cap guarantees termination whether or not EM converges.
    pub fn fit(&mut self, x: &Array2<f64>, lengths: &[usize], seed: u64) -> Result<f64, HmmError> {
        self.validate(x, lengths)?;
        if x.nrows() < self.n_states {
            return Err(HmmError::TooFewFrames {
                frames: x.nrows(),
                states: self.n_states,
            });
        }

        self.init_params(x, seed);

        let mut prev_log_prob = f64::NEG_INFINITY;

        for _iteration in 0..self.max_iter {
            // E-step accumulators, pooled across sequences
            let mut total_log_prob = 0.0;
            let mut start_acc = Array1::<f64>::zeros(self.n_states);
            let mut xi_acc = Array2::<f64>::zeros((self.n_states, self.n_states));
            let mut gamma_acc = Array1::<f64>::zeros(self.n_states);
            let mut obs_acc = Array2::<f64>::zeros((self.n_states, self.n_features));
            let mut obs_sq_acc = Array2::<f64>::zeros((self.n_states, self.n_features));

            let mut offset = 0;
            for &len in lengths {
                let seq = x.slice(s![offset..offset + len, ..]);
                offset += len;

                let (log_alpha, log_prob) = self.forward(&seq);
                if !log_prob.is_finite() {
                    return Err(HmmError::NonFiniteLikelihood("fit"));
                }
                let log_beta = self.backward(&seq);
                total_log_prob += log_prob;

                // State occupation probabilities
                let mut gamma = Array2::<f64>::zeros((len, self.n_states));
                for t in 0..len {
                    let terms: Vec<f64> = (0..self.n_states)
                        .map(|state| log_alpha[[t, state]] + log_beta[[t, state]])
                        .collect();
                    let log_denom = log_sum_exp(&terms);
                    for state in 0..self.n_states {
                        gamma[[t, state]] =
                            (log_alpha[[t, state]] + log_beta[[t, state]] - log_denom).exp();
                    }
                }

                for state in 0..self.n_states {
                    start_acc[state] += gamma[[0, state]];
                    for t in 0..len {
                        let g = gamma[[t, state]];
                        gamma_acc[state] += g;
                        for j in 0..self.n_features {
                            let v = seq[[t, j]];
                            obs_acc[[state, j]] += g * v;
                            obs_sq_acc[[state, j]] += g * v * v;
                        }
                    }
                }

                // Expected transition counts
                for t in 0..len - 1 {
                    let obs_next = seq.row(t + 1);
                    for i in 0..self.n_states {
                        for j in 0..self.n_states {
                            let log_xi = log_alpha[[t, i]]
                                + self.transition[[i, j]].ln()
                                + self.log_emission_prob(&obs_next, j)
                                + log_beta[[t + 1, j]]
                                - log_prob;
                            xi_acc[[i, j]] += log_xi.exp();
                        }
                    }
                }
            }

            if (total_log_prob - prev_log_prob).abs() < self.tol {
                return Ok(total_log_prob);
            }
            prev_log_prob = total_log_prob;

            // M-step
            let start_sum = start_acc.sum();
            if start_sum > 0.0 {
                for state in 0..self.n_states {
                    self.start_prob[state] = start_acc[state] / start_sum;
                }
            }

            for i in 0..self.n_states {
                let row_sum: f64 = xi_acc.row(i).sum();
                if row_sum > 0.0 {
                    for j in 0..self.n_states {
                        self.transition[[i, j]] = xi_acc[[i, j]] / row_sum;
                    }
                }
            }

            for state in 0..self.n_states {
                let gamma_sum = gamma_acc[state];
                // A starved state keeps its previous parameters
                if gamma_sum > 0.0 {
                    for j in 0..self.n_features {
                        let mean = obs_acc[[state, j]] / gamma_sum;
                        let var = obs_sq_acc[[state, j]] / gamma_sum - mean * mean;
                        self.means[[state, j]] = mean;
                        self.variances[[state, j]] = var.max(MIN_VARIANCE);
                    }
                }
            }
        }

        // Did not converge within max_iter iterations
        Ok(prev_log_prob)
    }

    /// Total log-likelihood of length-delimited sequences under the model.
    pub fn score(&self, x: &Array2<f64>, lengths: &[usize]) -> Result<f64, HmmError> {
        self.validate(x, lengths)?;

        let mut total = 0.0;
        let mut offset = 0;
        for &len in lengths {
            let seq = x.slice(s![offset..offset + len, ..]);
            offset += len;

            let (_, log_prob) = self.forward(&seq);
            if !log_prob.is_finite() {
                return Err(HmmError::NonFiniteLikelihood("score"));
            }
            total += log_prob;
        }

        Ok(total)
    }
}

/// Log-sum-exp trick for numerical stability
fn log_sum_exp(log_values: &[f64]) -> f64 {
    if log_values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = log_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }

    let sum_exp: f64 = log_values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum_exp.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_cluster_data() -> (Array2<f64>, Vec<usize>) {
        // Two sequences alternating around -1 and +1
        let rows = vec![
            -1.1, -0.9, -1.0, 1.0, 0.9, 1.1, //
            -0.95, -1.05, 1.05, 0.95, 1.0, -1.0,
        ];
        let x = Array2::from_shape_vec((12, 1), rows).unwrap();
        (x, vec![6, 6])
    }

    #[test]
    fn test_hmm_creation() {
        let hmm = GaussianHMM::new(4, 6);
        assert_eq!(hmm.n_states, 4);
        assert_eq!(hmm.n_features, 6);
        assert_eq!(hmm.transition.shape(), &[4, 4]);
        assert_eq!(hmm.means.shape(), &[4, 6]);
        assert_relative_eq!(hmm.transition.row(0).sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(hmm.start_prob.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_state_transition_is_identity() {
        let hmm = GaussianHMM::new(1, 2);
        assert_relative_eq!(hmm.transition[[0, 0]], 1.0);
    }

    #[test]
    fn test_fit_returns_finite_log_likelihood() {
        let (x, lengths) = two_cluster_data();
        let mut hmm = GaussianHMM::new(2, 1);
        let log_l = hmm.fit(&x, &lengths, 14).unwrap();
        assert!(log_l.is_finite());
        let rescored = hmm.score(&x, &lengths).unwrap();
        assert_relative_eq!(log_l, rescored, epsilon = 1e-6);
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let (x, lengths) = two_cluster_data();
        let mut a = GaussianHMM::new(2, 1);
        let mut b = GaussianHMM::new(2, 1);
        let la = a.fit(&x, &lengths, 14).unwrap();
        let lb = b.fit(&x, &lengths, 14).unwrap();
        assert_relative_eq!(la, lb);
        assert_eq!(a.means, b.means);
        assert_eq!(a.transition, b.transition);
    }

    #[test]
    fn test_fit_rejects_too_few_frames() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let mut hmm = GaussianHMM::new(5, 1);
        assert!(matches!(
            hmm.fit(&x, &[2], 14),
            Err(HmmError::TooFewFrames { frames: 2, states: 5 })
        ));
    }

    #[test]
    fn test_score_rejects_dimension_mismatch() {
        let (x, lengths) = two_cluster_data();
        let mut hmm = GaussianHMM::new(2, 1);
        hmm.fit(&x, &lengths, 14).unwrap();

        let wide = Array2::zeros((4, 3));
        assert!(matches!(
            hmm.score(&wide, &[4]),
            Err(HmmError::DimensionMismatch { expected: 1, got: 3 })
        ));
    }

    #[test]
    fn test_lengths_must_sum_to_rows() {
        let (x, _) = two_cluster_data();
        let mut hmm = GaussianHMM::new(2, 1);
        assert!(matches!(
            hmm.fit(&x, &[6, 5], 14),
            Err(HmmError::LengthMismatch { sum: 11, rows: 12 })
        ));
        assert!(matches!(hmm.fit(&x, &[12, 0], 14), Err(HmmError::EmptySequence)));
    }

    #[test]
    fn test_score_prefers_matching_data() {
        let (x, lengths) = two_cluster_data();
        let mut hmm = GaussianHMM::new(2, 1);
        hmm.fit(&x, &lengths, 14).unwrap();

        let near = Array2::from_shape_vec((4, 1), vec![-1.0, 1.0, -1.0, 1.0]).unwrap();
        let far = Array2::from_shape_vec((4, 1), vec![40.0, 41.0, 40.5, 39.5]).unwrap();
        let s_near = hmm.score(&near, &[4]).unwrap();
        let s_far = hmm.score(&far, &[4]).unwrap();
        assert!(s_near > s_far);
    }

    #[test]
    fn test_log_sum_exp() {
        let values = vec![-1.0, -2.0, -3.0];
        let result = log_sum_exp(&values);
        assert!(result > -1.0 && result < 0.0);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(
            log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
    }
}
