use tracing::{debug, info};

use super::{ModelSelector, SelectorContext};
use crate::data::{combine_sequences, kfold};
use crate::hmm::GaussianHMM;

/// Select the candidate with the highest average held-out log-likelihood
/// over `k = min(3, n_sequences)` cross-validation folds.
///
/// Each fold fits a fresh model on the training split and scores the
/// held-out split. Any fit or score failure inside a candidate's fold loop
/// discards the whole candidate; partial averages are never used. The
/// winning state count is then refit on the entire category and that model
/// is returned; the fold-trained models are throwaways.
pub struct SelectorCV<'a> {
    ctx: SelectorContext<'a>,
}

impl<'a> SelectorCV<'a> {
    pub fn new(ctx: SelectorContext<'a>) -> Self {
        Self { ctx }
    }

    /// Mean held-out log-likelihood for one candidate, or `None` when any
    /// fold fails.
    fn cv_score(&self, n_states: usize) -> Option<f64> {
        let sequences = self.ctx.own_sequences();
        let k = 3.min(sequences.len());

        // With fewer than 2 sequences there is nothing to hold out; the
        // candidate degenerates to a single fold trained and scored on the
        // full category data
        if k < 2 {
            let own = self.ctx.own_data();
            let model = self.ctx.fit_at(n_states)?;
            return model.score(&own.x, &own.lengths).ok();
        }

        let Ok(splits) = kfold(sequences.len(), k) else {
            return None;
        };

        let mut total = 0.0;
        for (train_idx, test_idx) in splits {
            let train = combine_sequences(&train_idx, sequences).ok()?;
            let test = combine_sequences(&test_idx, sequences).ok()?;

            let model = self.ctx.fit_on(&train.x, &train.lengths, n_states)?;
            match model.score(&test.x, &test.lengths) {
                Ok(log_l) => total += log_l,
                Err(err) => {
                    debug!(
                        "held-out scoring failed for {} with {} states: {}",
                        self.ctx.word(),
                        n_states,
                        err
                    );
                    return None;
                }
            }
        }

        Some(total / k as f64)
    }
}

impl ModelSelector for SelectorCV<'_> {
    fn select(&self) -> Option<GaussianHMM> {
        let mut best: Option<(f64, usize)> = None;

        for n in self.ctx.candidates() {
            let Some(score) = self.cv_score(n) else {
                debug!("candidate discarded for {} with {} states", self.ctx.word(), n);
                continue;
            };

            if self.ctx.options().verbose {
                info!(
                    "CV score for {} with {} states: {:.3}",
                    self.ctx.word(),
                    n,
                    score
                );
            }

            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, n));
            }
        }

        // Refit the winning state count on the full category data; only the
        // chosen n survives the fold loop
        let (_, best_n) = best?;
        self.ctx.fit_at(best_n)
    }
}
