use tracing::{debug, info};

use super::{ModelSelector, SelectorContext};
use crate::hmm::GaussianHMM;

/// Select the candidate with the highest Discriminative Information
/// Criterion: `DIC = logL(own data) - mean(logL over all other categories)`.
///
/// A model that fits its own category well while assigning low likelihood
/// to every other category separates best. Each candidate costs one score
/// per foreign category, so the search is
/// O(candidates x categories) oracle calls; fine for small vocabularies.
pub struct SelectorDIC<'a> {
    ctx: SelectorContext<'a>,
}

impl<'a> SelectorDIC<'a> {
    pub fn new(ctx: SelectorContext<'a>) -> Self {
        Self { ctx }
    }

    /// DIC value for an already-fitted candidate. `None` when the model
    /// cannot score its own data or no foreign category is scorable.
    pub fn dic_of(&self, model: &GaussianHMM) -> Option<f64> {
        let own = self.ctx.own_data();
        let log_l_self = model.score(&own.x, &own.lengths).ok()?;

        let mut anti_sum = 0.0;
        let mut anti_count = 0usize;
        for (word, data) in self.ctx.foreign_data() {
            match model.score(&data.x, &data.lengths) {
                Ok(log_l) => {
                    anti_sum += log_l;
                    anti_count += 1;
                }
                // A single unscorable foreign category just drops out of
                // the average for this candidate
                Err(err) => {
                    debug!(
                        "anti-likelihood of {} against {} failed: {}",
                        self.ctx.word(),
                        word,
                        err
                    );
                }
            }
        }

        if anti_count == 0 {
            return None;
        }
        Some(log_l_self - anti_sum / anti_count as f64)
    }
}

impl ModelSelector for SelectorDIC<'_> {
    fn select(&self) -> Option<GaussianHMM> {
        let mut best: Option<(f64, GaussianHMM)> = None;

        for n in self.ctx.candidates() {
            let Some(model) = self.ctx.fit_at(n) else {
                continue;
            };
            let Some(dic) = self.dic_of(&model) else {
                debug!("no DIC for {} with {} states", self.ctx.word(), n);
                continue;
            };

            if self.ctx.options().verbose {
                info!("DIC for {} with {} states: {:.3}", self.ctx.word(), n, dic);
            }

            if best.as_ref().map_or(true, |(score, _)| dic > *score) {
                best = Some((dic, model));
            }
        }

        best.map(|(_, model)| model)
    }
}
