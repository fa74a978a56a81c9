pub mod bic;
pub mod constant;
pub mod cv;
pub mod dic;

pub use bic::SelectorBIC;
pub use constant::SelectorConstant;
pub use cv::SelectorCV;
pub use dic::SelectorDIC;

use ndarray::Array2;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::data::{DataError, LengthIndexedDataset, Sequence, SequenceCollection, XLengths};
use crate::hmm::GaussianHMM;

/// Search bounds and oracle knobs shared by every selection strategy.
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// State count used by [`SelectorConstant`]
    pub n_constant: usize,
    /// Lower bound of the search range, inclusive
    pub min_n: usize,
    /// Upper bound of the search range, inclusive
    pub max_n: usize,
    /// Seed for the HMM's deterministic initialization
    pub seed: u64,
    /// Promote per-candidate progress lines from debug to info
    pub verbose: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            n_constant: 3,
            min_n: 2,
            max_n: 10,
            seed: 14,
            verbose: false,
        }
    }
}

/// Strategy contract: search the candidate range and hand back a trained
/// model, or `None` when every candidate failed to produce one.
pub trait ModelSelector {
    fn select(&self) -> Option<GaussianHMM>;
}

/// One category's slice of the dataset plus the shared fitting primitive.
///
/// Fit failures are an expected outcome of the numerically unstable oracle
/// (small samples, extreme state counts); `fit_at`/`fit_on` convert them
/// into `None` with a debug log line so the strategies' search loops can
/// skip the candidate and keep going.
pub struct SelectorContext<'a> {
    dataset: &'a LengthIndexedDataset,
    word: &'a str,
    sequences: &'a [Sequence],
    own: &'a XLengths,
    opts: SelectorOptions,
}

impl<'a> SelectorContext<'a> {
    pub fn new(
        collection: &'a SequenceCollection,
        dataset: &'a LengthIndexedDataset,
        word: &'a str,
        opts: SelectorOptions,
    ) -> Result<Self, DataError> {
        let sequences = collection
            .get(word)
            .ok_or_else(|| DataError::UnknownCategory(word.to_string()))?;
        let own = dataset
            .get(word)
            .ok_or_else(|| DataError::UnknownCategory(word.to_string()))?;
        Ok(Self {
            dataset,
            word,
            sequences,
            own,
            opts,
        })
    }

    pub fn word(&self) -> &str {
        self.word
    }

    pub fn options(&self) -> &SelectorOptions {
        &self.opts
    }

    /// Candidate state counts, ascending.
    pub fn candidates(&self) -> RangeInclusive<usize> {
        self.opts.min_n..=self.opts.max_n
    }

    /// This category's individual sequences (fold indexing order).
    pub fn own_sequences(&self) -> &[Sequence] {
        self.sequences
    }

    /// This category's full concatenated data.
    pub fn own_data(&self) -> &XLengths {
        self.own
    }

    /// Every other category's full concatenated data, in map order.
    pub fn foreign_data(&self) -> impl Iterator<Item = (&'a String, &'a XLengths)> + '_ {
        self.dataset
            .iter()
            .filter(move |(word, _)| word.as_str() != self.word)
    }

    /// Attempt to fit an HMM with exactly `n_states` states on arbitrary
    /// data. Never propagates oracle errors.
    pub fn fit_on(
        &self,
        x: &Array2<f64>,
        lengths: &[usize],
        n_states: usize,
    ) -> Option<GaussianHMM> {
        let mut model = GaussianHMM::new(n_states, x.ncols());
        match model.fit(x, lengths, self.opts.seed) {
            Ok(log_l) => {
                debug!(
                    "model created for {} with {} states (logL {:.3})",
                    self.word, n_states, log_l
                );
                Some(model)
            }
            Err(err) => {
                debug!("failure on {} with {} states: {}", self.word, n_states, err);
                None
            }
        }
    }

    /// Attempt to fit on the category's full training data.
    pub fn fit_at(&self, n_states: usize) -> Option<GaussianHMM> {
        self.fit_on(&self.own.x, &self.own.lengths, n_states)
    }
}
