//! HMM-based isolated word recognition with hidden-state-count selection.
//!
//! Each word gets its own diagonal-covariance Gaussian HMM; the open
//! question is how many hidden states that model should have. Four
//! interchangeable strategies search a bounded range of state counts
//! under partial-failure conditions:
//!
//! - [`selectors::SelectorConstant`] — fixed state count, no search
//! - [`selectors::SelectorBIC`] — lowest Bayesian Information Criterion
//! - [`selectors::SelectorDIC`] — highest discriminative margin against
//!   the other words
//! - [`selectors::SelectorCV`] — highest average held-out log-likelihood
//!   over cross-validation folds
//!
//! The [`recognizer`] scores unseen sequences against every trained model
//! and returns, per item, the full score map plus the arg-max word.
//!
//! Fitting fails routinely at extreme state counts or on tiny samples;
//! that is treated as data, not as an error: failed candidates drop out of
//! the search and an exhausted search yields an explicit `None`.

pub mod data;
pub mod hmm;
pub mod recognizer;
pub mod selectors;

pub use data::{
    build_dataset, combine_sequences, kfold, load_collection, parse_collection, DataError,
    LengthIndexedDataset, Sequence, SequenceCollection, XLengths,
};
pub use hmm::{GaussianHMM, HmmError};
pub use recognizer::{recognize, ScoreMap};
pub use selectors::{
    ModelSelector, SelectorBIC, SelectorCV, SelectorConstant, SelectorContext, SelectorDIC,
    SelectorOptions,
};
