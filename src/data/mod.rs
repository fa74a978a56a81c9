pub mod folds;

pub use folds::kfold;

use ndarray::{s, Array2};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// One observation sequence: `frames x features`.
pub type Sequence = Array2<f64>;

/// Category name -> ordered list of sequences. `BTreeMap` keeps category
/// iteration order deterministic, which the recognizer's tie-break relies on.
pub type SequenceCollection = BTreeMap<String, Vec<Sequence>>;

/// Category name -> concatenated data view, one entry per category.
pub type LengthIndexedDataset = BTreeMap<String, XLengths>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("category {0:?} has no sequences")]
    EmptyCategory(String),
    #[error("sequence has {got} feature columns, expected {expected}")]
    RaggedFeatures { expected: usize, got: usize },
    #[error("sequence with zero frames")]
    EmptySequence,
    #[error("sequence index {index} out of range for {len} sequences")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no sequence indices given")]
    EmptyIndexSet,
    #[error("lengths sum to {sum} but the matrix has {rows} rows")]
    LengthMismatch { sum: usize, rows: usize },
    #[error("cannot split {n} sequences into {k} folds")]
    InvalidFoldCount { k: usize, n: usize },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse dataset: {0}")]
    Json(#[from] serde_json::Error),
}

/// Concatenated feature matrix plus the per-sequence lengths that delimit it.
#[derive(Debug, Clone)]
pub struct XLengths {
    pub x: Array2<f64>,
    pub lengths: Vec<usize>,
}

impl XLengths {
    /// Build a view after checking that the lengths cover the matrix exactly.
    pub fn new(x: Array2<f64>, lengths: Vec<usize>) -> Result<Self, DataError> {
        if lengths.iter().any(|&len| len == 0) {
            return Err(DataError::EmptySequence);
        }
        let sum: usize = lengths.iter().sum();
        if lengths.is_empty() || sum != x.nrows() {
            return Err(DataError::LengthMismatch { sum, rows: x.nrows() });
        }
        Ok(Self { x, lengths })
    }

    pub fn n_frames(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_sequences(&self) -> usize {
        self.lengths.len()
    }
}

/// Concatenate the chosen sequences' frames in index order, recording their
/// individual lengths.
pub fn combine_sequences(indices: &[usize], sequences: &[Sequence]) -> Result<XLengths, DataError> {
    if indices.is_empty() {
        return Err(DataError::EmptyIndexSet);
    }

    for &index in indices {
        if index >= sequences.len() {
            return Err(DataError::IndexOutOfRange {
                index,
                len: sequences.len(),
            });
        }
    }

    let width = sequences[indices[0]].ncols();
    let mut lengths = Vec::with_capacity(indices.len());
    let mut total = 0;
    for &index in indices {
        let seq = &sequences[index];
        if seq.nrows() == 0 {
            return Err(DataError::EmptySequence);
        }
        if seq.ncols() != width {
            return Err(DataError::RaggedFeatures {
                expected: width,
                got: seq.ncols(),
            });
        }
        lengths.push(seq.nrows());
        total += seq.nrows();
    }

    let mut x = Array2::zeros((total, width));
    let mut row = 0;
    for &index in indices {
        let seq = &sequences[index];
        x.slice_mut(s![row..row + seq.nrows(), ..]).assign(seq);
        row += seq.nrows();
    }

    XLengths::new(x, lengths)
}

/// Derive the per-category concatenated view over a whole collection.
pub fn build_dataset(collection: &SequenceCollection) -> Result<LengthIndexedDataset, DataError> {
    let mut dataset = LengthIndexedDataset::new();
    for (word, sequences) in collection {
        if sequences.is_empty() {
            return Err(DataError::EmptyCategory(word.clone()));
        }
        let all: Vec<usize> = (0..sequences.len()).collect();
        dataset.insert(word.clone(), combine_sequences(&all, sequences)?);
    }
    Ok(dataset)
}

/// Parse a collection from its JSON form:
/// `{"WORD": [[[f, ...], ...], ...], ...}` — category -> sequences -> frames.
/// Every frame in the file must have the same feature width.
pub fn parse_collection(json: &str) -> Result<SequenceCollection, DataError> {
    let raw: BTreeMap<String, Vec<Vec<Vec<f64>>>> = serde_json::from_str(json)?;

    let width = raw
        .values()
        .flatten()
        .flatten()
        .next()
        .map(Vec::len)
        .unwrap_or(0);

    let mut collection = SequenceCollection::new();
    for (word, sequences) in raw {
        if sequences.is_empty() {
            return Err(DataError::EmptyCategory(word));
        }
        let mut converted = Vec::with_capacity(sequences.len());
        for frames in sequences {
            if frames.is_empty() {
                return Err(DataError::EmptySequence);
            }
            let mut flat = Vec::with_capacity(frames.len() * width);
            for frame in &frames {
                if frame.len() != width {
                    return Err(DataError::RaggedFeatures {
                        expected: width,
                        got: frame.len(),
                    });
                }
                flat.extend_from_slice(frame);
            }
            converted.push(Array2::from_shape_vec((frames.len(), width), flat)?);
        }
        collection.insert(word, converted);
    }
    Ok(collection)
}

/// Load a collection from a JSON file on disk.
pub fn load_collection(path: &Path) -> Result<SequenceCollection, DataError> {
    let json = std::fs::read_to_string(path)?;
    parse_collection(&json)
}
