use super::DataError;

/// Split `0..n_samples` into `k` contiguous (train, test) index partitions.
///
/// Fold sizes follow scikit-learn's `KFold`: the first `n_samples % k`
/// folds hold one extra sample. Every index appears in exactly one test
/// fold, and each train set is the complement of its test fold.
pub fn kfold(n_samples: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, DataError> {
    if k < 2 || k > n_samples {
        return Err(DataError::InvalidFoldCount { k, n: n_samples });
    }

    let base = n_samples / k;
    let extra = n_samples % k;

    let mut splits = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let stop = start + size;
        let test: Vec<usize> = (start..stop).collect();
        let train: Vec<usize> = (0..n_samples).filter(|i| *i < start || *i >= stop).collect();
        splits.push((train, test));
        start = stop;
    }

    Ok(splits)
}
