use std::collections::BTreeMap;
use tracing::debug;

use crate::data::XLengths;
use crate::hmm::GaussianHMM;

/// Category name -> log-likelihood for one test item. Failed scores are
/// recorded as `f64::NEG_INFINITY`; every category in the model map always
/// has an entry.
pub type ScoreMap = BTreeMap<String, f64>;

/// Score every test item against every category's trained model.
///
/// Returns one `ScoreMap` and one best guess per item, in the same order
/// as `test_items`. The best guess is the category with the greatest
/// score; ties keep the first category encountered, and `BTreeMap` makes
/// that order lexicographic and reproducible. The guess is `None` only
/// when `models` is empty.
///
/// Scoring failures (for example a feature-width mismatch between a model
/// and an item) never propagate; they become `NEG_INFINITY` entries so the
/// remaining categories still compete.
pub fn recognize(
    models: &BTreeMap<String, GaussianHMM>,
    test_items: &[XLengths],
) -> (Vec<ScoreMap>, Vec<Option<String>>) {
    let mut probabilities = Vec::with_capacity(test_items.len());
    let mut guesses = Vec::with_capacity(test_items.len());

    for item in test_items {
        let mut scores = ScoreMap::new();
        let mut best: Option<(&str, f64)> = None;

        for (word, model) in models {
            let log_l = match model.score(&item.x, &item.lengths) {
                Ok(log_l) => log_l,
                Err(err) => {
                    debug!("scoring against {} failed: {}", word, err);
                    f64::NEG_INFINITY
                }
            };
            scores.insert(word.clone(), log_l);

            // Strictly greater, so the first category wins ties
            if best.map_or(true, |(_, best_score)| log_l > best_score) {
                best = Some((word, log_l));
            }
        }

        probabilities.push(scores);
        guesses.push(best.map(|(word, _)| word.to_string()));
    }

    (probabilities, guesses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::combine_sequences;
    use crate::selectors::testdata::{cat_dog_collection, noisy_sequences};
    use crate::selectors::{ModelSelector, SelectorBIC, SelectorContext, SelectorOptions};

    fn trained_models() -> BTreeMap<String, GaussianHMM> {
        let (collection, dataset) = cat_dog_collection();
        let opts = SelectorOptions {
            min_n: 2,
            max_n: 4,
            ..SelectorOptions::default()
        };
        let mut models = BTreeMap::new();
        for word in collection.keys() {
            let ctx =
                SelectorContext::new(&collection, &dataset, word, opts.clone()).unwrap();
            models.insert(word.clone(), SelectorBIC::new(ctx).select().unwrap());
        }
        models
    }

    #[test]
    fn test_recognize_cat_sequence_as_cat() {
        let models = trained_models();
        let (collection, _) = cat_dog_collection();
        let item = combine_sequences(&[0], &collection["CAT"]).unwrap();

        let (probabilities, guesses) = recognize(&models, &[item]);
        assert_eq!(probabilities.len(), 1);
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].as_deref(), Some("CAT"));
        assert!(probabilities[0]["CAT"] > probabilities[0]["DOG"]);
    }

    #[test]
    fn test_guess_matches_score_map_argmax() {
        let models = trained_models();
        let (collection, _) = cat_dog_collection();
        let items: Vec<_> = (0..3)
            .map(|i| combine_sequences(&[i], &collection["DOG"]).unwrap())
            .collect();

        let (probabilities, guesses) = recognize(&models, &items);
        assert_eq!(probabilities.len(), items.len());
        for (scores, guess) in probabilities.iter().zip(&guesses) {
            assert_eq!(scores.len(), models.len());
            let argmax = scores
                .iter()
                .fold(None::<(&str, f64)>, |best, (word, &score)| {
                    if best.map_or(true, |(_, b)| score > b) {
                        Some((word.as_str(), score))
                    } else {
                        best
                    }
                })
                .map(|(word, _)| word.to_string());
            assert_eq!(guess, &argmax);
        }
    }

    #[test]
    fn test_unscorable_item_gets_neg_infinity_entries() {
        let models = trained_models();
        // 5-wide frames against 2-wide models: every score fails
        let five_wide = XLengths::new(ndarray::Array2::zeros((4, 5)), vec![4]).unwrap();

        let (probabilities, guesses) = recognize(&models, &[five_wide]);
        assert!(probabilities[0]
            .values()
            .all(|&score| score == f64::NEG_INFINITY));
        // All-tie case still yields the first category
        assert_eq!(guesses[0].as_deref(), Some("CAT"));
    }

    #[test]
    fn test_empty_model_map_yields_no_guess() {
        let models = BTreeMap::new();
        let item = combine_sequences(&[0], &noisy_sequences((0.0, 0.0), 1, 4, 9)).unwrap();
        let (probabilities, guesses) = recognize(&models, &[item]);
        assert!(probabilities[0].is_empty());
        assert_eq!(guesses[0], None);
    }

    #[test]
    fn test_output_order_matches_input_order() {
        let models = trained_models();
        let (collection, _) = cat_dog_collection();
        let cat = combine_sequences(&[1], &collection["CAT"]).unwrap();
        let dog = combine_sequences(&[1], &collection["DOG"]).unwrap();

        let (_, guesses) = recognize(&models, &[cat, dog]);
        assert_eq!(guesses[0].as_deref(), Some("CAT"));
        assert_eq!(guesses[1].as_deref(), Some("DOG"));
    }
}
