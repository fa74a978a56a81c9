use super::{ModelSelector, SelectorContext};
use crate::hmm::GaussianHMM;

/// Baseline strategy: no search, always fit at the configured `n_constant`.
pub struct SelectorConstant<'a> {
    ctx: SelectorContext<'a>,
}

impl<'a> SelectorConstant<'a> {
    pub fn new(ctx: SelectorContext<'a>) -> Self {
        Self { ctx }
    }
}

impl ModelSelector for SelectorConstant<'_> {
    fn select(&self) -> Option<GaussianHMM> {
        self.ctx.fit_at(self.ctx.options().n_constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::testdata::cat_dog_collection;
    use crate::selectors::SelectorOptions;

    #[test]
    fn test_constant_returns_requested_state_count() {
        let (collection, dataset) = cat_dog_collection();
        let opts = SelectorOptions {
            n_constant: 3,
            ..SelectorOptions::default()
        };
        let ctx = SelectorContext::new(&collection, &dataset, "CAT", opts).unwrap();
        let model = SelectorConstant::new(ctx).select().unwrap();
        assert_eq!(model.n_states, 3);
    }

    #[test]
    fn test_constant_reports_fit_failure() {
        let (collection, dataset) = cat_dog_collection();
        // 500 states on 50 frames cannot fit
        let opts = SelectorOptions {
            n_constant: 500,
            ..SelectorOptions::default()
        };
        let ctx = SelectorContext::new(&collection, &dataset, "CAT", opts).unwrap();
        assert!(SelectorConstant::new(ctx).select().is_none());
    }
}
