use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use word_recognizer::{
    build_dataset, combine_sequences, load_collection, recognize, GaussianHMM,
    LengthIndexedDataset, ModelSelector, SelectorBIC, SelectorCV, SelectorConstant,
    SelectorContext, SelectorDIC, SelectorOptions, SequenceCollection, XLengths,
};

#[derive(Parser)]
#[command(name = "word-recognizer")]
#[command(version = "0.1.0")]
#[command(about = "HMM word recognizer with hidden-state-count selection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the best state count per word and report the chosen models
    Select {
        /// Training dataset (JSON: word -> sequences -> frames)
        #[arg(short, long)]
        data: PathBuf,

        /// Restrict selection to a single word
        #[arg(short, long)]
        word: Option<String>,

        #[command(flatten)]
        search: SearchArgs,
    },
    /// Train one model per word, then classify every sequence of a test set
    Recognize {
        /// Training dataset (JSON)
        #[arg(long)]
        train: PathBuf,

        /// Test dataset (JSON); sequences are labeled by their word
        #[arg(long)]
        test: PathBuf,

        #[command(flatten)]
        search: SearchArgs,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Selection strategy
    #[arg(short, long, value_enum, default_value = "bic")]
    strategy: Strategy,

    /// Lower bound of the state-count search range (inclusive)
    #[arg(long, default_value_t = 2)]
    min_n: usize,

    /// Upper bound of the state-count search range (inclusive)
    #[arg(long, default_value_t = 10)]
    max_n: usize,

    /// State count used by the constant strategy
    #[arg(long, default_value_t = 3)]
    n_constant: usize,

    /// Seed for the oracle's deterministic initialization
    #[arg(long, default_value_t = 14)]
    seed: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    Constant,
    Bic,
    Dic,
    Cv,
}

impl SearchArgs {
    fn options(&self, verbose: bool) -> SelectorOptions {
        SelectorOptions {
            n_constant: self.n_constant,
            min_n: self.min_n,
            max_n: self.max_n,
            seed: self.seed,
            verbose,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Select { data, word, search } => {
            run_select(&data, word.as_deref(), &search, cli.verbose)?;
        }
        Commands::Recognize { train, test, search } => {
            run_recognize(&train, &test, &search, cli.verbose)?;
        }
    }

    Ok(())
}

fn select_model(ctx: SelectorContext<'_>, strategy: Strategy) -> Option<GaussianHMM> {
    match strategy {
        Strategy::Constant => SelectorConstant::new(ctx).select(),
        Strategy::Bic => SelectorBIC::new(ctx).select(),
        Strategy::Dic => SelectorDIC::new(ctx).select(),
        Strategy::Cv => SelectorCV::new(ctx).select(),
    }
}

/// Train one model per word; words whose search is exhausted are reported
/// and left out of the returned map.
fn train_models(
    collection: &SequenceCollection,
    dataset: &LengthIndexedDataset,
    search: &SearchArgs,
    verbose: bool,
) -> Result<BTreeMap<String, GaussianHMM>> {
    let mut models = BTreeMap::new();
    for word in collection.keys() {
        let ctx = SelectorContext::new(collection, dataset, word, search.options(verbose))?;
        match select_model(ctx, search.strategy) {
            Some(model) => {
                info!("selected {} states for {}", model.n_states, word);
                models.insert(word.clone(), model);
            }
            None => warn!("no model for {}: every candidate failed to fit", word),
        }
    }
    Ok(models)
}

fn run_select(
    data: &PathBuf,
    word: Option<&str>,
    search: &SearchArgs,
    verbose: bool,
) -> Result<()> {
    let mut collection = load_collection(data)?;
    if let Some(word) = word {
        collection.retain(|key, _| key.as_str() == word);
        if collection.is_empty() {
            anyhow::bail!("word {word:?} not present in {}", data.display());
        }
    }
    let dataset = build_dataset(&collection)?;

    info!(
        "selecting over n in [{}, {}] with the {:?} strategy for {} word(s)",
        search.min_n,
        search.max_n,
        search.strategy,
        collection.len()
    );
    let models = train_models(&collection, &dataset, search, verbose)?;
    info!("selected models for {}/{} words", models.len(), collection.len());

    Ok(())
}

fn run_recognize(train: &PathBuf, test: &PathBuf, search: &SearchArgs, verbose: bool) -> Result<()> {
    let collection = load_collection(train)?;
    let dataset = build_dataset(&collection)?;
    let models = train_models(&collection, &dataset, search, verbose)?;
    if models.is_empty() {
        anyhow::bail!("no word produced a usable model; nothing to recognize");
    }

    // Each test sequence becomes one labeled recognition item
    let test_collection = load_collection(test)?;
    let mut truths = Vec::new();
    let mut items: Vec<XLengths> = Vec::new();
    for (word, sequences) in &test_collection {
        for index in 0..sequences.len() {
            items.push(combine_sequences(&[index], sequences)?);
            truths.push(word.clone());
        }
    }

    let (probabilities, guesses) = recognize(&models, &items);

    let mut correct = 0;
    for ((truth, guess), scores) in truths.iter().zip(&guesses).zip(&probabilities) {
        let guessed = guess.as_deref().unwrap_or("<none>");
        let score = guess
            .as_ref()
            .and_then(|g| scores.get(g))
            .copied()
            .unwrap_or(f64::NEG_INFINITY);
        if guessed == truth {
            correct += 1;
            info!("{truth}: recognized ({score:.3})");
        } else {
            info!("{truth}: misrecognized as {guessed} ({score:.3})");
        }
    }

    info!(
        "accuracy: {}/{} ({:.1}%)",
        correct,
        items.len(),
        100.0 * correct as f64 / items.len() as f64
    );

    Ok(())
}
