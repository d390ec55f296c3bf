use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use headline_prep::config::PrepConfig;
use headline_prep::corpus::{self, Cleaner, Corpus};
use headline_prep::embedding::{self, KeyedVectors};
use headline_prep::mappings::{self, Mappings};
use headline_prep::vectorize;

/// Prepare newsgroup articles and GloVe vectors for headline generation
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepend the word2vec header to a raw GloVe file
    ConvertGlove {
        /// Raw GloVe file (defaults to <data_dir>/glove.6B.<dim>d.txt)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (defaults to the configured embedding path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split, tokenize and clean raw articles into bodies and headlines
    PrepareCorpus {
        /// Directory of raw newsgroup posts
        #[arg(short, long)]
        articles: PathBuf,

        /// Strip ASCII punctuation before tokenizing
        #[arg(long)]
        remove_punct: bool,

        /// File of stopwords to drop, one per line
        #[arg(long)]
        stopwords: Option<PathBuf>,

        /// Tokenizer JSON file to use instead of whitespace splitting
        #[arg(long)]
        tokenizer: Option<PathBuf>,
    },

    /// Build word/index/vector tables and the initial embedding weights
    BuildMappings {
        /// Keep only embedding words that occur in the corpus
        #[arg(long)]
        filter_corpus: bool,
    },

    /// Vectorize the corpus into X/y matrices and print a few examples
    FormatInputs {
        #[arg(long)]
        maxlen: Option<usize>,

        #[arg(long)]
        step: Option<usize>,

        /// Number of held-out examples to print
        #[arg(long, default_value = "5")]
        show: usize,
    },
}

fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let mut config = PrepConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::ConvertGlove { input, output } => {
            let input =
                input.unwrap_or_else(|| embedding::glove_path(&config.data_dir, config.embed_dim));
            let output = output.unwrap_or_else(|| config.embedding_path());
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            let (n_lines, dims) = embedding::convert_glove_to_word2vec(&input, &output)
                .with_context(|| format!("converting {}", input.display()))?;
            println!("{n_lines} {dims}");
        }
        Commands::PrepareCorpus {
            articles,
            remove_punct,
            stopwords,
            tokenizer,
        } => {
            let mut cleaner = Cleaner::new().remove_punctuation(remove_punct);
            if let Some(path) = stopwords {
                let words = Cleaner::load_stopwords(&path)
                    .with_context(|| format!("reading stopwords {}", path.display()))?;
                cleaner = cleaner.with_stopwords(words);
            }
            if let Some(path) = tokenizer {
                cleaner = cleaner
                    .with_tokenizer_file(&path)
                    .with_context(|| format!("loading tokenizer {}", path.display()))?;
            }
            let corpus = corpus::prepare_corpus(&articles, &cleaner)
                .with_context(|| format!("preparing articles in {}", articles.display()))?;
            corpus.save(&config.data_dir)?;
        }
        Commands::BuildMappings { filter_corpus } => {
            config.filter_corpus |= filter_corpus;
            build_mappings(&config)?;
        }
        Commands::FormatInputs { maxlen, step, show } => {
            config.maxlen = maxlen.unwrap_or(config.maxlen);
            config.step = step.unwrap_or(config.step);
            format_inputs(&config, show)?;
        }
    }

    Ok(())
}

fn build_mappings(config: &PrepConfig) -> Result<()> {
    let embedding_path = config.embedding_path();
    let wrd_embedding = KeyedVectors::load(&embedding_path, config.embedding_format)
        .with_context(|| format!("loading embedding {}", embedding_path.display()))?;

    let corpus = if config.filter_corpus {
        Some(Corpus::load(&config.data_dir).context("loading corpus for filtering")?)
    } else {
        None
    };
    let mappings = mappings::build_mappings(
        &wrd_embedding,
        config.filter_corpus,
        corpus.as_ref().map(|c| c.bodies.as_slice()),
        corpus.as_ref().map(|c| c.headlines.as_slice()),
    )?;
    let weights = mappings.embedding_weights()?;
    info!(vocab_size = mappings.vocab_size(), "Built mappings");

    fs::create_dir_all(&config.data_dir)?;
    write_json(&config.mappings_path(), &mappings)?;
    write_json(&config.weights_path(), &weights)?;
    Ok(())
}

fn format_inputs(config: &PrepConfig, show: usize) -> Result<()> {
    let corpus = Corpus::load(&config.data_dir).context("loading corpus")?;
    let mappings: Mappings = read_json(&config.mappings_path())?;
    let num_classes = mappings.word_idx.len();

    let (train, test) = corpus.split_train_test(config.test_fraction, config.seed)?;
    let mut sets = Vec::with_capacity(2);
    for (name, part) in [("train", &train), ("test", &test)] {
        let (vec_bodies, vec_headlines) =
            vectorize::vectorize_texts(&part.bodies, &part.headlines, &mappings.word_idx);
        let set = vectorize::format_inputs(
            &vec_bodies,
            &vec_headlines,
            num_classes,
            config.maxlen,
            config.step,
        )?;
        info!(split = name, examples = set.len(), "Formatted split");
        sets.push(set);
    }

    let (examples, _) = sets[1].subset(show, true);
    for (x, y) in examples.xs.rows().into_iter().zip(examples.ys.rows()) {
        let (x_str, y_str) =
            mappings::stringify_example(&x.to_vec(), &y.to_vec(), &mappings.idx_word)?;
        println!("X: {x_str:?}\ny: {y_str:?}\n");
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Saved");
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}
