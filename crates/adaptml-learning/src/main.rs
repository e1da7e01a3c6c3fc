//! `adaptml` command-line entry point.
//!
//! Every subcommand prints one JSON document to stdout; logs go to stderr.

use std::io::Read;
use std::path::PathBuf;

use adaptml_learning::recommend::catalog::recommended_grid;
use adaptml_learning::{
    Algorithm, ArtifactStore, FileArtifactStore, Hyperparameters, Level, ModelPreferences, ModelRecommender,
    Predictor, ProblemType, Trainer, TrainingConfig, TrainingSpeed, compare_models, insights,
    optimize_hyperparameters,
};
use adaptml_processing::ai::Summarizer;
use adaptml_processing::storage::{DatasetHandle, read_file};
use adaptml_processing::{DataProfiler, DatasetCharacterizer, DatasetStore, DirectoryStore};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "adaptml",
    version,
    about = "Adaptive tabular machine learning: profile, train and predict",
    long_about = "Profiles tabular datasets, recommends and trains models, and serves predictions \
                  from persisted artifacts.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    Enables generated summaries (templates otherwise)\n  \
                  RUST_LOG              Log filter (default: info)\n\n\
                  EXAMPLES:\n  \
                  adaptml profile --data titanic.csv\n  \
                  adaptml train --data titanic.csv --target Survived --session titanic01\n  \
                  adaptml predict --model-id model_titanic0_20250101_120000 --rows rows.json"
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Where the dataset comes from: a file, or a session under an uploads
/// directory.
#[derive(Args, Debug)]
struct Source {
    /// CSV or Parquet file
    #[arg(long, conflicts_with = "uploads")]
    data: Option<PathBuf>,

    /// Directory holding `{session}.csv`, `{session}.parquet` or `{session}/`
    #[arg(long, requires = "session")]
    uploads: Option<PathBuf>,

    /// Session token; also prefixes trained model ids
    #[arg(long)]
    session: Option<String>,
}

impl Source {
    fn load(&self) -> Result<DataFrame> {
        let df = match (&self.data, &self.uploads, &self.session) {
            (Some(path), _, _) => read_file(&DatasetHandle::from_path(path)?)?,
            (None, Some(root), Some(session)) => DirectoryStore::new(root).load(session)?,
            _ => bail!("pass --data <file> or --uploads <dir> --session <id>"),
        };
        info!(rows = df.height(), columns = df.width(), "dataset loaded");
        Ok(df)
    }
}

#[derive(Args, Debug)]
struct Preferences {
    #[arg(long, default_value = "medium")]
    interpretability: Level,
    #[arg(long, default_value = "medium")]
    training_time: TrainingSpeed,
    #[arg(long, default_value = "high")]
    performance: Level,
}

impl From<&Preferences> for ModelPreferences {
    fn from(p: &Preferences) -> Self {
        ModelPreferences {
            interpretability: p.interpretability,
            training_time: p.training_time,
            performance: p.performance,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profile a dataset
    Profile {
        #[command(flatten)]
        source: Source,
    },
    /// Target recommendations, quality assessment and suggestions
    Analyze {
        #[command(flatten)]
        source: Source,
    },
    /// Rank candidate algorithms for a target column
    Recommend {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        target: String,
        /// Detected from the target when omitted
        #[arg(long)]
        problem_type: Option<ProblemType>,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[command(flatten)]
        preferences: Preferences,
    },
    /// Train and persist a model
    Train {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        training: TrainingArgs,
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
    },
    /// Grid search with cross-validation
    Search {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        training: TrainingArgs,
        /// Search space as JSON (`{"C": [0.1, 1.0]}`); the size-adjusted
        /// recommended grid when omitted
        #[arg(long)]
        grid: Option<String>,
    },
    /// Cross-validate several algorithms and rank them
    Compare {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        training: TrainingArgs,
        /// Comma-separated algorithm tokens
        #[arg(long, value_delimiter = ',', required = true)]
        algorithms: Vec<Algorithm>,
    },
    /// Score rows with a stored model
    Predict {
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        #[arg(long)]
        model_id: String,
        /// JSON file with one object or an array of objects; `-` reads stdin
        #[arg(long, default_value = "-")]
        rows: String,
    },
    /// Metadata, summary and insights of a stored model
    Summary {
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        #[arg(long)]
        model_id: String,
    },
}

#[derive(Args, Debug)]
struct TrainingArgs {
    #[arg(long)]
    target: String,
    /// Algorithm token or `auto`
    #[arg(long, default_value = "auto")]
    algorithm: String,
    #[arg(long)]
    problem_type: Option<ProblemType>,
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 5)]
    cv_folds: usize,
    /// Hyperparameter as `name=value`; repeatable
    #[arg(long = "param")]
    params: Vec<String>,
    #[command(flatten)]
    preferences: Preferences,
}

impl TrainingArgs {
    fn config(&self, session: Option<&str>) -> Result<TrainingConfig> {
        let mut builder = TrainingConfig::builder()
            .target_column(&self.target)
            .algorithm(&self.algorithm)
            .test_size(self.test_size)
            .random_seed(self.seed)
            .cv_folds(self.cv_folds)
            .hyperparameters(parse_params(&self.params)?)
            .preferences((&self.preferences).into());
        if let Some(problem_type) = self.problem_type {
            builder = builder.problem_type(problem_type);
        }
        if let Some(session) = session {
            builder = builder.session_id(session);
        }
        Ok(builder.build()?)
    }
}

/// `name=value`; the value is read as JSON when it parses, else as text.
fn parse_params(raw: &[String]) -> Result<Hyperparameters> {
    raw.iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("hyperparameter '{pair}' is not name=value"))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

fn read_rows(source: &str) -> Result<Vec<Value>> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading rows from {source}"))?
    };
    Ok(match serde_json::from_str(&text)? {
        Value::Array(rows) => rows,
        row => vec![row],
    })
}

fn summarizer() -> Summarizer {
    #[cfg(feature = "ai")]
    {
        use adaptml_processing::ai::{OpenRouterConfig, OpenRouterProvider};
        match OpenRouterProvider::from_env(OpenRouterConfig::default()) {
            Some(Ok(provider)) => return Summarizer::with_generator(std::sync::Arc::new(provider)),
            Some(Err(e)) => warn!("text generation unavailable, using templates: {e}"),
            None => {}
        }
    }
    Summarizer::offline()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Profile { source } => {
            let df = source.load()?;
            let profile = DataProfiler::default().profile(&df);
            let summary = summarizer().dataset_summary(&profile);
            print_json(&json!({ "profile": profile, "summary": summary }))
        }
        Command::Analyze { source } => {
            let df = source.load()?;
            print_json(&DatasetCharacterizer::default().characterize(&df)?)
        }
        Command::Recommend {
            source,
            target,
            problem_type,
            top_k,
            preferences,
        } => {
            let df = source.load()?;
            let characterizer = DatasetCharacterizer::default();
            let problem_type = match problem_type {
                Some(p) => p,
                None => characterizer.detect_problem_type(&df, &target)?,
            };
            let profile = DataProfiler::default().profile_with_target(&df, Some(&target))?;
            let characteristics = characterizer.characteristics(&profile, Some(&target));
            let recommendations =
                ModelRecommender::new(top_k).recommend(&characteristics, problem_type, &(&preferences).into());
            print_json(&json!({
                "problem_type": problem_type,
                "characteristics": characteristics,
                "recommendations": recommendations,
            }))
        }
        Command::Train {
            source,
            training,
            models_dir,
        } => {
            let df = source.load()?;
            let config = training.config(source.session.as_deref())?;
            let trainer = Trainer::builder()
                .store(FileArtifactStore::new(models_dir))
                .on_progress(|u| info!("[{}] {:.0}% - {}", u.stage, u.progress * 100.0, u.message))
                .build()?;
            print_json(&trainer.train(&df, &config)?)
        }
        Command::Search {
            source,
            training,
            grid,
        } => {
            let df = source.load()?;
            let config = training.config(source.session.as_deref())?;
            let algorithm = config
                .algorithm
                .ok_or_else(|| anyhow!("search needs a concrete --algorithm"))?;
            let grid = match grid {
                Some(text) => serde_json::from_str(&text).context("parsing --grid")?,
                None => recommended_grid(algorithm, df.height()),
            };
            print_json(&optimize_hyperparameters(&df, &config, algorithm, &grid)?)
        }
        Command::Compare {
            source,
            training,
            algorithms,
        } => {
            let df = source.load()?;
            let config = training.config(source.session.as_deref())?;
            print_json(&compare_models(&df, &config, &algorithms)?)
        }
        Command::Predict {
            models_dir,
            model_id,
            rows,
        } => {
            let rows = read_rows(&rows)?;
            let predictor = Predictor::new(FileArtifactStore::new(models_dir));
            print_json(&predictor.predict(&model_id, &rows)?)
        }
        Command::Summary { models_dir, model_id } => {
            let metadata = FileArtifactStore::new(models_dir).metadata(&model_id)?;
            let report = insights::model_report(&summarizer(), &metadata);
            print_json(&json!({ "metadata": metadata, "report": report }))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenv().ok();
    run(cli.command)
}
