#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod demo;
mod error;
mod ml;
mod store;
mod structs;
mod table_reader;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use ml::pipeline::{compute_components, run_pipeline, PipelineConfig};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use store::{DirectoryStore, TableStore};
use structs::{IdentifierColumn, Orientation, PcaError, PcaSolver, RawTable, Result};

/// pcakit - PCA chart data (scatter, scree, loadings, contributors) from expression tables
#[derive(Parser, Debug)]
#[command(name = "pcakit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where a single table comes from
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Input CSV/TSV/JSON table
    #[arg(short, long, required_unless_present = "store", conflicts_with = "store")]
    input: Option<PathBuf>,

    /// Directory of stored tables
    #[arg(long, requires = "table_id")]
    store: Option<PathBuf>,

    /// Id (file stem) of the table in the store
    #[arg(long, requires = "store")]
    table_id: Option<String>,

    /// Treat input as TSV instead of CSV
    #[arg(long)]
    tsv: bool,
}

/// Pipeline settings; flags override values from `--config`
#[derive(clap::Args, Debug)]
struct AnalysisArgs {
    /// JSON pipeline configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Column holding the feature identifiers
    #[arg(long, conflicts_with = "row_index")]
    id_column: Option<String>,

    /// Use row numbers as feature identifiers
    #[arg(long)]
    row_index: bool,

    /// Treat features as the plotted observations instead of samples
    /// (scatter `sampleId` then holds feature identifiers)
    #[arg(long)]
    features_as_observations: bool,

    /// Number of components to keep (default: all)
    #[arg(short = 'n', long)]
    components: Option<usize>,

    /// Cumulative variance threshold in percent
    #[arg(long)]
    threshold: Option<f64>,

    /// Contributors listed per component
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Decomposition method
    #[arg(long, value_enum)]
    solver: Option<SolverArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SolverArg {
    Auto,
    Covariance,
    Svd,
}

impl From<SolverArg> for PcaSolver {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Auto => Self::Auto,
            SolverArg::Covariance => Self::Covariance,
            SolverArg::Svd => Self::Svd,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print 2D or 3D score plot data
    Scatter {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Number of plotted components (2 or 3)
        #[arg(long, default_value = "2")]
        dims: usize,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print scree plot data
    Scree {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print signed loadings per feature
    Loadings {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Emit flat records keyed by identifier column and component label
        #[arg(long)]
        records: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the strongest contributors of each component
    Contributors {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Also list the weakest contributors
        #[arg(long)]
        bottom: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline on one or more tables, write all outputs
    Analyze {
        /// Input tables (analyzed in parallel)
        #[arg(short, long, required_unless_present = "store")]
        input: Vec<PathBuf>,

        /// Analyze every table in this store directory
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        tsv: bool,

        /// Output directory; one subdirectory per table
        #[arg(short, long, default_value = "./pca_output")]
        output_dir: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Also list the weakest contributors
        #[arg(long)]
        bottom: bool,
    },

    /// Write a synthetic expression table as CSV
    DemoData {
        #[arg(long, default_value = "300")]
        features: usize,
        #[arg(long, default_value = "6")]
        samples: usize,
        #[arg(long, default_value = "42")]
        seed: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let log_level = level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!(
            "Warning: Invalid log level '{}' provided. Defaulting to Info.",
            level
        );
        log::LevelFilter::Info
    });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Some(Commands::Scatter {
            source,
            analysis,
            dims,
            output,
        }) => {
            let config = analysis.to_config()?;
            let table = load_table(&source)?;
            let (_, _, pcs) = compute_components(&table, &config)?;
            emit(&ml::output::scatter_plot(&pcs, dims)?, output.as_deref())
        }

        Some(Commands::Scree {
            source,
            analysis,
            output,
        }) => {
            let config = analysis.to_config()?;
            let table = load_table(&source)?;
            let (_, _, pcs) = compute_components(&table, &config)?;
            let summary = ml::variance::variance_summary(&pcs, config.variance_threshold)?;
            emit(&ml::output::scree_series(&summary), output.as_deref())
        }

        Some(Commands::Loadings {
            source,
            analysis,
            records,
            output,
        }) => {
            let config = analysis.to_config()?;
            let table = load_table(&source)?;
            let (_, _, pcs) = compute_components(&table, &config)?;
            let loadings = ml::output::loadings_table(&pcs);
            if records {
                emit(&loadings.records(), output.as_deref())
            } else {
                emit(&loadings, output.as_deref())
            }
        }

        Some(Commands::Contributors {
            source,
            analysis,
            bottom,
            output,
        }) => {
            let mut config = analysis.to_config()?;
            config.include_bottom |= bottom;
            let table = load_table(&source)?;
            let (_, _, pcs) = compute_components(&table, &config)?;
            let ranking =
                ml::contributors::rank_contributors(&pcs, config.top_k, config.include_bottom)?;
            emit(&ml::output::contributors_output(&ranking), output.as_deref())
        }

        Some(Commands::Analyze {
            input,
            store,
            tsv,
            output_dir,
            analysis,
            bottom,
        }) => {
            let mut config = analysis.to_config()?;
            config.include_bottom |= bottom;
            run_analyze(&input, store.as_deref(), tsv, &output_dir, &config)
        }

        Some(Commands::DemoData {
            features,
            samples,
            seed,
            output,
        }) => run_demo(
            demo::DemoParams {
                features,
                samples,
                seed,
            },
            output.as_deref(),
        ),

        None => {
            eprintln!("No subcommand provided. Use 'pcakit analyze' or 'pcakit scatter'.");
            eprintln!("Run 'pcakit --help' for usage information.");
            std::process::exit(1);
        }
    }
}

impl AnalysisArgs {
    fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(column) = &self.id_column {
            config.identifier = IdentifierColumn::Named(column.clone());
        } else if self.row_index {
            config.identifier = IdentifierColumn::RowIndex;
        }
        if self.features_as_observations {
            config.orientation = Orientation::FeaturesAsObservations;
        }
        if self.components.is_some() {
            config.n_components = self.components;
        }
        if let Some(threshold) = self.threshold {
            config.variance_threshold = threshold;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if let Some(solver) = self.solver {
            config.solver = solver.into();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Load the table named by `--input` or `--store`/`--table-id`
fn load_table(source: &SourceArgs) -> Result<RawTable> {
    match (&source.input, &source.store, &source.table_id) {
        (Some(path), _, _) => {
            if !path.exists() {
                return Err(PcaError::InvalidConfig(format!(
                    "Input file not found: {}",
                    path.display()
                )));
            }
            let table = RawTable::from_file(path, source.tsv)?;
            info!(
                "Loaded {}: {} rows x {} columns",
                path.display(),
                table.row_count(),
                table.col_count()
            );
            Ok(table)
        }
        (None, Some(dir), Some(id)) => {
            let store = DirectoryStore::open(dir)?;
            store.fetch(id)
        }
        _ => Err(PcaError::InvalidConfig(
            "Provide --input or --store with --table-id".into(),
        )),
    }
}

/// Print one JSON document to stdout, or write it to `output`
fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Output written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// A table scheduled by `analyze`
enum Job {
    File(PathBuf),
    Stored(String),
}

/// Run the full pipeline on every input in parallel
fn run_analyze(
    inputs: &[PathBuf],
    store_dir: Option<&Path>,
    tsv: bool,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let store = store_dir.map(DirectoryStore::open).transpose()?;

    let mut jobs: Vec<(String, Job)> = Vec::new();
    for path in inputs {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PcaError::InvalidConfig(format!("Invalid input file name: {}", path.display()))
            })?
            .to_string();
        jobs.push((name, Job::File(path.clone())));
    }
    if let Some(store) = &store {
        if store.is_empty() {
            warn!("Store contains no tables");
        }
        info!("Analyzing {} stored tables", store.len());
        jobs.extend(store.ids()?.into_iter().map(|id| (id.clone(), Job::Stored(id))));
    }

    let mut seen = HashSet::new();
    if let Some((name, _)) = jobs.iter().find(|(name, _)| !seen.insert(name.as_str())) {
        return Err(PcaError::InvalidConfig(format!(
            "Two inputs share the output name '{name}'"
        )));
    }

    std::fs::create_dir_all(output_dir)?;

    let outcomes: Vec<(String, Result<()>)> = jobs
        .par_iter()
        .map(|(name, job)| {
            let outcome = match job {
                Job::File(path) => RawTable::from_file(path, tsv),
                Job::Stored(id) => store
                    .as_ref()
                    .map_or_else(|| Err(PcaError::Store("Store not open".into())), |s| s.fetch(id)),
            }
            .and_then(|table| analyze_table(name, &table, config, &output_dir.join(name)));
            (name.clone(), outcome)
        })
        .collect();

    let mut first_error = None;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(()) => info!("{name}: outputs written to {}", output_dir.join(&name).display()),
            Err(e) => {
                error!("{name}: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Run the pipeline on one table and write every output file into `dir`
fn analyze_table(name: &str, table: &RawTable, config: &PipelineConfig, dir: &Path) -> Result<()> {
    let result = run_pipeline(table, config)?;
    std::fs::create_dir_all(dir)?;

    let pcs = &result.components;
    for (dims, file_name) in [(2, "scatter2d.json"), (3, "scatter3d.json")] {
        if pcs.len() >= dims {
            ml::output::write_json(dir, file_name, &ml::output::scatter_plot(pcs, dims)?)?;
        } else {
            warn!("{name}: {} component(s), skipping {file_name}", pcs.len());
        }
    }
    if let Some(variance) = &result.variance {
        ml::output::write_json(dir, "scree.json", &ml::output::scree_series(variance))?;
    }
    ml::output::write_json(dir, "loadings.json", &ml::output::loadings_table(pcs))?;
    ml::output::write_json(
        dir,
        "contributors.json",
        &ml::output::contributors_output(&result.ranking),
    )?;

    let mut summary = ml::output::build_summary(
        name,
        &result.report,
        pcs,
        result.variance.as_ref(),
        &result.ranking,
    );
    summary.push_str(&format!(
        "\nReconstruction RMSE with {} components: {:.6}\n",
        pcs.len(),
        result.reconstruction_rmse()?
    ));
    ml::output::write_summary(dir, &summary)?;

    Ok(())
}

/// Write a synthetic table to `output` or stdout
fn run_demo(params: demo::DemoParams, output: Option<&Path>) -> Result<()> {
    let table = demo::generate(params)?;
    match output {
        Some(path) => {
            demo::write_csv(&table, std::fs::File::create(path)?)?;
            info!(
                "Demo table written to {} ({} features x {} samples)",
                path.display(),
                params.features,
                params.samples
            );
        }
        None => demo::write_csv(&table, std::io::stdout().lock())?,
    }
    Ok(())
}
