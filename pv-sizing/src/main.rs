use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pv_model::{FinancialInput, YieldEstimate};
use pv_sizing::{
    CompatibilityResolver, EngineConfig, EstimateRequest, EstimatorError, FinancialEngine,
    PeakSunHoursEstimator, ProjectFile, YieldEstimator, parse_estimate_json, run_project,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "pv-sizing")]
#[command(about = "Size a PV array, balance it on the inverter MPPTs and evaluate the investment")]
struct Cli {
    /// Engine configuration (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a project file end to end
    Run {
        /// Project description (TOML)
        #[arg(short, long)]
        project: PathBuf,

        /// Use a stored estimator response (JSON) instead of the built-in approximation
        #[arg(short, long)]
        estimate: Option<PathBuf>,
    },
    /// Evaluate a financial input (JSON) on its own
    Evaluate {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Show the MPPT capacity of the module/inverter pair of a project
    Capacity {
        /// Without a project the configured preview equipment is used
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

/// Replays a previously stored estimator response.
struct StoredEstimate {
    path: PathBuf,
}

impl YieldEstimator for StoredEstimate {
    fn estimate(&self, _request: &EstimateRequest) -> Result<YieldEstimate, EstimatorError> {
        let json = fs::read_to_string(&self.path).map_err(|e| {
            EstimatorError::Backend(format!("cannot read {}: {e}", self.path.display()))
        })?;
        parse_estimate_json(&json, &self.path.display().to_string())
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{error}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }
    Ok(config)
}

fn load_project(path: &Path) -> Result<ProjectFile> {
    let project = ProjectFile::from_toml_file(path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;
    let errors = project.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{error}");
        }
        bail!("project has {} error(s)", errors.len());
    }
    Ok(project)
}

fn print<T: serde::Serialize + std::fmt::Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{value}");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run { project, estimate } => {
            let file = load_project(&project)?;
            let base_dir = project.parent().unwrap_or(Path::new("."));
            info!(project = %project.display(), "running project");
            let report = match estimate {
                Some(path) => run_project(&config, &file, base_dir, &StoredEstimate { path })?,
                None => {
                    let estimator = PeakSunHoursEstimator::new(file.site.irradiance_kwh_m2_day);
                    run_project(&config, &file, base_dir, &estimator)?
                }
            };
            print(&report, cli.json)?;
        }
        Command::Evaluate { input } => {
            let content = fs::read_to_string(&input)
                .with_context(|| format!("Failed to open file: {}", input.display()))?;
            let financial: FinancialInput = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", input.display()))?;
            let result = FinancialEngine::new(config.finance).evaluate(&financial)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let a = &result.analysis;
                println!("NPV: {:.2}", a.npv);
                println!("IRR: {:?}", a.irr);
                println!("Simple payback: {:?}", a.simple_payback_years);
                println!("Discounted payback: {:?}", a.discounted_payback_years);
                println!("Profitability index: {:.2}", a.profitability_index);
                println!("LCOE: {:?}", a.lcoe);
            }
        }
        Command::Capacity { project } => {
            let resolver = CompatibilityResolver::new(config.compatibility);
            let capacity = match project {
                Some(path) => {
                    let file = load_project(&path)?;
                    let catalog = file.catalog(path.parent().unwrap_or(Path::new(".")))?;
                    let (module, inverter) = file.resolve_equipment(&catalog)?;
                    resolver.capacity(module, inverter)?
                }
                None => resolver.preview_capacity(None, None)?,
            };
            print(&capacity, cli.json)?;
        }
    }
    Ok(())
}
