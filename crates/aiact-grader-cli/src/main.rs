use std::path::{Path, PathBuf};

use aiact_grader_core::{
    load_document, obligations, parse_draft, render_report, DraftDiagnostic,
    FileFindingRepository, FindingRepository, GradingConfig, GradingEngine, OutputFormat,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "AIACT_GRADER";

#[derive(Parser, Debug)]
#[command(
    name = "aiact-grader",
    author,
    version,
    about = "EU AI Act diagnostic grading CLI"
)]
struct Cli {
    /// Grading configuration file (TOML, YAML or JSON); layered under AIACT_GRADER_* env vars
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory containing diagnostic documents (<id>.json, <id>.yaml)
    #[arg(
        long = "diagnostics-dir",
        value_name = "DIR",
        default_value = "./diagnostics",
        global = true
    )]
    diagnostics_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grade a stored diagnostic, a diagnostic file, or `-` for stdin
    Grade {
        /// Diagnostic id, path to a document, or `-`
        target: String,
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Grade only the findings given; skip filling missing obligations as not started
        #[arg(long)]
        raw: bool,
    },
    /// List the obligation catalogue
    Obligations {
        /// Emit obligations as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// List diagnostics available in the diagnostics directory
    List,
    /// Load and validate the grading configuration, then print it
    CheckConfig {
        /// Emit the effective configuration as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command.as_ref().unwrap_or(&Commands::Obligations { json: false }) {
        Commands::Grade { target, json, raw } => grade(&cli, target, *json, *raw).await?,
        Commands::Obligations { json } => list_obligations(*json)?,
        Commands::List => list_diagnostics(&cli.diagnostics_dir).await?,
        Commands::CheckConfig { json } => check_config(cli.config.as_deref(), *json)?,
    }
    Ok(())
}

async fn grade(cli: &Cli, target: &str, json: bool, raw: bool) -> Result<()> {
    let engine = GradingEngine::with_config(load_grading_config(cli.config.as_deref())?)?;
    let draft = resolve_target(&cli.diagnostics_dir, target).await?;
    debug!(findings = draft.findings.len(), raw, "grading diagnostic");

    let report = if raw {
        let mut report = engine.grade(&draft.findings)?;
        report.diagnostic_id = draft.diagnostic_id.clone();
        report
    } else {
        engine.reconcile(&draft)?
    };

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print!("{}", render_report(&report, format)?);
    if json {
        println!();
    }
    Ok(())
}

async fn resolve_target(diagnostics_dir: &Path, target: &str) -> Result<DraftDiagnostic> {
    if target == "-" {
        let mut payload = String::new();
        tokio::io::stdin()
            .read_to_string(&mut payload)
            .await
            .context("failed to read diagnostic from stdin")?;
        return parse_draft(&payload).context("invalid diagnostic on stdin");
    }

    let path = Path::new(target);
    if path.is_file() {
        return load_document(path);
    }

    let repo = FileFindingRepository::new(diagnostics_dir);
    match repo
        .load_diagnostic(target)
        .await
        .with_context(|| format!("failed to load diagnostics from {}", diagnostics_dir.display()))?
    {
        Some(draft) => Ok(draft),
        None => bail!(
            "diagnostic `{target}` not found in {}",
            diagnostics_dir.display()
        ),
    }
}

fn load_grading_config(path: Option<&Path>) -> Result<GradingConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        info!(path = %path.display(), "loading grading configuration");
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to load grading configuration")?;
    let grading: GradingConfig = settings
        .try_deserialize()
        .context("grading configuration does not match the expected schema")?;
    grading.validate()?;
    Ok(grading)
}

fn check_config(path: Option<&Path>, json: bool) -> Result<()> {
    let grading = load_grading_config(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&grading)?);
        return Ok(());
    }

    println!("Configuration OK");
    println!("Thresholds:");
    for (grade, floor) in grading.thresholds.bands() {
        println!("  {grade:<2} >= {floor:.2}");
    }
    println!("Overrides:");
    for rule in &grading.overrides {
        println!("  - {}", rule.describe());
    }
    Ok(())
}

fn list_obligations(json: bool) -> Result<()> {
    let catalogue = obligations();
    if json {
        println!("{}", serde_json::to_string_pretty(catalogue)?);
        return Ok(());
    }

    println!("{} obligation(s) in catalogue", catalogue.len());
    for obligation in catalogue {
        println!(
            "- {id:<34} [{article:10}] {name}",
            id = obligation.id,
            article = obligation.article,
            name = obligation.name
        );
    }
    Ok(())
}

async fn list_diagnostics(diagnostics_dir: &Path) -> Result<()> {
    let repo = FileFindingRepository::new(diagnostics_dir);
    let ids = repo
        .list_diagnostics()
        .await
        .with_context(|| format!("failed to list diagnostics in {}", diagnostics_dir.display()))?;
    println!(
        "{} diagnostic(s) in {}",
        ids.len(),
        diagnostics_dir.display()
    );
    for id in ids {
        println!("- {id}");
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
