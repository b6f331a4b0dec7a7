//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use harvest_artifacts::{RunMeta, WrittenRun, load_run, write_run};
use harvest_core::pipeline::{self, ProgressReporter, RunConfig, RunOutcome};
use harvest_core::request::{RequestConfig, build_request};
use harvest_core::validate::ValidationOptions;
use harvest_gateway::{HttpGateway, LlmGateway};
use harvest_shared::{
    AppConfig, Credentials, HarvestError, RunId, SchemaVersion, YearRange, init_config,
    init_config_at, load_config, load_config_from,
};

use crate::render;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Harvest: turn a language model's prose answer into validated heritage-site records.
#[derive(Parser)]
#[command(
    name = "harvest",
    version,
    about = "Ask a language model for heritage sites and keep the records that validate.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.harvest/harvest.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Query the model and print the validated sites.
    Fetch {
        /// Country or region to list sites for (falls back to defaults.subject).
        subject: Option<String>,

        /// Persist raw.txt, sites.json and run.json under the output directory.
        #[arg(long)]
        save: bool,

        /// Output root for --save (defaults to defaults.output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Record schema: v1 or v2 (v2 adds `type`).
        #[arg(long)]
        schema: Option<SchemaVersion>,

        /// Model override.
        #[arg(long)]
        model: Option<String>,

        /// max_tokens override.
        #[arg(long)]
        max_tokens: Option<u32>,

        #[command(flatten)]
        output: OutputFlags,
    },

    /// Extract and validate a saved raw answer without calling the model.
    Extract {
        /// File holding the raw answer (e.g. a run's raw.txt).
        file: PathBuf,

        /// Record schema: v1 or v2.
        #[arg(long)]
        schema: Option<SchemaVersion>,

        #[command(flatten)]
        output: OutputFlags,
    },

    /// Print a run saved with `fetch --save`.
    Show {
        /// Run directory (contains run.json).
        run_dir: PathBuf,

        #[command(flatten)]
        output: OutputFlags,
    },

    /// Print the request body that `fetch` would send.
    Prompt {
        /// Country or region to list sites for.
        subject: Option<String>,

        /// Record schema: v1 or v2.
        #[arg(long)]
        schema: Option<SchemaVersion>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// How results are printed.
#[derive(clap::Args, Clone, Copy, Debug, Default)]
pub(crate) struct OutputFlags {
    /// Print the raw answer and extracted span before the records.
    #[arg(long)]
    pub raw: bool,

    /// Print records as a JSON array.
    #[arg(long)]
    pub json: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for `--json`.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "harvest=info",
        1 => "harvest=debug",
        _ => "harvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Fetch {
            subject,
            save,
            out,
            schema,
            model,
            max_tokens,
            output,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            apply_overrides(&mut config, schema, model, max_tokens);
            cmd_fetch(&config, subject, save, out, output).await
        }
        Command::Extract {
            file,
            schema,
            output,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            apply_overrides(&mut config, schema, None, None);
            cmd_extract(&config, &file, output)
        }
        Command::Show { run_dir, output } => cmd_show(&run_dir, output),
        Command::Prompt { subject, schema } => {
            let mut config = resolve_config(config_path.as_deref())?;
            apply_overrides(&mut config, schema, None, None);
            cmd_prompt(&config, subject)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// Load the config from `--config` if given, else the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// CLI flags override config file values.
fn apply_overrides(
    config: &mut AppConfig,
    schema: Option<SchemaVersion>,
    model: Option<String>,
    max_tokens: Option<u32>,
) {
    if let Some(schema) = schema {
        config.defaults.schema = schema;
    }
    if let Some(model) = model {
        config.llm.model = model;
    }
    if let Some(max_tokens) = max_tokens {
        config.llm.max_output_tokens = max_tokens;
    }
}

/// The positional subject wins over `defaults.subject`; one of them is required.
fn resolve_subject(arg: Option<String>, config: &AppConfig) -> harvest_shared::Result<String> {
    arg.or_else(|| config.defaults.subject.clone())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            HarvestError::config(
                "no subject given: pass one (e.g. `harvest fetch Japan`) or set defaults.subject",
            )
        })
}

fn validation_options(config: &AppConfig) -> ValidationOptions {
    ValidationOptions {
        schema: config.defaults.schema,
        years: YearRange::current(),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(
    config: &AppConfig,
    subject: Option<String>,
    save: bool,
    out: Option<PathBuf>,
    output: OutputFlags,
) -> Result<()> {
    // Everything that can fail without the network is checked first.
    let subject = resolve_subject(subject, config)?;
    let credentials = Credentials::from_env(config)?;
    let endpoint = config.llm.endpoint_url()?;

    let gateway = HttpGateway::new(
        endpoint,
        credentials,
        Duration::from_secs(config.llm.timeout_secs),
    )?;

    let request = FetchRequest {
        subject,
        save,
        out,
        output,
    };
    fetch_with(config, &gateway, request, &mut std::io::stdout()).await?;
    Ok(())
}

/// Resolved arguments of `fetch`.
struct FetchRequest {
    subject: String,
    save: bool,
    out: Option<PathBuf>,
    output: OutputFlags,
}

/// Run the pipeline against `gateway`, print the records to `stdout` and
/// persist the run when asked. Returns the saved run, if any.
async fn fetch_with<W: Write + Send>(
    config: &AppConfig,
    gateway: &dyn LlmGateway,
    request: FetchRequest,
    stdout: &mut W,
) -> Result<Option<WrittenRun>> {
    let run_config = RunConfig {
        request: RequestConfig::from_app_config(config, Some(request.subject.clone())),
        validation: validation_options(config),
    };

    info!(
        subject = %request.subject,
        model = %config.llm.model,
        schema = %config.defaults.schema,
        "fetching heritage sites"
    );

    let reporter = CliProgress::new();
    let outcome = pipeline::run(&run_config, gateway, &reporter).await;
    reporter.clear();
    let outcome = outcome?;

    print_extraction(stdout, &outcome.raw_text, &outcome.extraction, request.output)?;

    let mut written = None;
    if request.save {
        let output_root = request
            .out
            .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
        let meta = RunMeta {
            run_id: RunId::new(),
            subject: Some(request.subject),
            model: config.llm.model.clone(),
            schema: config.defaults.schema,
            rejected_count: outcome.extraction.report.rejections.len(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let run = write_run(&output_root, &meta, &outcome.raw_text, outcome.sites())?;

        eprintln!();
        eprintln!("  Run saved!");
        eprintln!("  ID:    {}", run.manifest.run_id);
        eprintln!("  Sites: {}", run.manifest.site_count);
        eprintln!("  Path:  {}", run.run_dir.display());
        written = Some(run);
    }

    eprintln!("  Time:  {:.1}s", outcome.elapsed.as_secs_f64());

    Ok(written)
}

fn cmd_extract(config: &AppConfig, file: &Path, output: OutputFlags) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| HarvestError::io(file, e))
        .wrap_err("cannot read raw answer")?;

    info!(file = %file.display(), schema = %config.defaults.schema, "extracting from file");

    let extraction = pipeline::process_raw_text(&raw, &validation_options(config));
    print_extraction(&mut std::io::stdout().lock(), &raw, &extraction, output)
}

fn cmd_show(run_dir: &Path, output: OutputFlags) -> Result<()> {
    let run = load_run(run_dir)?;

    let mut stdout = std::io::stdout().lock();
    if !output.json {
        writeln!(stdout, "Run:     {}", run.manifest.run_id)?;
        writeln!(
            stdout,
            "Subject: {}",
            run.manifest.subject.as_deref().unwrap_or("-")
        )?;
        writeln!(stdout, "Model:   {}", run.manifest.model)?;
        writeln!(stdout, "Created: {}", run.manifest.created_at.to_rfc3339())?;
        writeln!(stdout)?;
    }
    if output.raw {
        writeln!(stdout, "Raw answer:")?;
        writeln!(stdout, "{}", run.raw_text)?;
        writeln!(stdout)?;
    }
    if output.json {
        render::write_json(&mut stdout, &run.sites)?;
    } else {
        render::write_sites(&mut stdout, &run.sites)?;
    }
    Ok(())
}

fn cmd_prompt(config: &AppConfig, subject: Option<String>) -> Result<()> {
    let subject = subject.or_else(|| config.defaults.subject.clone());
    let request = build_request(&RequestConfig::from_app_config(config, subject));
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(p) => {
            init_config_at(p)?;
            p.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

/// Shared console output for `fetch` and `extract`. Records go to `stdout`,
/// the validation tally to stderr.
fn print_extraction<W: Write>(
    stdout: &mut W,
    raw: &str,
    extraction: &pipeline::Extraction,
    output: OutputFlags,
) -> Result<()> {
    if output.raw {
        render::write_raw(stdout, raw, &extraction.candidate)?;
    }
    if output.json {
        render::write_json(stdout, extraction.sites())?;
    } else {
        render::write_sites(stdout, extraction.sites())?;
    }
    stdout.flush()?;

    let mut stderr = std::io::stderr().lock();
    writeln!(stderr)?;
    render::write_summary(&mut stderr, &extraction.report)
        .map_err(|e| eyre!("failed to write summary: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &RunOutcome) {
        self.spinner.finish_and_clear();
    }
}
