//! Command-line interface for the `hvac` binary.
//!
//! Provides ingest, record, query, export, dump, and config subcommands. Each
//! invocation opens at most one sample store handle and releases it before
//! returning.

use crate::diag::DiagnosticLog;
use crate::exit_codes::ExitCode;
use crate::ingest::{self, IngestReport};
use crate::query::{build_series, iso_local, QueryRange, SeriesOptions, SeriesReport};
use clap::{Args, Parser, Subcommand};
use hvac_common::{Error, OutputFormat, Sample, Stage, SCHEMA_VERSION};
use hvac_config::{resolve_config, ConfigPaths, ResolvedConfig};
use hvac_store::{InsertOutcome, SampleStore, StoreOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HVAC stage duty-cycle monitor.
#[derive(Parser, Debug)]
#[command(name = "hvac", version, about = "Store HVAC samples and report stage duty cycles")]
pub struct Cli {
    /// Config file (overrides HVAC_CONFIG and the XDG location)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory that relative db/log paths resolve against
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Sample database path (overrides config and HVAC_DB)
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Echo diagnostic log lines to stderr and enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit tracing output as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a JSON array of [time, stage, temperature, humidity] records
    Ingest {
        /// Payload file; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Store one reading stamped with the current time
    Record {
        /// Equipment stage (0-3)
        #[arg(long, value_parser = parse_stage)]
        stage: Stage,
        /// Temperature in sensor units
        #[arg(long, allow_hyphen_values = true, value_parser = parse_reading)]
        temperature: f64,
        /// Relative humidity in percent
        #[arg(long, value_parser = parse_reading)]
        humidity: f64,
    },
    /// Report samples and stage duty cycles over a time range
    Query(QueryArgs),
    /// Print samples newer than a time as an ingestible JSON payload
    Export {
        /// Only samples with time strictly greater than this epoch second
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        since: i64,
    },
    /// Print every stored sample
    Dump,
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn parse_stage(raw: &str) -> Result<Stage, String> {
    let value: i64 = raw.parse().map_err(|e| format!("{e}"))?;
    Stage::new(value).map_err(|e| e.to_string())
}

/// A finite real; `NaN` and `inf` parse as f64 but cannot be stored.
fn parse_reading(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{raw} is not a finite number"))
    }
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Hours to report (clamped to 1-8760; defaults to the configured span)
    #[arg(long, allow_hyphen_values = true)]
    pub hours: Option<i64>,
    /// End of the range: epoch seconds, RFC 3339, or local YYYY-MM-DDTHH:MM
    #[arg(long)]
    pub end: Option<String>,
    /// Trailing duty-cycle window in seconds (defaults to config)
    #[arg(long)]
    pub window: Option<i64>,
    /// Read one extra window (and its anchor sample) before the range so
    /// early points have history
    #[arg(long)]
    pub warmup: bool,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the resolved configuration
    Show,
    /// Validate the configuration and print any warnings
    Validate,
}

/// Everything a command needs, resolved once per invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub resolved: ResolvedConfig,
    pub db_path: PathBuf,
    pub debug: bool,
    pub format: OutputFormat,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self, Error> {
        let paths = ConfigPaths {
            config_file: cli.config.clone(),
            data_dir: cli.data_dir.clone(),
        };
        let resolved = resolve_config(&paths)?;
        let db_path = cli.db.clone().unwrap_or_else(|| resolved.db_path.clone());
        let debug = cli.debug || resolved.config.debug;
        Ok(Self {
            resolved,
            db_path,
            debug,
            format: cli.format,
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .with_busy_timeout(Duration::from_millis(self.resolved.config.busy_timeout_ms))
    }

    pub fn diag(&self) -> DiagnosticLog {
        DiagnosticLog::new(&self.resolved.log_path, self.debug)
    }

    fn open_store(&self, diag: &DiagnosticLog) -> Result<SampleStore, Error> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        SampleStore::open(&self.db_path, &self.store_options()).map_err(|e| {
            diag.record(format!("failed to open database: {e}"));
            e.into()
        })
    }
}

/// Run a command and map the outcome to an exit code.
pub fn execute(command: &Commands, ctx: &Context) -> ExitCode {
    match dispatch(command, ctx) {
        Ok(code) => code,
        Err(e) => report_error(ctx.format, &e),
    }
}

/// Print an error in the requested format and pick its exit code.
pub fn report_error(format: OutputFormat, err: &Error) -> ExitCode {
    let code = ExitCode::for_error(err);
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "code": err.code(),
                "error": err.to_string(),
            });
            println!("{}", output);
        }
        OutputFormat::Summary => eprintln!("error: {}", err),
    }
    code
}

fn dispatch(command: &Commands, ctx: &Context) -> Result<ExitCode, Error> {
    match command {
        Commands::Ingest { file } => run_ingest(ctx, file.as_deref()),
        Commands::Record {
            stage,
            temperature,
            humidity,
        } => run_record(ctx, *stage, *temperature, *humidity),
        Commands::Query(args) => run_query(ctx, args),
        Commands::Export { since } => run_export(ctx, *since),
        Commands::Dump => run_dump(ctx),
        Commands::Config { command } => run_config(ctx, command),
    }
}

fn run_ingest(ctx: &Context, file: Option<&Path>) -> Result<ExitCode, Error> {
    let diag = ctx.diag();
    // Read the payload before opening the store so a bad file never creates one.
    let payload = ingest::read_payload(file, &diag)?;

    let store = ctx.open_store(&diag)?;
    let report = ingest::ingest_batch(&store, &payload, &diag)?;
    drop(store);

    print_ingest(ctx.format, &report)?;
    Ok(if report.is_clean() {
        ExitCode::Clean
    } else {
        ExitCode::PartialIngest
    })
}

fn print_ingest(format: OutputFormat, report: &IngestReport) -> Result<(), Error> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": if report.is_clean() { "ok" } else { "partial" },
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => {
            println!("{}", report.summary());
            for skipped in &report.skipped {
                println!("  skipped #{}: {}", skipped.index, skipped.reason);
            }
            for failed in &report.failed {
                println!("  failed #{} (time {}): {}", failed.index, failed.time, failed.message);
            }
        }
    }
    Ok(())
}

fn run_record(ctx: &Context, stage: Stage, temperature: f64, humidity: f64) -> Result<ExitCode, Error> {
    let diag = ctx.diag();
    let store = ctx.open_store(&diag)?;
    let (sample, outcome) = ingest::record_now(&store, stage, temperature, humidity, &diag)?;
    drop(store);

    match ctx.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "ok",
                "sample": sample,
                "outcome": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => {
            let note = match outcome {
                InsertOutcome::Inserted => "",
                InsertOutcome::Duplicate => " (already recorded)",
            };
            println!(
                "{} Stage = {} Temp = {} Humidity = {}{}",
                iso_local(sample.time),
                sample.stage,
                sample.temperature,
                sample.humidity,
                note
            );
        }
    }
    Ok(ExitCode::Clean)
}

fn run_query(ctx: &Context, args: &QueryArgs) -> Result<ExitCode, Error> {
    let config = &ctx.resolved.config;
    let window_secs = args.window.unwrap_or(config.window_secs);
    if window_secs <= 0 {
        return Err(Error::Config(format!(
            "--window must be positive, got {window_secs}"
        )));
    }

    let now = chrono::Utc::now().timestamp();
    let range = QueryRange::resolve(args.hours, args.end.as_deref(), now, config.default_hours);
    let options = SeriesOptions {
        window_secs,
        warmup: args.warmup,
    };

    let diag = ctx.diag();
    let store = ctx.open_store(&diag)?;
    let report = build_series(&store, &range, &options)?;
    drop(store);

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Summary => print_series_summary(&report),
    }
    Ok(ExitCode::Clean)
}

fn print_series_summary(report: &SeriesReport) {
    println!(
        "HVAC Monitor - Last {} Hours ({} to {})",
        report.hours,
        iso_local(report.start),
        iso_local(report.end)
    );
    println!("Data points: {}", report.count);
    if let Some(latest) = &report.latest {
        println!("Current temperature: {:.1}", latest.temperature);
        println!("Current humidity: {:.1}%", latest.humidity);
        println!("Current stage: {}", latest.stage);
    }
    if let Some(last) = report.points.last() {
        if last.insufficient_history {
            println!(
                "Stage on-time: less than {}s of history",
                report.window_secs
            );
        } else {
            let p = last.stage_percent;
            println!(
                "Stage on-time over {}s: stage1 {:.1}% stage2 {:.1}% stage3 {:.1}%",
                report.window_secs, p.stage1, p.stage2, p.stage3
            );
        }
    }
}

fn run_export(ctx: &Context, since: i64) -> Result<ExitCode, Error> {
    let diag = ctx.diag();
    let store = ctx.open_store(&diag)?;
    let samples = store.query_since(since)?;
    drop(store);

    // Always the compact payload layout so the output can be ingested as is.
    println!("{}", serde_json::to_string(&samples)?);
    Ok(ExitCode::Clean)
}

fn run_dump(ctx: &Context) -> Result<ExitCode, Error> {
    let diag = ctx.diag();
    let store = ctx.open_store(&diag)?;
    let samples = store.all()?;
    drop(store);

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&samples)?),
        OutputFormat::Summary => print_table(&samples),
    }
    Ok(ExitCode::Clean)
}

fn print_table(samples: &[Sample]) {
    println!("hvac database");
    println!("time stage temperature humidity");
    println!("---- ----- ----------- --------");
    for s in samples {
        println!("({}, {}, {}, {})", s.time, s.stage, s.temperature, s.humidity);
    }
}

fn run_config(ctx: &Context, command: &ConfigCommands) -> Result<ExitCode, Error> {
    match command {
        ConfigCommands::Show => match ctx.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&ctx.resolved)?)
            }
            OutputFormat::Summary => {
                let r = &ctx.resolved;
                println!("source: {:?}", r.source);
                println!("db_path: {}", ctx.db_path.display());
                println!("log_path: {}", r.log_path.display());
                println!("window_secs: {}", r.config.window_secs);
                println!("default_hours: {}", r.config.default_hours);
                println!("debug: {}", ctx.debug);
            }
        },
        ConfigCommands::Validate => {
            let warnings = ctx.resolved.config.validate().warnings;
            match ctx.format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "schema_version": SCHEMA_VERSION,
                        "status": "ok",
                        "source": ctx.resolved.source,
                        "warnings": warnings,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("config ok");
                    for w in &warnings {
                        println!("  warning: {}", w);
                    }
                }
            }
        }
    }
    Ok(ExitCode::Clean)
}
