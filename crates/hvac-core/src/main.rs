//! `hvac` binary entry point.

use clap::Parser;
use hvac_core::cli::{self, Cli, Context};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HVAC_LOG";

fn main() {
    let cli = Cli::parse();
    let context = Context::from_cli(&cli);
    let debug = context.as_ref().map(|ctx| ctx.debug).unwrap_or(cli.debug);
    init_tracing(debug, cli.log_json);

    let code = match context {
        Ok(ctx) => cli::execute(&cli.command, &ctx),
        Err(e) => cli::report_error(cli.format, &e),
    };
    std::process::exit(code.as_i32());
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing(debug: bool, json: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("hvac: tracing already initialized: {e}");
    }
}
