use clap::{Parser, Subcommand};

mod cmd;
mod error;
mod server;
mod utils;

use cmd::format::{self, StyleOptions};
use cmd::{Globals, PlantUmlArgs, RedPenArgs, compat};
use server::Environment;

/// sabacan - CLI for PlantUML and RedPen servers
///
/// Drop-in stand-in for the native `plantuml` and `redpen` commands. Each
/// invocation sends exactly one HTTP request and relays the response body to
/// stdout (or the requested output file).
///
/// Usage:
///   sabacan [-u URL] [-t SECS] plantuml [plantuml options] <file>
///   sabacan [-u URL] [-t SECS] redpen   [redpen options]   <file>
///
/// Server URL resolution (first hit wins):
///   -u / --url                 override for the invoked subcommand
///   SABACAN_PLANTUML_URL       PlantUML server
///   SABACAN_REDPEN_URL         RedPen server
///   SABACAN_URL                shared fallback
///   built-in default           http://127.0.0.1:8080/plantuml, http://127.0.0.1:8080
///
/// Examples:
///   sabacan -u http://localhost/plantuml plantuml -tpng sequence.uml > seq.png
///   sabacan plantuml -pipe -tsvg < sequence.uml
///   SABACAN_REDPEN_URL=http://localhost/redpen sabacan redpen -r json document.md
#[derive(Parser, Debug)]
#[command(
    name = "sabacan",
    version,
    author,
    about = "CLI for PlantUML and RedPen servers",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Server base URL for the invoked subcommand
    #[arg(short = 'u', long = "url", value_name = "URL")]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(short = 't', long = "timeout", value_name = "SECS")]
    timeout: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// CLI for PlantUML server
    Plantuml(PlantUmlArgs),

    /// CLI for RedPen server
    Redpen(RedPenArgs),
}

fn main() {
    let normalized = compat::normalize_args(std::env::args_os());
    let cli = Cli::parse_from(normalized.args);

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    for option in &normalized.ignored {
        tracing::warn!("{option} is not supported by the server, ignored");
    }

    let globals = Globals {
        url: cli.url,
        timeout: cli.timeout,
        env: Environment::capture(),
    };

    let result = match cli.command {
        Commands::Plantuml(args) => cmd::execute_plantuml(args, &globals),
        Commands::Redpen(args) => cmd::execute_redpen(args, &globals),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            let style = StyleOptions::detect();
            eprintln!("{}", format::error_line(&e, &style));
            if let Some(hint) = error::hint_for(&e) {
                eprintln!("{}", format::hint_line(hint, &style));
            }
            error::exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
