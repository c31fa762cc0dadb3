mod api;
mod cache;
mod commands;
mod config;
mod error;
mod logging;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::commands::Outcome;

#[derive(Parser, Debug)]
#[command(name = "mailctl")]
#[command(about = "Manage domains, senders, tokens, templates and email on MailerSend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mailctl/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log debug output to stderr and include backtraces in error reports
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  let args = Args::parse();

  if args.verbose && std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
    std::env::set_var("RUST_LIB_BACKTRACE", "1");
  }
  color_eyre::install()?;

  let _log_guard = logging::init(args.verbose);

  let config = config::Config::load(args.config.as_deref())?;

  match commands::run(args.command, &config).await {
    Ok(Outcome::Done) => Ok(ExitCode::SUCCESS),
    Ok(Outcome::Failed(msg)) => {
      eprintln!("{}", msg);
      Ok(ExitCode::FAILURE)
    }
    Err(e) if e.is_invalid_argument() => {
      eprintln!("{}", e);
      Ok(ExitCode::from(2))
    }
    Err(e) if e.is_connection() => {
      eprintln!("{}\nCheck the API endpoint and your network connection.", e);
      Ok(ExitCode::FAILURE)
    }
    Err(e) if e.status().is_some() => {
      eprintln!("Error: {}", e);
      Ok(ExitCode::FAILURE)
    }
    // Anything else gets the full report, with backtrace under --verbose.
    Err(e) => Err(e.into()),
  }
}
