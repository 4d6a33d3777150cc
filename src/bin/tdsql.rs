//! tdsql CLI
//!
//! Runs the regression suite rooted at a specification file. With no
//! argument, probes `tdsql.yaml` then `tdsql.yml` in the working directory.
//!
//! Usage:
//!   tdsql
//!   tdsql path/to/suite.yaml --output json

use std::path::PathBuf;

use clap::Parser;

use tdsql::report::write_report;
use tdsql::{OutputFormat, TdsqlError};

#[derive(Parser)]
#[command(name = "tdsql")]
#[command(about = "Regression-testing harness for analytical SQL")]
#[command(version)]
struct Cli {
    /// Root specification file (defaults to ./tdsql.yaml or ./tdsql.yml)
    config: Option<PathBuf>,

    /// Output format: text, json
    #[arg(short, long, default_value = "text")]
    output: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let root = match cli.config {
        Some(path) => path,
        None => {
            let yaml = PathBuf::from("tdsql.yaml");
            let yml = PathBuf::from("tdsql.yml");
            if yaml.is_file() {
                yaml
            } else if yml.is_file() {
                yml
            } else {
                log::error!("tdsql.yaml is not found");
                std::process::exit(1);
            }
        }
    };

    let format: OutputFormat = match cli.output.parse() {
        Ok(f) => f,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let report = match tdsql::run(&root).await {
        Ok(report) => report,
        Err(e @ TdsqlError::Internal { .. }) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut stdout = std::io::stdout();
    if let Err(e) = write_report(&report, format, &mut stdout) {
        log::error!("failed to write report: {}", e);
        std::process::exit(1);
    }

    if report.summary.failed > 0 {
        std::process::exit(1);
    }
}
