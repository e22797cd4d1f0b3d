mod collectors;
mod config;
mod model;
mod platform;
mod report;
mod rotating_log;

use clap::Parser;
use collectors::LiveHost;
use config::Config;
use model::LOG_HEADER;
use report::{write_snapshot, Assembler};
use rotating_log::RotatingLog;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "healthprobe")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(dir) = cli.output_dir {
        cfg.output_directory = dir;
    }
    if let Some(path) = cli.log_file {
        cfg.log_file_path = path;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "invalid configuration");
        std::process::exit(1);
    }

    let platform = platform::detect();
    info!(
        %platform,
        output_directory = %cfg.output_directory.display(),
        log_file = %cfg.log_file_path.display(),
        "starting healthprobe"
    );

    let host = LiveHost::new();
    let report = Assembler::new(&cfg, &host).assemble(platform).await;

    let log_line = report.log_line();
    if !cli.quiet {
        println!("{LOG_HEADER}");
        println!("{log_line}");
    }

    let log = RotatingLog::new(&cfg.log_file_path, cfg.max_log_entries);
    if let Err(err) = log.append(&log_line) {
        error!(error = %err, "failed to update rotating log");
        std::process::exit(1);
    }

    if !cli.quiet {
        match report.to_pretty_json() {
            Ok(json) => println!("\n{json}"),
            Err(err) => {
                error!(error = %err, "failed to serialize report");
                std::process::exit(1);
            }
        }
    }

    match write_snapshot(&report, &cfg.output_directory, &cfg.report_file_name) {
        Ok(path) => info!(
            report = %path.display(),
            log = %log.path().display(),
            "health report written"
        ),
        Err(err) => {
            error!(error = %err, "failed to write health report");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
