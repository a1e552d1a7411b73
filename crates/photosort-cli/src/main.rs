//! Photosort CLI
//!
//! Organizes a folder of images into semantically coherent groups.
//!
//! # Commands
//!
//! - `organize`: scan a folder, embed every image, cluster, and print the
//!   resulting groups

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod present;
mod scanner;

/// Photosort - semantic image folder organization
#[derive(Parser)]
#[command(name = "photosort")]
#[command(version = "0.1.0")]
#[command(about = "Organize a folder of images into semantically coherent groups")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, embed, and cluster an image folder
    Organize(commands::organize::OrganizeArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Organize(args) => commands::organize::run(args).await,
    };

    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(exit_code);
}
