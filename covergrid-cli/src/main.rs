//! Covergrid CLI - operator surface for the persistent cache store.
//!
//! Exposes the store's administrative controls: statistics, clear-cache,
//! and cleanup-by-age. This binary never touches the computation engine;
//! it operates purely on the on-disk store.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use covergrid::{CovergridConfig, GridStore, StoreError};

#[derive(Parser)]
#[command(name = "covergrid")]
#[command(version = covergrid::VERSION)]
#[command(about = "Manage the covergrid persistent cache store", long_about = None)]
struct Cli {
    /// Root directory of the persistent store (defaults to the platform
    /// cache directory).
    #[arg(long)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print record counts and average grid size.
    Stats,
    /// Delete every cached record.
    Clear,
    /// Delete records older than the retention window.
    Cleanup {
        /// Retention window in days.
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Store warnings (unreadable records, failed deletes) surface through
    // tracing; keep the guard alive for the life of the command.
    let _logging = covergrid::logging::init_logging(
        covergrid::logging::default_log_dir(),
        covergrid::logging::default_log_file(),
    )
    .ok();

    let store_dir = cli
        .store_dir
        .unwrap_or_else(|| CovergridConfig::default().store_dir);

    if let Err(e) = run(&store_dir, cli.command) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(store_dir: &Path, command: Command) -> Result<(), StoreError> {
    let store = GridStore::open(store_dir)?;

    match command {
        Command::Stats => {
            let summary = store.summary();
            println!("Store: {}", store_dir.display());
            println!("  Coverage grids:  {}", summary.grid_count);
            println!("  Avg points/grid: {:.1}", summary.avg_point_count);
            println!("  Heatmaps:        {}", summary.heatmap_count);
        }
        Command::Clear => {
            let before = store.summary();
            store.clear_all()?;
            println!(
                "Cleared {} grid and {} heatmap records",
                before.grid_count, before.heatmap_count
            );
        }
        Command::Cleanup { days } => {
            let report = store.cleanup(chrono::Duration::days(days));
            println!(
                "Removed {} grid and {} heatmap records older than {} days",
                report.grids_removed, report.heatmaps_removed, days
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::try_parse_from(["covergrid", "--store-dir", "/tmp/s", "stats"]).unwrap();
        assert!(matches!(cli.command, Command::Stats));
        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/s")));
    }

    #[test]
    fn test_parse_cleanup_default_days() {
        let cli = Cli::try_parse_from(["covergrid", "cleanup"]).unwrap();
        match cli.command {
            Command::Cleanup { days } => assert_eq!(days, 7),
            _ => panic!("expected cleanup command"),
        }
    }

    #[test]
    fn test_parse_cleanup_custom_days() {
        let cli = Cli::try_parse_from(["covergrid", "cleanup", "--days", "30"]).unwrap();
        match cli.command {
            Command::Cleanup { days } => assert_eq!(days, 30),
            _ => panic!("expected cleanup command"),
        }
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["covergrid"]).is_err());
    }
}
