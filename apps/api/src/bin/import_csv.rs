use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sierrahacks_api::config::Config;
use sierrahacks_api::db::create_pool;
use sierrahacks_api::reconcile::csv_source::read_csv_file;
use sierrahacks_api::reconcile::import::{run_import, ImportOptions, ImportReport};
use sierrahacks_api::reconcile::normalizer::{unmapped_headers, FIELD_ALIASES};
use sierrahacks_api::reconcile::upsert::UniquenessPolicy;
use sierrahacks_api::store::{AttendeeStore, MemoryStore, PgStore};

/// Imports a registration export (CSV or TSV) into the attendees table.
///
/// Exit codes: 0 success, 1 usage, configuration or file error, 2 one or more
/// chunks could not be written.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the exported file
    path: PathBuf,

    /// Rows per write request (default 200)
    #[arg(long, env = "IMPORT_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Fail a chunk instead of falling back when submission_id is not unique
    #[arg(long)]
    require_unique: bool,

    /// Parse and reconcile against an in-memory store; no database needed
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(code) => return ExitCode::from(code),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sierrahacks_api=info,import_csv=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args).await {
        Ok(report) if report.has_unrecoverable_errors() => {
            error!(
                "{} chunk(s) could not be written",
                report.failed_chunks.len()
            );
            ExitCode::from(2)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Import aborted: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Exit code 2 is reserved for failed chunks, so usage errors map to 1.
/// `--help` and `--version` map to 0.
fn parse_args<I, T>(argv: I) -> std::result::Result<Args, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Args::try_parse_from(argv).map_err(|e| {
        let _ = e.print();
        if e.use_stderr() {
            1
        } else {
            0
        }
    })
}

async fn run(args: Args) -> Result<ImportReport> {
    let config = if args.dry_run {
        Config::with_database_url(String::new())?
    } else {
        Config::from_env()?
    };

    let table = read_csv_file(&args.path)
        .with_context(|| format!("Could not load {}", args.path.display()))?;
    for header in unmapped_headers(&table.headers, FIELD_ALIASES) {
        warn!("Ignoring unrecognised column '{header}'");
    }
    let records = table.normalize();
    info!("Parsed {} rows from {}", records.len(), args.path.display());

    let store: Arc<dyn AttendeeStore> = if args.dry_run {
        info!("Dry run: writing to an in-memory store");
        Arc::new(MemoryStore::default())
    } else {
        let pool = create_pool(&config.database_url).await?;
        Arc::new(PgStore::new(pool))
    };

    let options = ImportOptions {
        chunk_size: args.chunk_size.unwrap_or(config.import_chunk_size).max(1),
        uniqueness: if args.require_unique || config.require_unique_submission_id {
            UniquenessPolicy::Require
        } else {
            UniquenessPolicy::BestEffort
        },
        enrich_profiles: true,
    };

    let report = run_import(store.as_ref(), records, &options).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_exits_with_one() {
        assert_eq!(parse_args(["import-csv"]).unwrap_err(), 1);
        assert_eq!(parse_args(["import-csv", "--bogus", "a.csv"]).unwrap_err(), 1);
    }

    #[test]
    fn test_help_exits_with_zero() {
        assert_eq!(parse_args(["import-csv", "--help"]).unwrap_err(), 0);
    }

    #[test]
    fn test_parses_flags() {
        let args =
            parse_args(["import-csv", "reg.csv", "--chunk-size", "50", "--dry-run"]).unwrap();
        assert_eq!(args.path, PathBuf::from("reg.csv"));
        assert_eq!(args.chunk_size, Some(50));
        assert!(args.dry_run);
        assert!(!args.require_unique);
    }
}
