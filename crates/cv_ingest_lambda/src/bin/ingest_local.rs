use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use cv_ingest_core::memory_sink::MemoryRecordSink;
use cv_ingest_core::model::DataCategory;
use cv_ingest_core::object_keys::DEFAULT_REPORT_PREFIX;
use cv_ingest_core::pipeline::RecordSink;
use cv_ingest_core::report::HandlerResponse;
use cv_ingest_lambda::adapters::object_store::{LocalDirectoryStore, ObjectStore};
use cv_ingest_lambda::adapters::postgres::PgRecordSink;
use cv_ingest_lambda::config::DEFAULT_DB_MAX_CONNECTIONS;
use cv_ingest_lambda::handlers::ingest::{ingest_object, HandlerConfig, S3ObjectRef};

const LOCAL_BUCKET: &str = "local";

#[derive(Debug, Parser)]
#[command(about = "Ingest a local CSV export the same way the Lambda does")]
struct Args {
    /// CSV file to ingest.
    #[arg(long)]
    file: PathBuf,
    /// Data category; inferred from the parent directory name when omitted.
    #[arg(long)]
    category: Option<String>,
    /// Write to PostgreSQL instead of an in-memory dry run.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DEFAULT_DB_MAX_CONNECTIONS)]
    db_max_connections: u32,
    /// Directory receiving the JSON report. Reports are discarded when omitted.
    #[arg(long)]
    report_dir: Option<PathBuf>,
    #[arg(long, env = "REPORT_PREFIX", default_value = DEFAULT_REPORT_PREFIX)]
    report_prefix: String,
}

struct DiscardStore;

impl ObjectStore for DiscardStore {
    fn get_object(&self, _bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        Err(format!("no object store configured for {key}"))
    }

    fn put_object(&self, _bucket: &str, _key: &str, _body: &[u8]) -> Result<(), String> {
        Ok(())
    }
}

fn resolve_category(args: &Args) -> Result<DataCategory, String> {
    if let Some(raw) = &args.category {
        return DataCategory::parse(raw).ok_or_else(|| format!("unknown category '{raw}'"));
    }
    args.file
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .and_then(DataCategory::parse)
        .ok_or_else(|| {
            format!(
                "cannot infer category from {}; pass --category",
                args.file.display()
            )
        })
}

fn run(args: &Args) -> Result<HandlerResponse, String> {
    let category = resolve_category(args)?;
    let body = fs::read(&args.file)
        .map_err(|error| format!("failed to read {}: {error}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.csv");
    let object = S3ObjectRef {
        bucket: LOCAL_BUCKET.to_string(),
        key: format!("{}/{file_name}", category.key_prefix()),
    };
    let config = HandlerConfig {
        report_bucket: None,
        report_prefix: args.report_prefix.clone(),
        archive_uploads: false,
        run_date: Utc::now().format("%Y-%m-%d").to_string(),
    };

    let sink: Box<dyn RecordSink> = match &args.database_url {
        Some(url) => Box::new(PgRecordSink::connect_lazy(url, args.db_max_connections)?),
        None => {
            tracing::info!(event = "dry_run", "no DATABASE_URL; writing to memory only");
            Box::new(MemoryRecordSink::new())
        }
    };

    let outcome = match &args.report_dir {
        Some(dir) => ingest_object(
            &object,
            category,
            &body,
            &config,
            &LocalDirectoryStore::new(dir),
            sink.as_ref(),
        ),
        None => ingest_object(&object, category, &body, &config, &DiscardStore, sink.as_ref()),
    };

    Ok(match outcome {
        Ok(report) => HandlerResponse::from_outcomes(vec![report], Vec::new()),
        Err(error) => HandlerResponse::failed(error),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let response = run(&args).unwrap_or_else(|error| HandlerResponse::failed(error));
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(error) => eprintln!("failed to serialize response: {error}"),
    }
    if response.status_code != 200 {
        std::process::exit(1);
    }
}
