//! Scriptflow - Trace Post-Processing Pipeline
//!
//! Ingests a JSONL stream of browser-script execution records, folds them
//! into a deduplicated per-script registry, then materializes the registry
//! through the selected sink: a bulk SQLite load or a classification report
//! driven by an external oracle process.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --backend report
//! ```
//!
//! ## Environment Variables
//!
//! - CLASSIFIER_BINARY - Path to the external classifier executable (required for --backend report)
//! - CLASSIFIER_TIMEOUT_SECS - Classifier protocol timeout in seconds (default: 60)
//! - SCRIPTFLOW_DB_PATH - SQLite database path (default: data/scriptflow.db) - used when --backend sqlite
//! - TRACE_PATH - JSONL trace input path, "-" for stdin (default: -)
//! - REPORT_PATH - Report output path, "-" for stdout (default: -)
//! - RUST_LOG - Logging level (optional, default: info)

pub mod adblock;
pub mod aggregator;
pub mod config;
pub mod trace;

use {
    adblock::{AdblockAggregator, PipeClassifier, SqliteBulkLoader},
    aggregator::Aggregator,
    config::Config,
    std::{
        env,
        fs::File,
        io::{BufRead, BufReader, BufWriter, Write},
        time::Duration,
    },
    trace::{AggregationContext, TraceRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendType {
    Sqlite,
    Report,
}

fn parse_backend_from_args() -> BackendType {
    let args: Vec<String> = env::args().collect();
    if args.contains(&"--backend".to_string()) {
        if let Some(idx) = args.iter().position(|x| x == "--backend") {
            match args.get(idx + 1).map(|s| s.as_str()) {
                Some("sqlite") => return BackendType::Sqlite,
                Some("report") => return BackendType::Report,
                _ => {}
            }
        }
    }
    BackendType::Report
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let backend = parse_backend_from_args();
    let config = Config::from_env();

    log::info!("🚀 Starting Scriptflow trace post-processor");
    log::info!("   Backend: {:?}", backend);
    log::info!("   Trace input: {}", config.trace_path);
    match backend {
        BackendType::Sqlite => log::info!("   Database: {}", config.db_path),
        BackendType::Report => {
            log::info!("   Report output: {}", config.report_path);
            log::info!(
                "   Classifier: {} (timeout: {}s)",
                config.classifier_binary.as_deref().unwrap_or("<unset>"),
                config.classifier_timeout_secs
            );
        }
    }

    if backend == BackendType::Report && config.classifier_binary.is_none() {
        return Err("CLASSIFIER_BINARY must be set for the report backend".into());
    }

    let classifier = PipeClassifier::new(
        config.classifier_binary.clone().unwrap_or_default(),
        Duration::from_secs(config.classifier_timeout_secs),
    );
    let mut aggregator = AdblockAggregator::new(Box::new(classifier));

    // Single logical pass over the trace, no replay
    let reader: Box<dyn BufRead> = if config.trace_path == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(&config.trace_path)?))
    };

    let mut ingested = 0u64;
    let mut skipped = 0u64;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match TraceRecord::from_jsonl(&line) {
            Ok(record) => {
                let ctx = record.execution_context();
                aggregator.ingest(&ctx, record.line_number, record.op as u8, &record.fields)?;
                ingested += 1;
            }
            Err(e) => {
                log::warn!(
                    "⚠️  Skipping malformed trace record at line {}: {}",
                    index + 1,
                    e
                );
                skipped += 1;
            }
        }
    }

    log::info!(
        "✅ Ingested {} records ({} skipped), {} scripts registered",
        ingested,
        skipped,
        aggregator.script_count()
    );

    let agg_ctx = AggregationContext::new(config.trace_path.clone());

    match backend {
        BackendType::Sqlite => {
            let mut loader = SqliteBulkLoader::new(&config.db_path)?;
            aggregator.dump_to_store(&agg_ctx, &mut loader).await?;
            log::info!("✅ Bulk load committed to {}", config.db_path);
        }
        BackendType::Report => {
            let mut sink: Box<dyn Write + Send> = if config.report_path == "-" {
                Box::new(std::io::stdout())
            } else {
                Box::new(BufWriter::new(File::create(&config.report_path)?))
            };
            aggregator.dump_to_stream(&agg_ctx, sink.as_mut()).await?;
            log::info!("✅ Report written to {}", config.report_path);
        }
    }

    Ok(())
}
