use std::env;

pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 60;

/// Configuration loaded from environment variables
pub struct Config {
    /// Path/command of the external classifier binary (report backend)
    pub classifier_binary: Option<String>,
    /// Classifier protocol timeout in seconds
    pub classifier_timeout_secs: u64,
    /// SQLite database path (sqlite backend)
    pub db_path: String,
    /// JSONL trace input path; "-" reads stdin
    pub trace_path: String,
    /// Report output path; "-" writes stdout
    pub report_path: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// The classifier binary is only required when the report backend is
    /// selected, so it stays optional here.
    pub fn from_env() -> Self {
        let classifier_binary = env::var("CLASSIFIER_BINARY").ok();

        let classifier_timeout_secs = env::var("CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT_SECS);

        let db_path =
            env::var("SCRIPTFLOW_DB_PATH").unwrap_or_else(|_| "data/scriptflow.db".to_string());

        let trace_path = env::var("TRACE_PATH").unwrap_or_else(|_| "-".to_string());

        let report_path = env::var("REPORT_PATH").unwrap_or_else(|_| "-".to_string());

        Self {
            classifier_binary,
            classifier_timeout_secs,
            db_path,
            trace_path,
            report_path,
        }
    }
}
