//! Sink backend traits for the adblock aggregator
//!
//! Defines the capability interfaces the dump paths depend on, so the core
//! can be exercised against in-memory fakes instead of a live database or
//! classifier process.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
    /// Classifier process failed to start
    Spawn(std::io::Error),
    /// Classifier not driven to completion within the timeout (seconds)
    ProcessTimeout(u64),
    /// Other systemic classifier protocol failure
    Process(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SinkError::Database(e) => write!(f, "Database error: {}", e),
            SinkError::Spawn(e) => write!(f, "Failed to spawn classifier: {}", e),
            SinkError::ProcessTimeout(secs) => {
                write!(f, "Classifier timed out after {}s", secs)
            }
            SinkError::Process(e) => write!(f, "Classifier error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

/// One row of the bulk load, in the fixed column order of the target
/// relation. `evaled_by` carries -1 when the script was not dynamically
/// evaluated; `apis` is retained positionally for schema compatibility and
/// is never populated by this aggregator.
#[derive(Debug, Clone)]
pub struct ScriptRow {
    pub id: i64,
    pub isolate: String,
    pub visible: bool,
    pub code: String,
    pub url: String,
    pub evaled_by: i64,
    pub first_origin: String,
}

/// Backend trait for the bulk relational load
///
/// One call, one transaction: either every row is committed or none is.
#[async_trait]
pub trait ScriptBulkLoader: Send {
    /// Stream the whole batch within a single transaction
    async fn load_scripts(&mut self, rows: &[ScriptRow]) -> Result<(), SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// One request line of the classifier protocol
///
/// The oracle keys requests by `url`, which carries the script identity.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub url: i64,
    pub origin: String,
}

/// Backend trait for the external blocking oracle
///
/// Verdicts are positionally aligned with requests: the returned vector has
/// exactly one entry per request, in request order. Entries the oracle never
/// answered come back as false.
#[async_trait]
pub trait ClassifierProcess: Send {
    async fn classify(&mut self, requests: &[ClassifyRequest]) -> Result<Vec<bool>, SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
