//! Aggregator plugin contract
//!
//! The host pipeline feeds every trace record through `ingest`, then calls
//! exactly one of the two dump methods to materialize results.

use crate::adblock::sink_backend::{ScriptBulkLoader, SinkError};
use crate::trace::{AggregationContext, ExecutionContext};
use async_trait::async_trait;
use std::io::Write;

/// Malformed execution context during ingestion
///
/// Reserved for defensive validation; a record with no script info is
/// "condition not met", not an error.
#[derive(Debug)]
pub struct IngestionError(pub String);

impl std::fmt::Display for IngestionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ingestion error: {}", self.0)
    }
}

impl std::error::Error for IngestionError {}

/// Contract every trace aggregator implements
///
/// Ingestion is invoked synchronously once per record, in a single logical
/// pass with no replay. The two dump variants read the same registry; the
/// host selects which one to call.
#[async_trait]
pub trait Aggregator: Send {
    /// Consume one trace record
    fn ingest(
        &mut self,
        ctx: &ExecutionContext,
        line_number: usize,
        op: u8,
        fields: &[String],
    ) -> Result<(), IngestionError>;

    /// Serialize the registry into a single bulk-load transaction
    async fn dump_to_store(
        &mut self,
        ctx: &AggregationContext,
        loader: &mut dyn ScriptBulkLoader,
    ) -> Result<(), SinkError>;

    /// Drive the external classifier and emit the report to `sink`
    async fn dump_to_stream(
        &mut self,
        ctx: &AggregationContext,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), SinkError>;
}
