use serde::{Deserialize, Serialize};

/// Per-script info as observed in the trace
///
/// `evaled_by` is a weak back-reference by script id (never an owning link),
/// so mutually evaluating scripts cannot form a cycle. `None` means the
/// script was not dynamically evaluated and serializes as -1 in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub id: i64,
    pub isolate: String,
    /// Whether the script is visible to the instrumentation layer
    pub visible: bool,
    /// Script body text (may be large)
    pub code: String,
    /// Origin/location of the script, empty if unknown
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub evaled_by: Option<i64>,
    /// First page origin under which the script executed
    #[serde(default)]
    pub first_origin: String,
}

/// Per-record execution context handed to the aggregator (read-only)
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Script currently under consideration, if any
    pub script: Option<ScriptInfo>,
    /// Current page origin, empty if unknown
    pub origin: String,
}

/// Trace-wide metadata passed through the dump calls
#[derive(Debug, Clone, Default)]
pub struct AggregationContext {
    /// Name of the trace being post-processed (used for logging)
    pub trace_name: String,
}

impl AggregationContext {
    pub fn new(trace_name: impl Into<String>) -> Self {
        Self {
            trace_name: trace_name.into(),
        }
    }
}

/// One line of the JSONL trace stream consumed by the driver
///
/// The record already carries the tokenized form of the underlying trace
/// event: positional metadata, the raw operation code, the free-form field
/// list, plus the current script info and page origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub line_number: usize,
    pub op: char,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub script: Option<ScriptInfo>,
    #[serde(default)]
    pub origin: String,
}

impl TraceRecord {
    /// Parse a single JSONL trace line
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Build the per-record execution context for the aggregator
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            script: self.script.clone(),
            origin: self.origin.clone(),
        }
    }
}
