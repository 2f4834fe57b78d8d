//! Adblock Aggregator - Script Classification Pipeline
//!
//! Folds the trace's script execution records into a deduplicated
//! per-script registry, then materializes it through one of two sinks.
//!
//! # Architecture
//!
//! ```text
//! JSONL trace → AdblockAggregator::ingest → ScriptRegistry
//!     ↓
//! dump_to_store  → SqliteBulkLoader (one transaction, all-or-nothing)
//! dump_to_stream → PipeClassifier → report lines ["adblock", {...}]
//! ```

pub mod classifier;
pub mod report;
pub mod sink_backend;
pub mod sqlite_sink;

pub use classifier::PipeClassifier;
pub use sink_backend::{
    ClassifierProcess, ClassifyRequest, ScriptBulkLoader, ScriptRow, SinkError,
};
pub use sqlite_sink::SqliteBulkLoader;

use crate::aggregator::{Aggregator, IngestionError};
use crate::trace::{AggregationContext, ExecutionContext, ScriptInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;

/// Registry entry: one distinct script observed in the trace
#[derive(Debug, Clone)]
pub struct Script {
    pub info: ScriptInfo,
    /// Classification verdict, set only by the pipe adapter
    pub blocked: bool,
}

impl Script {
    fn new(info: ScriptInfo) -> Self {
        Self {
            info,
            blocked: false,
        }
    }
}

/// Aggregator keyed on script identity
///
/// The registry grows monotonically during ingestion and is read by a
/// single dump call. Entries are never updated or removed by ingestion,
/// even when later records carry different values for the same id.
pub struct AdblockAggregator {
    scripts: HashMap<i64, Script>,
    classifier: Box<dyn ClassifierProcess>,
}

impl AdblockAggregator {
    pub fn new(classifier: Box<dyn ClassifierProcess>) -> Self {
        Self {
            scripts: HashMap::new(),
            classifier,
        }
    }

    /// Number of distinct scripts registered so far
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    fn to_row(script: &Script) -> ScriptRow {
        ScriptRow {
            id: script.info.id,
            isolate: script.info.isolate.clone(),
            visible: script.info.visible,
            code: script.info.code.clone(),
            url: script.info.url.clone(),
            evaled_by: script.info.evaled_by.unwrap_or(-1),
            first_origin: script.info.first_origin.clone(),
        }
    }
}

#[async_trait]
impl Aggregator for AdblockAggregator {
    fn ingest(
        &mut self,
        ctx: &ExecutionContext,
        _line_number: usize,
        _op: u8,
        _fields: &[String],
    ) -> Result<(), IngestionError> {
        // One-shot gate: an opaque script executing under a known origin is
        // registered once and never re-evaluated. Missing script info is
        // "condition not met", not an error.
        if let Some(script) = &ctx.script {
            if !script.visible
                && !ctx.origin.is_empty()
                && !self.scripts.contains_key(&script.id)
            {
                self.scripts.insert(script.id, Script::new(script.clone()));
            }
        }

        Ok(())
    }

    async fn dump_to_store(
        &mut self,
        ctx: &AggregationContext,
        loader: &mut dyn ScriptBulkLoader,
    ) -> Result<(), SinkError> {
        log::info!(
            "📊 adblock: {} scripts analysed ({})",
            self.scripts.len(),
            ctx.trace_name
        );

        let rows: Vec<ScriptRow> = self.scripts.values().map(Self::to_row).collect();

        loader.load_scripts(&rows).await
    }

    async fn dump_to_stream(
        &mut self,
        ctx: &AggregationContext,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), SinkError> {
        // Snapshot the iteration order once: requests, verdicts and report
        // lines must stay positionally aligned
        let order: Vec<i64> = self.scripts.keys().copied().collect();

        let requests: Vec<ClassifyRequest> = order
            .iter()
            .map(|id| {
                let script = &self.scripts[id];
                ClassifyRequest {
                    url: script.info.id,
                    origin: script.info.first_origin.clone(),
                }
            })
            .collect();

        log::info!(
            "📊 adblock: classifying {} scripts ({}) via {}",
            order.len(),
            ctx.trace_name,
            self.classifier.backend_type()
        );

        let verdicts = self.classifier.classify(&requests).await?;

        for (id, blocked) in order.iter().zip(verdicts) {
            if let Some(script) = self.scripts.get_mut(id) {
                script.blocked = blocked;
            }
        }

        let written = report::write_report(sink, order.iter().map(|id| &self.scripts[id]))?;

        log::debug!("✅ Emitted {} report entries", written);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn make_script(id: i64, visible: bool) -> ScriptInfo {
        ScriptInfo {
            id,
            isolate: "0x2a".to_string(),
            visible,
            code: format!("script_{}()", id),
            url: format!("http://site/{}.js", id),
            evaled_by: None,
            first_origin: "http://site".to_string(),
        }
    }

    fn ctx(script: Option<ScriptInfo>, origin: &str) -> ExecutionContext {
        ExecutionContext {
            script,
            origin: origin.to_string(),
        }
    }

    /// In-memory oracle answering from an id → verdict map
    struct FakeClassifier {
        verdicts: HashMap<i64, bool>,
        seen: Arc<Mutex<Vec<ClassifyRequest>>>,
    }

    #[async_trait]
    impl ClassifierProcess for FakeClassifier {
        async fn classify(
            &mut self,
            requests: &[ClassifyRequest],
        ) -> Result<Vec<bool>, SinkError> {
            self.seen.lock().unwrap().extend(requests.iter().cloned());
            Ok(requests
                .iter()
                .map(|r| self.verdicts.get(&r.url).copied().unwrap_or(false))
                .collect())
        }

        fn backend_type(&self) -> &'static str {
            "Fake"
        }
    }

    fn fake_aggregator(
        verdicts: HashMap<i64, bool>,
    ) -> (AdblockAggregator, Arc<Mutex<Vec<ClassifyRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let classifier = FakeClassifier {
            verdicts,
            seen: seen.clone(),
        };
        (AdblockAggregator::new(Box::new(classifier)), seen)
    }

    #[test]
    fn test_visible_scripts_never_registered() {
        let (mut agg, _) = fake_aggregator(HashMap::new());

        agg.ingest(&ctx(Some(make_script(1, true)), "http://site"), 1, b'c', &[])
            .unwrap();

        assert_eq!(agg.script_count(), 0);
    }

    #[test]
    fn test_empty_origin_never_registered() {
        let (mut agg, _) = fake_aggregator(HashMap::new());

        agg.ingest(&ctx(Some(make_script(1, false)), ""), 1, b'c', &[])
            .unwrap();

        assert_eq!(agg.script_count(), 0);
    }

    #[test]
    fn test_missing_script_info_is_not_an_error() {
        let (mut agg, _) = fake_aggregator(HashMap::new());

        agg.ingest(&ctx(None, "http://site"), 1, b'c', &[]).unwrap();

        assert_eq!(agg.script_count(), 0);
    }

    #[test]
    fn test_duplicate_records_register_once() {
        let (mut agg, _) = fake_aggregator(HashMap::new());

        for line in 0..10 {
            agg.ingest(&ctx(Some(make_script(7, false)), "http://site"), line, b'c', &[])
                .unwrap();
        }

        assert_eq!(agg.script_count(), 1);
    }

    #[test]
    fn test_registered_entries_are_never_updated() {
        let (mut agg, _) = fake_aggregator(HashMap::new());

        agg.ingest(&ctx(Some(make_script(7, false)), "http://site"), 1, b'c', &[])
            .unwrap();

        // Later record carries a different url for the same id
        let mut changed = make_script(7, false);
        changed.url = "http://elsewhere/late.js".to_string();
        agg.ingest(&ctx(Some(changed), "http://site"), 2, b'c', &[])
            .unwrap();

        assert_eq!(agg.script_count(), 1);
        assert_eq!(agg.scripts[&7].info.url, "http://site/7.js");
    }

    #[tokio::test]
    async fn test_stream_dump_correlates_verdicts() {
        let (mut agg, seen) = fake_aggregator(HashMap::from([(2, true)]));

        for id in 1..=3 {
            agg.ingest(&ctx(Some(make_script(id, false)), "http://site"), 1, b'c', &[])
                .unwrap();
        }

        let mut sink: Vec<u8> = Vec::new();
        agg.dump_to_stream(&AggregationContext::new("trace"), &mut sink)
            .await
            .unwrap();

        // Exactly script 2 ends up blocked
        assert!(!agg.scripts[&1].blocked);
        assert!(agg.scripts[&2].blocked);
        assert!(!agg.scripts[&3].blocked);

        // One request per registered script, keyed by script identity
        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.origin == "http://site"));

        // Report carries one entry per script
        let output = String::from_utf8(sink).unwrap();
        assert_eq!(output.lines().count(), 3);
        let blocked_count = output
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .filter(|v| v[1]["Blocked"] == true)
            .count();
        assert_eq!(blocked_count, 1);
    }

    #[tokio::test]
    async fn test_store_dump_resolves_back_references() {
        struct CapturingLoader {
            rows: Arc<Mutex<Vec<ScriptRow>>>,
        }

        #[async_trait]
        impl ScriptBulkLoader for CapturingLoader {
            async fn load_scripts(&mut self, rows: &[ScriptRow]) -> Result<(), SinkError> {
                self.rows.lock().unwrap().extend(rows.iter().cloned());
                Ok(())
            }

            fn backend_type(&self) -> &'static str {
                "Capturing"
            }
        }

        let (mut agg, _) = fake_aggregator(HashMap::new());

        agg.ingest(&ctx(Some(make_script(1, false)), "http://site"), 1, b'c', &[])
            .unwrap();
        let mut evaled = make_script(2, false);
        evaled.evaled_by = Some(1);
        agg.ingest(&ctx(Some(evaled), "http://site"), 2, b'c', &[])
            .unwrap();

        let rows = Arc::new(Mutex::new(Vec::new()));
        let mut loader = CapturingLoader { rows: rows.clone() };
        agg.dump_to_store(&AggregationContext::new("trace"), &mut loader)
            .await
            .unwrap();

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 2);

        let root = rows.iter().find(|r| r.id == 1).unwrap();
        assert_eq!(root.evaled_by, -1);

        let evaled = rows.iter().find(|r| r.id == 2).unwrap();
        assert_eq!(evaled.evaled_by, 1);
    }
}
