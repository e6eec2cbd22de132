//! Instrumentation Module
//!
//! Call counting and input/output history for named operations.
//!
//! Wrappers are plain async higher-order methods. They compose by nesting:
//! [`Instrumentation::instrumented`] is `count_calls` around
//! `record_history`, so the counter moves once per call.

mod record;

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

pub use record::{CallRecord, OperationRecord, Outcome, Replay};

// == Instrumentation ==
/// Registry of operation records keyed by operation name.
#[derive(Debug, Default)]
pub struct Instrumentation {
    records: RwLock<HashMap<String, OperationRecord>>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    // == Count Calls ==
    /// Increments the counter for `name`, then runs `op`.
    ///
    /// The count is taken before `op` runs, so failed calls are counted too.
    pub async fn count_calls<F, Fut, T>(&self, name: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        {
            let mut records = self.records.write().await;
            records.entry(name.to_string()).or_default().calls += 1;
        }
        op().await
    }

    // == Record History ==
    /// Records `args`, runs `op`, then records its output.
    ///
    /// A failed call records [`Outcome::Failed`] with the error text in place
    /// of an output. Serialization problems and resets during the call are
    /// logged and never affect the returned result.
    pub async fn record_history<A, F, Fut, T, E>(&self, name: &str, args: &A, op: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let input = to_stable_text(name, "input", args);
        let (slot, epoch) = {
            let mut records = self.records.write().await;
            let record = records.entry(name.to_string()).or_default();
            record.inputs.push(input);
            record.outputs.push(Outcome::Pending);
            (record.outputs.len() - 1, record.epoch)
        };

        let result = op().await;

        let outcome = match &result {
            Ok(value) => Outcome::Ok(to_stable_text(name, "output", value)),
            Err(err) => Outcome::Failed(err.to_string()),
        };

        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(record) if record.epoch == epoch && slot < record.outputs.len() => {
                record.outputs[slot] = outcome;
            }
            _ => warn!("History for '{}' was reset during a call; output dropped", name),
        }

        result
    }

    // == Instrumented ==
    /// Counts and records one call of `op` under `name`.
    pub async fn instrumented<A, F, Fut, T, E>(&self, name: &str, args: &A, op: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.count_calls(name, || self.record_history(name, args, op))
            .await
    }

    // == Replay ==
    /// Snapshot of the count and history for `name`. Unknown names replay
    /// as zero calls.
    pub async fn replay(&self, name: &str) -> Replay {
        let records = self.records.read().await;
        Replay::from_record(name, records.get(name))
    }

    /// Current invocation count for `name`.
    pub async fn call_count(&self, name: &str) -> u64 {
        let records = self.records.read().await;
        records.get(name).map(|r| r.calls).unwrap_or(0)
    }

    // == Reset ==
    /// Discards the record for `name`. Returns false if there was none.
    pub async fn reset(&self, name: &str) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(record) => {
                let epoch = record.epoch + 1;
                *record = OperationRecord {
                    epoch,
                    ..OperationRecord::default()
                };
                true
            }
            None => false,
        }
    }

    /// Discards every record.
    pub async fn reset_all(&self) {
        let mut records = self.records.write().await;
        for record in records.values_mut() {
            let epoch = record.epoch + 1;
            *record = OperationRecord {
                epoch,
                ..OperationRecord::default()
            };
        }
    }
}

/// Serializes to compact JSON, or a placeholder when that fails.
fn to_stable_text<V: Serialize + ?Sized>(name: &str, what: &str, value: &V) -> String {
    match serde_json::to_string(value) {
        Ok(text) => text,
        Err(err) => {
            warn!("Could not record {} of '{}': {}", what, name, err);
            format!("<unrecorded: {}>", err)
        }
    }
}
