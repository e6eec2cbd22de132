//! Operation records and their replay views.

use std::fmt;

use serde::Serialize;

// == Outcome ==
/// Recorded output of one instrumented call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Outcome {
    /// Call still running
    Pending,
    /// Serialized return value
    Ok(String),
    /// Error text of a failed call
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "<pending>"),
            Outcome::Ok(output) => write!(f, "{}", output),
            Outcome::Failed(reason) => write!(f, "<failed: {}>", reason),
        }
    }
}

// == Operation Record ==
/// Counter and call history for one operation name.
///
/// `inputs` and `outputs` grow together: an output slot is reserved as
/// `Pending` when the input is recorded, so both always have equal length
/// and concurrent calls keep their pairing.
#[derive(Debug, Clone, Default)]
pub struct OperationRecord {
    /// Number of counted invocations
    pub calls: u64,
    /// Serialized inputs in call order
    pub inputs: Vec<String>,
    /// Outputs matching `inputs` by position
    pub outputs: Vec<Outcome>,
    /// Bumped on reset so in-flight calls don't write into a new history
    pub(crate) epoch: u64,
}

// == Replay ==
/// One input/output pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub input: String,
    pub output: Outcome,
}

/// Read-only snapshot of an operation's count and history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replay {
    pub name: String,
    pub count: u64,
    pub history: Vec<CallRecord>,
}

impl Replay {
    pub(crate) fn from_record(name: &str, record: Option<&OperationRecord>) -> Self {
        let (count, history) = match record {
            Some(record) => (
                record.calls,
                record
                    .inputs
                    .iter()
                    .zip(&record.outputs)
                    .map(|(input, output)| CallRecord {
                        input: input.clone(),
                        output: output.clone(),
                    })
                    .collect(),
            ),
            None => (0, Vec::new()),
        };

        Self {
            name: name.to_string(),
            count,
            history,
        }
    }
}

impl fmt::Display for Replay {
    /// Renders as `name was called N times:` followed by one
    /// `name(input) -> output` line per call.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} was called {} times:", self.name, self.count)?;
        for call in &self.history {
            write!(f, "\n{}({}) -> {}", self.name, call.input, call.output)?;
        }
        Ok(())
    }
}
