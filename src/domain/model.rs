use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event listing as published by a source. No schema is assumed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    /// Wraps a JSON object; any other value is not a record.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(data) => Some(Self { data }),
            _ => None,
        }
    }

    /// Wraps one entry of a feed's event array. An entry that is not an
    /// object still occupies a row, with every field absent.
    pub fn from_entry(value: Value) -> Self {
        Self::from_value(value).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub records: Vec<Record>,
    pub csv_output: String,
}

/// What happened to one endpoint during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    Fetched { records: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    pub endpoint: String,
    pub outcome: EndpointOutcome,
}

/// Per-endpoint summary of a single run, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub endpoints: Vec<EndpointReport>,
}

impl RunReport {
    pub fn record_fetched(&mut self, endpoint: &str, records: usize) {
        self.endpoints.push(EndpointReport {
            endpoint: endpoint.to_string(),
            outcome: EndpointOutcome::Fetched { records },
        });
    }

    pub fn record_skipped(&mut self, endpoint: &str, reason: impl Into<String>) {
        self.endpoints.push(EndpointReport {
            endpoint: endpoint.to_string(),
            outcome: EndpointOutcome::Skipped {
                reason: reason.into(),
            },
        });
    }

    pub fn total_records(&self) -> usize {
        self.endpoints
            .iter()
            .map(|e| match e.outcome {
                EndpointOutcome::Fetched { records } => records,
                EndpointOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EndpointReport> {
        self.endpoints
            .iter()
            .filter(|e| matches!(e.outcome, EndpointOutcome::Skipped { .. }))
    }
}
