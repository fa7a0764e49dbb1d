use crate::domain::model::Record;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn parse(part: &str) -> Self {
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            // indices too large for usize can never be in range
            Segment::Index(part.parse().unwrap_or(usize::MAX))
        } else {
            Segment::Key(part.to_string())
        }
    }

    fn step<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match (self, value) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        }
    }
}

/// A `/`-separated path into a nested record, e.g. `lineup/0` or `venue/address/city`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('/').map(Segment::parse).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walks the record along this path. `null` anywhere on the way counts as absent.
    pub fn resolve<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        let (first, rest) = self.segments.split_first()?;
        let start = match first {
            Segment::Key(key) => record.data.get(key),
            Segment::Index(_) => None,
        };

        rest.iter()
            .try_fold(start?, |current, segment| match current {
                Value::Null => None,
                value => segment.step(value),
            })
            .filter(|value| !value.is_null())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Resolves `path` against `record`.
pub fn resolve<'r>(record: &'r Record, path: &FieldPath) -> Option<&'r Value> {
    path.resolve(record)
}

/// Ordered output columns. Order here is the column order of the table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSet(Vec<FieldPath>);

impl ColumnSet {
    pub fn new(columns: Vec<FieldPath>) -> Self {
        Self(columns)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldPath> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths that appear more than once, in first-seen order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for path in &self.0 {
            if !seen.insert(path.as_str()) && !dups.contains(&path.as_str()) {
                dups.push(path.as_str());
            }
        }
        dups
    }
}

impl<S: AsRef<str>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| FieldPath::parse(s.as_ref())).collect())
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a FieldPath;
    type IntoIter = std::slice::Iter<'a, FieldPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
