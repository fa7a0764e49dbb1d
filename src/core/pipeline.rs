use crate::core::{jsonp, table};
use crate::core::{ConfigProvider, Pipeline, Record, Storage, TransformResult};
use crate::domain::model::RunReport;
use crate::domain::ports::TransportPolicy;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde_json::Value;
use std::sync::Mutex;

const RESPONSE_PREVIEW_CHARS: usize = 80;

/// Fetches every configured JSONP endpoint in order and flattens the
/// combined events into one CSV file.
pub struct JsonpPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
    report: Mutex<RunReport>,
}

impl<S: Storage, C: ConfigProvider> JsonpPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            report: Mutex::new(RunReport::default()),
        }
    }

    /// Outcome of the most recent extraction.
    pub fn last_report(&self) -> RunReport {
        self.report
            .lock()
            .map(|report| report.clone())
            .unwrap_or_default()
    }

    /// Fetches all endpoints sequentially, skipping the ones that fail.
    pub async fn fetch_all(&self) -> Result<(Vec<Record>, RunReport)> {
        let mut all_records = Vec::new();
        let mut report = RunReport::default();

        for endpoint in self.config.endpoints() {
            tracing::info!("📡 Fetching JSONP from: {}", endpoint);

            match self.fetch_endpoint(endpoint).await {
                Ok(records) => {
                    tracing::info!("📥 Parsed {} events from {}", records.len(), endpoint);
                    report.record_fetched(endpoint, records.len());
                    all_records.extend(records);
                }
                Err(e) if e.is_skippable() => {
                    tracing::warn!("⚠️ Skipping {}: {}", endpoint, e);
                    report.record_skipped(endpoint, e.to_string());
                }
                Err(e @ EtlError::TransportError(_))
                    if self.config.transport_policy() == TransportPolicy::Skip =>
                {
                    tracing::error!("❌ Could not fetch {}: {}", endpoint, e);
                    report.record_skipped(endpoint, e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Ok((all_records, report))
    }

    async fn fetch_endpoint(&self, endpoint: &str) -> Result<Vec<Record>> {
        let body = self.fetch_text(endpoint).await?;
        tracing::debug!("Raw response start: {}", head(&body, RESPONSE_PREVIEW_CHARS));
        decode_response(&body, self.config.records_key())
    }

    async fn fetch_text(&self, endpoint: &str) -> Result<String> {
        let mut request = self.client.get(endpoint);

        for (key, value) in self.config.headers() {
            request = request.header(key, value);
        }

        if let Some(timeout) = self.config.timeout_seconds() {
            request = request.timeout(std::time::Duration::from_secs(timeout));
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            // the body still goes through the unwrapper, which usually rejects it
            tracing::warn!("⚠️ {} answered with status {}", endpoint, status);
        }

        Ok(response.text().await?)
    }

    fn log_report(report: &RunReport) {
        let skipped = report.skipped().count();
        tracing::info!(
            "📊 {} endpoints fetched, {} skipped, {} events in total",
            report.endpoints.len() - skipped,
            skipped,
            report.total_records()
        );
        for entry in report.skipped() {
            tracing::debug!("Skipped endpoint {}: {:?}", entry.endpoint, entry.outcome);
        }
    }
}

/// Unwraps, parses and extracts the event records of one JSONP response body.
pub fn decode_response(body: &str, records_key: &str) -> Result<Vec<Record>> {
    let unwrapped = jsonp::unwrap(body)?;
    tracing::debug!("Detected callback name: {}", unwrapped.callback);
    tracing::debug!(
        "Stripped response end: {}",
        tail(unwrapped.payload, RESPONSE_PREVIEW_CHARS)
    );

    let data: Value = serde_json::from_str(unwrapped.payload)?;
    Ok(extract_records(data, records_key))
}

/// Takes the record list out of a parsed payload: either the payload itself
/// when it is an array, or the array stored under `records_key`.
pub fn extract_records(data: Value, records_key: &str) -> Vec<Record> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove(records_key) {
            Some(Value::Array(items)) => items,
            _ => {
                tracing::debug!("No '{}' array in payload", records_key);
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    let non_objects = items.iter().filter(|item| !item.is_object()).count();
    if non_objects > 0 {
        tracing::debug!("{} non-object entries will render as empty rows", non_objects);
    }
    items.into_iter().map(Record::from_entry).collect()
}

fn head(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn tail(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for JsonpPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let (records, report) = self.fetch_all().await?;
        Self::log_report(&report);

        if let Ok(mut slot) = self.report.lock() {
            *slot = report;
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let columns = self.config.columns();
        tracing::debug!("Flattening {} records into {} columns", data.len(), columns.len());

        let csv_output = table::serialize(&data, columns);

        Ok(TransformResult {
            records: data,
            csv_output,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let file_name = self
            .config
            .output_file()
            .replace("{timestamp}", &chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string());
        let output_path = format!("{}/{}", self.config.output_path(), file_name);

        if self.storage.exists(&file_name).await? {
            tracing::info!("♻️ Replacing existing {}", output_path);
        }

        tracing::debug!(
            "Writing {} bytes ({} records) to storage",
            result.csv_output.len(),
            result.records.len()
        );
        self.storage
            .write_file(&file_name, result.csv_output.as_bytes())
            .await?;

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<AsyncMutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(AsyncMutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn exists(&self, path: &str) -> Result<bool> {
            let files = self.files.lock().await;
            Ok(files.contains_key(path))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn config(endpoints: Vec<String>) -> FeedConfig {
        FeedConfig {
            endpoints,
            columns: ["id", "title", "lineup/0"].into_iter().collect(),
            output_path: "test_output".to_string(),
            ..FeedConfig::default()
        }
    }

    #[tokio::test]
    async fn test_extract_combines_endpoints_in_order() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET).path("/organizer/1");
            then.status(200)
                .body(r#"callback({"events":[{"id":1,"title":"Show A"},{"id":2,"title":"Show B"}]});"#);
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/organizer/2");
            then.status(200)
                .body(r#"callback({"events":[{"id":3,"title":"Show C"}]})"#);
        });

        let pipeline = JsonpPipeline::new(
            MockStorage::new(),
            config(vec![server.url("/organizer/1"), server.url("/organizer/2")]),
        );

        let records = pipeline.extract().await.unwrap();

        first.assert();
        second.assert();
        let ids: Vec<i64> = records
            .iter()
            .map(|r| r.data.get("id").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pipeline.last_report().total_records(), 3);
    }

    #[tokio::test]
    async fn test_extract_skips_malformed_endpoints() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/good");
            then.status(200)
                .body(r#"cb({"events":[{"id":1,"title":"Show A"}]})"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/not-jsonp");
            then.status(200).body("<html>maintenance</html>");
        });
        server.mock(|when, then| {
            when.method(GET).path("/truncated");
            then.status(200).body(r#"cb({"events":[{"id":9"#);
        });

        let pipeline = JsonpPipeline::new(
            MockStorage::new(),
            config(vec![
                server.url("/not-jsonp"),
                server.url("/good"),
                server.url("/truncated"),
            ]),
        );

        let records = pipeline.extract().await.unwrap();
        assert_eq!(records.len(), 1);

        let report = pipeline.last_report();
        assert_eq!(report.endpoints.len(), 3);
        assert_eq!(report.skipped().count(), 2);
        assert_eq!(report.endpoints[1].endpoint, server.url("/good"));
    }

    #[tokio::test]
    async fn test_error_status_body_goes_through_unwrapper() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/down");
            then.status(503).body("Service Unavailable");
        });

        let pipeline = JsonpPipeline::new(MockStorage::new(), config(vec![server.url("/down")]));

        let records = pipeline.extract().await.unwrap();
        mock.assert();
        assert!(records.is_empty());
        assert_eq!(pipeline.last_report().skipped().count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_by_default() {
        // nothing listens on port 9 of localhost
        let pipeline = JsonpPipeline::new(
            MockStorage::new(),
            config(vec!["http://127.0.0.1:9/events".to_string()]),
        );

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_skipped_when_configured() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/good");
            then.status(200).body(r#"cb({"events":[{"id":5}]})"#);
        });

        let mut feed = config(vec![
            "http://127.0.0.1:9/events".to_string(),
            server.url("/good"),
        ]);
        feed.transport_policy = TransportPolicy::Skip;
        let pipeline = JsonpPipeline::new(MockStorage::new(), feed);

        let records = pipeline.extract().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(pipeline.last_report().skipped().count(), 1);
    }

    #[tokio::test]
    async fn test_configured_headers_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/events")
                .header("x-api-key", "secret");
            then.status(200).body(r#"cb({"events":[]})"#);
        });

        let mut feed = config(vec![server.url("/events")]);
        feed.headers
            .insert("x-api-key".to_string(), "secret".to_string());
        let pipeline = JsonpPipeline::new(MockStorage::new(), feed);

        pipeline.extract().await.unwrap();
        mock.assert();
    }

    #[test]
    fn test_extract_records_shapes() {
        let from_array = extract_records(json!([{"id": 1}, {"id": 2}]), "events");
        assert_eq!(from_array.len(), 2);

        let from_key = extract_records(json!({"events": [{"id": 1}], "count": 1}), "events");
        assert_eq!(from_key.len(), 1);

        let custom_key = extract_records(json!({"shows": [{"id": 1}]}), "shows");
        assert_eq!(custom_key.len(), 1);

        assert!(extract_records(json!({"count": 0}), "events").is_empty());
        assert!(extract_records(json!({"events": "none"}), "events").is_empty());
        assert!(extract_records(json!("text"), "events").is_empty());

        let mixed = extract_records(json!([{"id": 1}, 2, null, {"id": 3}]), "events");
        assert_eq!(mixed.len(), 4);
        assert!(mixed[1].data.is_empty());
        assert!(mixed[2].data.is_empty());
    }

    #[test]
    fn test_null_entry_keeps_an_empty_row() {
        let records = decode_response(r#"cb({"events":[null,{"id":1}]})"#, "events").unwrap();
        let columns: crate::core::field_path::ColumnSet = ["id"].into_iter().collect();
        assert_eq!(table::serialize(&records, &columns), "id\n\n1");
    }

    #[test]
    fn test_decode_response_errors() {
        assert!(matches!(
            decode_response("not a function call", "events"),
            Err(EtlError::FormatError { .. })
        ));
        assert!(matches!(
            decode_response("cb({invalid json", "events"),
            Err(EtlError::ParseError(_))
        ));
    }

    #[test]
    fn test_preview_helpers() {
        assert_eq!(head("abcdef", 3), "abc");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 5), "ab");
    }

    #[tokio::test]
    async fn test_transform_and_load() {
        let storage = MockStorage::new();
        let pipeline = JsonpPipeline::new(storage.clone(), config(vec![]));

        let records = extract_records(
            json!([{"id": 1, "title": "Show \"A\"", "lineup": ["Band A", "Band B"]}]),
            "events",
        );
        let result = pipeline.transform(records).await.unwrap();
        assert_eq!(
            result.csv_output,
            "id,title,lineup/0\n1,\"Show \"\"A\"\"\",\"Band A\""
        );

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "test_output/output.csv");

        let written = storage.get_file("output.csv").await.unwrap();
        assert!(String::from_utf8(written).unwrap().starts_with("id,title,lineup/0\n"));
    }

    #[tokio::test]
    async fn test_load_replaces_previous_output() {
        let storage = MockStorage::new();
        storage
            .write_file("output.csv", b"id,title,lineup/0\n99,\"Old\",")
            .await
            .unwrap();
        let pipeline = JsonpPipeline::new(storage.clone(), config(vec![]));

        let result = pipeline.transform(Vec::new()).await.unwrap();
        pipeline.load(result).await.unwrap();

        assert_eq!(
            storage.get_file("output.csv").await.unwrap(),
            b"id,title,lineup/0".to_vec()
        );
    }

    #[tokio::test]
    async fn test_load_expands_timestamp_placeholder() {
        let storage = MockStorage::new();
        let mut feed = config(vec![]);
        feed.output_file = "events_{timestamp}.csv".to_string();
        let pipeline = JsonpPipeline::new(storage.clone(), feed);

        let result = pipeline.transform(Vec::new()).await.unwrap();
        let output_path = pipeline.load(result).await.unwrap();

        assert!(!output_path.contains("{timestamp}"));
        let file_name = output_path.trim_start_matches("test_output/");
        assert_eq!(file_name.len(), "events_20260101_000000.csv".len());
        assert_eq!(
            storage.get_file(file_name).await.unwrap(),
            b"id,title,lineup/0".to_vec()
        );
    }
}
