use crate::core::field_path::ColumnSet;
use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Destination of the finished table. Paths are relative to the storage root.
pub trait Storage: Send + Sync {
    /// Whether a file already sits at `path`. Writing there replaces it.
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// What to do when an endpoint cannot be reached at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    #[default]
    Abort,
    Skip,
}

pub trait ConfigProvider: Send + Sync {
    fn endpoints(&self) -> &[String];
    fn columns(&self) -> &ColumnSet;
    fn output_path(&self) -> &str;
    fn output_file(&self) -> &str;
    fn records_key(&self) -> &str;
    fn timeout_seconds(&self) -> Option<u64>;
    fn headers(&self) -> &HashMap<String, String>;
    fn transport_policy(&self) -> TransportPolicy;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
