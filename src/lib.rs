pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, FeedConfig};

pub use crate::core::field_path::{ColumnSet, FieldPath};
pub use crate::core::jsonp::{unwrap, Unwrapped};
pub use crate::core::table::serialize;
pub use crate::core::{etl::EtlEngine, pipeline::JsonpPipeline};
pub use utils::error::{EtlError, Result};
