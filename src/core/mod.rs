pub mod etl;
pub mod field_path;
pub mod jsonp;
pub mod pipeline;
pub mod table;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
