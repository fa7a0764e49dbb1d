pub mod cli;
pub mod toml_config;

use crate::core::field_path::ColumnSet;
use crate::core::ConfigProvider;
use crate::domain::ports::TransportPolicy;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::collections::HashMap;

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://www.prekindle.com/api/events/organizer/22815447474366230&callback=callback",
    "https://www.prekindle.com/api/events/organizer/22815447474833148&callback=callback",
    "https://www.prekindle.com/api/events/organizer/531433528752920374&callback=callback",
    "https://www.prekindle.com/api/events/organizer/532452771022890770&callback=callback",
];

pub const DEFAULT_COLUMNS: &[&str] = &[
    "id",
    "promoId",
    "date",
    "time",
    "title",
    "ages",
    "lineup/0",
    "dayOfWeek",
    "month",
    "monthAbbrev",
    "dayOfMonth",
    "venue",
    "city",
    "state",
    "dtfNames/0",
    "dtfLinks/0",
    "imageUrl",
];

pub const DEFAULT_OUTPUT_FILE: &str = "output.csv";
pub const DEFAULT_RECORDS_KEY: &str = "events";

/// Everything one run needs, resolved from defaults, a TOML file and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub endpoints: Vec<String>,
    pub columns: ColumnSet,
    pub output_path: String,
    pub output_file: String,
    pub records_key: String,
    pub timeout_seconds: Option<u64>,
    pub headers: HashMap<String, String>,
    pub transport_policy: TransportPolicy,
    pub monitoring: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            columns: DEFAULT_COLUMNS.iter().collect(),
            output_path: ".".to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            records_key: DEFAULT_RECORDS_KEY.to_string(),
            timeout_seconds: None,
            headers: HashMap::new(),
            transport_policy: TransportPolicy::default(),
            monitoring: false,
        }
    }
}

impl ConfigProvider for FeedConfig {
    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_file(&self) -> &str {
        &self.output_file
    }

    fn records_key(&self) -> &str {
        &self.records_key
    }

    fn timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }

    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn transport_policy(&self) -> TransportPolicy {
        self.transport_policy
    }
}

impl Validate for FeedConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_endpoints("source.endpoints", &self.endpoints)?;
        validation::validate_columns("transform.columns", &self.columns)?;
        validation::validate_path("load.output_path", &self.output_path)?;
        validation::validate_path("load.output_file", &self.output_file)?;
        validation::validate_non_empty_string("extract.records_key", &self.records_key)?;
        if let Some(timeout) = self.timeout_seconds {
            validation::validate_positive_number("source.timeout_seconds", timeout, 1)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "jsonp-etl")]
#[command(about = "Fetch JSONP event feeds and flatten them into one CSV file")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Endpoint to fetch; repeat or comma-separate for several
    #[arg(long = "endpoint", value_delimiter = ',')]
    pub endpoints: Vec<String>,

    /// Column paths in output order, e.g. id,title,lineup/0
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    #[arg(long)]
    pub output_path: Option<String>,

    /// Output file name; `{timestamp}` is replaced with the UTC run time
    #[arg(long)]
    pub output_file: Option<String>,

    /// Key holding the event array when a payload is an object
    #[arg(long)]
    pub records_key: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Skip endpoints that cannot be reached instead of aborting the run
    #[arg(long)]
    pub skip_failed_endpoints: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Print the resolved configuration without fetching anything
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Layers flags over the TOML file (if any) over the built-in defaults.
    pub fn resolve(&self) -> Result<FeedConfig> {
        let mut feed = match &self.config {
            Some(path) => toml_config::TomlConfig::from_file(path)?.into_feed_config(),
            None => FeedConfig::default(),
        };

        if !self.endpoints.is_empty() {
            feed.endpoints = self.endpoints.clone();
        }
        if !self.columns.is_empty() {
            feed.columns = self.columns.iter().collect();
        }
        if let Some(output_path) = &self.output_path {
            feed.output_path = output_path.clone();
        }
        if let Some(output_file) = &self.output_file {
            feed.output_file = output_file.clone();
        }
        if let Some(records_key) = &self.records_key {
            feed.records_key = records_key.clone();
        }
        if self.timeout_seconds.is_some() {
            feed.timeout_seconds = self.timeout_seconds;
        }
        if self.skip_failed_endpoints {
            feed.transport_policy = TransportPolicy::Skip;
        }
        if self.monitor {
            feed.monitoring = true;
        }

        Ok(feed)
    }
}
