use std::fs::{read_to_string, write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Error, bail};
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};

/// Name of the configuration file.
pub(crate) const CONFIG_NAME: &str = "config.json";

/// Placeholder the page URL template must carry for the index number.
const PAGE_PLACEHOLDER: &str = "{page}";

/// How one index unit is shaped: an HTML gallery page walked with the
/// selector chain, or a JSON API page of records.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) enum SourceShape {
    #[default]
    Html,
    JsonApi,
}

/// Config that is used to do general setup. Loaded once at startup and passed
/// into the coordinators as a plain value.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct Config {
    /// Root URL of the source site, used as the first referer and as the base
    /// for resolving relative media paths.
    #[serde(rename = "baseUrl")]
    base_url: String,
    /// Page URL template containing a `{page}` placeholder.
    #[serde(rename = "pageUrlTemplate")]
    page_url_template: String,
    /// First page of the index range (inclusive).
    #[serde(rename = "startPage", default = "default_start_page")]
    start_page: u64,
    /// Last page of the index range (inclusive).
    #[serde(rename = "endPage")]
    end_page: u64,
    /// Shape of the source: "html" or "jsonApi".
    #[serde(rename = "sourceShape", default)]
    source_shape: SourceShape,
    /// Record field carrying the media URL, for jsonApi sources.
    #[serde(rename = "apiUrlField", default = "default_api_url_field")]
    api_url_field: String,
    /// Record field distinguishing media records from thumbnails, for jsonApi
    /// sources. Empty string disables the filter.
    #[serde(rename = "apiTypeField", default = "default_api_type_field")]
    api_type_field: String,
    /// Value of the type field that marks an actual media record.
    #[serde(rename = "apiTypeValue", default = "default_api_type_value")]
    api_type_value: i64,
    /// The location of the download directory.
    #[serde(rename = "downloadDirectory", default = "default_download_directory")]
    download_directory: String,
    /// Worker count for the discovery phase (default: 5)
    #[serde(rename = "discoveryConcurrency", default = "default_concurrency")]
    discovery_concurrency: usize,
    /// Worker count for the retrieval phase (default: 5)
    #[serde(rename = "downloadConcurrency", default = "default_concurrency")]
    download_concurrency: usize,
    /// Items per retrieval batch (default: 100)
    #[serde(rename = "batchSize", default = "default_batch_size")]
    batch_size: usize,
    /// Pause after each discovery task, in seconds (default: 1)
    #[serde(rename = "discoveryDelaySecs", default = "default_task_delay_secs")]
    discovery_delay_secs: u64,
    /// Pause after each successful download, in seconds (default: 1)
    #[serde(rename = "downloadDelaySecs", default = "default_task_delay_secs")]
    download_delay_secs: u64,
    /// Pause between retrieval batches, in seconds (default: 5)
    #[serde(rename = "batchDelaySecs", default = "default_batch_delay_secs")]
    batch_delay_secs: u64,
}

fn default_start_page() -> u64 {
    1
}
fn default_api_url_field() -> String {
    String::from("source")
}
fn default_api_type_field() -> String {
    String::from("type")
}
fn default_api_type_value() -> i64 {
    1
}
fn default_download_directory() -> String {
    String::from("downloads/")
}
fn default_concurrency() -> usize {
    5
}
fn default_batch_size() -> usize {
    100
}
fn default_task_delay_secs() -> u64 {
    1
}
fn default_batch_delay_secs() -> u64 {
    5
}

impl Config {
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn page_url_template(&self) -> &str {
        &self.page_url_template
    }

    pub(crate) fn start_page(&self) -> u64 {
        self.start_page
    }

    pub(crate) fn end_page(&self) -> u64 {
        self.end_page
    }

    pub(crate) fn source_shape(&self) -> SourceShape {
        self.source_shape
    }

    pub(crate) fn api_url_field(&self) -> &str {
        &self.api_url_field
    }

    pub(crate) fn api_record_filter(&self) -> Option<(&str, i64)> {
        if self.api_type_field.is_empty() {
            None
        } else {
            Some((self.api_type_field.as_str(), self.api_type_value))
        }
    }

    pub(crate) fn download_directory(&self) -> &str {
        &self.download_directory
    }

    pub(crate) fn discovery_concurrency(&self) -> usize {
        self.discovery_concurrency
    }

    pub(crate) fn download_concurrency(&self) -> usize {
        self.download_concurrency
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub(crate) fn discovery_delay(&self) -> Duration {
        Duration::from_secs(self.discovery_delay_secs)
    }

    pub(crate) fn download_delay(&self) -> Duration {
        Duration::from_secs(self.download_delay_secs)
    }

    pub(crate) fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    /// Checks config and ensure it isn't missing.
    pub(crate) fn config_exists() -> bool {
        if !Path::new(CONFIG_NAME).exists() {
            trace!("config.json: does not exist!");
            return false;
        }

        true
    }

    /// Creates config file.
    pub(crate) fn create_config() -> Result<(), Error> {
        let json = to_string_pretty(&Config::default())?;
        write(Path::new(CONFIG_NAME), json)?;

        Ok(())
    }

    /// Loads and validates the config file.
    pub(crate) fn load() -> Result<Self, Error> {
        let config_contents = read_to_string(CONFIG_NAME)
            .with_context(|| format!("Failed to read config file: {}", CONFIG_NAME))?;
        let config: Config = from_str(&config_contents)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if !self.page_url_template.contains(PAGE_PLACEHOLDER) {
            bail!(
                "pageUrlTemplate must contain the {} placeholder",
                PAGE_PLACEHOLDER
            );
        }
        if self.start_page > self.end_page {
            bail!(
                "startPage ({}) must not exceed endPage ({})",
                self.start_page,
                self.end_page
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: String::from("https://example.com"),
            page_url_template: String::from("https://example.com/en/gallery/{page}"),
            start_page: default_start_page(),
            end_page: 1,
            source_shape: SourceShape::default(),
            api_url_field: default_api_url_field(),
            api_type_field: default_api_type_field(),
            api_type_value: default_api_type_value(),
            download_directory: default_download_directory(),
            discovery_concurrency: default_concurrency(),
            download_concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            discovery_delay_secs: default_task_delay_secs(),
            download_delay_secs: default_task_delay_secs(),
            batch_delay_secs: default_batch_delay_secs(),
        }
    }
}
