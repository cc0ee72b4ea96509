//! Job configuration
//!
//! A harvest job is described by one YAML file: where the checkpoint and
//! output live, which units are required, how to talk to the endpoint, and
//! how the engine paces, retries and flushes.

use crate::engine::{HarvestOptions, RecordTransform};
use crate::error::{Error, Result};
use crate::http::{HttpFetcherConfig, PaginationParams};
use crate::loader::{self, DeclarationColumns, Declarations, UnitDecl};
use crate::output::ScanColumns;
use crate::source::{BackoffPolicy, Pagination, SourceConfig};
use crate::types::{BackoffType, DedupScope, JsonValue, PaginationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Job Config
// ============================================================================

/// Complete job configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Job name, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Checkpoint file
    pub checkpoint: PathBuf,

    /// Output store
    pub output: OutputConfig,

    /// Required units
    #[serde(default)]
    pub declarations: DeclarationsConfig,

    /// Remote endpoint
    #[serde(default)]
    pub http: HttpConfig,

    /// Page size, pacing and backoff
    #[serde(default)]
    pub source: SourceSettings,

    /// Iteration and orchestration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Key derivation and projection of items
    #[serde(default)]
    pub transform: RecordTransform,
}

fn default_name() -> String {
    "harvest".to_string()
}

/// Values given on the command line that win over the job file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Page size
    pub page_size: Option<u32>,
    /// Flush interval
    pub flush_interval: Option<usize>,
    /// Inter-request delay in milliseconds
    pub request_delay_ms: Option<u64>,
}

impl HarvestConfig {
    /// Parse and validate a job from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a job file; relative paths are resolved against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read job file '{}': {e}", path.display()))
        })?;

        let mut config = Self::from_yaml(&yaml)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make every relative file path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.checkpoint);
        resolve(&mut self.output.path);
        if let Some(p) = self.declarations.sources.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.declarations.partitions.as_mut() {
            resolve(p);
        }
    }

    /// Apply command-line overrides and re-validate
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(size) = overrides.page_size {
            self.source.page_size = size;
        }
        if let Some(interval) = overrides.flush_interval {
            self.engine.flush_interval = interval;
        }
        if let Some(delay) = overrides.request_delay_ms {
            self.source.request_delay_ms = delay;
        }
        self.validate()
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint.as_os_str().is_empty() {
            return Err(Error::invalid_value("checkpoint", "must not be empty"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(Error::invalid_value("output.path", "must not be empty"));
        }

        self.declarations.validate()?;
        self.source.validate()?;

        if self.engine.flush_interval == 0 {
            return Err(Error::invalid_value(
                "engine.flush_interval",
                "must be at least 1",
            ));
        }
        if self.engine.unit_attempts == 0 {
            return Err(Error::invalid_value(
                "engine.unit_attempts",
                "must be at least 1",
            ));
        }

        for (field, pointer) in [
            ("http.records_pointer", Some(&self.http.records_pointer)),
            ("http.total_pages_pointer", self.http.total_pages_pointer.as_ref()),
            ("http.cursor_pointer", self.http.cursor_pointer.as_ref()),
            ("http.has_more_pointer", self.http.has_more_pointer.as_ref()),
        ] {
            if let Some(pointer) = pointer {
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(Error::invalid_value(
                        field,
                        format!("'{pointer}' is not a JSON pointer (must start with '/')"),
                    ));
                }
            }
        }
        if self.http.pagination == PaginationKind::Cursor && self.http.cursor_pointer.is_none() {
            return Err(Error::invalid_value(
                "http.cursor_pointer",
                "required for cursor pagination",
            ));
        }

        Ok(())
    }

    /// Load the declared units
    pub fn declarations(&self) -> Result<Declarations> {
        self.declarations.load()
    }

    /// HTTP fetcher settings
    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        let http = &self.http;
        let mut builder = HttpFetcherConfig::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .vars(http.vars.clone())
            .pagination(http.pagination)
            .params(http.params.clone().into())
            .records_pointer(&http.records_pointer);

        if let Some(agent) = &http.user_agent {
            builder = builder.user_agent(agent);
        }
        for (key, value) in &http.headers {
            builder = builder.header(key, value);
        }
        for (key, value) in &http.query {
            builder = builder.query(key, value);
        }
        if let Some(pointer) = &http.total_pages_pointer {
            builder = builder.total_pages_pointer(pointer);
        }
        if let Some(pointer) = &http.cursor_pointer {
            builder = builder.cursor_pointer(pointer);
        }
        if let Some(pointer) = &http.has_more_pointer {
            builder = builder.has_more_pointer(pointer);
        }

        builder.build()
    }

    /// Pagination strategy
    pub fn pagination(&self) -> Pagination {
        Pagination::from_kind(self.http.pagination, self.http.start_page)
    }

    /// Paginated source settings
    pub fn source_config(&self) -> SourceConfig {
        self.source.to_source_config()
    }

    /// Engine options
    pub fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            page_size: self.source.page_size,
            flush_interval: self.engine.flush_interval,
            dedup_scope: self.engine.dedup_scope,
            retry_failed: self.engine.retry_failed,
            record_details: self.engine.record_details,
            unit_attempts: self.engine.unit_attempts,
            stop_on_rate_limit: self.engine.stop_on_rate_limit,
        }
    }

    /// Columns for the completeness scan
    pub fn scan_columns(&self) -> ScanColumns {
        self.output.scan.clone()
    }
}

// ============================================================================
// Output
// ============================================================================

/// Output store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV file receiving accepted records
    pub path: PathBuf,

    /// How to find completed units in the output
    #[serde(default)]
    pub scan: ScanColumns,
}

// ============================================================================
// Declarations
// ============================================================================

/// Where the required units come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclarationsConfig {
    /// Sources CSV file
    #[serde(default)]
    pub sources: Option<PathBuf>,

    /// Partitions CSV file
    #[serde(default)]
    pub partitions: Option<PathBuf>,

    /// Column names of the CSV files
    #[serde(default)]
    pub columns: DeclarationColumns,

    /// Normalize source ids read from the CSV files
    #[serde(default)]
    pub normalize: bool,

    /// Sources declared inline
    #[serde(default)]
    pub units: Vec<UnitDecl>,
}

impl DeclarationsConfig {
    fn validate(&self) -> Result<()> {
        match (&self.sources, &self.partitions) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::invalid_value(
                    "declarations",
                    "'sources' and 'partitions' must be given together",
                ))
            }
            (None, None) if self.units.is_empty() => {
                return Err(Error::invalid_value(
                    "declarations",
                    "declare units inline or through 'sources' and 'partitions' files",
                ))
            }
            _ => {}
        }

        for unit in &self.units {
            loader::validate_source_id(&unit.source)?;
            if unit.locator.is_empty() {
                return Err(Error::invalid_value(
                    "declarations.units",
                    format!("source '{}' has no locator", unit.source),
                ));
            }
        }
        Ok(())
    }

    /// Read the CSV files (if any), then append the inline units
    pub fn load(&self) -> Result<Declarations> {
        let mut declarations = match (&self.sources, &self.partitions) {
            (Some(sources), Some(partitions)) => {
                loader::load_declarations(sources, partitions, &self.columns, self.normalize)?
            }
            _ => Declarations::new(),
        };
        declarations.extend(Declarations::from_units(&self.units));
        Ok(declarations)
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent (defaults to `harvester/<version>`)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Headers sent with every request (templated)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Extra query parameters (templated)
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Job-level template variables, available as `{{ vars.name }}`
    #[serde(default)]
    pub vars: JsonValue,

    /// Pagination style
    #[serde(default)]
    pub pagination: PaginationKind,

    /// First page number
    #[serde(default = "default_start_page")]
    pub start_page: u64,

    /// Pagination parameter names
    #[serde(default)]
    pub params: ParamsConfig,

    /// JSON pointer to the record array
    #[serde(default = "default_records_pointer")]
    pub records_pointer: String,

    /// JSON pointer to the total page count
    #[serde(default)]
    pub total_pages_pointer: Option<String>,

    /// JSON pointer to the next cursor
    #[serde(default)]
    pub cursor_pointer: Option<String>,

    /// JSON pointer to a "has more pages" flag
    #[serde(default)]
    pub has_more_pointer: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: None,
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            vars: JsonValue::Null,
            pagination: PaginationKind::default(),
            start_page: default_start_page(),
            params: ParamsConfig::default(),
            records_pointer: default_records_pointer(),
            total_pages_pointer: None,
            cursor_pointer: None,
            has_more_pointer: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_start_page() -> u64 {
    1
}

fn default_records_pointer() -> String {
    "/results".to_string()
}

/// Query parameter names used for pagination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    /// Page number parameter
    pub page: String,
    /// Page size parameter
    pub limit: String,
    /// Offset parameter
    pub offset: String,
    /// Cursor parameter
    pub cursor: String,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        PaginationParams::default().into()
    }
}

impl From<PaginationParams> for ParamsConfig {
    fn from(p: PaginationParams) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            offset: p.offset,
            cursor: p.cursor,
        }
    }
}

impl From<ParamsConfig> for PaginationParams {
    fn from(p: ParamsConfig) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            offset: p.offset,
            cursor: p.cursor,
        }
    }
}

// ============================================================================
// Source
// ============================================================================

/// Page size, pacing and rate-limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Requested page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Largest page size the endpoint accepts
    #[serde(default = "default_page_size")]
    pub max_page_size: u32,

    /// Delay between successive page requests in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Optional ceiling on requests per second
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    /// Stop after this many pages per unit
    #[serde(default)]
    pub max_pages: Option<u64>,

    /// Rate-limit backoff
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_page_size(),
            request_delay_ms: default_request_delay_ms(),
            requests_per_second: None,
            max_pages: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl SourceSettings {
    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::invalid_value("source.page_size", "must be at least 1"));
        }
        if self.max_page_size == 0 {
            return Err(Error::invalid_value(
                "source.max_page_size",
                "must be at least 1",
            ));
        }
        if self.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "source.requests_per_second",
                "must be at least 1",
            ));
        }
        if self.max_pages == Some(0) {
            return Err(Error::invalid_value("source.max_pages", "must be at least 1"));
        }
        self.backoff.validate()
    }

    /// Build the paginated source settings
    pub fn to_source_config(&self) -> SourceConfig {
        SourceConfig::new()
            .with_max_page_size(self.max_page_size)
            .with_request_delay(Duration::from_millis(self.request_delay_ms))
            .with_requests_per_second(self.requests_per_second)
            .with_max_pages(self.max_pages)
            .with_backoff(self.backoff.to_policy())
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_request_delay_ms() -> u64 {
    500
}

/// Backoff for rate-limited requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Backoff type
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// First delay in milliseconds
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Delay cap in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Total requests per page, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BackoffConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_value(
                "source.backoff.max_attempts",
                "must be at least 1",
            ));
        }
        if self.base_ms > self.max_ms {
            return Err(Error::invalid_value(
                "source.backoff.base_ms",
                format!("{} exceeds max_ms {}", self.base_ms, self.max_ms),
            ));
        }
        Ok(())
    }

    /// Build the retry policy
    pub fn to_policy(&self) -> BackoffPolicy {
        BackoffPolicy::exponential(Duration::from_millis(self.base_ms), self.max_attempts)
            .with_type(self.backoff_type)
            .with_max_delay(Duration::from_millis(self.max_ms))
    }
}

fn default_base_ms() -> u64 {
    2000
}

fn default_max_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    5
}

// ============================================================================
// Engine
// ============================================================================

/// Iteration and orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Items between flushes of the output and the checkpoint
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,

    /// Dedup key scope
    #[serde(default)]
    pub dedup_scope: DedupScope,

    /// Re-attempt items recorded as failed
    #[serde(default)]
    pub retry_failed: bool,

    /// Keep each accepted record in the checkpoint
    #[serde(default)]
    pub record_details: bool,

    /// Attempts per unit within one run
    #[serde(default = "default_unit_attempts")]
    pub unit_attempts: u32,

    /// End the run when a unit exhausts its rate-limit retries
    #[serde(default)]
    pub stop_on_rate_limit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            dedup_scope: DedupScope::default(),
            retry_failed: false,
            record_details: false,
            unit_attempts: default_unit_attempts(),
            stop_on_rate_limit: false,
        }
    }
}

fn default_flush_interval() -> usize {
    100
}

fn default_unit_attempts() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
checkpoint: state/checkpoint.json
output:
  path: data/results.csv
declarations:
  units:
    - source: boston
      locator: "https://api.example.com/races/{{ source }}/results"
      partitions: [2023, 2024]
"#;

    #[test]
    fn test_parse_minimal_job() {
        let config = HarvestConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.name, "harvest");
        assert_eq!(config.checkpoint, PathBuf::from("state/checkpoint.json"));
        assert_eq!(config.declarations.units[0].partitions, vec!["2023", "2024"]);
        assert_eq!(config.transform, RecordTransform::default());
    }

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::from_yaml(MINIMAL).unwrap();

        let source = config.source_config();
        assert_eq!(source.max_page_size, 100);
        assert_eq!(source.request_delay, Duration::from_millis(500));
        assert_eq!(source.backoff.base, Duration::from_secs(2));
        assert_eq!(source.backoff.max_delay, Duration::from_secs(60));
        assert_eq!(source.backoff.max_attempts, 5);
        assert_eq!(source.requests_per_second, None);

        assert_eq!(config.harvest_options(), HarvestOptions::default());

        let http = config.fetcher_config();
        assert_eq!(http.timeout, Duration::from_secs(30));
        assert_eq!(http.records_pointer, "/results");
        assert_eq!(http.pagination, PaginationKind::PageNumber);
        assert_eq!(config.scan_columns(), ScanColumns::default());
    }

    #[test]
    fn test_parse_full_job() {
        let yaml = r#"
name: marathons
checkpoint: checkpoint.json
output:
  path: results.csv
  scan:
    source: race_name
    partition: race_date
    partition_prefix: 4
    normalize_source: true
declarations:
  sources: races.csv
  partitions: missing.csv
  columns:
    source: race
    partition: missing_year
  normalize: true
http:
  timeout_seconds: 10
  headers:
    Referer: "https://example.com/{{ source }}"
  query:
    year: "{{ partition }}"
  params:
    limit: per_page
  total_pages_pointer: /pagination/last_page
source:
  page_size: 50
  request_delay_ms: 250
  requests_per_second: 4
  backoff:
    type: linear
    base_ms: 1000
    max_attempts: 3
engine:
  flush_interval: 10
  dedup_scope: per_unit
  unit_attempts: 2
  stop_on_rate_limit: true
transform:
  key_fields: [bib, name]
  required_fields: [name]
"#;

        let config = HarvestConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "marathons");
        assert_eq!(config.declarations.columns.source, "race");
        assert_eq!(config.declarations.columns.locator, "url");
        assert_eq!(
            config.scan_columns(),
            ScanColumns::new("race_name", "race_date")
                .with_partition_prefix(4)
                .with_normalized_source()
        );

        let http = config.fetcher_config();
        assert_eq!(http.timeout, Duration::from_secs(10));
        assert_eq!(http.params.limit, "per_page");
        assert_eq!(http.params.page, "page");
        assert_eq!(http.query.get("year").unwrap(), "{{ partition }}");
        assert_eq!(
            http.total_pages_pointer.as_deref(),
            Some("/pagination/last_page")
        );

        let source = config.source_config();
        assert_eq!(source.requests_per_second, Some(4));
        assert_eq!(source.backoff.backoff_type, BackoffType::Linear);
        assert_eq!(source.backoff.max_attempts, 3);

        let options = config.harvest_options();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.flush_interval, 10);
        assert_eq!(options.dedup_scope, DedupScope::PerUnit);
        assert!(options.stop_on_rate_limit);
        assert_eq!(config.transform.key_fields, vec!["bib", "name"]);
    }

    #[test]
    fn test_overrides() {
        let mut config = HarvestConfig::from_yaml(MINIMAL).unwrap();
        config
            .apply_overrides(&Overrides {
                page_size: Some(25),
                flush_interval: Some(5),
                request_delay_ms: Some(0),
            })
            .unwrap();

        assert_eq!(config.harvest_options().page_size, 25);
        assert_eq!(config.harvest_options().flush_interval, 5);
        assert_eq!(config.source_config().request_delay, Duration::ZERO);

        let err = config
            .apply_overrides(&Overrides {
                flush_interval: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("source:\n  page_size: 0\n", "source.page_size"),
            ("source:\n  backoff:\n    max_attempts: 0\n", "source.backoff.max_attempts"),
            ("engine:\n  unit_attempts: 0\n", "engine.unit_attempts"),
            ("http:\n  records_pointer: results\n", "http.records_pointer"),
            ("http:\n  pagination: cursor\n", "http.cursor_pointer"),
        ];

        for (extra, field) in cases {
            let yaml = format!("{MINIMAL}{extra}");
            let err = HarvestConfig::from_yaml(&yaml).unwrap_err();
            assert!(
                err.to_string().contains(field),
                "expected error on {field}, got {err}"
            );
        }
    }

    #[test]
    fn test_declarations_must_be_complete() {
        let yaml = r#"
checkpoint: c.json
output:
  path: o.csv
declarations:
  sources: races.csv
"#;
        assert!(HarvestConfig::from_yaml(yaml).is_err());

        let yaml = "checkpoint: c.json\noutput:\n  path: o.csv\n";
        assert!(HarvestConfig::from_yaml(yaml).is_err());

        let yaml = r#"
checkpoint: c.json
output:
  path: o.csv
declarations:
  units:
    - source: a/b
      locator: https://x
"#;
        assert!(HarvestConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_resolves_paths_and_declarations() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("races.csv"),
            "source,url\nboston,https://b/{{ partition }}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("missing.csv"),
            "source,partition\nboston,2024\n",
        )
        .unwrap();
        let job = dir.path().join("job.yaml");
        std::fs::write(
            &job,
            r#"
checkpoint: checkpoint.json
output:
  path: /tmp/absolute.csv
declarations:
  sources: races.csv
  partitions: missing.csv
  units:
    - source: nyc
      locator: https://n
      partitions: [2024]
"#,
        )
        .unwrap();

        let config = HarvestConfig::load(&job).unwrap();
        assert_eq!(config.checkpoint, dir.path().join("checkpoint.json"));
        assert_eq!(config.output.path, PathBuf::from("/tmp/absolute.csv"));

        let units = config.declarations().unwrap().required_units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id(), "boston/2024");
        assert_eq!(units[1].id(), "nyc/2024");
    }

    #[test]
    fn test_missing_job_file() {
        let err = HarvestConfig::load("/nonexistent/job.yaml").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
