//! Run configuration: presets, RON files, environment and CLI overrides.
//!
//! Precedence, lowest first: preset or file, then `SCRAPER_*` variables,
//! then command-line flags.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use listing_core::{BoundsError, PatternSpec, ValidationBounds};
use listing_engine::{
    ExportFormat, ExportOptions, PaginationSettings, RetryPolicy, TransportSettings,
    DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, Preset};

const VILLA_URL: &str = "https://www.portalinmobiliario.com/venta/casa/rm-metropolitana/nunoa/villa-los-jardines---villa-los-presidentes";
const RENTALS_URL: &str =
    "https://www.portalinmobiliario.com/arriendo/departamento/santiago-metropolitana";
const MAC_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
    pub formats: Vec<ExportFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_prefix: "villa_jardines_properties".to_string(),
            formats: vec![ExportFormat::Json, ExportFormat::Csv],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub max_pages: u32,
    pub page_param: String,
    pub page_delay_secs: f64,
    pub request_timeout_secs: f64,
    /// Total tries per page, the first one included.
    pub max_attempts: u32,
    pub retry_backoff_secs: f64,
    pub stop_on_empty_page: bool,
    pub extraction_workers: usize,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    pub bounds: ValidationBounds,
    pub patterns: PatternSpec,
    pub output: OutputConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self::villa_los_jardines()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("environment variable {name}={value:?} is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("invalid bounds: {0}")]
    Bounds(#[from] BoundsError),
    #[error("failed to render config: {0}")]
    Render(String),
}

impl ScraperConfig {
    pub fn villa_los_jardines() -> Self {
        Self {
            base_url: VILLA_URL.to_string(),
            max_pages: 10,
            page_param: "page".to_string(),
            page_delay_secs: 3.0,
            request_timeout_secs: 30.0,
            max_attempts: 3,
            retry_backoff_secs: 5.0,
            stop_on_empty_page: true,
            extraction_workers: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: TransportSettings::default().headers,
            bounds: ValidationBounds::villa_los_jardines(),
            patterns: PatternSpec::villa_los_jardines(),
            output: OutputConfig::default(),
        }
    }

    pub fn santiago_rentals() -> Self {
        Self {
            base_url: RENTALS_URL.to_string(),
            max_pages: 3,
            page_delay_secs: 2.0,
            stop_on_empty_page: false,
            user_agent: MAC_USER_AGENT.to_string(),
            bounds: ValidationBounds::santiago_rentals(),
            patterns: PatternSpec::santiago_rentals(),
            output: OutputConfig {
                file_prefix: "rental_properties".to_string(),
                ..OutputConfig::default()
            },
            ..Self::villa_los_jardines()
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Villa => Self::villa_los_jardines(),
            Preset::Rentals => Self::santiago_rentals(),
        }
    }

    /// Parse RON text. Missing fields take the Villa Los Jardines values.
    pub fn from_ron_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn from_ron_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text, path)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
            .map_err(|err| ConfigError::Render(err.to_string()))
    }

    /// Apply `SCRAPER_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SCRAPER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(value) = lookup("SCRAPER_MAX_PAGES") {
            self.max_pages = parse_env("SCRAPER_MAX_PAGES", value, "page count")?;
        }
        if let Some(value) = lookup("SCRAPER_DELAY") {
            self.page_delay_secs = parse_env("SCRAPER_DELAY", value, "number of seconds")?;
        }
        if let Some(value) = lookup("SCRAPER_MAX_RETRIES") {
            self.max_attempts = parse_env("SCRAPER_MAX_RETRIES", value, "attempt count")?;
        }
        if let Some(value) = lookup("SCRAPER_TIMEOUT") {
            self.request_timeout_secs = parse_env("SCRAPER_TIMEOUT", value, "number of seconds")?;
        }
        if let Some(value) = lookup("SCRAPER_STOP_ON_EMPTY_PAGE") {
            self.stop_on_empty_page = parse_flag("SCRAPER_STOP_ON_EMPTY_PAGE", value)?;
        }
        if let Some(dir) = lookup("SCRAPER_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("page_delay_secs", self.page_delay_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("retry_backoff_secs", self.retry_backoff_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        self.bounds.check()?;
        Ok(())
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            request_timeout: seconds(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
            ..TransportSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: seconds(self.retry_backoff_secs),
        }
    }

    pub fn pagination_settings(&self) -> PaginationSettings {
        PaginationSettings {
            base_url: self.base_url.clone(),
            max_pages: self.max_pages,
            page_param: self.page_param.clone(),
            page_delay: seconds(self.page_delay_secs),
            stop_on_empty_page: self.stop_on_empty_page,
            extraction_workers: self.extraction_workers,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            output_dir: self.output.dir.clone(),
            file_prefix: self.output.file_prefix.clone(),
            formats: self.output.formats.clone(),
        }
    }
}

/// Build the effective configuration for one invocation.
pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<ScraperConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config {
        Some(path) => ScraperConfig::from_ron_file(path)?,
        None => ScraperConfig::preset(cli.preset),
    };
    config.apply_env_overrides(lookup)?;
    if let Some(max_pages) = cli.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_env<T: std::str::FromStr>(
    name: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv {
            name,
            value,
            expected,
        })
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value,
            expected: "boolean",
        }),
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser;
    use listing_core::Bound;
    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn presets_are_valid() {
        ScraperConfig::villa_los_jardines().validate().unwrap();
        ScraperConfig::santiago_rentals().validate().unwrap();
    }

    #[test]
    fn rentals_preset_differs_where_the_markets_differ() {
        let rentals = ScraperConfig::santiago_rentals();
        assert_eq!(rentals.max_pages, 3);
        assert!(!rentals.stop_on_empty_page);
        assert_eq!(rentals.bounds.clp_price, Bound::new(100_000, 10_000_000));
        assert_eq!(rentals.output.file_prefix, "rental_properties");
        assert_eq!(rentals.max_attempts, 3);
    }

    #[test]
    fn ron_round_trip_preserves_everything() {
        let config = ScraperConfig::santiago_rentals();
        let text = config.to_ron().unwrap();
        let parsed = ScraperConfig::from_ron_str(&text, Path::new("inline.ron")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_ron_falls_back_to_defaults() {
        let text = r#"(
            max_pages: 2,
            stop_on_empty_page: false,
            output: (file_prefix: "nunoa"),
        )"#;
        let config = ScraperConfig::from_ron_str(text, Path::new("inline.ron")).unwrap();

        assert_eq!(config.max_pages, 2);
        assert!(!config.stop_on_empty_page);
        assert_eq!(config.output.file_prefix, "nunoa");
        assert_eq!(config.output.dir, PathBuf::from("."));
        assert_eq!(config.base_url, VILLA_URL);
    }

    #[test]
    fn malformed_ron_names_the_file() {
        let err = ScraperConfig::from_ron_str("(max_pages: \"many\")", Path::new("bad.ron"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == Path::new("bad.ron")));
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scraper.ron");
        fs::write(&path, "(max_pages: 4)").unwrap();

        assert_eq!(ScraperConfig::from_ron_file(&path).unwrap().max_pages, 4);
        assert!(matches!(
            ScraperConfig::from_ron_file(&dir.path().join("missing.ron")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ScraperConfig::villa_los_jardines();
        config
            .apply_env_overrides(env(&[
                ("SCRAPER_MAX_PAGES", "7"),
                ("SCRAPER_DELAY", "0.5"),
                ("SCRAPER_MAX_RETRIES", "5"),
                ("SCRAPER_TIMEOUT", "12"),
                ("SCRAPER_STOP_ON_EMPTY_PAGE", "no"),
                ("SCRAPER_OUTPUT_DIR", "/tmp/listings"),
            ]))
            .unwrap();

        assert_eq!(config.max_pages, 7);
        assert_eq!(config.page_delay_secs, 0.5);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.request_timeout_secs, 12.0);
        assert!(!config.stop_on_empty_page);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/listings"));
        assert_eq!(config.pagination_settings().page_delay, Duration::from_millis(500));
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = ScraperConfig::villa_los_jardines();
        let err = config
            .apply_env_overrides(env(&[("SCRAPER_MAX_PAGES", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "SCRAPER_MAX_PAGES",
                ..
            }
        ));

        let err = config
            .apply_env_overrides(env(&[("SCRAPER_STOP_ON_EMPTY_PAGE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { expected: "boolean", .. }));
    }

    #[test]
    fn negative_delays_fail_validation() {
        let mut config = ScraperConfig::villa_los_jardines();
        config.page_delay_secs = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration {
                field: "page_delay_secs",
                ..
            })
        ));
    }

    #[test]
    fn overlapping_bounds_fail_validation() {
        let mut config = ScraperConfig::villa_los_jardines();
        config.bounds.uf_price = Bound::new(100, 50_000_000);
        assert!(matches!(config.validate(), Err(ConfigError::Bounds(_))));
    }

    #[test]
    fn cli_flags_win_over_environment() {
        let cli = Cli::try_parse_from([
            "listing-harvester",
            "--preset",
            "rentals",
            "--max-pages",
            "1",
            "--output-dir",
            "cli-out",
        ])
        .unwrap();

        let config = resolve(
            &cli,
            env(&[("SCRAPER_MAX_PAGES", "9"), ("SCRAPER_DELAY", "0")]),
        )
        .unwrap();

        assert_eq!(config.base_url, RENTALS_URL);
        assert_eq!(config.max_pages, 1);
        assert_eq!(config.page_delay_secs, 0.0);
        assert_eq!(config.output.dir, PathBuf::from("cli-out"));
    }
}
