use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::timefmt::{parse_timezone, DEFAULT_TIMEZONE};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Statusboard";
const APP_NAME: &str = "statusboard";

pub const CONFIG_ENV: &str = "STATUSBOARD_CONFIG";
pub const DEFAULT_DOCUMENT_URL: &str = "http://127.0.0.1:9000/statusboard/statuses.json";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load()?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load()?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            state_dir,
            log_dir,
        })
    }

    /// Everything rooted under one directory; handy for tests and portable
    /// installs.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.state_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteOptions,
    pub display: DisplayOptions,
}

impl AppConfig {
    pub fn post_load(&mut self) -> Result<()> {
        self.remote.validate().context("validating [remote] options")?;
        if parse_timezone(&self.display.timezone).is_none() {
            tracing::warn!(
                timezone = %self.display.timezone,
                "unknown timezone in config, falling back to {}",
                DEFAULT_TIMEZONE.name()
            );
            self.display.timezone = DEFAULT_TIMEZONE.name().to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    /// Full URL of the JSON document; GET reads it, PUT replaces it.
    pub document_url: String,
    /// Send `If-Match` with the ETag seen at load time and refuse to
    /// overwrite a document that changed in between.
    pub conditional_writes: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            document_url: DEFAULT_DOCUMENT_URL.to_string(),
            conditional_writes: false,
        }
    }
}

impl RemoteOptions {
    fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(self.document_url.trim())
            .with_context(|| format!("parsing document_url {:?}", self.document_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("document_url must be http or https, got {}", url.scheme());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// IANA zone every timestamp is rendered in.
    pub timezone: String,
    pub refresh_interval_secs: u64,
    pub board_title: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            refresh_interval_secs: 60,
            board_title: "Status Updates".to_string(),
        }
    }
}

impl DisplayOptions {
    pub fn zone(&self) -> Tz {
        parse_timezone(&self.timezone).unwrap_or(DEFAULT_TIMEZONE)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::seconds(self.refresh_interval_secs.max(1) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert_eq!(cfg.remote.document_url, DEFAULT_DOCUMENT_URL);
        assert!(!cfg.remote.conditional_writes);
        assert_eq!(cfg.display.zone(), DEFAULT_TIMEZONE);
        assert!(loader.paths().config_file.exists());
        assert!(loader.paths().log_dir.is_dir());

        let reloaded = loader.load()?;
        assert_eq!(reloaded.display.board_title, "Status Updates");
        assert_eq!(reloaded.display.refresh_interval(), Duration::seconds(60));
        Ok(())
    }

    #[test]
    fn partial_files_fill_in_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[remote]\ndocument_url = \"https://bucket.example/statuses.json\"\nconditional_writes = true\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.remote.document_url, "https://bucket.example/statuses.json");
        assert!(cfg.remote.conditional_writes);
        assert_eq!(cfg.display.timezone, "America/New_York");
        Ok(())
    }

    #[test]
    fn unknown_timezone_falls_back() -> Result<()> {
        let mut cfg = AppConfig::default();
        cfg.display.timezone = "Atlantis/Lost".into();
        cfg.post_load()?;
        assert_eq!(cfg.display.timezone, "America/New_York");
        Ok(())
    }

    #[test]
    fn rejects_non_http_document_urls() {
        let mut cfg = AppConfig::default();
        cfg.remote.document_url = "ftp://example.com/statuses.json".into();
        assert!(cfg.post_load().is_err());

        cfg.remote.document_url = "not a url".into();
        assert!(cfg.post_load().is_err());
    }
}
