use crate::classifier::DEFAULT_FUZZY_THRESHOLD;
use crate::error::ConfigError;
use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8089;

const DEFAULT_TEMPLATE: &str = r#"# optionk configuration

[optionk]
# Port the server listens on (loopback only); the client uses it to find the server.
port = 8089
# Minimum partial fuzzy similarity (0-100) for a word to count as a git term.
# fuzzy_threshold = 85

# Exactly one of the AI service blocks below must be enabled.

[vertexai]
enabled = false
project = "your-gcp-project"
location = "us-central1"
model = "gemini-1.5-flash"

[google_ai_studio]
enabled = false
api_key = ""
model = "gemini-1.5-flash"
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub optionk: OptionkSection,
    #[serde(default)]
    pub vertexai: VertexAiSection,
    #[serde(default)]
    pub google_ai_studio: GoogleAiStudioSection,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// True when `source` was just written from the default template.
    #[serde(skip)]
    pub freshly_created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionkSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_threshold: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VertexAiSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleAiStudioSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The AI service selected by the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSettings {
    Vertex {
        project: String,
        location: String,
        model: String,
    },
    GoogleAiStudio {
        api_key: String,
        model: String,
    },
}

/// Validated settings the server runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub port: u16,
    pub fuzzy_threshold: u8,
    pub backend: BackendSettings,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for OptionkSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            fuzzy_threshold: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            optionk: OptionkSection::default(),
            vertexai: VertexAiSection::default(),
            google_ai_studio: GoogleAiStudioSection::default(),
            source: None,
            freshly_created: false,
        }
    }
}

impl Config {
    /// Load configuration from `path_override` or the per-user default path.
    ///
    /// For the default path a legacy `~/.optionk/config.ini` is migrated once,
    /// and a commented template is written when no file exists at all.
    /// Environment variables override values from the file.
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path_override, true)
    }

    /// Like [`Config::load`], but a missing default file yields the built-in
    /// defaults instead of a freshly written template.
    pub fn load_existing(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path_override, false)
    }

    fn load_with(path_override: Option<&Path>, create_template: bool) -> Result<Self, ConfigError> {
        let mut config = match path_override {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_default(
                &Self::default_config_path()?,
                Self::legacy_config_path().as_deref(),
                create_template,
            )?,
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load `path` after migrating `legacy` into it.
    ///
    /// When neither exists the template is written if `create_template` is
    /// set; otherwise the defaults are returned and nothing touches the disk.
    pub fn load_default(
        path: &Path,
        legacy: Option<&Path>,
        create_template: bool,
    ) -> Result<Self, ConfigError> {
        if let Some(legacy) = legacy {
            Self::migrate_legacy(path, legacy)?;
        }
        if path.exists() {
            return Self::load_from_path(path);
        }
        if !create_template {
            warn!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::write_template(path)?;
        let mut config = Self::load_from_path(path)?;
        config.freshly_created = true;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Parse the INI layout used by `~/.optionk/config.ini`.
    ///
    /// Sections and `key = value` (or `key: value`) pairs are gathered into a
    /// TOML table and deserialized like a regular config file. Keys are
    /// case-insensitive; `#` and `;` start comment lines.
    pub fn from_ini_str(content: &str) -> Result<Self, String> {
        let mut root = toml::Table::new();
        let mut section: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                if !root.contains_key(&name) {
                    root.insert(name.clone(), toml::Value::Table(toml::Table::new()));
                }
                section = Some(name);
                continue;
            }

            let line_no = index + 1;
            let Some((key, value)) = line.split_once(['=', ':']) else {
                return Err(format!("line {}: expected 'key = value'", line_no));
            };
            let Some(name) = section.as_ref() else {
                return Err(format!("line {}: key outside of any [section]", line_no));
            };

            let key = key.trim().to_lowercase();
            let value = ini_value(&key, value.trim())
                .map_err(|e| format!("line {}: {}", line_no, e))?;
            if let Some(toml::Value::Table(table)) = root.get_mut(name) {
                table.insert(key, value);
            }
        }

        toml::Value::Table(root)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())
    }

    /// Apply `OPTIONK_PORT` and `GOOGLE_API_KEY` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("OPTIONK_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.optionk.port = port,
                Err(_) => warn!("Ignoring invalid OPTIONK_PORT value: {}", port),
            }
        }

        if let Some(api_key) = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.google_ai_studio.api_key = Some(api_key);
        }
    }

    /// Port shared by server and client.
    pub fn port(&self) -> Result<u16, ConfigError> {
        match self.optionk.port {
            0 => Err(ConfigError::InvalidPort(0)),
            port => Ok(port),
        }
    }

    /// Validate everything the server needs and pick the enabled AI service.
    pub fn server_settings(&self) -> Result<ServerSettings, ConfigError> {
        let port = self.port()?;

        let fuzzy_threshold = self.optionk.fuzzy_threshold.unwrap_or(DEFAULT_FUZZY_THRESHOLD);
        if fuzzy_threshold > 100 {
            return Err(ConfigError::InvalidThreshold(fuzzy_threshold));
        }

        let backend = match (self.vertexai.enabled, self.google_ai_studio.enabled) {
            (false, false) => return Err(ConfigError::NoBackendEnabled),
            (true, true) => return Err(ConfigError::MultipleBackendsEnabled),
            (true, false) => BackendSettings::Vertex {
                project: required(&self.vertexai.project, "vertexai", "project")?,
                location: required(&self.vertexai.location, "vertexai", "location")?,
                model: required(&self.vertexai.model, "vertexai", "model")?,
            },
            (false, true) => BackendSettings::GoogleAiStudio {
                api_key: required(&self.google_ai_studio.api_key, "google_ai_studio", "api_key")?,
                model: required(&self.google_ai_studio.model, "google_ai_studio", "model")?,
            },
        };

        Ok(ServerSettings {
            port,
            fuzzy_threshold,
            backend,
        })
    }

    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        let base = config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("optionk"))
    }

    fn legacy_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".optionk"))
    }

    fn legacy_config_path() -> Option<PathBuf> {
        Self::legacy_dir().map(|dir| dir.join("config.ini"))
    }

    /// Location of the history file kept by older installs.
    pub fn legacy_history_path() -> Option<PathBuf> {
        Self::legacy_dir().map(|dir| dir.join("history"))
    }

    /// Convert the INI file at `legacy` into TOML at `target` when only the
    /// legacy file exists.
    ///
    /// Returns whether a migration happened. The legacy file is left in place.
    pub fn migrate_legacy(target: &Path, legacy: &Path) -> Result<bool, ConfigError> {
        if target.exists() || !legacy.is_file() {
            return Ok(false);
        }

        let content = fs::read_to_string(legacy).map_err(|source| ConfigError::Io {
            path: legacy.to_path_buf(),
            source,
        })?;
        let legacy_err = |message: String| ConfigError::Legacy {
            path: legacy.to_path_buf(),
            message,
        };
        let config = Self::from_ini_str(&content).map_err(legacy_err)?;
        let body = toml::to_string(&config).map_err(|e| legacy_err(e.to_string()))?;

        let io_err = |source| ConfigError::Io {
            path: target.to_path_buf(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let header = format!("# optionk configuration, migrated from {}\n\n", legacy.display());
        fs::write(target, header + &body).map_err(io_err)?;
        info!(
            "Migrated legacy config {} to {}",
            legacy.display(),
            target.display()
        );
        Ok(true)
    }

    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, DEFAULT_TEMPLATE).map_err(io_err)?;
        info!("Wrote default config to: {}", path.display());
        Ok(())
    }

    /// Location of the executed-command history file.
    pub fn history_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::get_config_dir()?.join("history"))
    }
}

fn ini_value(key: &str, raw: &str) -> Result<toml::Value, String> {
    match key {
        "enabled" => match raw.to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "no" | "false" | "off" => Ok(toml::Value::Boolean(false)),
            _ => Err(format!("'{}' is not a boolean", raw)),
        },
        "port" | "fuzzy_threshold" => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|_| format!("'{}' is not a number", raw)),
        _ => Ok(toml::Value::String(raw.to_string())),
    }
}

fn required(
    value: &Option<String>,
    section: &'static str,
    key: &'static str,
) -> Result<String, ConfigError> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingKey { section, key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn studio_config() -> Config {
        Config::from_toml_str(
            r#"
            [optionk]
            port = 9000

            [google_ai_studio]
            enabled = true
            api_key = "key-123"
            model = "gemini-1.5-flash"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_studio_block_selects_studio_backend() {
        let settings = studio_config().server_settings().unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.fuzzy_threshold, DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(
            settings.backend,
            BackendSettings::GoogleAiStudio {
                api_key: "key-123".to_string(),
                model: "gemini-1.5-flash".to_string(),
            }
        );
    }

    #[test]
    fn test_vertex_block_selects_vertex_backend() {
        let config = Config::from_toml_str(
            r#"
            [vertexai]
            enabled = true
            project = "demo"
            location = "europe-west4"
            model = "gemini-1.5-pro"
            "#,
        )
        .unwrap();

        let settings = config.server_settings().unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(matches!(
            settings.backend,
            BackendSettings::Vertex { ref project, ref location, .. }
                if project == "demo" && location == "europe-west4"
        ));
    }

    #[test]
    fn test_no_enabled_backend_is_fatal() {
        let config = Config::from_toml_str("[optionk]\nport = 8089\n").unwrap();
        assert!(matches!(
            config.server_settings(),
            Err(ConfigError::NoBackendEnabled)
        ));
    }

    #[test]
    fn test_both_backends_enabled_is_fatal() {
        let mut config = studio_config();
        config.vertexai.enabled = true;
        assert!(matches!(
            config.server_settings(),
            Err(ConfigError::MultipleBackendsEnabled)
        ));
    }

    #[test]
    fn test_blank_required_key_is_reported() {
        let mut config = studio_config();
        config.google_ai_studio.api_key = Some("   ".to_string());
        assert!(matches!(
            config.server_settings(),
            Err(ConfigError::MissingKey { section: "google_ai_studio", key: "api_key" })
        ));
    }

    #[test]
    fn test_zero_port_is_invalid() {
        let mut config = studio_config();
        config.optionk.port = 0;
        assert!(matches!(config.server_settings(), Err(ConfigError::InvalidPort(0))));
    }

    #[test]
    fn test_threshold_above_100_is_invalid() {
        let mut config = studio_config();
        config.optionk.fuzzy_threshold = Some(120);
        assert!(matches!(
            config.server_settings(),
            Err(ConfigError::InvalidThreshold(120))
        ));
    }

    #[test]
    fn test_overrides_replace_port_and_api_key() {
        let mut config = studio_config();
        config.apply_overrides(|key| match key {
            "OPTIONK_PORT" => Some("7777".to_string()),
            "GOOGLE_API_KEY" => Some("from-env".to_string()),
            _ => None,
        });

        assert_eq!(config.optionk.port, 7777);
        assert_eq!(config.google_ai_studio.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = studio_config();
        config.apply_overrides(|key| (key == "OPTIONK_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.optionk.port, 9000);
    }

    #[test]
    fn test_template_parses_with_no_backend_enabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::write_template(&path).unwrap();
        let config = Config::load_from_path(&path).unwrap();

        assert_eq!(config.optionk.port, DEFAULT_PORT);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert!(matches!(
            config.server_settings(),
            Err(ConfigError::NoBackendEnabled)
        ));
    }

    const LEGACY_INI: &str = "\
[optionk]
port = 1234

; the old client only read the port
[vertexai]
enabled = false

[google_ai_studio]
Enabled = True
api_key: abc:def
model = gemini-1.5-flash
";

    #[test]
    fn test_ini_sections_and_types_are_read() {
        let config = Config::from_ini_str(LEGACY_INI).unwrap();

        assert_eq!(config.optionk.port, 1234);
        assert!(!config.vertexai.enabled);
        assert!(config.google_ai_studio.enabled);
        assert_eq!(config.google_ai_studio.api_key.as_deref(), Some("abc:def"));
        assert_eq!(
            config.server_settings().unwrap().backend,
            BackendSettings::GoogleAiStudio {
                api_key: "abc:def".to_string(),
                model: "gemini-1.5-flash".to_string(),
            }
        );
    }

    #[test]
    fn test_ini_rejects_bad_values() {
        assert!(Config::from_ini_str("[optionk]\nport = eighty\n").is_err());
        assert!(Config::from_ini_str("[vertexai]\nenabled = maybe\n").is_err());
        assert!(Config::from_ini_str("port = 8089\n").is_err());
        assert!(Config::from_ini_str("[optionk]\njust words\n").is_err());
    }

    #[test]
    fn test_migrate_legacy_ini_once() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("config.ini");
        let target = dir.path().join("new").join("config.toml");
        fs::write(&legacy, LEGACY_INI).unwrap();

        assert!(Config::migrate_legacy(&target, &legacy).unwrap());
        let migrated = Config::load_from_path(&target).unwrap();
        assert_eq!(migrated.optionk.port, 1234);
        assert_eq!(migrated.google_ai_studio.api_key.as_deref(), Some("abc:def"));
        assert!(migrated.server_settings().is_ok());

        fs::write(&legacy, "[optionk]\nport = 4321\n").unwrap();
        assert!(!Config::migrate_legacy(&target, &legacy).unwrap());
        assert_eq!(Config::load_from_path(&target).unwrap().optionk.port, 1234);
    }

    #[test]
    fn test_unreadable_legacy_ini_is_reported() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("config.ini");
        let target = dir.path().join("config.toml");
        fs::write(&legacy, "[optionk]\nport = none\n").unwrap();

        assert!(matches!(
            Config::migrate_legacy(&target, &legacy),
            Err(ConfigError::Legacy { .. })
        ));
        assert!(!target.exists());
    }

    #[test]
    fn test_migrate_without_legacy_does_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("config.toml");
        assert!(!Config::migrate_legacy(&target, &dir.path().join("missing.ini")).unwrap());
        assert!(!target.exists());
    }

    #[test]
    fn test_default_load_migrates_legacy_ini() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("config.ini");
        let path = dir.path().join("optionk").join("config.toml");
        fs::write(&legacy, LEGACY_INI).unwrap();

        let config = Config::load_default(&path, Some(&legacy), true).unwrap();

        assert_eq!(config.optionk.port, 1234);
        assert!(!config.freshly_created);
        assert!(path.exists());
    }

    #[test]
    fn test_load_without_template_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("optionk").join("config.toml");

        let config = Config::load_default(&path, None, false).unwrap();

        assert_eq!(config.optionk.port, DEFAULT_PORT);
        assert!(config.source.is_none());
        assert!(!config.freshly_created);
        assert!(!path.exists());
        assert!(!dir.path().join("optionk").exists());
    }

    #[test]
    fn test_load_with_template_writes_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("optionk").join("config.toml");

        let config = Config::load_default(&path, None, true).unwrap();

        assert!(config.freshly_created);
        assert!(path.exists());
    }

    #[test]
    fn test_malformed_file_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[optionk\nport = ").unwrap();

        assert!(matches!(
            Config::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
