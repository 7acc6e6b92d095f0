//! Configuration types.
//!
//! Values are resolved from the process environment first and fall back to a
//! JSON file (`config/core.env.json` by default). The client identity config
//! served to front-ends lives in its own file (`config/firebaseConfig.json`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::email::EmailConfig;
use crate::error::ConfigError;

/// File holding backend settings, relative to the config directory.
pub const CORE_ENV_FILE: &str = "core.env.json";
/// File holding the client identity config, relative to the config directory.
pub const CLIENT_CONFIG_FILE: &str = "firebaseConfig.json";

/// Key listing which settings the public config endpoint may expose.
pub const PUBLIC_ENV_KEY: &str = "FRONTEND_PUBLIC_ENV";

/// Layered key/value lookup: environment snapshot over file contents.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    env: HashMap<String, String>,
    file: Map<String, Value>,
}

impl ConfigSource {
    /// Build a source from explicit layers.
    pub fn new(env: HashMap<String, String>, file: Map<String, Value>) -> Self {
        Self { env, file }
    }

    /// Snapshot the process environment and read `path` as the file layer.
    ///
    /// A missing or malformed file is not fatal: the source then serves
    /// environment values only.
    pub fn load(path: &Path) -> Self {
        let env = std::env::vars().collect();
        let file = match read_json_object(path) {
            Ok(map) => {
                tracing::info!(path = %path.display(), "Config file loaded");
                map
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Config file not found or invalid, using environment variables only"
                );
                Map::new()
            }
        };
        Self { env, file }
    }

    /// Raw lookup. Environment values are returned as JSON strings.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.env.get(key) {
            return Some(Value::String(v.clone()));
        }
        self.file.get(key).cloned()
    }

    /// String lookup. Non-string file values are rendered as JSON.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// List lookup. Accepts a JSON array in the file, or a JSON array or
    /// comma-separated string in the environment.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            Value::String(s) => {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&s) {
                    return Some(
                        items
                            .into_iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect(),
                    );
                }
                Some(
                    s.split(',')
                        .map(|part| part.trim().to_string())
                        .filter(|part| !part.is_empty())
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Parse a value with `FromStr`, returning `InvalidValue` on failure.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_string(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Prefix prepended to every API path, always ending in `/`.
    pub base_path: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Development mode exposes internal error detail and route listings.
    pub dev_mode: bool,
    /// Client identity config served by `config/firebase`.
    pub client_config: Value,
    /// Landing page for password reset links.
    pub password_reset_url: String,
    /// Outbound email settings.
    pub email: EmailConfig,
    /// Layered source for ad-hoc lookups (public config whitelist).
    pub source: ConfigSource,
}

impl AppConfig {
    /// Load from the environment and the config directory
    /// (`ADMIN_KIT_CONFIG_DIR`, default `./config`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var("ADMIN_KIT_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));
        let source = ConfigSource::load(&dir.join(CORE_ENV_FILE));
        let client_config = match read_json_object(&dir.join(CLIENT_CONFIG_FILE)) {
            Ok(map) => Value::Object(map),
            Err(e) => {
                tracing::warn!(error = %e, "Client identity config unavailable");
                Value::Object(Map::new())
            }
        };
        Self::from_source(source, client_config)
    }

    /// Build from an already-resolved source.
    pub fn from_source(source: ConfigSource, client_config: Value) -> Result<Self, ConfigError> {
        let base_path = normalize_base_path(&source.get_string("BASE_PATH").unwrap_or_default());
        let port = source.get_parsed::<u16>("ADMIN_KIT_PORT")?.unwrap_or(8080);
        let dev_mode = source
            .get_string("APP_ENV")
            .or_else(|| source.get_string("NODE_ENV"))
            .is_some_and(|env| env.eq_ignore_ascii_case("development"));
        let password_reset_url = source
            .get_string("PASSWORD_RESET_URL")
            .unwrap_or_else(|| "http://localhost:3000/reset-password".to_string());
        let email = EmailConfig::from_source(&source)?;

        Ok(Self {
            base_path,
            port,
            dev_mode,
            client_config,
            password_reset_url,
            email,
            source,
        })
    }

    /// Collect the whitelisted public settings for `config/core`. Nothing is
    /// exposed when `FRONTEND_PUBLIC_ENV` is unset.
    pub fn public_config(&self) -> Map<String, Value> {
        let keys = self.source.get_list(PUBLIC_ENV_KEY).unwrap_or_default();
        keys.into_iter()
            .map(|key| {
                let value = self.source.get(&key).unwrap_or(Value::Null);
                (key, value)
            })
            .collect()
    }
}

/// Ensure a base path ends with exactly one `/` (empty means root).
pub fn normalize_base_path(raw: &str) -> String {
    if raw.is_empty() {
        "/".to_string()
    } else if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

/// Join `endpoint` onto `base_path`, inserting a separator when missing.
pub fn build_api_url(base_path: &str, endpoint: &str) -> String {
    let base = normalize_base_path(base_path);
    format!("{base}{}", endpoint.trim_start_matches('/'))
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::ParseError {
            path: path.display().to_string(),
            reason: "expected a JSON object".into(),
        }),
        Err(e) => Err(ConfigError::ParseError {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(env: &[(&str, &str)], file: Value) -> ConfigSource {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let file = match file {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ConfigSource::new(env, file)
    }

    #[test]
    fn env_overrides_file() {
        let src = source(&[("SITE", "env")], json!({"SITE": "file", "OTHER": "x"}));
        assert_eq!(src.get_string("SITE").as_deref(), Some("env"));
        assert_eq!(src.get_string("OTHER").as_deref(), Some("x"));
        assert!(src.get("MISSING").is_none());
    }

    #[test]
    fn list_from_file_array_and_env_string() {
        let src = source(&[], json!({"FRONTEND_PUBLIC_ENV": ["A", "B"]}));
        assert_eq!(src.get_list(PUBLIC_ENV_KEY).unwrap(), vec!["A", "B"]);

        let src = source(&[("FRONTEND_PUBLIC_ENV", "A, B ,")], json!({}));
        assert_eq!(src.get_list(PUBLIC_ENV_KEY).unwrap(), vec!["A", "B"]);

        let src = source(&[("FRONTEND_PUBLIC_ENV", r#"["C"]"#)], json!({}));
        assert_eq!(src.get_list(PUBLIC_ENV_KEY).unwrap(), vec!["C"]);
    }

    #[test]
    fn public_config_only_exposes_whitelist() {
        let src = source(
            &[("SENDGRID_API_KEY", "secret")],
            json!({"FRONTEND_PUBLIC_ENV": ["SITE_NAME"], "SITE_NAME": "Admin"}),
        );
        let config = AppConfig::from_source(src, json!({})).unwrap();
        let public = config.public_config();
        assert_eq!(public.len(), 1);
        assert_eq!(public["SITE_NAME"], "Admin");
        assert!(!public.contains_key("SENDGRID_API_KEY"));
    }

    #[test]
    fn public_config_without_whitelist_is_empty() {
        let src = source(&[], json!({"SITE_NAME": "Admin"}));
        let config = AppConfig::from_source(src, json!({})).unwrap();
        assert!(config.public_config().is_empty());

        let src = source(
            &[],
            json!({"FRONTEND_PUBLIC_ENV": ["SITE_NAME", "UNSET"], "SITE_NAME": "Admin"}),
        );
        let config = AppConfig::from_source(src, json!({})).unwrap();
        let public = config.public_config();
        assert_eq!(public["SITE_NAME"], "Admin");
        assert_eq!(public["UNSET"], Value::Null);
    }

    #[test]
    fn dev_mode_and_port() {
        let src = source(&[("APP_ENV", "development"), ("ADMIN_KIT_PORT", "9090")], json!({}));
        let config = AppConfig::from_source(src, json!({})).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.port, 9090);

        let src = source(&[("ADMIN_KIT_PORT", "nope")], json!({}));
        assert!(matches!(
            AppConfig::from_source(src, json!({})),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn api_url_joins_base_path() {
        assert_eq!(build_api_url("", "api/core/user/create"), "/api/core/user/create");
        assert_eq!(build_api_url("/admin", "api/core/x"), "/admin/api/core/x");
        assert_eq!(build_api_url("/admin/", "/api/core/x"), "/admin/api/core/x");
    }

    #[test]
    fn load_reads_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CORE_ENV_FILE);
        std::fs::write(&path, r#"{"ADMIN_KIT_TEST_ONLY_KEY": "from-file"}"#).unwrap();
        let src = ConfigSource::load(&path);
        assert_eq!(
            src.get_string("ADMIN_KIT_TEST_ONLY_KEY").as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn load_tolerates_missing_or_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ConfigSource::load(&dir.path().join("absent.json"));
        assert!(missing.get("ADMIN_KIT_TEST_ONLY_KEY").is_none());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let bad = ConfigSource::load(&path);
        assert!(bad.get("ADMIN_KIT_TEST_ONLY_KEY").is_none());
    }
}
