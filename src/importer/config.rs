// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::utils::{validate_certificate_file, validate_feed_url, ChecksumType};

/// A single importer configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Str(s) => f.write_str(s),
            ConfigValue::List(items) => {
                let items = items.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(value: Vec<&str>) -> Self {
        ConfigValue::List(value.into_iter().map(ConfigValue::from).collect())
    }
}

impl TryFrom<toml::Value> for ConfigValue {
    type Error = anyhow::Error;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            toml::Value::String(s) => ConfigValue::Str(s),
            toml::Value::Integer(i) => ConfigValue::Int(i),
            toml::Value::Float(x) => ConfigValue::Float(x),
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Datetime(dt) => ConfigValue::Str(dt.to_string()),
            toml::Value::Array(items) => ConfigValue::List(
                items.into_iter().map(ConfigValue::try_from).collect::<anyhow::Result<_>>()?,
            ),
            toml::Value::Table(_) => {
                return Err(anyhow::anyhow!("Importer configuration values must not be tables"));
            }
        })
    }
}

/// Flat key/value importer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImporterConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl ImporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ConfigValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// String entries of a list value; non-string entries are dropped
    pub fn get_list(&self, key: &str) -> Option<Vec<&str>> {
        match self.get(key)? {
            ConfigValue::List(items) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        ConfigValue::Str(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn feed_url(&self) -> Option<&str> {
        self.get_str(FEED_URL)
    }

    pub fn skip_content_types(&self) -> Vec<String> {
        self.get_list("skip_content_types")
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn purge_orphaned(&self) -> bool {
        self.get_bool("purge_orphaned").unwrap_or(true)
    }

    pub fn ssl_verify(&self) -> bool {
        self.get_bool("ssl_verify").unwrap_or(true)
    }

    pub fn checksum_type(&self) -> Option<ChecksumType> {
        self.get_str("checksum_type").and_then(|s| s.parse().ok())
    }
}

impl TryFrom<toml::Table> for ImporterConfig {
    type Error = anyhow::Error;

    fn try_from(table: toml::Table) -> Result<Self, Self::Error> {
        let mut values = BTreeMap::new();
        for (key, value) in table {
            let value = ConfigValue::try_from(value)
                .map_err(|e| anyhow::anyhow!("Importer configuration key '{}': {}", key, e))?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }
}

impl FromIterator<(String, ConfigValue)> for ImporterConfig {
    fn from_iter<T: IntoIterator<Item = (String, ConfigValue)>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// A configuration rejected by `validate`. The `Display` text is what the host shows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    #[error("Configuration key '{0}' is not supported")]
    UnsupportedKey(String),

    #[error("{key} should be a boolean; got {value} instead")]
    NotBoolean { key: String, value: String },

    #[error("{key} should be an integer; got {value} instead")]
    NotInteger { key: String, value: String },

    #[error("{key} should be a port number between 1 and 65535; got {value} instead")]
    InvalidPort { key: String, value: String },

    #[error("{key} should be a string; got {value} instead")]
    NotString { key: String, value: String },

    #[error("{key} [{value}] does not start with a valid protocol")]
    InvalidUrl { key: String, value: String },

    #[error("Invalid proxy url: {0}")]
    InvalidProxyUrl(String),

    #[error("{key} is not a valid certificate")]
    InvalidCertificate { key: String },

    #[error("{0} is not a valid checksum type")]
    InvalidChecksumType(String),

    #[error("{key} should be a list of strings; got {value} instead")]
    NotStringList { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Boolean,
    Integer,
    Port,
    Text,
    Url,
    ProxyUrl,
    Certificate,
    Checksum,
    StringList,
}

pub const FEED_URL: &str = "feed_url";

const REQUIRED_KEYS: &[(&str, Rule)] = &[(FEED_URL, Rule::Url)];

const OPTIONAL_KEYS: &[(&str, Rule)] = &[
    ("ssl_verify", Rule::Boolean),
    ("ssl_ca_cert", Rule::Certificate),
    ("ssl_client_cert", Rule::Certificate),
    ("ssl_client_key", Rule::Text),
    ("proxy_url", Rule::ProxyUrl),
    ("proxy_port", Rule::Port),
    ("proxy_pass", Rule::Text),
    ("proxy_user", Rule::Text),
    ("max_speed", Rule::Integer),
    ("verify_size", Rule::Boolean),
    ("verify_checksum", Rule::Boolean),
    ("num_threads", Rule::Integer),
    ("newest", Rule::Boolean),
    ("remove_old", Rule::Boolean),
    ("num_old_packages", Rule::Integer),
    ("purge_orphaned", Rule::Boolean),
    ("skip_content_types", Rule::StringList),
    ("checksum_type", Rule::Checksum),
];

fn rule_for(key: &str) -> Option<Rule> {
    REQUIRED_KEYS
        .iter()
        .chain(OPTIONAL_KEYS)
        .find(|(known, _)| *known == key)
        .map(|(_, rule)| *rule)
}

/// Check an importer configuration against the schema.
///
/// Returns the first violation: each required key must be present and valid,
/// then unsupported keys are rejected, then optional keys are checked in
/// schema order. Only the certificate rule touches the filesystem.
pub fn validate(config: &ImporterConfig) -> Result<(), ConfigError> {
    for (key, rule) in REQUIRED_KEYS {
        match config.get(key) {
            Some(value) => check_rule(key, *rule, value)?,
            None => return Err(ConfigError::MissingKey(key.to_string())),
        }
    }

    if let Some(key) = config.keys().find(|key| rule_for(key).is_none()) {
        return Err(ConfigError::UnsupportedKey(key.to_string()));
    }

    for (key, rule) in OPTIONAL_KEYS {
        if let Some(value) = config.get(key) {
            check_rule(key, *rule, value)?;
        }
    }

    Ok(())
}

fn check_rule(key: &str, rule: Rule, value: &ConfigValue) -> Result<(), ConfigError> {
    let key_owned = || key.to_string();
    let shown = || value.to_string();

    match (rule, value) {
        (Rule::Boolean, ConfigValue::Bool(_)) => Ok(()),
        (Rule::Boolean, _) => Err(ConfigError::NotBoolean { key: key_owned(), value: shown() }),

        (Rule::Integer, ConfigValue::Int(_)) => Ok(()),
        (Rule::Integer, _) => Err(ConfigError::NotInteger { key: key_owned(), value: shown() }),

        (Rule::Port, ConfigValue::Int(port)) if (1..=65535).contains(port) => Ok(()),
        (Rule::Port, ConfigValue::Int(_)) => Err(ConfigError::InvalidPort { key: key_owned(), value: shown() }),
        (Rule::Port, _) => Err(ConfigError::NotInteger { key: key_owned(), value: shown() }),

        (Rule::Text, ConfigValue::Str(_)) => Ok(()),
        (Rule::Text, _) => Err(ConfigError::NotString { key: key_owned(), value: shown() }),

        (Rule::Url, ConfigValue::Str(url)) => match validate_feed_url(url) {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(key, error = %e, "URL rejected");
                Err(ConfigError::InvalidUrl { key: key_owned(), value: shown() })
            }
        },
        (Rule::Url, _) => Err(ConfigError::InvalidUrl { key: key_owned(), value: shown() }),

        (Rule::ProxyUrl, ConfigValue::Str(url)) if validate_feed_url(url).is_ok() => Ok(()),
        (Rule::ProxyUrl, _) => Err(ConfigError::InvalidProxyUrl(shown())),

        (Rule::Certificate, ConfigValue::Str(path)) => match validate_certificate_file(Path::new(path)) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(key, error = %format!("{:#}", e), "Certificate rejected");
                Err(ConfigError::InvalidCertificate { key: key_owned() })
            }
        },
        (Rule::Certificate, _) => Err(ConfigError::InvalidCertificate { key: key_owned() }),

        (Rule::Checksum, ConfigValue::Str(kind)) if kind.parse::<ChecksumType>().is_ok() => Ok(()),
        (Rule::Checksum, _) => Err(ConfigError::InvalidChecksumType(shown())),

        (Rule::StringList, ConfigValue::List(items))
            if items.iter().all(|item| matches!(item, ConfigValue::Str(_))) => Ok(()),
        (Rule::StringList, _) => Err(ConfigError::NotStringList { key: key_owned(), value: shown() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal() -> ImporterConfig {
        ImporterConfig::new().with("feed_url", "https://x/repo")
    }

    fn pem_file() -> NamedTempFile {
        let certified = rcgen::generate_simple_self_signed(vec!["cdn.example.com".to_string()]).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(certified.cert.pem().as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert_eq!(validate(&minimal()), Ok(()));
    }

    #[test]
    fn test_feed_url_with_verify_checksum_is_valid() {
        let config = minimal().with("verify_checksum", true);
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn test_every_optional_key_valid() {
        let ca = pem_file();
        let client = pem_file();
        let config = minimal()
            .with("ssl_verify", true)
            .with("ssl_ca_cert", ca.path().to_str().unwrap())
            .with("ssl_client_cert", client.path().to_str().unwrap())
            .with("ssl_client_key", "/etc/pki/client.key")
            .with("proxy_url", "http://proxy.example.com")
            .with("proxy_port", 3128)
            .with("proxy_user", "admin")
            .with("proxy_pass", "secret")
            .with("max_speed", 1000)
            .with("verify_size", false)
            .with("verify_checksum", true)
            .with("num_threads", 5)
            .with("newest", false)
            .with("remove_old", true)
            .with("num_old_packages", 2)
            .with("purge_orphaned", true)
            .with("skip_content_types", vec!["drpm", "distribution"])
            .with("checksum_type", "sha256");
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn test_missing_feed_url() {
        let config = ImporterConfig::new().with("ssl_verify", true);
        let err = validate(&config).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("feed_url".to_string()));
        assert!(err.to_string().contains("feed_url"));
    }

    #[test]
    fn test_missing_key_wins_over_rule_errors() {
        let config = ImporterConfig::new()
            .with("num_threads", "many")
            .with("bogus", 1);
        assert_eq!(validate(&config), Err(ConfigError::MissingKey("feed_url".to_string())));
    }

    #[test]
    fn test_unsupported_key() {
        let config = minimal().with("mirror_list", "http://x");
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "Configuration key 'mirror_list' is not supported");
    }

    #[test]
    fn test_invalid_feed_protocol() {
        let config = ImporterConfig::new().with("feed_url", "ftpx://a");
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "feed_url [ftpx://a] does not start with a valid protocol");
    }

    #[test]
    fn test_feed_url_must_be_string() {
        let config = ImporterConfig::new().with("feed_url", 12);
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_feed_protocol_wins_over_unsupported_key() {
        let config = ImporterConfig::new()
            .with("feed_url", "ftpx://a")
            .with("bogus", 1);
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "feed_url [ftpx://a] does not start with a valid protocol");
    }

    #[test]
    fn test_unsupported_key_wins_over_optional_rules() {
        let config = minimal()
            .with("num_threads", "many")
            .with("bogus", 1);
        assert_eq!(validate(&config), Err(ConfigError::UnsupportedKey("bogus".to_string())));
    }

    #[test]
    fn test_invalid_proxy_url() {
        let config = minimal().with("proxy_url", "proxy.example.com");
        let err = validate(&config).unwrap_err();
        assert_eq!(err, ConfigError::InvalidProxyUrl("proxy.example.com".to_string()));
        assert_eq!(err.to_string(), "Invalid proxy url: proxy.example.com");

        assert_eq!(validate(&minimal().with("proxy_url", "http://proxy.example.com")), Ok(()));
    }

    #[test]
    fn test_boolean_keys() {
        for key in ["ssl_verify", "verify_size", "verify_checksum", "newest", "remove_old", "purge_orphaned"] {
            let config = minimal().with(key, "yes");
            let err = validate(&config).unwrap_err();
            assert_eq!(err.to_string(), format!("{} should be a boolean; got yes instead", key));
        }
    }

    #[test]
    fn test_integer_keys() {
        for key in ["max_speed", "num_threads", "num_old_packages"] {
            let config = minimal().with(key, "fast");
            let err = validate(&config).unwrap_err();
            assert_eq!(err.to_string(), format!("{} should be an integer; got fast instead", key));
        }
    }

    #[test]
    fn test_proxy_port_accepts_integer() {
        assert_eq!(validate(&minimal().with("proxy_port", 8080)), Ok(()));
        assert!(matches!(validate(&minimal().with("proxy_port", 0)), Err(ConfigError::InvalidPort { .. })));
        assert!(matches!(validate(&minimal().with("proxy_port", "8080")), Err(ConfigError::NotInteger { .. })));
    }

    #[test]
    fn test_invalid_certificate() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----\nnope\n-----END CERTIFICATE-----\n").unwrap();
        let config = minimal().with("ssl_ca_cert", file.path().to_str().unwrap());
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "ssl_ca_cert is not a valid certificate");
    }

    #[test]
    fn test_missing_certificate_file() {
        let config = minimal().with("ssl_client_cert", "/nonexistent/client.pem");
        assert_eq!(
            validate(&config),
            Err(ConfigError::InvalidCertificate { key: "ssl_client_cert".to_string() })
        );
    }

    #[test]
    fn test_checksum_type() {
        assert_eq!(validate(&minimal().with("checksum_type", "sha1")), Ok(()));
        let err = validate(&minimal().with("checksum_type", "crc32")).unwrap_err();
        assert_eq!(err.to_string(), "crc32 is not a valid checksum type");
    }

    #[test]
    fn test_skip_content_types_must_be_string_list() {
        assert!(matches!(
            validate(&minimal().with("skip_content_types", "errata")),
            Err(ConfigError::NotStringList { .. })
        ));
        let mixed = ConfigValue::List(vec![ConfigValue::from("rpm"), ConfigValue::Int(3)]);
        let err = validate(&minimal().with("skip_content_types", mixed)).unwrap_err();
        assert_eq!(err.to_string(), "skip_content_types should be a list of strings; got [rpm, 3] instead");
    }

    #[test]
    fn test_rules_follow_schema_order() {
        // checksum_type comes after num_threads in the schema, regardless of key names
        let config = minimal()
            .with("checksum_type", "crc32")
            .with("num_threads", "x");
        assert!(matches!(validate(&config), Err(ConfigError::NotInteger { key, .. }) if key == "num_threads"));
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let config = minimal().with("num_threads", "x");
        let before = config.clone();
        let _ = validate(&config);
        assert_eq!(config, before);
    }

    #[test]
    fn test_accessors() {
        let config = minimal()
            .with("skip_content_types", vec!["errata"])
            .with("ssl_verify", false)
            .with("num_threads", 4)
            .with("checksum_type", "sha256");
        assert_eq!(config.feed_url(), Some("https://x/repo"));
        assert_eq!(config.skip_content_types(), vec!["errata".to_string()]);
        assert!(!config.ssl_verify());
        assert!(config.purge_orphaned());
        assert_eq!(config.get_int("num_threads"), Some(4));
        assert_eq!(config.get_bool("num_threads"), None);
        assert_eq!(config.checksum_type(), Some(ChecksumType::Sha256));
    }

    #[test]
    fn test_from_toml_table() {
        let table: toml::Table = toml::from_str(
            r#"
feed_url = "https://x/repo"
verify_checksum = true
num_threads = 3
skip_content_types = ["drpm"]
"#,
        )
        .unwrap();
        let config = ImporterConfig::try_from(table).unwrap();
        assert_eq!(config.get_bool("verify_checksum"), Some(true));
        assert_eq!(config.get_int("num_threads"), Some(3));
        assert_eq!(config.get_list("skip_content_types"), Some(vec!["drpm"]));
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn test_from_toml_rejects_nested_table() {
        let table: toml::Table = toml::from_str("feed_url = \"https://x\"\n[proxy]\nurl = \"http://p\"\n").unwrap();
        assert!(ImporterConfig::try_from(table).is_err());
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: ImporterConfig =
            serde_json::from_str(r#"{"feed_url": "https://x/repo", "verify_checksum": true, "num_threads": 2}"#).unwrap();
        assert_eq!(config.get_bool("verify_checksum"), Some(true));
        assert_eq!(config.get_int("num_threads"), Some(2));
    }
}
