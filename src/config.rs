//! Process configuration, read from the environment at cold start.

use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log aggregators.
    Json,
}

/// Settings for the ambient parts of a function: currently logging.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// An `EnvFilter` directive, such as `info` or `lambstack=debug,warn`.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Reads `LOG_LEVEL` and `LOG_FORMAT` (`text` or `json`). Unset variables
    /// keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            config.log_format = if v.eq_ignore_ascii_case("json") { LogFormat::Json } else { LogFormat::Text };
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_variables() {
        let config = Config::from_lookup(|key| match key {
            "LOG_LEVEL" => Some("debug".into()),
            "LOG_FORMAT" => Some("JSON".into()),
            _ => None,
        });
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_format_is_text() {
        let config = Config::from_lookup(|key| (key == "LOG_FORMAT").then(|| "yaml".into()));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn deserializes_camel_case() {
        let config: Config = serde_json::from_str(r#"{ "logFormat": "json" }"#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info");
    }
}
