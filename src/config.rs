use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use lettre::Address;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::SENDER_DOMAIN;
use crate::types::OrderBook;

/// Config file name, resolved relative to the user's home directory.
pub const CONFIG_FILE_NAME: &str = ".quadriga-bot";

/// Default config file path (`~/.quadriga-bot`), if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// Errors raised while loading or validating the config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing config key \"{field}\"")]
    MissingField { field: &'static str },

    #[error("invalid value for \"{field}\": {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Validated bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Order book to poll.
    pub order_book: OrderBook,
    /// Path on the QuadrigaCX website linked from alert emails.
    pub url_path: String,
    /// Price move that triggers an alert immediately.
    pub price_delta: f64,
    /// Pause between polls.
    pub poll_wait: Duration,
    pub sender_email: String,
    pub sender_password: SecretString,
    pub to_emails: Vec<String>,
    /// Timezone used to render timestamps in alert emails.
    pub timezone: Tz,
    /// Deadline for a single ticker request.
    pub timeout: Duration,
    /// After this long without an alert, any price move triggers one.
    pub max_idle: Duration,
    /// Number of polls before the ticker client is rebuilt.
    pub process_ttl: u64,
}

/// On-disk shape of the config file.
///
/// Absent keys take their default; keys explicitly set to `null` deserialize
/// to `None` and are rejected as missing.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_order_book")]
    order_book: Option<Value>,
    #[serde(default = "default_url_path")]
    url_path: Option<Value>,
    #[serde(default = "default_price_delta", alias = "max_delta")]
    price_delta: Option<Value>,
    #[serde(default = "default_poll_wait", alias = "sleep")]
    poll_wait: Option<Value>,
    #[serde(default)]
    sender_email: Option<Value>,
    #[serde(default)]
    sender_password: Option<Value>,
    #[serde(default)]
    to_emails: Option<Value>,
    #[serde(default = "default_timezone")]
    timezone: Option<Value>,
    #[serde(default = "default_timeout")]
    timeout: Option<Value>,
    #[serde(default = "default_max_idle")]
    max_idle: Option<Value>,
    #[serde(default = "default_process_ttl")]
    process_ttl: Option<Value>,
}

/// Current key names and the older names still accepted for them.
const KEY_ALIASES: [(&str, &str); 2] = [("price_delta", "max_delta"), ("poll_wait", "sleep")];

fn default_order_book() -> Option<Value> {
    Some(Value::from("eth_cad"))
}

fn default_url_path() -> Option<Value> {
    Some(Value::from("/trade/eth/cad"))
}

fn default_price_delta() -> Option<Value> {
    Some(Value::from(2))
}

fn default_poll_wait() -> Option<Value> {
    Some(Value::from(5))
}

fn default_timezone() -> Option<Value> {
    Some(Value::from("Canada/Pacific"))
}

fn default_timeout() -> Option<Value> {
    Some(Value::from(10))
}

fn default_max_idle() -> Option<Value> {
    Some(Value::from(3600 * 12))
}

fn default_process_ttl() -> Option<Value> {
    Some(Value::from(10_000))
}

impl Config {
    /// Load and validate config from the given JSON file path.
    ///
    /// Safe to call repeatedly; every call returns a fresh record.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate config from a JSON document.
    ///
    /// The document must be a JSON object; arrays and scalars are parse errors.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let parse_err = |source: serde_json::Error| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        };
        let map: Map<String, Value> = serde_json::from_str(contents).map_err(parse_err)?;
        for (key, alias) in KEY_ALIASES {
            if map.contains_key(key) && map.contains_key(alias) {
                let reason = format!("set either \"{key}\" or \"{alias}\", not both");
                return Err(invalid(key, reason));
            }
        }
        let raw = RawConfig::deserialize(Value::Object(map)).map_err(parse_err)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let order_book = required_str("order_book", raw.order_book)?
            .parse::<OrderBook>()
            .map_err(|reason| invalid("order_book", reason))?;

        let url_path = required_str("url_path", raw.url_path)?;

        let sender_email = required_str("sender_email", raw.sender_email)?;
        if !sender_email.to_ascii_lowercase().ends_with(SENDER_DOMAIN) {
            return Err(invalid(
                "sender_email",
                format!("only {SENDER_DOMAIN} is supported for bot email"),
            ));
        }
        if let Err(e) = sender_email.parse::<Address>() {
            return Err(invalid("sender_email", format!("invalid address: {e}")));
        }

        let sender_password = required_str("sender_password", raw.sender_password)?;
        if sender_password.is_empty() {
            return Err(invalid("sender_password", "must not be empty"));
        }

        let to_emails = match required("to_emails", raw.to_emails)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => {
                        let addr = s.trim();
                        match addr.parse::<Address>() {
                            Ok(_) => Ok(addr.to_string()),
                            Err(e) => Err(invalid(
                                "to_emails",
                                format!("invalid address \"{addr}\": {e}"),
                            )),
                        }
                    }
                    other => Err(invalid(
                        "to_emails",
                        format!("not an email address: {other}"),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(invalid(
                    "to_emails",
                    format!("not a list of email addresses: {other}"),
                ));
            }
        };
        if to_emails.is_empty() {
            return Err(invalid("to_emails", "must list at least one recipient"));
        }

        let timezone_name = required_str("timezone", raw.timezone)?;
        let timezone = timezone_name.parse::<Tz>().map_err(|_| {
            invalid("timezone", format!("unknown timezone \"{timezone_name}\""))
        })?;

        let price_delta = positive_number("price_delta", raw.price_delta)?;
        let poll_wait = positive_integer("poll_wait", raw.poll_wait)?;
        let timeout = positive_integer("timeout", raw.timeout)?;
        let max_idle = positive_integer("max_idle", raw.max_idle)?;
        let process_ttl = positive_integer("process_ttl", raw.process_ttl)?;

        Ok(Self {
            order_book,
            url_path,
            price_delta,
            poll_wait: Duration::from_secs(poll_wait),
            sender_email,
            sender_password: SecretString::new(sender_password),
            to_emails,
            timezone,
            timeout: Duration::from_secs(timeout),
            max_idle: Duration::from_secs(max_idle),
            process_ttl,
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn required(field: &'static str, value: Option<Value>) -> Result<Value, ConfigError> {
    match value {
        None | Some(Value::Null) => Err(ConfigError::MissingField { field }),
        Some(v) => Ok(v),
    }
}

fn required_str(field: &'static str, value: Option<Value>) -> Result<String, ConfigError> {
    match required(field, value)? {
        Value::String(s) => Ok(s),
        other => Err(invalid(field, format!("expected a string, got {other}"))),
    }
}

/// Coerce a JSON value to a float. Numbers and numeric strings are accepted.
fn as_number(field: &'static str, value: &Value) -> Result<f64, ConfigError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(field, format!("non-numeric value: {value}")))
}

fn positive_number(field: &'static str, value: Option<Value>) -> Result<f64, ConfigError> {
    let n = as_number(field, &required(field, value)?)?;
    if n <= 0.0 {
        return Err(invalid(field, format!("must be greater than zero, got {n}")));
    }
    Ok(n)
}

/// Coerce a JSON value to a whole number of seconds (or polls).
///
/// Integers and integer strings are accepted as-is; fractional numbers are
/// truncated toward zero.
fn positive_integer(field: &'static str, value: Option<Value>) -> Result<u64, ConfigError> {
    let value = required(field, value)?;
    let n = match &value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => as_number(field, &value)?.trunc() as i64,
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(field, format!("non-numeric value: {value}")))?,
        _ => return Err(invalid(field, format!("non-numeric value: {value}"))),
    };
    if n <= 0 {
        return Err(invalid(field, format!("must be greater than zero, got {n}")));
    }
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::io::Write;

    fn base() -> Value {
        json!({
            "sender_email": "bot@gmail.com",
            "sender_password": "hunter2",
            "to_emails": ["alice@example.com", "bob@example.com"]
        })
    }

    fn with(key: &str, value: Value) -> String {
        let mut doc = base();
        doc[key] = value;
        doc.to_string()
    }

    fn without(key: &str) -> String {
        let mut doc = base();
        doc.as_object_mut().unwrap().remove(key);
        doc.to_string()
    }

    fn assert_invalid(result: Result<Config, ConfigError>, expected: &str) {
        match result {
            Err(ConfigError::InvalidValue { field, .. }) if field == expected => {}
            Err(err) => panic!("Expected invalid {expected}, got {err}"),
            Ok(_) => panic!("Expected invalid {expected} to be rejected"),
        }
    }

    // ── defaults ───────────────────────────────────────────────────

    #[test]
    fn minimal_config_takes_defaults() {
        let config = Config::from_json(&base().to_string()).unwrap();
        assert_eq!(config.order_book, OrderBook::EthCad);
        assert_eq!(config.url_path, "/trade/eth/cad");
        assert_eq!(config.price_delta, 2.0);
        assert_eq!(config.poll_wait, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_idle, Duration::from_secs(43_200));
        assert_eq!(config.process_ttl, 10_000);
        assert_eq!(config.timezone, chrono_tz::Canada::Pacific);
        assert_eq!(config.sender_password.expose_secret(), "hunter2");
        assert_eq!(config.to_emails.len(), 2);
    }

    #[test]
    fn full_config_overrides_defaults() {
        let doc = json!({
            "order_book": "btc_usd",
            "url_path": "/trade/btc/usd",
            "price_delta": 50.5,
            "poll_wait": 30,
            "sender_email": "Bot@Gmail.com",
            "sender_password": "pw",
            "to_emails": ["a@example.com"],
            "timezone": "America/Toronto",
            "timeout": "15",
            "max_idle": 600,
            "process_ttl": 100
        });
        let config = Config::from_json(&doc.to_string()).unwrap();
        assert_eq!(config.order_book, OrderBook::BtcUsd);
        assert_eq!(config.price_delta, 50.5);
        assert_eq!(config.poll_wait, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_idle, Duration::from_secs(600));
        assert_eq!(config.process_ttl, 100);
        assert_eq!(config.timezone, chrono_tz::America::Toronto);
    }

    #[test]
    fn legacy_key_names_are_accepted() {
        let mut doc = base();
        doc["max_delta"] = json!(7);
        doc["sleep"] = json!(12);
        let config = Config::from_json(&doc.to_string()).unwrap();
        assert_eq!(config.price_delta, 7.0);
        assert_eq!(config.poll_wait, Duration::from_secs(12));
    }

    #[test]
    fn fractional_seconds_truncate() {
        let config = Config::from_json(&with("poll_wait", json!(7.9))).unwrap();
        assert_eq!(config.poll_wait, Duration::from_secs(7));
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = Config::from_json(&base().to_string()).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    // ── missing keys ───────────────────────────────────────────────

    #[test]
    fn rejects_missing_credentials() {
        for key in ["sender_email", "sender_password", "to_emails"] {
            assert!(
                matches!(
                    Config::from_json(&without(key)),
                    Err(ConfigError::MissingField { field }) if field == key
                ),
                "Expected missing {key} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_explicit_null_even_with_default() {
        assert!(matches!(
            Config::from_json(&with("timeout", Value::Null)),
            Err(ConfigError::MissingField { field: "timeout" })
        ));
    }

    // ── invalid values ─────────────────────────────────────────────

    #[test]
    fn rejects_unknown_order_book() {
        assert_invalid(Config::from_json(&with("order_book", json!("doge_cad"))), "order_book");
    }

    #[test]
    fn rejects_non_gmail_sender() {
        assert_invalid(
            Config::from_json(&with("sender_email", json!("bot@example.com"))),
            "sender_email",
        );
    }

    #[test]
    fn rejects_bad_recipient_lists() {
        assert_invalid(Config::from_json(&with("to_emails", json!("a@example.com"))), "to_emails");
        assert_invalid(Config::from_json(&with("to_emails", json!([]))), "to_emails");
        assert_invalid(Config::from_json(&with("to_emails", json!(["a@example.com", 3]))), "to_emails");
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert_invalid(Config::from_json(&with("max_idle", json!("forever"))), "max_idle");
        assert_invalid(Config::from_json(&with("poll_wait", json!([5]))), "poll_wait");
        assert_invalid(Config::from_json(&with("price_delta", json!("two"))), "price_delta");
        assert_invalid(Config::from_json(&with("process_ttl", json!(true))), "process_ttl");
    }

    #[test]
    fn rejects_non_positive_fields() {
        assert_invalid(Config::from_json(&with("price_delta", json!(0))), "price_delta");
        assert_invalid(Config::from_json(&with("timeout", json!(-1))), "timeout");
        assert_invalid(Config::from_json(&with("poll_wait", json!(0.5))), "poll_wait");
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert_invalid(Config::from_json(&with("timezone", json!("Mars/Olympus"))), "timezone");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::from_json("[1, 2, 3]"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::from_json("\"eth_cad\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_positional_array_config() {
        let doc = r#"["eth_cad","/trade/eth/cad",2,5,"bot@gmail.com","pw",["a@example.com"]]"#;
        assert!(matches!(
            Config::from_json(doc),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_key_and_legacy_alias_together() {
        let mut doc = base();
        doc["price_delta"] = json!(2);
        doc["max_delta"] = json!(3);
        match Config::from_json(&doc.to_string()) {
            Err(ConfigError::InvalidValue { field: "price_delta", reason }) => {
                assert!(reason.contains("max_delta"), "{reason}");
            }
            other => panic!("Expected conflicting keys to be rejected, got {other:?}"),
        }

        let mut doc = base();
        doc["poll_wait"] = json!(5);
        doc["sleep"] = json!(5);
        assert_invalid(Config::from_json(&doc.to_string()), "poll_wait");
    }

    #[test]
    fn rejects_sender_without_local_part() {
        assert_invalid(
            Config::from_json(&with("sender_email", json!("@gmail.com"))),
            "sender_email",
        );
    }

    #[test]
    fn rejects_malformed_recipient() {
        assert_invalid(
            Config::from_json(&with("to_emails", json!(["alice@example.com", "bob"]))),
            "to_emails",
        );
    }

    // ── files ──────────────────────────────────────────────────────

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", base()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sender_email, "bot@gmail.com");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        match Config::load(&path) {
            Err(ConfigError::Read { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected read error, got {other:?}"),
        }
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{").unwrap();
        match Config::load(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }
}
