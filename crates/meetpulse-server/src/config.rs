use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use meetpulse_core::identity::IdentitySettings;

/// Secrets that ship in sample configs and must never sign real sessions.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-in-production", "dev-secret-change-me"];

const DEFAULT_FROM_EMAIL: &str = "MeetPulse <onboarding@resend.dev>";

const MAX_CODE_TTL_SECS: i64 = 24 * 3600;
const MAX_SESSION_TTL_HOURS: i64 = 366 * 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MEETPULSE_SECRET_KEY is unset or still a placeholder")]
    MissingSecret,

    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be between 1 and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        max: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailProvider {
    Resend { api_key: String },
    Brevo { api_key: String },
    /// No provider configured: codes are written to the log.
    LogOnly,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub secret_key: String,
    pub code_ttl: Duration,
    pub session_ttl: Duration,
    pub auto_approve: bool,
    pub email: EmailProvider,
    pub from_email: String,
    /// Origins allowed to call the API with credentials. Empty means
    /// same-origin only.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let secret_key = get("MEETPULSE_SECRET_KEY")
            .filter(|s| !PLACEHOLDER_SECRETS.contains(s))
            .ok_or(ConfigError::MissingSecret)?
            .to_string();

        let email = match (get("RESEND_API_KEY"), get("BREVO_API_KEY")) {
            (Some(key), _) => EmailProvider::Resend {
                api_key: key.to_string(),
            },
            (None, Some(key)) => EmailProvider::Brevo {
                api_key: key.to_string(),
            },
            (None, None) => EmailProvider::LogOnly,
        };

        Ok(Self {
            host: get("MEETPULSE_HOST").unwrap_or("0.0.0.0").to_string(),
            port: number(get("MEETPULSE_PORT"), "MEETPULSE_PORT", 8000)?,
            db_path: get("MEETPULSE_DB_PATH").unwrap_or("meetpulse.db").into(),
            secret_key,
            code_ttl: ttl(
                get("MEETPULSE_CODE_TTL_SECS"),
                "MEETPULSE_CODE_TTL_SECS",
                900,
                MAX_CODE_TTL_SECS,
                Duration::try_seconds,
            )?,
            session_ttl: ttl(
                get("MEETPULSE_SESSION_TTL_HOURS"),
                "MEETPULSE_SESSION_TTL_HOURS",
                168,
                MAX_SESSION_TTL_HOURS,
                Duration::try_hours,
            )?,
            auto_approve: get("MEETPULSE_AUTO_APPROVE") == Some("1"),
            email,
            from_email: get("FROM_EMAIL").unwrap_or(DEFAULT_FROM_EMAIL).to_string(),
            allowed_origins: get("MEETPULSE_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn identity_settings(&self) -> IdentitySettings {
        IdentitySettings {
            code_ttl: self.code_ttl,
            session_ttl: self.session_ttl,
            auto_approve: self.auto_approve,
        }
    }
}

fn number<T: std::str::FromStr>(
    raw: Option<&str>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        }),
    }
}

/// Parse a positive, bounded lifetime in the units `make` expects.
fn ttl(
    raw: Option<&str>,
    key: &'static str,
    default: i64,
    max: i64,
    make: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    let value: i64 = number(raw, key, default)?;
    if !(1..=max).contains(&value) {
        return Err(ConfigError::OutOfRange { key, value, max });
    }
    make(value).ok_or(ConfigError::OutOfRange { key, value, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_vars(&vars(&[("MEETPULSE_SECRET_KEY", "s3cret")])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("meetpulse.db"));
        assert_eq!(config.code_ttl, Duration::seconds(900));
        assert_eq!(config.session_ttl, Duration::hours(168));
        assert!(!config.auto_approve);
        assert_eq!(config.email, EmailProvider::LogOnly);
        assert_eq!(config.from_email, DEFAULT_FROM_EMAIL);
        assert!(config.allowed_origins.is_empty());

        let settings = config.identity_settings();
        assert_eq!(settings.session_ttl, Duration::days(7));
        assert_eq!(settings.code_ttl, Duration::minutes(15));
    }

    #[test]
    fn secret_is_required_and_placeholders_rejected() {
        assert!(matches!(
            Config::from_vars(&HashMap::new()),
            Err(ConfigError::MissingSecret)
        ));
        for placeholder in PLACEHOLDER_SECRETS {
            assert!(matches!(
                Config::from_vars(&vars(&[("MEETPULSE_SECRET_KEY", placeholder)])),
                Err(ConfigError::MissingSecret)
            ));
        }
    }

    #[test]
    fn resend_wins_over_brevo() {
        let config = Config::from_vars(&vars(&[
            ("MEETPULSE_SECRET_KEY", "s3cret"),
            ("RESEND_API_KEY", "re_123"),
            ("BREVO_API_KEY", "xkeysib"),
        ]))
        .unwrap();
        assert_eq!(
            config.email,
            EmailProvider::Resend {
                api_key: "re_123".into()
            }
        );

        let config = Config::from_vars(&vars(&[
            ("MEETPULSE_SECRET_KEY", "s3cret"),
            ("BREVO_API_KEY", "xkeysib"),
        ]))
        .unwrap();
        assert_eq!(
            config.email,
            EmailProvider::Brevo {
                api_key: "xkeysib".into()
            }
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_vars(&vars(&[
            ("MEETPULSE_SECRET_KEY", "s3cret"),
            ("MEETPULSE_PORT", "9090"),
            ("MEETPULSE_AUTO_APPROVE", "1"),
            ("MEETPULSE_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert!(config.auto_approve);
        assert_eq!(
            config.allowed_origins,
            ["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn bad_number_is_reported() {
        let err = Config::from_vars(&vars(&[
            ("MEETPULSE_SECRET_KEY", "s3cret"),
            ("MEETPULSE_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "MEETPULSE_PORT must be a number, got \"eighty\"");
    }

    #[test]
    fn lifetimes_must_be_positive_and_bounded() {
        for (key, value) in [
            ("MEETPULSE_SESSION_TTL_HOURS", "99999999999999"),
            ("MEETPULSE_SESSION_TTL_HOURS", "0"),
            ("MEETPULSE_CODE_TTL_SECS", "-5"),
            ("MEETPULSE_CODE_TTL_SECS", "86401"),
        ] {
            let err = Config::from_vars(&vars(&[("MEETPULSE_SECRET_KEY", "s3cret"), (key, value)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { key: k, .. } if k == key),
                "{key}={value}: {err}"
            );
        }

        let config = Config::from_vars(&vars(&[
            ("MEETPULSE_SECRET_KEY", "s3cret"),
            ("MEETPULSE_SESSION_TTL_HOURS", "24"),
        ]))
        .unwrap();
        assert_eq!(config.identity_settings().session_ttl, Duration::days(1));
    }
}
