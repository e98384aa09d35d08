use cv_ingest_core::object_keys::DEFAULT_REPORT_PREFIX;
use thiserror::Error;

use crate::handlers::ingest::HandlerConfig;

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read once per cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub database_url: String,
    pub report_bucket: Option<String>,
    pub report_prefix: String,
    pub archive_uploads: bool,
    pub db_max_connections: u32,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let database_url = value("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let archive_uploads = match value("ARCHIVE_UPLOADS") {
            None => false,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "ARCHIVE_UPLOADS",
                        value: raw,
                    })
                }
            },
        };

        let db_max_connections = match value("DB_MAX_CONNECTIONS") {
            None => DEFAULT_DB_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(count) if count > 0 => count,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DB_MAX_CONNECTIONS",
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            database_url,
            report_bucket: value("REPORT_BUCKET"),
            report_prefix: value("REPORT_PREFIX")
                .unwrap_or_else(|| DEFAULT_REPORT_PREFIX.to_string()),
            archive_uploads,
            db_max_connections,
        })
    }

    pub fn handler_config(&self, run_date: impl Into<String>) -> HandlerConfig {
        HandlerConfig {
            report_bucket: self.report_bucket.clone(),
            report_prefix: self.report_prefix.clone(),
            archive_uploads: self.archive_uploads,
            run_date: run_date.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn applies_defaults_when_only_database_url_is_set() {
        let config = IngestConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/cv",
        )]))
        .expect("config should load");

        assert_eq!(config.report_bucket, None);
        assert_eq!(config.report_prefix, "ingestion");
        assert!(!config.archive_uploads);
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    }

    #[test]
    fn missing_database_url_names_the_variable() {
        let error = IngestConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")]))
            .expect_err("blank url should fail");

        assert_eq!(error.to_string(), "DATABASE_URL must be configured");
    }

    #[test]
    fn rejects_unparseable_flags_and_counts() {
        let error = IngestConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/cv"),
            ("ARCHIVE_UPLOADS", "sometimes"),
        ]))
        .expect_err("flag should fail");
        assert_eq!(
            error,
            ConfigError::Invalid {
                name: "ARCHIVE_UPLOADS",
                value: "sometimes".to_string()
            }
        );

        let error = IngestConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/cv"),
            ("DB_MAX_CONNECTIONS", "0"),
        ]))
        .expect_err("zero connections should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                ..
            }
        ));
    }

    #[test]
    fn handler_config_carries_run_date_and_report_settings() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/cv"),
            ("REPORT_BUCKET", "cv-reports"),
            ("REPORT_PREFIX", "audit/"),
            ("ARCHIVE_UPLOADS", "TRUE"),
        ]))
        .expect("config should load");

        let handler_config = config.handler_config("2026-10-16");
        assert_eq!(handler_config.report_bucket.as_deref(), Some("cv-reports"));
        assert_eq!(handler_config.report_prefix, "audit/");
        assert!(handler_config.archive_uploads);
        assert_eq!(handler_config.run_date, "2026-10-16");
    }
}
