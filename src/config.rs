//! Process configuration read from the environment.
//!
//! Values come from real environment variables (optionally seeded from a `.env`
//! file by `dotenvy` in `main`). Nothing here is global: callers build a
//! [`Config`] once at startup and pass it down.

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
pub const DEFAULT_LOG_FILTER: &str = "info";

pub static GOOGLE_TOKEN_URI: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://oauth2.googleapis.com/token").expect("valid fixed GOOGLE_TOKEN_URI")
});

pub static SECRET_MANAGER_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://secretmanager.googleapis.com/").expect("valid fixed SECRET_MANAGER_URL")
});

pub static SQLADMIN_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://sqladmin.googleapis.com/").expect("valid fixed SQLADMIN_URL")
});

/// Environment variables the loader looks at. Anything else is ignored.
const ENV_KEYS: [&str; 12] = [
    "DB_USER",
    "DB_NAME",
    "DB_SECRET_ID",
    "DB_CONN_NAME",
    "DB_HOST",
    "DB_PORT",
    "PORT",
    "DB_ACQUIRE_TIMEOUT_SECS",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "GCE_METADATA_HOST",
    "SECRET_MANAGER_ENDPOINT",
    "SQLADMIN_ENDPOINT",
];

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("both DB_CONN_NAME and DB_HOST are set; pick the connector or the local proxy")]
    AmbiguousTarget,

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration value: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Where the database lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    /// Cloud SQL instance `PROJECT:REGION:INSTANCE`, reached over its private IP.
    CloudSql { connection_name: String },
    /// A local proxy already forwarding to the database.
    Proxy { host: String, port: u16 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_user: String,
    pub db_name: String,
    pub db_secret_id: String,
    pub target: DbTarget,
    pub port: u16,
    pub acquire_timeout: Duration,
    /// `authorized_user` credentials file; the metadata server is used when absent.
    pub credentials_file: Option<PathBuf>,
    pub metadata_host: String,
    pub secret_manager_endpoint: Url,
    pub sqladmin_endpoint: Url,
}

/// Every key is kept as text; numbers and URLs are parsed after the
/// presence check so `DB_NAME=2024` stays a name and `PORT=` means "unset".
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    db_user: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_secret_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_conn_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_host: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_port: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    port: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    db_acquire_timeout_secs: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    google_application_credentials: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    gce_metadata_host: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    secret_manager_endpoint: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    sqladmin_endpoint: Option<String>,
}

impl Config {
    /// Read the process environment. Values are handed to figment as raw
    /// strings so nothing is reinterpreted before validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: BTreeMap<String, String> = Env::raw()
            .only(&ENV_KEYS)
            .iter()
            .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
            .collect();
        Self::from_figment(Figment::from(Serialized::defaults(vars)))
    }

    /// Extract and validate from any figment. Keys are the lowercased variable names.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawConfig = figment.extract().map_err(Box::new)?;

        let mut missing = Vec::new();
        let db_user = present(raw.db_user);
        let db_name = present(raw.db_name);
        let db_secret_id = present(raw.db_secret_id);
        if db_user.is_none() {
            missing.push("DB_USER");
        }
        if db_name.is_none() {
            missing.push("DB_NAME");
        }
        if db_secret_id.is_none() {
            missing.push("DB_SECRET_ID");
        }

        let target = match (present(raw.db_conn_name), present(raw.db_host)) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousTarget),
            (Some(connection_name), None) => Some(DbTarget::CloudSql { connection_name }),
            (None, Some(host)) => match parse_value::<u16>("DB_PORT", raw.db_port)? {
                Some(port) => Some(DbTarget::Proxy { host, port }),
                None => {
                    missing.push("DB_PORT");
                    None
                }
            },
            (None, None) => {
                missing.push("DB_CONN_NAME (or DB_HOST and DB_PORT)");
                None
            }
        };

        let (Some(db_user), Some(db_name), Some(db_secret_id), Some(target)) =
            (db_user, db_name, db_secret_id, target)
        else {
            return Err(ConfigError::Missing(missing));
        };

        Ok(Self {
            db_user,
            db_name,
            db_secret_id,
            target,
            port: parse_value("PORT", raw.port)?.unwrap_or(DEFAULT_PORT),
            acquire_timeout: Duration::from_secs(
                parse_value("DB_ACQUIRE_TIMEOUT_SECS", raw.db_acquire_timeout_secs)?
                    .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            ),
            credentials_file: present(raw.google_application_credentials).map(PathBuf::from),
            metadata_host: present(raw.gce_metadata_host)
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
            secret_manager_endpoint: parse_value(
                "SECRET_MANAGER_ENDPOINT",
                raw.secret_manager_endpoint,
            )?
            .unwrap_or_else(|| SECRET_MANAGER_URL.clone()),
            sqladmin_endpoint: parse_value("SQLADMIN_ENDPOINT", raw.sqladmin_endpoint)?
                .unwrap_or_else(|| SQLADMIN_URL.clone()),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Parse an optional value; empty counts as unset.
fn parse_value<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    present(value)
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value: v.clone(),
            })
        })
        .transpose()
}

/// Accept any scalar a provider hands over and keep it as text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        UInt(u64),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Str(s) => s,
        Scalar::UInt(n) => n.to_string(),
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn base() -> Figment {
        Figment::new()
            .merge(Serialized::default("db_user", "app-user"))
            .merge(Serialized::default("db_name", "products-db"))
            .merge(Serialized::default(
                "db_secret_id",
                "projects/demo/secrets/db-pass/versions/latest",
            ))
    }

    #[test]
    fn empty_figment_reports_every_missing_variable() {
        let err = Config::from_figment(Figment::new()).unwrap_err();
        match err {
            ConfigError::Missing(vars) => assert_eq!(
                vars,
                vec![
                    "DB_USER",
                    "DB_NAME",
                    "DB_SECRET_ID",
                    "DB_CONN_NAME (or DB_HOST and DB_PORT)"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let figment = base()
            .merge(Serialized::default("db_user", ""))
            .merge(Serialized::default("db_conn_name", "demo:europe-west3:db"));
        let err = Config::from_figment(figment).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required environment variables: DB_USER"
        );
    }

    #[test]
    fn connection_name_selects_cloud_sql_and_port_defaults() {
        let figment = base().merge(Serialized::default("db_conn_name", "demo:europe-west3:db"));
        let cfg = Config::from_figment(figment).expect("valid config");
        assert_eq!(
            cfg.target,
            DbTarget::CloudSql {
                connection_name: "demo:europe-west3:db".to_string()
            }
        );
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.listen_addr().port(), 8080);
        assert_eq!(cfg.acquire_timeout, Duration::from_secs(30));
        assert_eq!(cfg.metadata_host, DEFAULT_METADATA_HOST);
        assert_eq!(cfg.secret_manager_endpoint, *SECRET_MANAGER_URL);
        assert!(cfg.credentials_file.is_none());
    }

    #[test]
    fn host_without_port_is_missing_db_port() {
        let figment = base().merge(Serialized::default("db_host", "127.0.0.1"));
        let err = Config::from_figment(figment).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref v) if v == &vec!["DB_PORT"]));
    }

    #[test]
    fn both_targets_are_rejected() {
        let figment = base()
            .merge(Serialized::default("db_conn_name", "demo:europe-west3:db"))
            .merge(Serialized::default("db_host", "127.0.0.1"))
            .merge(Serialized::default("db_port", 5432));
        assert!(matches!(
            Config::from_figment(figment),
            Err(ConfigError::AmbiguousTarget)
        ));
    }

    #[test]
    fn reads_proxy_variant_from_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "app-user");
            jail.set_env("DB_NAME", "products-db");
            jail.set_env("DB_SECRET_ID", "projects/demo/secrets/db-pass");
            jail.set_env("DB_HOST", "127.0.0.1");
            jail.set_env("DB_PORT", 5432);
            jail.set_env("PORT", 9090);
            jail.set_env("DB_ACQUIRE_TIMEOUT_SECS", 3);

            let cfg = Config::from_env().expect("valid env config");
            assert_eq!(
                cfg.target,
                DbTarget::Proxy {
                    host: "127.0.0.1".to_string(),
                    port: 5432
                }
            );
            assert_eq!(cfg.port, 9090);
            assert_eq!(cfg.acquire_timeout, Duration::from_secs(3));
            Ok(())
        });
    }

    #[test]
    fn non_numeric_port_is_invalid() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "app-user");
            jail.set_env("DB_NAME", "products-db");
            jail.set_env("DB_SECRET_ID", "projects/demo/secrets/db-pass");
            jail.set_env("DB_CONN_NAME", "demo:europe-west3:db");
            jail.set_env("PORT", "eighty");

            assert!(matches!(
                Config::from_env(),
                Err(ConfigError::InvalidValue { key: "PORT", .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn numeric_looking_values_stay_strings() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "12345");
            jail.set_env("DB_NAME", "2024");
            jail.set_env("DB_SECRET_ID", "projects/123/secrets/007");
            jail.set_env("DB_CONN_NAME", "demo:europe-west3:db");

            let cfg = Config::from_env().expect("numeric strings are valid values");
            assert_eq!(cfg.db_user, "12345");
            assert_eq!(cfg.db_name, "2024");
            assert_eq!(cfg.db_secret_id, "projects/123/secrets/007");
            Ok(())
        });
    }

    #[test]
    fn leading_zeros_are_preserved() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "app-user");
            jail.set_env("DB_NAME", "007");
            jail.set_env("DB_SECRET_ID", "projects/demo/secrets/db-pass");
            jail.set_env("DB_CONN_NAME", "demo:europe-west3:db");

            assert_eq!(Config::from_env().expect("valid").db_name, "007");
            Ok(())
        });
    }

    #[test]
    fn empty_port_values_count_as_unset() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "app-user");
            jail.set_env("DB_NAME", "products-db");
            jail.set_env("DB_SECRET_ID", "projects/demo/secrets/db-pass");
            jail.set_env("DB_CONN_NAME", "demo:europe-west3:db");
            jail.set_env("PORT", "");
            jail.set_env("DB_PORT", "");
            jail.set_env("DB_ACQUIRE_TIMEOUT_SECS", "");

            let cfg = Config::from_env().expect("empty optional values are ignored");
            assert_eq!(cfg.port, DEFAULT_PORT);
            assert_eq!(
                cfg.acquire_timeout,
                Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS)
            );
            Ok(())
        });
    }

    #[test]
    fn empty_db_port_with_host_is_missing() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_USER", "app-user");
            jail.set_env("DB_NAME", "products-db");
            jail.set_env("DB_SECRET_ID", "projects/demo/secrets/db-pass");
            jail.set_env("DB_HOST", "127.0.0.1");
            jail.set_env("DB_PORT", "");

            match Config::from_env() {
                Err(ConfigError::Missing(vars)) => assert_eq!(vars, vec!["DB_PORT"]),
                other => panic!("unexpected result: {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn numeric_port_from_serialized_provider_is_accepted() {
        let figment = base()
            .merge(Serialized::default("db_host", "127.0.0.1"))
            .merge(Serialized::default("db_port", 6543))
            .merge(Serialized::default("port", 9000));
        let cfg = Config::from_figment(figment).expect("valid config");
        assert_eq!(
            cfg.target,
            DbTarget::Proxy {
                host: "127.0.0.1".to_string(),
                port: 6543
            }
        );
        assert_eq!(cfg.port, 9000);
    }
}
