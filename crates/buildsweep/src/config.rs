use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::cloud::Provider;

// MaintenanceConfig is the one place runtime settings come from.
// It is read from the environment once at startup and never mutated;
// every phase gets a shared read-only handle to it.

pub const DEFAULT_ARCHITECTURES: &[&str] = &["x86_64"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is missing")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Max concurrent requests is 0")]
    ZeroConcurrency,

    #[error("DB maintenance is enabled but no job queue was provided")]
    MissingJobQueue,

    #[error("{slot} cleanup slot is wired to the {got} cleaner")]
    ProviderMismatch { slot: Provider, got: Provider },
}

#[derive(Clone, Debug, Default)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Clone, Debug)]
pub struct PgConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub sslmode: String,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            host: String::new(),
            port: String::new(),
            database: String::new(),
            sslmode: "prefer".to_string(),
        }
    }
}

impl PgConfig {
    /// Typed connect options. Credentials are passed as-is, so passwords with
    /// URL metacharacters need no escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        let port = self.port.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            var: "PGPORT",
            value: self.port.clone(),
        })?;
        let ssl_mode = self
            .sslmode
            .parse::<PgSslMode>()
            .map_err(|_| ConfigError::Invalid {
                var: "PGSSLMODE",
                value: self.sslmode.clone(),
            })?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(ssl_mode))
    }
}

#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    pub dry_run: bool,
    pub max_concurrent_requests: usize,
    pub enable_aws_maintenance: bool,
    pub enable_gcp_maintenance: bool,
    pub enable_db_maintenance: bool,
    pub aws: AwsConfig,
    pub postgres: PgConfig,
    pub architectures: Vec<String>,
    pub migrate_on_startup: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_concurrent_requests: 1,
            enable_aws_maintenance: false,
            enable_gcp_maintenance: false,
            enable_db_maintenance: false,
            aws: AwsConfig::default(),
            postgres: PgConfig::default(),
            architectures: DEFAULT_ARCHITECTURES.iter().map(|a| a.to_string()).collect(),
            migrate_on_startup: false,
        }
    }
}

impl MaintenanceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let dry_run = parse_bool(&get, "DRY_RUN")?.unwrap_or(false);

        let raw = get("MAX_CONCURRENT_REQUESTS").ok_or(ConfigError::Missing("MAX_CONCURRENT_REQUESTS"))?;
        let max_concurrent_requests =
            raw.trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid {
                    var: "MAX_CONCURRENT_REQUESTS",
                    value: raw.clone(),
                })?;

        let enable_aws_maintenance = parse_bool(&get, "ENABLE_AWS_MAINTENANCE")?.unwrap_or(false);
        let enable_gcp_maintenance = parse_bool(&get, "ENABLE_GCP_MAINTENANCE")?.unwrap_or(false);
        let enable_db_maintenance = parse_bool(&get, "ENABLE_DB_MAINTENANCE")?.unwrap_or(false);
        let migrate_on_startup = parse_bool(&get, "MIGRATE_ON_STARTUP")?.unwrap_or(false);

        // credentials are only required for the phases that use them
        let aws = if enable_aws_maintenance {
            AwsConfig {
                access_key_id: required(&get, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: required(&get, "AWS_SECRET_ACCESS_KEY")?,
            }
        } else {
            AwsConfig::default()
        };

        let postgres = if enable_db_maintenance {
            let pg = PgConfig {
                user: required(&get, "PGUSER")?,
                password: required(&get, "PGPASSWORD")?,
                host: required(&get, "PGHOST")?,
                port: required(&get, "PGPORT")?,
                database: required(&get, "PGDATABASE")?,
                sslmode: get("PGSSLMODE").unwrap_or_else(|| "prefer".to_string()),
            };
            pg.connect_options()?;
            pg
        } else {
            PgConfig::default()
        };

        let architectures = match get("MAINTENANCE_ARCHITECTURES") {
            Some(list) => {
                let archs: Vec<String> = list
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                if archs.is_empty() {
                    return Err(ConfigError::Invalid {
                        var: "MAINTENANCE_ARCHITECTURES",
                        value: list,
                    });
                }
                archs
            }
            None => DEFAULT_ARCHITECTURES.iter().map(|a| a.to_string()).collect(),
        };

        let cfg = Self {
            dry_run,
            max_concurrent_requests,
            enable_aws_maintenance,
            enable_gcp_maintenance,
            enable_db_maintenance,
            aws,
            postgres,
            architectures,
            migrate_on_startup,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Migrations change the schema, so a dry run never applies them.
    pub fn runs_migrations(&self) -> bool {
        self.migrate_on_startup && !self.dry_run
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// GCP service-account credentials. Loaded separately from the main config,
/// only when the GCP phase actually runs.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GcpCredentialsConfig {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
}

impl GcpCredentialsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            account_type: get("GCP_TYPE"),
            project_id: get("GCP_PROJECT_ID"),
            private_key_id: get("GCP_PRIVATE_KEY_ID"),
            private_key: get("GCP_PRIVATE_KEY"),
            client_email: get("GCP_CLIENT_EMAIL"),
            client_id: get("GCP_CLIENT_ID"),
            auth_uri: get("GCP_AUTH_URI"),
            token_uri: get("GCP_TOKEN_URI"),
            auth_provider_x509_cert_url: get("GCP_AUTH_PROVIDER_X509_CERT_URL"),
            client_x509_cert_url: get("GCP_CLIENT_X509_CERT_URL"),
        }
    }

    /// All fields must be present for the credentials to be usable.
    pub fn valid(&self) -> bool {
        [
            &self.account_type,
            &self.project_id,
            &self.private_key_id,
            &self.private_key,
            &self.client_email,
            &self.client_id,
            &self.auth_uri,
            &self.token_uri,
            &self.auth_provider_x509_cert_url,
            &self.client_x509_cert_url,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }

    /// Service-account JSON, the form the gcloud tooling reads.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn required<G>(get: &G, key: &'static str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key).ok_or(ConfigError::Missing(key))
}

fn parse_bool<G>(get: &G, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(v) = get(key) else {
        return Ok(None);
    };
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid { var: key, value: v }),
    }
}
