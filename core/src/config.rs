use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::DEFAULT_MAX_QUEUE_SIZE;
use crate::errors::ConfigError;
use crate::upsert::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub database: DbConfig,
    pub batch: BatchConfig,
    pub run: RunConfig,
}

/// Connection settings for the destination database.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "argon_db".to_string(),
            user: "argon_user".to_string(),
            password: "somepassword".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_queue_size: usize,
    pub chunk_size: usize,
    pub mode: WriteMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: WriteMode::Batched,
        }
    }
}

/// How decomposed rows reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Dependent rows go through the batch queue.
    #[default]
    Batched,
    /// Every row is written as soon as it is produced.
    Direct,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Drop and recreate every destination table before ingesting.
    pub init_schema: bool,
    pub dead_letter_dir: Option<PathBuf>,
    /// Write to an in-memory store instead of the database.
    pub dry_run: bool,
}

pub async fn load_config(config_path: Option<&str>) -> anyhow::Result<IngestConfig> {
    let mut config = match config_path {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::from_env()?,
    };
    config.database = config.database.with_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

impl IngestConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })?;
        let config: IngestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reads YAML from `INGEST_CONFIG`; defaults when the variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("INGEST_CONFIG") {
            Ok(config_str) => {
                let config: IngestConfig = serde_yaml::from_str(&config_str)?;
                Ok(config)
            }
            Err(_) => Ok(IngestConfig::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_queue_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "batch.max_queue_size must be greater than zero".to_string(),
            });
        }
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "batch.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.database.dbname.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "database.dbname cannot be empty".to_string(),
            });
        }
        if self.database.host.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "database.host cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl DbConfig {
    /// Defaults overridden by `DBHOST`, `DBPORT`, `DBNAME`, `DBUSER` and
    /// `DBPASSWORD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        DbConfig::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("DBHOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DBPORT") {
            self.port = port.parse().map_err(|_| ConfigError::Invalid {
                message: format!("DBPORT is not a valid port: {port:?}"),
            })?;
        }
        if let Some(dbname) = lookup("DBNAME") {
            self.dbname = dbname;
        }
        if let Some(user) = lookup("DBUSER") {
            self.user = user;
        }
        if let Some(password) = lookup("DBPASSWORD") {
            self.password = password;
        }
        Ok(self)
    }

    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database:
  host: db.internal
  dbname: trials
batch:
  max_queue_size: 50
  mode: direct
run:
  init_schema: true
  dead_letter_dir: /var/lib/ctgov/dead-letter
"#
        )
        .unwrap();

        let config = IngestConfig::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.dbname, "trials");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "argon_user");
        assert_eq!(config.batch.max_queue_size, 50);
        assert_eq!(config.batch.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.batch.mode, WriteMode::Direct);
        assert!(config.run.init_schema);
        assert!(!config.run.dry_run);
        assert_eq!(
            config.run.dead_letter_dir,
            Some(PathBuf::from("/var/lib/ctgov/dead-letter"))
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.batch.max_queue_size, 300);
        assert_eq!(config.batch.chunk_size, 100);
        assert_eq!(config.batch.mode, WriteMode::Batched);
        assert_eq!(config.database.dbname, "argon_db");
        assert!(config.run.dead_letter_dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = IngestConfig::from_file("/nonexistent/ingest.yaml").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut config = IngestConfig::default();
        config.batch.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationFailed { .. })));

        let mut config = IngestConfig::default();
        config.batch.max_queue_size = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.database.dbname.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DBHOST", "pg.example.org"),
            ("DBPORT", "6543"),
            ("DBPASSWORD", "s3cret"),
        ]);
        let db = DbConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(db.host, "pg.example.org");
        assert_eq!(db.port, 6543);
        assert_eq!(db.password, "s3cret");
        assert_eq!(db.dbname, "argon_db");
    }

    #[test]
    fn test_bad_port_override() {
        let err = DbConfig::default()
            .with_overrides(|key| (key == "DBPORT").then(|| "fifty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DBPORT"));
    }
}
