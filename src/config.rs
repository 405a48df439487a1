use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Expose genomes and datasets that are not yet part of a release
    pub allow_unreleased: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub health_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub metadata_uri: String,
    pub taxonomy_uri: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    /// Seconds before a pooled connection is recycled
    pub pool_recycle: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            health_port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            metadata_uri: "mysql://ensembl@localhost:3306/ensembl_genome_metadata".to_string(),
            taxonomy_uri: "mysql://ensembl@localhost:3306/ncbi_taxonomy".to_string(),
            pool_size: 20,
            max_overflow: 0,
            pool_recycle: 50,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, legacy variables, config file and environment
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default().with_legacy_env(|key| std::env::var(key).ok());
        Self::load_over(defaults)
    }

    fn load_over(defaults: AppConfig) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&defaults)?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables with prefix "ENSMETA", e.g. ENSMETA_DATABASE__POOL_SIZE
        config = config.add_source(
            config::Environment::with_prefix("ENSMETA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.database.metadata_uri = normalize_mysql_uri(&app_config.database.metadata_uri);
        app_config.database.taxonomy_uri = normalize_mysql_uri(&app_config.database.taxonomy_uri);

        Ok(app_config)
    }

    /// Apply the unprefixed variables older deployments set (METADATA_URI, POOL_SIZE, ...)
    pub fn with_legacy_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("METADATA_URI") {
            self.database.metadata_uri = uri;
        }
        if let Some(uri) = lookup("TAXONOMY_URI") {
            self.database.taxonomy_uri = uri;
        }
        if let Some(size) = parse_number(&lookup, "POOL_SIZE") {
            self.database.pool_size = size;
        }
        if let Some(overflow) = parse_number(&lookup, "MAX_OVERFLOW") {
            self.database.max_overflow = overflow;
        }
        if let Some(recycle) = parse_number(&lookup, "POOL_RECYCLE") {
            self.database.pool_recycle = recycle;
        }
        if let Some(flag) = lookup("ALLOW_UNRELEASED") {
            self.allow_unreleased = parse_flag(&flag);
        }
        self
    }

    /// Get the gRPC bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the health endpoint bind address
    pub fn health_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.health_port)
    }
}

impl DatabaseConfig {
    /// Upper bound of open connections per pool
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }
}

fn parse_number<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a number");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// SQLAlchemy style URIs name the driver (`mysql+pymysql://`); sqlx only wants the scheme.
fn normalize_mysql_uri(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, rest)) if scheme.starts_with("mysql+") => format!("mysql://{rest}"),
        _ => uri.to_string(),
    }
}
