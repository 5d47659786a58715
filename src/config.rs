use crate::error::ConfigError;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BATCH_SIZE: usize = 3_000_000;
pub const DEFAULT_DELIMITER: char = ';';
pub const DEFAULT_ARTIFACT_COLUMN: &str = "Unnamed: 16";
pub const DEFAULT_OUTPUT_DIR: &str = "./batches";

fn lookup_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn lookup_parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

/// Parse a delimiter given as a single character.
pub fn parse_delimiter(value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::InvalidValue {
            key: "delimiter",
            value: value.to_string(),
        }),
    }
}

/// Accepts `identifier` or `schema.identifier` made of plain, unquoted SQL identifiers.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }

    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        }
    })
}

/// Connection settings for the target PostgreSQL server.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return url.parse::<PgConnectOptions>().map_err(|_| ConfigError::InvalidValue {
                key: "DATABASE_URL",
                value: "<redacted>".to_string(),
            });
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

/// Everything a single run needs.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub table: String,
    pub batch_size: usize,
    pub delimiter: char,
    pub artifact_column: String,
    /// Stop after writing batch files.
    pub dry_run: bool,
    pub database: DatabaseConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            table: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: DEFAULT_DELIMITER,
            artifact_column: DEFAULT_ARTIFACT_COLUMN.to_string(),
            dry_run: false,
            database: DatabaseConfig::default(),
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, using the same keys as `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = LoaderConfig::default();
        let db_defaults = DatabaseConfig::default();

        let delimiter = match lookup("CSVLOAD_DELIMITER").filter(|value| !value.is_empty()) {
            Some(value) => parse_delimiter(&value)?,
            None => defaults.delimiter,
        };

        let database = DatabaseConfig {
            host: lookup_string(&lookup, "PGHOST", &db_defaults.host),
            port: lookup_parse(&lookup, "PGPORT", db_defaults.port)?,
            database: lookup_string(&lookup, "PGDATABASE", &db_defaults.database),
            user: lookup_string(&lookup, "PGUSER", &db_defaults.user),
            password: lookup("PGPASSWORD"),
            url: lookup("DATABASE_URL").filter(|value| !value.trim().is_empty()),
        };

        Ok(Self {
            input: lookup("CSVLOAD_INPUT").map(PathBuf::from).unwrap_or_default(),
            output_dir: PathBuf::from(lookup_string(&lookup, "CSVLOAD_OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
            table: lookup_string(&lookup, "CSVLOAD_TABLE", ""),
            batch_size: lookup_parse(&lookup, "CSVLOAD_BATCH_SIZE", defaults.batch_size)?,
            delimiter,
            artifact_column: lookup_string(&lookup, "CSVLOAD_ARTIFACT_COLUMN", DEFAULT_ARTIFACT_COLUMN),
            dry_run: false,
            database,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError::Missing("input path"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\r' | '\n') {
            return Err(ConfigError::InvalidDelimiter(self.delimiter));
        }
        if !self.dry_run {
            if self.table.is_empty() {
                return Err(ConfigError::Missing("table name"));
            }
            if !is_valid_table_name(&self.table) {
                return Err(ConfigError::InvalidTable(self.table.clone()));
            }
        }
        Ok(())
    }

    /// The delimiter as the single byte the CSV reader and writer expect.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = LoaderConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.batch_size, 3_000_000);
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.artifact_column, "Unnamed: 16");
        assert_eq!(config.output_dir, PathBuf::from("./batches"));
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert!(config.database.password.is_none());
    }

    #[test]
    fn environment_keys_are_read() {
        let config = LoaderConfig::from_lookup(lookup_from(&[
            ("CSVLOAD_INPUT", "data/input.csv"),
            ("CSVLOAD_TABLE", "staging.sales"),
            ("CSVLOAD_BATCH_SIZE", "500"),
            ("CSVLOAD_DELIMITER", ","),
            ("PGHOST", "db.internal"),
            ("PGPORT", "6543"),
            ("PGPASSWORD", "secret"),
        ]))
        .expect("config");

        assert_eq!(config.input, PathBuf::from("data/input.csv"));
        assert_eq!(config.table, "staging.sales");
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.password.as_deref(), Some("secret"));
        config.validate().expect("valid config");
    }

    #[test]
    fn unparsable_batch_size_is_rejected() {
        let err = LoaderConfig::from_lookup(lookup_from(&[("CSVLOAD_BATCH_SIZE", "lots")]))
            .expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "CSVLOAD_BATCH_SIZE", .. }
        ));
    }

    #[test]
    fn validate_rejects_bad_options() {
        let base = LoaderConfig {
            input: PathBuf::from("in.csv"),
            table: "tabela".to_string(),
            ..LoaderConfig::default()
        };
        base.validate().expect("base config is valid");

        let zero = LoaderConfig { batch_size: 0, ..base.clone() };
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroBatchSize)));

        let quote = LoaderConfig { delimiter: '"', ..base.clone() };
        assert!(matches!(quote.validate(), Err(ConfigError::InvalidDelimiter('"'))));

        let table = LoaderConfig { table: "users; DROP TABLE x".to_string(), ..base.clone() };
        assert!(matches!(table.validate(), Err(ConfigError::InvalidTable(_))));

        let no_input = LoaderConfig { input: PathBuf::new(), ..base.clone() };
        assert!(matches!(no_input.validate(), Err(ConfigError::Missing(_))));

        let dry_run_without_table = LoaderConfig {
            table: String::new(),
            dry_run: true,
            ..base
        };
        dry_run_without_table.validate().expect("table not needed for dry run");
    }

    #[test]
    fn table_names() {
        assert!(is_valid_table_name("tabela"));
        assert!(is_valid_table_name("public.sales_2024"));
        assert!(is_valid_table_name("_tmp$1"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("a.b.c"));
        assert!(!is_valid_table_name("1table"));
        assert!(!is_valid_table_name("sales."));
        assert!(!is_valid_table_name("\"Quoted\""));
    }

    #[test]
    fn delimiter_must_be_one_character() {
        assert_eq!(parse_delimiter(";").expect("ok"), ';');
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn database_url_takes_precedence() {
        let db = DatabaseConfig {
            url: Some("postgres://loader:pw@example.org:6000/warehouse".to_string()),
            ..DatabaseConfig::default()
        };
        let options = db.connect_options().expect("url parses");
        assert_eq!(options.get_host(), "example.org");
        assert_eq!(options.get_port(), 6000);
        assert_eq!(options.get_database(), Some("warehouse"));
        assert_eq!(options.get_username(), "loader");
    }
}
