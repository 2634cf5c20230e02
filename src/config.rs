use crate::db::destination::DatabaseAddress;
use crate::error::LoadError;
use crate::ingest::csv::{Delimiter, ParserOptions};
use crate::source::SourceSpec;
use clap::{ArgAction, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// `gcs` or the path of a local file.
    pub source: String,
    pub bucket: String,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DestinationConfig {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    pub table: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ParserConfig {
    pub delimiter: String, // "comma" or "tab"
    pub lazy_quotes: bool,
    pub trim_leading_space: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: PathBuf,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub parser: ParserConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Source type: gcs or a csv file path
    #[arg(long)]
    pub source: Option<String>,

    /// Cloud Storage bucket name
    #[arg(long)]
    pub bucket: Option<String>,

    /// Cloud Storage object path
    #[arg(long)]
    pub path: Option<String>,

    /// Destination project id
    #[arg(long = "project-id")]
    pub project_id: Option<String>,

    /// Destination instance id
    #[arg(long = "instance-id")]
    pub instance_id: Option<String>,

    /// Destination database id
    #[arg(long = "database-id")]
    pub database_id: Option<String>,

    /// Destination table the file will be loaded into
    #[arg(long)]
    pub table: Option<String>,

    /// Delimiter type: comma or tab
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Tolerate stray quotes in fields
    #[arg(long = "lazyquotes", action = ArgAction::Set)]
    pub lazy_quotes: Option<bool>,

    /// Strip leading whitespace from each field
    #[arg(long = "trimleadingspace", action = ArgAction::Set)]
    pub trim_leading_space: Option<bool>,

    /// Directory holding destination databases
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

/// A validated set of settings for one load.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub source: SourceSpec,
    pub address: DatabaseAddress,
    pub table: String,
    pub parser: ParserOptions,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, LoadError> {
        let mut config_builder = Config::builder();

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "tabload.toml",
                "config/tabload.toml",
                "/etc/tabload/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // e.g. TABLOAD_DESTINATION__TABLE=Singers
        config_builder = config_builder.add_source(
            Environment::with_prefix("TABLOAD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;
        config.apply_args(args);
        Ok(config)
    }

    /// Command line flags win over file and environment settings.
    pub fn apply_args(&mut self, args: &CliArgs) {
        let overrides = [
            (&args.source, &mut self.source.source),
            (&args.bucket, &mut self.source.bucket),
            (&args.path, &mut self.source.path),
            (&args.project_id, &mut self.destination.project_id),
            (&args.instance_id, &mut self.destination.instance_id),
            (&args.database_id, &mut self.destination.database_id),
            (&args.table, &mut self.destination.table),
            (&args.delimiter, &mut self.parser.delimiter),
        ];
        for (arg, field) in overrides {
            if let Some(value) = arg {
                *field = value.clone();
            }
        }

        if let Some(lazy_quotes) = args.lazy_quotes {
            self.parser.lazy_quotes = lazy_quotes;
        }
        if let Some(trim_leading_space) = args.trim_leading_space {
            self.parser.trim_leading_space = trim_leading_space;
        }
        if let Some(data_dir) = &args.data_dir {
            self.database.data_dir = data_dir.clone();
        }
    }

    /// Checks required settings in a fixed order, failing on the first gap.
    pub fn plan(&self) -> Result<RunPlan, LoadError> {
        let required = |value: &str, message: &str| {
            if value.is_empty() {
                Err(LoadError::config(message))
            } else {
                Ok(value.to_string())
            }
        };

        let source = required(&self.source.source, "source is not set")?;
        let project = required(&self.destination.project_id, "project-id is not set")?;
        let instance = required(&self.destination.instance_id, "instance-id is not set")?;
        let database = required(&self.destination.database_id, "database-id is not set")?;
        let table = required(&self.destination.table, "table is not set")?;
        let delimiter: Delimiter = self.parser.delimiter.parse()?;

        let source = if source == "gcs" {
            SourceSpec::Gcs {
                bucket: required(&self.source.bucket, "bucket is not set")?,
                path: required(&self.source.path, "path is not set")?,
            }
        } else {
            SourceSpec::File(PathBuf::from(source))
        };

        Ok(RunPlan {
            source,
            address: DatabaseAddress {
                project,
                instance,
                database,
            },
            table,
            parser: ParserOptions {
                delimiter,
                lazy_quotes: self.parser.lazy_quotes,
                trim_leading_space: self.parser.trim_leading_space,
            },
            storage: self.storage.clone(),
            database: self.database.clone(),
        })
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source: "gcs".to_string(),
            bucket: String::new(),
            path: String::new(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: "comma".to_string(),
            lazy_quotes: true,
            trim_leading_space: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.googleapis.com".to_string(),
            access_token: None,
            timeout_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pool_size: 1,
            connect_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn config_with(source: &str, bucket: &str, path: &str, ids: [&str; 4], delimiter: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.source = SourceConfig {
            source: source.into(),
            bucket: bucket.into(),
            path: path.into(),
        };
        config.destination = DestinationConfig {
            project_id: ids[0].into(),
            instance_id: ids[1].into(),
            database_id: ids[2].into(),
            table: ids[3].into(),
        };
        config.parser.delimiter = delimiter.into();
        config
    }

    fn plan_error(config: AppConfig) -> String {
        let err = config.plan().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        err.to_string()
    }

    #[test]
    fn test_required_settings_in_order() {
        let cases = [
            (config_with("", "", "", ["", "", "", ""], ""), "source is not set"),
            (config_with("gcs", "", "", ["", "", "", ""], ""), "project-id is not set"),
            (config_with("gcs", "", "", ["project", "", "", ""], ""), "instance-id is not set"),
            (
                config_with("gcs", "", "", ["project", "instance", "", ""], ""),
                "database-id is not set",
            ),
            (
                config_with("gcs", "", "", ["project", "instance", "database", ""], ""),
                "table is not set",
            ),
            (
                config_with("gcs", "", "", ["project", "instance", "database", "table"], ""),
                "invalid delimiter type. You can only use: comma or tab",
            ),
            (
                config_with("gcs", "", "", ["project", "instance", "database", "table"], "comma"),
                "bucket is not set",
            ),
            (
                config_with("gcs", "test", "", ["project", "instance", "database", "table"], "comma"),
                "path is not set",
            ),
        ];

        for (config, expected) in cases {
            assert_eq!(plan_error(config), expected);
        }
    }

    #[test]
    fn test_plan_for_gcs_source() {
        let config = config_with("gcs", "bucket", "dir/data.csv", ["p", "i", "d", "t"], "tab");
        let plan = config.plan().unwrap();

        assert_eq!(
            plan.source,
            SourceSpec::Gcs {
                bucket: "bucket".into(),
                path: "dir/data.csv".into()
            }
        );
        assert_eq!(plan.address.to_string(), "projects/p/instances/i/databases/d");
        assert_eq!(plan.table, "t");
        assert_eq!(plan.parser.delimiter, Delimiter::Tab);
        assert!(plan.parser.lazy_quotes);
        assert!(plan.parser.trim_leading_space);
    }

    #[test]
    fn test_plan_for_local_file_ignores_bucket() {
        let config = config_with("data/example.csv", "", "", ["p", "i", "d", "t"], "comma");
        let plan = config.plan().unwrap();
        assert_eq!(plan.source, SourceSpec::File(PathBuf::from("data/example.csv")));
    }

    #[test]
    fn test_args_override_defaults() {
        let mut config = AppConfig::default();
        let args = CliArgs::parse_from([
            "tabload",
            "--source",
            "input.tsv",
            "--project-id",
            "p",
            "--instance-id",
            "i",
            "--database-id",
            "d",
            "--table",
            "t",
            "--delimiter",
            "tab",
            "--lazyquotes",
            "false",
            "--data-dir",
            "/tmp/tabload",
        ]);
        config.apply_args(&args);

        assert_eq!(config.source.source, "input.tsv");
        assert_eq!(config.destination.table, "t");
        assert_eq!(config.parser.delimiter, "tab");
        assert!(!config.parser.lazy_quotes);
        assert!(config.parser.trim_leading_space);
        assert_eq!(config.database.data_dir, PathBuf::from("/tmp/tabload"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tabload.toml");
        std::fs::write(
            &path,
            r#"
[source]
source = "gcs"
bucket = "bucket"
path = "data.csv"

[destination]
project_id = "p"
instance_id = "i"
database_id = "d"
table = "Testing"

[parser]
delimiter = "tab"
"#,
        )
        .unwrap();

        let args = CliArgs {
            config: Some(path),
            table: Some("Override".to_string()),
            ..CliArgs::default()
        };
        let config = AppConfig::new(&args).unwrap();

        assert_eq!(config.source.bucket, "bucket");
        assert_eq!(config.destination.table, "Override");
        assert_eq!(config.parser.delimiter, "tab");
        assert!(config.parser.lazy_quotes);
        assert_eq!(config.storage.endpoint, "https://storage.googleapis.com");
    }
}
