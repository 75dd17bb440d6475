//! Configuration files for elb-tagger.

use std::{
    env::home_dir,
    path::{Path, PathBuf},
    str::FromStr,
};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use crate::tags::TagPolicy;
use crate::{Error, Result};

/// Default configuration file name, relative to home.
static DEFAULT_CONFIG_FILE: &str = ".config/elb-tagger.toml";

/// Configuration for elb-tagger.
///
/// This is by default read from `~/.config/elb-tagger.toml`, or from the file
/// specified by `--config`. Every key is optional; the builtin defaults match
/// the fleet conventions this tool was written for.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct Config {
    /// The AWS region to operate in. When unset the default provider chain
    /// decides.
    pub region: Option<String>,

    /// Tag keys that every load balancer must carry.
    pub global_tag_keys: Option<Vec<String>>,

    /// Key prefixes owned by the platform, never written by this tool.
    pub reserved_tag_prefixes: Option<Vec<String>>,

    /// Exact tag keys treated as operational noise.
    pub ignored_tag_keys: Option<Vec<String>>,
}

impl Config {
    /// Load from a file, or load from the default location, or use builtin defaults.
    pub fn new(config_path: &Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = config_path {
            Self::from_file(config_path)
        } else {
            let default_path = home_dir()
                .expect("Couldn't determine home dir")
                .join(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                Self::from_file(&default_path)
            } else {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn from_file(config_path: &Path) -> Result<Self> {
        debug!(?config_path, "Loading config from file");
        let config_str = std::fs::read_to_string(config_path).map_err(|err| {
            Error::Config(format!(
                "Failed to load config file {}: {err}",
                config_path.display()
            ))
        })?;
        config_str.parse().map_err(|err| {
            Error::Config(format!(
                "Failed to parse config file {}: {err}",
                config_path.display()
            ))
        })
    }

    /// The tag rules from this config, with builtin defaults filled in.
    pub fn tag_policy(&self) -> TagPolicy {
        let default = TagPolicy::default();
        TagPolicy {
            global_keys: self
                .global_tag_keys
                .clone()
                .unwrap_or(default.global_keys),
            reserved_prefixes: self
                .reserved_tag_prefixes
                .clone()
                .unwrap_or(default.reserved_prefixes),
            ignored_keys: self
                .ignored_tag_keys
                .clone()
                .unwrap_or(default.ignored_keys),
        }
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use schemars::schema_for;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn config_from_empty_file() {
        let config_tmp = NamedTempFile::new().unwrap();
        let config_path = config_tmp.path().to_path_buf();
        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.region, None);
        assert_eq!(config.global_tag_keys, None);
        assert_eq!(config.reserved_tag_prefixes, None);
        assert_eq!(config.ignored_tag_keys, None);
    }

    #[test]
    fn config_from_file() {
        let mut config_tmp = NamedTempFile::new().unwrap();
        config_tmp
            .write_all(
                br#"
                region = "eu-west-1"
                global_tag_keys = ["Application", "Environment", "Version", "CostCenter"]
                reserved_tag_prefixes = ["aws"]
                "#,
            )
            .unwrap();
        let config_path = config_tmp.path().to_path_buf();
        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.region, Some("eu-west-1".to_string()));
        assert_eq!(
            config.global_tag_keys,
            Some(vec![
                "Application".to_string(),
                "Environment".to_string(),
                "Version".to_string(),
                "CostCenter".to_string(),
            ])
        );
        assert_eq!(config.reserved_tag_prefixes, Some(vec!["aws".to_string()]));
        assert_eq!(config.ignored_tag_keys, None);
    }

    #[test]
    fn default_tag_policy() {
        let policy = Config::default().tag_policy();
        assert_eq!(policy.global_keys, ["Application", "Environment", "Version"]);
        assert_eq!(
            policy.reserved_prefixes,
            ["aws", "opsworks", "elasticbeanstalk"]
        );
        assert_eq!(policy.ignored_keys, ["LaunchedBy", "service", "component"]);
    }

    #[test]
    fn tag_policy_overrides() {
        let config = Config::from_str(
            r#"
            global_tag_keys = ["Team"]
            "#,
        )
        .unwrap();
        let policy = config.tag_policy();
        assert_eq!(policy.global_keys, ["Team"]);
        // Unset keys keep the builtin defaults.
        assert_eq!(
            policy.reserved_prefixes,
            ["aws", "opsworks", "elasticbeanstalk"]
        );
    }

    #[test]
    fn config_from_file_with_errors() {
        let mut config_tmp = NamedTempFile::new().unwrap();
        config_tmp.write_all(b" garbage ").unwrap();
        let err = Config::from_file(config_tmp.path()).unwrap_err();
        assert_matches!(err, Error::Config(_));
        let msg = err.to_string();
        println!("{}", msg);
        assert!(msg.starts_with("Invalid configuration: "));
        assert!(msg.contains("garbage"));
        assert!(msg.contains(config_tmp.path().display().to_string().as_str()));
    }

    #[test]
    fn parse_example_config_from_source_tree() {
        let _config = Config::from_file(Path::new("example/elb-tagger.toml")).unwrap();
        // it's enough that it just parses
    }

    #[test]
    fn can_make_config_schema() {
        let schema = schema_for!(Config);
        let _schema_json = serde_json::to_string_pretty(&schema).unwrap();
    }
}
