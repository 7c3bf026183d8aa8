use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config_error;
use crate::core::error::AppResult;
use crate::store::StoreOptions;

const MIN_MAP_SIZE: usize = 1024 * 1024;
const PAGE_SIZE: usize = 4096;

/// Command line options.
#[derive(Debug, Default, Parser)]
#[command(name = "jelly-requester")]
#[command(about = "Tracks media requests and their fulfilment")]
#[command(version)]
pub struct Opt {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub conf: Option<String>,

    /// Override for the request database location
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub storage: Storage,

    #[validate(nested)]
    #[serde(default)]
    pub requester: Requester,

    #[validate(nested)]
    pub log: Option<Log>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> AppResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {}: {}", path, e))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> AppResult<Self> {
        let mut conf = match &opt.conf {
            Some(path) => Self::load_from_yaml(path)?,
            None => {
                debug!("No conf file given, using defaults");
                let conf = Self::default();
                conf.validate()
                    .map_err(|e| config_error!("Conf file valid failed: {}", e))?;
                conf
            }
        };
        conf.merge_with_opt(opt);
        Ok(conf)
    }

    pub fn from_yaml(conf_str: &str) -> AppResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| config_error!("Unable to parse yaml conf: {}", e))?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .map_err(|e| config_error!("Conf file valid failed: {}", e))?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self).map_err(|e| config_error!("Unable to render conf: {}", e))
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if let Some(db) = &opt.db {
            self.storage.path = db.clone();
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Storage {
    #[serde(default = "Storage::default_path")]
    pub path: PathBuf,
    #[serde(default = "Storage::default_map_size")]
    #[validate(
        range(min = MIN_MAP_SIZE),
        custom(function = "Storage::validate_map_size")
    )]
    pub map_size: usize,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            map_size: Self::default_map_size(),
        }
    }
}

impl Storage {
    fn default_path() -> PathBuf {
        PathBuf::from("requests.db")
    }

    fn default_map_size() -> usize {
        StoreOptions::default().map_size
    }

    // LMDB wants the map to be a whole number of pages.
    fn validate_map_size(map_size: usize) -> Result<(), ValidationError> {
        if map_size % PAGE_SIZE == 0 {
            Ok(())
        } else {
            Err(ValidationError::new("map_size_not_page_aligned"))
        }
    }

    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            map_size: self.map_size,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Requester {
    #[serde(default = "Requester::default_allowed_domains")]
    #[validate(
        length(min = 1),
        custom(function = "Requester::validate_allowed_domains")
    )]
    pub allowed_domains: Vec<String>,
}

impl Default for Requester {
    fn default() -> Self {
        Self {
            allowed_domains: Self::default_allowed_domains(),
        }
    }
}

impl Requester {
    fn default_allowed_domains() -> Vec<String> {
        [
            "thetvdb.com",
            "imdb.com",
            "themoviedb.org",
            "discogs.com",
            "open.spotify.com",
            "musicbrainz.org",
        ]
        .iter()
        .map(|d| d.to_string())
        .collect()
    }

    // Hosts are compared verbatim against parsed URLs, which are lowercase
    // and carry no scheme or port.
    fn validate_allowed_domains(domains: &Vec<String>) -> Result<(), ValidationError> {
        for domain in domains {
            if domain.is_empty()
                || domain.contains(|c: char| c.is_whitespace() || c == '/' || c == ':')
                || domain.chars().any(|c| c.is_ascii_uppercase())
            {
                return Err(ValidationError::new("invalid_allowed_domain"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(length(min = 1))]
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_defaults() {
        init_log();
        let conf = Config::from_yaml("---\n{}\n").unwrap();
        assert_eq!(conf.storage.path, PathBuf::from("requests.db"));
        assert_eq!(conf.storage.map_size, 10 * 1024 * 1024);
        assert_eq!(conf.requester.allowed_domains.len(), 6);
        assert!(conf.log.is_none());
        print!("{}", conf.to_yaml().unwrap());
    }

    #[test]
    fn test_load_file() {
        init_log();
        let conf_str = r#"
---
storage:
  path: /var/lib/jelly/requests.db
  map_size: 2097152

requester:
  allowed_domains:
    - imdb.com
    - discogs.com

log:
  path: /var/log/jelly/requester.log
        "#;
        let conf = Config::from_yaml(conf_str).unwrap();
        assert_eq!(
            conf.storage.path,
            PathBuf::from("/var/lib/jelly/requests.db")
        );
        assert_eq!(conf.storage.options().map_size, 2097152);
        assert_eq!(conf.requester.allowed_domains, vec!["imdb.com", "discogs.com"]);
        assert_eq!(conf.log.unwrap().path, "/var/log/jelly/requester.log");
    }

    #[test]
    fn test_valid_allowed_domains_length() {
        init_log();
        let conf_str = r#"
---
requester:
  allowed_domains: []
        "#;
        let conf = Config::from_yaml(conf_str);
        match conf {
            Ok(_) => panic!("Expected error, but got a valid config"),
            Err(e) => eprintln!("Error: {:?}", e),
        }
    }

    #[test]
    fn test_valid_allowed_domains_host_only() {
        init_log();
        let conf_str = r#"
---
requester:
  allowed_domains:
    - https://imdb.com
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_valid_map_size() {
        init_log();
        let conf_str = r#"
---
storage:
  map_size: 4096
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_valid_map_size_alignment() {
        init_log();
        let conf_str = r#"
---
storage:
  map_size: 2097153
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_load_errors_keep_cause() {
        init_log();
        let err = Config::from_yaml("storage: [").unwrap_err().to_string();
        assert!(err.starts_with("Configuration error: Unable to parse yaml conf: "));
        assert!(!err.contains("{e}"), "{err}");

        let err = Config::load_from_yaml("/nonexistent/jelly.yaml")
            .unwrap_err()
            .to_string();
        assert!(
            err.starts_with("Configuration error: Unable to read conf file from /nonexistent/jelly.yaml: "),
            "{err}"
        );
        assert!(!err.contains("{path}"), "{err}");

        let err = Config::from_yaml("storage:\n  map_size: 4096\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("map_size"), "{err}");
    }

    #[test]
    fn test_valid_log_path() {
        init_log();
        let conf_str = r#"
---
log:
  path: ""
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_opt_override() {
        init_log();
        let opt = Opt {
            conf: None,
            db: Some(PathBuf::from("/tmp/other.db")),
        };
        let conf = Config::load_yaml_with_opt_override(&opt).unwrap();
        assert_eq!(conf.storage.path, PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_opt_parse() {
        let opt = Opt::parse_from(["jelly-requester", "-c", "conf.yaml", "--db", "data"]);
        assert_eq!(opt.conf.as_deref(), Some("conf.yaml"));
        assert_eq!(opt.db, Some(PathBuf::from("data")));
    }
}
