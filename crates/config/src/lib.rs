//! Configuration loading for the blocks conductor and workers.
//!
//! Precedence, lowest to highest: built-in defaults, `/etc/blocks.ini`,
//! `~/.config/blocks.ini`, then the process environment. Every environment
//! variable named in the external interfaces section of the specification
//! wins over both INI files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

/// Configuration errors, mapped to the process exit codes the CLI
/// contract promises: `1` for missing configuration, `3` for a missing
/// chain endpoint.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse INI file {path}: {source}")]
    Ini {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("no ethereum JSON-RPC endpoint configured")]
    MissingChainEndpoint,
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingChainEndpoint => 3,
            _ => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
}

impl DatabaseConfig {
    /// The `postgres://` DSN used to open a connection pool.
    pub fn dsn(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.pass, self.host, self.port, self.name
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EthereumConfig {
    pub node: String,
    pub infura_api_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConductorConfig {
    pub host: String,
    pub port: u16,
    pub batch_size: usize,
    pub endpoint: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub database: DatabaseConfig,
    pub ethereum: EthereumConfig,
    pub conductor: ConductorConfig,
}

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_CONDUCTOR_HOST: &str = "127.0.0.1";
const DEFAULT_CONDUCTOR_PORT: u16 = 3205;
const DEFAULT_CONDUCTOR_ENDPOINT: &str = "http://localhost:3205";
const DEFAULT_ETHEREUM_NODE: &str = "http://localhost:8545/";

/// A flat `section.key -> value` view over one or more merged INI files.
#[derive(Default)]
struct IniValues(HashMap<(String, String), String>);

impl IniValues {
    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.is_file() {
            return Ok(());
        }

        let ini = Ini::load_from_file(path)
            .map_err(|source| ConfigError::Ini { path: path.to_path_buf(), source })?;

        for (section, props) in ini.iter() {
            let section = section.unwrap_or("default").to_string();
            for (key, value) in props.iter() {
                self.0.insert((section.clone(), key.to_string()), value.to_string());
            }
        }

        Ok(())
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.0.get(&(section.to_string(), key.to_string())).map(String::as_str)
    }
}

/// Looks up a value from the environment first, falling back to the
/// merged INI values, then to `default`.
fn resolve(
    env: &dyn Fn(&str) -> Option<String>,
    env_var: &str,
    ini: &IniValues,
    section: &str,
    key: &str,
    default: &str,
) -> String {
    env(env_var)
        .or_else(|| ini.get(section, key).map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

/// Default INI search paths, lowest to highest precedence.
fn default_ini_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/blocks.ini")];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config").join("blocks.ini"));
    }
    paths
}

/// Loads configuration from the real environment and the standard INI
/// search paths.
pub fn load() -> Result<Config, ConfigError> {
    load_from(&default_ini_paths(), &|key| std::env::var(key).ok())
}

/// Loads configuration from explicit INI paths and an environment lookup
/// function. Exposed so tests (and alternate entry points) can avoid
/// touching the real filesystem or environment.
pub fn load_from(
    ini_paths: &[PathBuf],
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut ini = IniValues::default();
    for path in ini_paths {
        ini.merge_file(path)?;
    }

    let log_level = resolve(env, "LOG_LEVEL", &ini, "default", "loglevel", "INFO");

    let database = DatabaseConfig {
        host: resolve(env, "PGHOST", &ini, "postgresql", "host", "localhost"),
        port: resolve(env, "PGPORT", &ini, "postgresql", "port", "5432")
            .parse()
            .map_err(|_| ConfigError::Missing("PGPORT"))?,
        user: env("PGUSER")
            .or_else(|| ini.get("postgresql", "user").map(str::to_string))
            .ok_or(ConfigError::Missing("PGUSER"))?,
        pass: env("PGPASSWORD")
            .or_else(|| ini.get("postgresql", "pass").map(str::to_string))
            .ok_or(ConfigError::Missing("PGPASSWORD"))?,
        name: resolve(env, "PGDATABASE", &ini, "postgresql", "name", "blocks"),
    };

    let node = resolve(env, "JSONRPC_NODE", &ini, "ethereum", "node", DEFAULT_ETHEREUM_NODE);
    let infura_api_key = env("WEB3_INFURA_API_KEY");
    if node.is_empty() && infura_api_key.is_none() {
        return Err(ConfigError::MissingChainEndpoint);
    }

    let batch_size = env("CONDUCTOR_BATCH_SIZE")
        .or_else(|| ini.get("conductor", "batch_size").map(str::to_string))
        .map(|v| v.parse::<usize>().map_err(|_| ConfigError::Missing("CONDUCTOR_BATCH_SIZE")))
        .transpose()?
        .unwrap_or(DEFAULT_BATCH_SIZE);

    let conductor = ConductorConfig {
        host: env("CONDUCTOR_HOST").unwrap_or_else(|| DEFAULT_CONDUCTOR_HOST.to_string()),
        port: env("CONDUCTOR_PORT")
            .map(|v| v.parse::<u16>().map_err(|_| ConfigError::Missing("CONDUCTOR_PORT")))
            .transpose()?
            .unwrap_or(DEFAULT_CONDUCTOR_PORT),
        batch_size,
        endpoint: env("CONDUCTOR_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_CONDUCTOR_ENDPOINT.to_string()),
    };

    Ok(Config { log_level, database, ethereum: EthereumConfig { node, infura_api_key }, conductor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn env_vars_override_ini_files() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_ini(
            &dir,
            "system.ini",
            "[postgresql]\nhost = db.example.com\nuser = sysuser\npass = syspass\n",
        );
        let user = write_ini(&dir, "user.ini", "[postgresql]\nhost = user.example.com\n");

        let env = |k: &str| if k == "PGHOST" { Some("env.example.com".to_string()) } else { None };

        let cfg = load_from(&[system, user], &env).unwrap();
        assert_eq!(cfg.database.host, "env.example.com");
        assert_eq!(cfg.database.user, "sysuser");
    }

    #[test]
    fn later_ini_file_overrides_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_ini(
            &dir,
            "system.ini",
            "[postgresql]\nhost = db.example.com\nuser = u\npass = p\n",
        );
        let user = write_ini(&dir, "user.ini", "[postgresql]\nhost = user.example.com\n");

        let cfg = load_from(&[system, user], &|_| None).unwrap();
        assert_eq!(cfg.database.host, "user.example.com");
    }

    #[test]
    fn missing_db_user_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_ini(&dir, "system.ini", "[postgresql]\npass = p\n");

        let err = load_from(&[system], &|_| None).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_chain_endpoint_is_exit_code_three() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_ini(
            &dir,
            "system.ini",
            "[postgresql]\nuser = u\npass = p\n[ethereum]\nnode = \n",
        );

        let err = load_from(&[system], &|_| None).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn defaults_fill_in_conductor_settings() {
        let dir = tempfile::tempdir().unwrap();
        let system = write_ini(&dir, "system.ini", "[postgresql]\nuser = u\npass = p\n");

        let cfg = load_from(&[system], &|_| None).unwrap();
        assert_eq!(cfg.conductor.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.conductor.endpoint, DEFAULT_CONDUCTOR_ENDPOINT);
    }
}
