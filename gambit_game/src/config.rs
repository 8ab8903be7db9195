// Node configuration from the environment.
//
// Only the settings a game node itself needs live here. The directory
// service has its own deployment configuration; this side just needs to
// know where it is and how to authenticate.

use std::env;
use std::path::PathBuf;

/// Environment-driven settings for a game node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Base URL of the directory service (`API_BASE`).
    pub api_base: String,
    /// Opaque bearer credential presented on every directory call
    /// (`GAMBIT_TOKEN`).
    pub token: String,
    /// Host the mesh binds its listener on (`GAMBIT_BIND_HOST`).
    pub bind_host: String,
    /// Directory for rotating log files (`GAMBIT_LOG_DIR`); unset logs to
    /// stderr.
    pub log_dir: Option<PathBuf>,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env::var("API_BASE").unwrap_or_else(|_| "http://127.0.0.1:8080".into()),
            token: env::var("GAMBIT_TOKEN").unwrap_or_default(),
            bind_host: env::var("GAMBIT_BIND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            log_dir: env::var_os("GAMBIT_LOG_DIR").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply() {
        env::set_var("API_BASE", "http://directory.example:9999");
        env::set_var("GAMBIT_TOKEN", "opaque");
        env::set_var("GAMBIT_BIND_HOST", "127.0.0.1");
        env::set_var("GAMBIT_LOG_DIR", "/tmp/gambit-logs");

        let config = NodeConfig::from_env();
        assert_eq!(config.api_base, "http://directory.example:9999");
        assert_eq!(config.token, "opaque");
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/gambit-logs")));

        env::remove_var("API_BASE");
        env::remove_var("GAMBIT_TOKEN");
        env::remove_var("GAMBIT_BIND_HOST");
        env::remove_var("GAMBIT_LOG_DIR");
    }
}
