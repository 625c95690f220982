// Configuration module entry point
// Layered settings: built-in defaults, config file, VOTING_* environment

mod state;
mod types;

use std::collections::HashSet;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HealthConfig};

/// Default choices when no ballot is configured
pub const DEFAULT_CHOICES: [&str; 3] = ["Python", "Java", "Go"];

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("VOTING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.workers", 4)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_grace", 10)?
            .set_default("http.server_name", "voting-server")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("ballot.choices", DEFAULT_CHOICES.to_vec())?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.workers == 0 {
            return Err(invalid("server.workers must be a positive integer"));
        }
        if self.http.max_body_size == 0 {
            return Err(invalid("http.max_body_size must be greater than zero"));
        }
        if self.ballot.choices.is_empty() {
            return Err(invalid("ballot.choices must not be empty"));
        }

        let mut seen = HashSet::new();
        for choice in &self.ballot.choices {
            if choice.trim().is_empty() {
                return Err(invalid("ballot.choices must not contain empty names"));
            }
            if !seen.insert(choice.as_str()) {
                return Err(invalid(&format!("duplicate ballot choice '{choice}'")));
            }
        }

        self.get_socket_addr().map_err(|e| invalid(&e))?;
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

fn invalid(message: &str) -> config::ConfigError {
    config::ConfigError::Message(message.to_string())
}

#[cfg(test)]
pub fn test_config() -> Config {
    use types::{
        BallotConfig, HttpConfig, LoggingConfig, PerformanceConfig, PersistenceConfig,
        ServerConfig,
    };

    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: 4,
            backlog: 128,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            access_log: false,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        },
        performance: PerformanceConfig {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
            shutdown_grace: 1,
        },
        http: HttpConfig {
            server_name: "voting-server".to_string(),
            enable_cors: false,
            max_body_size: 1024,
        },
        ballot: BallotConfig {
            choices: DEFAULT_CHOICES.iter().map(ToString::to_string).collect(),
        },
        health: HealthConfig::default(),
        persistence: PersistenceConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    // Tests that read or write VOTING_* variables run one at a time
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_without_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = Config::load_from("does-not-exist").unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.workers, 4);
        assert_eq!(cfg.ballot.choices, vec!["Python", "Java", "Go"]);
        assert!(cfg.health.enabled);
        assert!(cfg.persistence.state_file.is_none());
        assert!(cfg.performance.max_connections.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[server]\nport = 5000\n\n[ballot]\nchoices = [\"Rust\", \"Zig\"]\n",
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.workers, 4);
        assert_eq!(cfg.ballot.choices, vec!["Rust", "Zig"]);
    }

    #[test]
    fn test_environment_overrides_file_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[server]\nport = 7000\n\n[http]\nenable_cors = false\n").unwrap();

        std::env::set_var("VOTING_SERVER__PORT", "5000");
        std::env::set_var("VOTING_HTTP__ENABLE_CORS", "true");
        std::env::set_var("VOTING_PERFORMANCE__SHUTDOWN_GRACE", "3");
        let result = Config::load_from(path.to_str().unwrap());
        std::env::remove_var("VOTING_SERVER__PORT");
        std::env::remove_var("VOTING_HTTP__ENABLE_CORS");
        std::env::remove_var("VOTING_PERFORMANCE__SHUTDOWN_GRACE");

        let cfg = result.unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert!(cfg.http.enable_cors);
        assert_eq!(cfg.performance.shutdown_grace, 3);
        assert_eq!(cfg.server.workers, 4);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut cfg = test_config();
        cfg.server.workers = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validate_rejects_bad_ballots() {
        let mut cfg = test_config();
        cfg.ballot.choices.clear();
        assert!(cfg.validate().is_err());

        cfg.ballot.choices = vec!["Go".to_string(), "Go".to_string()];
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        cfg.ballot.choices = vec!["Go".to_string(), "  ".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let mut cfg = test_config();
        cfg.server.host = "not a host".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = test_config();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "127.0.0.1:8000");
    }
}
