use std::env;
use std::path::PathBuf;

/// Runtime configuration for the service
///
/// All values come from environment variables with sensible defaults, so the
/// server can run with no configuration at all. The struct is passed down
/// explicitly; nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to (`EV_BIND_ADDR`, default `127.0.0.1:8000`)
    pub bind_addr: String,

    /// Root directory for all persisted state (`EV_DATA_DIR`, default `database`)
    pub data_dir: PathBuf,

    /// How many datasets to retain per owner (`EV_RETENTION_KEEP`, default 5)
    pub retention_keep: usize,

    /// How many preview rows a cached summary carries (default 20)
    pub preview_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("database"),
            retention_keep: 5,
            preview_rows: 20,
        }
    }
}

impl AppConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("EV_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let data_dir = env::var("EV_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let retention_keep = env::var("EV_RETENTION_KEEP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.retention_keep);

        Self {
            bind_addr,
            data_dir,
            retention_keep,
            preview_rows: defaults.preview_rows,
        }
    }

    /// Path of the users record file
    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    /// Path of the dataset record file
    pub fn datasets_file(&self) -> PathBuf {
        self.data_dir.join("datasets.json")
    }
}
