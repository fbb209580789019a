//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.tether), or ./.tether when no home is known
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tether")
}

/// Default config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
