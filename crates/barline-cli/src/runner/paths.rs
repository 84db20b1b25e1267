//! Config file path resolution.
//!
//! Priority for the config directory:
//! 1. `BARLINE_CONFIG_DIR` (explicit override)
//! 2. OS config dir + `barline` (`~/.config/barline` on Linux)
//! 3. `~/.barline` (home directory fallback)
//! 4. System temp dir (last resort)

use std::env;
use std::path::PathBuf;

/// File name of the config inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Get config directory with priority fallback.
///
/// Empty values of `BARLINE_CONFIG_DIR` are ignored.
pub fn get_config_dir() -> PathBuf {
    // 1. Explicit override (ignore empty)
    if let Ok(dir) = env::var("BARLINE_CONFIG_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    // 2. Platform config directory
    if let Some(config) = dirs::config_dir() {
        return config.join("barline");
    }

    // 3. Home directory fallback
    if let Some(home) = dirs::home_dir() {
        return home.join(".barline");
    }

    // 4. Last resort: temp dir
    env::temp_dir().join("barline")
}

/// Get the config file path.
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}
