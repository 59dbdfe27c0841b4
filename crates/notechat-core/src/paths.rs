use std::env;
use std::path::PathBuf;

/// Directory name for the data store under the user's home directory.
pub const DATA_DIR_NAME: &str = ".notechat";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| "Home directory not set".to_string())
}

/// Default data directory: `$HOME/.notechat`.
pub fn default_data_dir() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(DATA_DIR_NAME))
}
