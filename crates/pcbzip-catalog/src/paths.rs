use std::path::PathBuf;

/// Overrides the data directory
pub const HOME_ENV: &str = "PCBZIP_HOME";
/// URL of the supplier parts dump used by `catalog refresh`
pub const PARTS_URL_ENV: &str = "PCBZIP_PARTS_URL";

/// Directory holding the catalog and downloaded dumps, `~/.pcbzip` by default
pub fn data_dir() -> Option<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".pcbzip")),
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("parts.db"))
}

pub fn parts_url_from_env() -> Option<String> {
    std::env::var(PARTS_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}
