use dirs::home_dir;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".termlogs";
pub const SETTINGS_SECTION: &str = "settings";
pub const LOG_DIR_KEY: &str = "session_logs_path";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found")]
    HomeDirNotFound,

    #[error("config file not found: {0}")]
    ConfigFileMissing(String),

    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("key `{LOG_DIR_KEY}` not found in [{SETTINGS_SECTION}] section of {0}")]
    MissingKey(String),

    #[error("{0} is not a valid directory")]
    NotADirectory(String),
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os("TERMLOGS_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let Some(home) = home_dir() else {
        return Err(ConfigError::HomeDirNotFound);
    };
    Ok(home.join(CONFIG_FILE_NAME))
}

/// Picks the session log directory: an explicit override always wins,
/// otherwise `session_logs_path` from the `[settings]` section of the config file.
pub fn resolve_log_dir(override_dir: Option<&str>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = override_dir.filter(|dir| !dir.trim().is_empty()) {
        return existing_dir(expand_tilde(dir.trim()));
    }

    let config_path = resolve_config_path()?;
    log_dir_from_config(&config_path)
}

pub fn log_dir_from_config(config_path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = match fs::read_to_string(config_path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::ConfigFileMissing(
                config_path.display().to_string(),
            ));
        }
        Err(source) => {
            return Err(ConfigError::ReadConfig {
                path: config_path.display().to_string(),
                source,
            });
        }
    };

    let sections = parse_ini(&raw);
    let value = sections
        .get(SETTINGS_SECTION)
        .and_then(|section| section.get(LOG_DIR_KEY))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingKey(config_path.display().to_string()))?;

    tracing::debug!(config = %config_path.display(), dir = %value, "session log directory from config");
    existing_dir(expand_tilde(value))
}

fn existing_dir(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfigError::NotADirectory(path.display().to_string()))
    }
}

pub fn expand_tilde(value: &str) -> PathBuf {
    let rest = if value == "~" {
        Some("")
    } else {
        value.strip_prefix("~/")
    };
    match (rest, home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

type IniSections = BTreeMap<String, BTreeMap<String, String>>;

/// Minimal INI reader: `[section]` headers, `key = value` or `key: value`
/// pairs, `#`/`;` comment lines. Keys are lowercased; values are trimmed.
fn parse_ini(raw: &str) -> IniSections {
    let mut sections = IniSections::new();
    let mut current: Option<String> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_ref() else {
            continue;
        };
        let Some(split_at) = trimmed.find(['=', ':']) else {
            continue;
        };
        let key = trimmed[..split_at].trim().to_ascii_lowercase();
        let value = trimmed[split_at + 1..].trim().to_string();
        sections
            .entry(section.clone())
            .or_default()
            .insert(key, value);
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_log_dir_from_settings_section() {
        let dir = tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).expect("mkdir");
        let config = dir.path().join("termlogs.ini");
        fs::write(
            &config,
            format!(
                "# termlogs\n[other]\nsession_logs_path = /nope\n\n[settings]\nSession_Logs_Path = {}\n",
                logs.display()
            ),
        )
        .expect("write");

        assert_eq!(log_dir_from_config(&config).expect("resolve"), logs);
    }

    #[test]
    fn missing_config_file_is_distinct_from_missing_key() {
        let dir = tempdir().expect("tempdir");
        let config = dir.path().join("termlogs.ini");
        assert!(matches!(
            log_dir_from_config(&config),
            Err(ConfigError::ConfigFileMissing(_))
        ));

        fs::write(&config, "[settings]\nother = 1\n").expect("write");
        assert!(matches!(
            log_dir_from_config(&config),
            Err(ConfigError::MissingKey(_))
        ));

        fs::write(&config, "session_logs_path = /tmp\n").expect("write");
        assert!(matches!(
            log_dir_from_config(&config),
            Err(ConfigError::MissingKey(_))
        ));
    }

    #[test]
    fn configured_path_must_be_a_directory() {
        let dir = tempdir().expect("tempdir");
        let config = dir.path().join("termlogs.ini");
        let missing = dir.path().join("missing");
        fs::write(&config, format!("[settings]\nsession_logs_path: {}\n", missing.display()))
            .expect("write");
        assert!(matches!(
            log_dir_from_config(&config),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn override_wins_and_is_validated() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().to_string_lossy().to_string();
        assert_eq!(
            resolve_log_dir(Some(&path)).expect("override"),
            dir.path().to_path_buf()
        );

        let file = dir.path().join("file.log");
        fs::write(&file, "x").expect("write");
        let file = file.to_string_lossy().to_string();
        assert!(matches!(
            resolve_log_dir(Some(&file)),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn expands_home_prefix() {
        let Some(home) = home_dir() else {
            return;
        };
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        assert_eq!(expand_tilde("/abs/~/x"), PathBuf::from("/abs/~/x"));
    }
}
