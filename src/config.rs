//! Interpreter configuration: loads optional ~/.chainline/config.yaml.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Interpreter defaults loaded from YAML. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Clip length in bars when `new_clip(bar=..)` omits `length_bars`.
    pub default_length_bars: i64,
    /// Clip length when `new_clip(start=..)` omits `length`.
    pub default_clip_length: f64,
    /// Abort a combinator on the first failing item instead of skipping it.
    pub strict_combinators: bool,
    /// Plugin `add_fx` inserts when run as a callback over tracks without one.
    pub default_fx: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            default_length_bars: 4,
            default_clip_length: 4.0,
            strict_combinators: false,
            default_fx: "ReaVerb".to_string(),
        }
    }
}

/// Get the config file path.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| config_path_in(&h))
}

/// Config file location under a given home directory.
pub fn config_path_in(home: &Path) -> PathBuf {
    home.join(".chainline").join("config.yaml")
}

/// Load configuration from ~/.chainline/config.yaml.
/// Returns None if the file doesn't exist or can't be parsed.
pub fn load_config() -> Option<InterpreterConfig> {
    load_config_in(&dirs::home_dir()?)
}

/// Load configuration from `<home>/.chainline/config.yaml`.
pub fn load_config_in(home: &Path) -> Option<InterpreterConfig> {
    let content = std::fs::read_to_string(config_path_in(home)).ok()?;
    serde_yaml::from_str(&content).ok()
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<InterpreterConfig, io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_values() {
        let config = InterpreterConfig::default();
        assert_eq!(config.default_length_bars, 4);
        assert!((config.default_clip_length - 4.0).abs() < f64::EPSILON);
        assert!(!config.strict_combinators);
        assert_eq!(config.default_fx, "ReaVerb");
    }

    #[test]
    fn home_without_config_file_is_none() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(load_config_in(home.path()), None);
    }

    #[test]
    fn home_config_file_is_loaded() {
        let home = tempfile::tempdir().unwrap();
        let path = config_path_in(home.path());
        assert!(path.ends_with(".chainline/config.yaml"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "default_length_bars: 16\ndefault_fx: ReaDelay\n").unwrap();

        let config = load_config_in(home.path()).unwrap();
        assert_eq!(config.default_length_bars, 16);
        assert_eq!(config.default_fx, "ReaDelay");
        assert!(!config.strict_combinators);
    }

    #[test]
    fn unparsable_home_config_is_none() {
        let home = tempfile::tempdir().unwrap();
        let path = config_path_in(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "default_length_bars: [1, 2]\n").unwrap();
        assert_eq!(load_config_in(home.path()), None);
    }

    #[test]
    fn parse_yaml_config() {
        let yaml = r#"
default_length_bars: 8
default_clip_length: 2.5
strict_combinators: true
"#;
        let config: InterpreterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_length_bars, 8);
        assert!((config.default_clip_length - 2.5).abs() < f64::EPSILON);
        assert!(config.strict_combinators);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: InterpreterConfig = serde_yaml::from_str("strict_combinators: true\n").unwrap();
        assert!(config.strict_combinators);
        assert_eq!(config.default_length_bars, 4);
    }

    #[test]
    fn load_from_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_length_bars: 2").unwrap();
        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.default_length_bars, 2);
    }

    #[test]
    fn load_from_invalid_yaml_is_invalid_data() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_length_bars: [not, a, number]").unwrap();
        let err = load_config_from(file.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn load_from_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("absent.yaml")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
