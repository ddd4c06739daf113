// SPDX-License-Identifier: CEPL-1.0
use serde::de::DeserializeOwned;
use std::{fs, io, path::Path, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load a TOML file into `T`.
///
/// A missing file is not an error: it yields `T::default()` so a bare
/// checkout runs without any config. A file that exists but does not
/// parse is reported.
pub fn load_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("config {} not found, using defaults", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    debug!("config {} ({} bytes)", path.display(), text.len());
    parse_toml(path, &text)
}

pub fn parse_toml<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, ConfigError> {
    toml::from_str::<T>(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg: Sample = load_toml(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(cfg, Sample::default());
    }

    #[test]
    fn parses_partial_tables() {
        let cfg: Sample = parse_toml(Path::new("inline"), "count = 3").unwrap();
        assert_eq!(cfg.count, 3);
        assert!(cfg.name.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = parse_toml::<Sample>(Path::new("bad.toml"), "count = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
