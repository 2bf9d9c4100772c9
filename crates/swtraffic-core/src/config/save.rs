//! Host id write-back.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{ConfigError, FileConfig, MackerelSection};

/// Rewrites the config file at `path` with `mackerel.host-id` set to `host_id`.
///
/// The file is re-read so that keys are kept as written; file permissions are
/// preserved.
pub fn save_host_id(path: impl AsRef<Path>, host_id: &str) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let permissions = fs::metadata(path).map_err(io_err)?.permissions();
    let text = fs::read_to_string(path).map_err(io_err)?;
    let mut file: FileConfig = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    file.mackerel
        .get_or_insert_with(MackerelSection::default)
        .host_id = host_id.to_string();

    let yaml = serde_yaml::to_string(&file).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, yaml).map_err(io_err)?;
    fs::set_permissions(path, permissions).map_err(io_err)?;
    debug!(path = %path.display(), host_id, "host id saved");
    Ok(())
}
