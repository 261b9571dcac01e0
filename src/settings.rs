use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Input and store locations. Defaults point at ./data and can be
/// overridden by a `fispq.toml` file (or an explicit --config path) and by
/// FISPQ_-prefixed environment variables, e.g. FISPQ_DB_PATH.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("input_dir", "data/fispq")?
            .set_default("db_path", "data/fispq.sqlite")?
            .set_default("csv_path", "data/fispq.csv")?
            .set_default("snapshot_dir", "data/json")?;
        builder = match config_file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("fispq").required(false)),
        };
        builder
            .add_source(Environment::with_prefix("FISPQ"))
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_path() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s.input_dir, PathBuf::from("data/fispq"));
        assert_eq!(s.db_path, PathBuf::from("data/fispq.sqlite"));
        assert_eq!(s.csv_path, PathBuf::from("data/fispq.csv"));
        assert_eq!(s.snapshot_dir, PathBuf::from("data/json"));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "db_path = \"/tmp/other.sqlite\"\n").unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.db_path, PathBuf::from("/tmp/other.sqlite"));
        assert_eq!(s.csv_path, PathBuf::from("data/fispq.csv"));
    }
}
