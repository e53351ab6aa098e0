//! Run configuration.
//!
//! Defaults reproduce the reference analysis. A `go_sharing.json` file in the
//! project root overrides any subset of the fields; relative paths in it are
//! resolved against the project root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SharingError};
use crate::models::{reference_organisms, Organism};

pub const CONFIG_FILE: &str = "go_sharing.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullModelMode {
    /// Use the snapshot when its fingerprint matches, otherwise recompute.
    Auto,
    /// Always read the snapshot, even if stale.
    Cached,
    /// Always run the estimator and rewrite the snapshot.
    Recompute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NullModelConfig {
    pub mode: NullModelMode,
    pub trials: usize,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for NullModelConfig {
    fn default() -> Self {
        NullModelConfig {
            mode: NullModelMode::Auto,
            trials: 100_000,
            seed: 42,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for FigureConfig {
    fn default() -> Self {
        // 8 x 10 inches at 600 dpi
        FigureConfig {
            width: 4800,
            height: 6000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub organisms: Vec<Organism>,
    pub significance: f64,
    pub universe_file: PathBuf,
    pub baseline_file: PathBuf,
    pub figure_file: PathBuf,
    pub null_model: NullModelConfig,
    pub figure: FigureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            organisms: reference_organisms(),
            significance: 0.05,
            universe_file: PathBuf::from("All_Organisms_GOids.json"),
            baseline_file: PathBuf::from(
                "ModelEukaryoticOrganisms_Cross-Organism_GOfrequencies_LENGTH-WEIGHTED_ProteinSampling.csv",
            ),
            figure_file: PathBuf::from("ModelEukaryoticOrganisms_GO_sharing.png"),
            null_model: NullModelConfig::default(),
            figure: FigureConfig::default(),
        }
    }
}

impl Config {
    /// Loads `<root>/go_sharing.json` over the defaults, or the defaults alone
    /// when the file does not exist. Paths come back absolute under `root`.
    pub fn load(root: &Path) -> Result<Config> {
        let path = root.join(CONFIG_FILE);
        let config = if path.is_file() {
            info!("Reading configuration from {}", path.display());
            let text = fs::read_to_string(&path).map_err(|e| SharingError::io(&path, e))?;
            serde_json::from_str(&text)?
        } else {
            debug!("No {} found, using defaults", path.display());
            Config::default()
        };
        config.validate()?;
        Ok(config.resolve(root))
    }

    fn resolve(mut self, root: &Path) -> Config {
        for path in [
            &mut self.data_dir,
            &mut self.universe_file,
            &mut self.baseline_file,
            &mut self.figure_file,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.organisms.is_empty() {
            return Err(SharingError::Config("at least one organism is required".into()));
        }
        let mut seen = HashSet::new();
        for organism in &self.organisms {
            if !seen.insert(organism.code.as_str()) {
                return Err(SharingError::Config(format!(
                    "organism {} listed twice",
                    organism.code
                )));
            }
        }
        if !(self.significance > 0.0 && self.significance <= 1.0) {
            return Err(SharingError::Config(format!(
                "significance must be in (0, 1], got {}",
                self.significance
            )));
        }
        if self.null_model.trials == 0 {
            return Err(SharingError::Config("null model needs at least one trial".into()));
        }
        if self.figure.width == 0 || self.figure.height == 0 {
            return Err(SharingError::Config("figure size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn organism_codes(&self) -> Vec<String> {
        self.organisms.iter().map(|o| o.code.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_reference_run() {
        let config = Config::default();
        assert_eq!(config.organisms.len(), 7);
        assert_eq!(config.organisms[4].code, "Xlaevis");
        assert_eq!(config.significance, 0.05);
        assert_eq!(config.null_model.trials, 100_000);
        assert_eq!(config.null_model.mode, NullModelMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_gives_defaults_under_root() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.figure_file.starts_with(dir.path()));
        assert_eq!(config.null_model.seed, 42);
        // picks up the baseline shipped with the published data
        assert_eq!(
            config.baseline_file,
            dir.path().join(
                "ModelEukaryoticOrganisms_Cross-Organism_GOfrequencies_LENGTH-WEIGHTED_ProteinSampling.csv"
            )
        );
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "null_model": { "trials": 500, "mode": "recompute" }, "data_dir": "reports" }"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.null_model.trials, 500);
        assert_eq!(config.null_model.mode, NullModelMode::Recompute);
        assert_eq!(config.null_model.seed, 42);
        assert_eq!(config.data_dir, dir.path().join("reports"));
        assert_eq!(config.organisms.len(), 7);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.significance = 0.0;
        assert!(matches!(config.validate(), Err(SharingError::Config(_))));

        let mut config = Config::default();
        config.organisms.push(config.organisms[0].clone());
        assert!(matches!(config.validate(), Err(SharingError::Config(_))));

        let mut config = Config::default();
        config.null_model.trials = 0;
        assert!(config.validate().is_err());
    }
}
