//! Run configuration
//!
//! A YAML file with three sections:
//! - `electronics`: array dimensions and conversion constants
//! - `inputs`: locations of the hit list and parameter tables
//! - `run`: mean current, seed, event count and output path
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//!
//! ```no_run
//! use pmt_electronics::config::RunConfig;
//!
//! let mut config = RunConfig::from_file("electronics.yaml").unwrap();
//! config.apply_args(None, None, None, Some(42), Some(10), None);
//! println!("bins per channel: {}", config.electronics.bin_2_gen);
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::data_io::InputPaths;
use crate::pmt::ElectronicsConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Mean anode current scaling every channel's relative current.
    pub mean_current: f64,
    /// Master seed; drawn from system entropy when absent.
    pub seed: Option<u64>,
    pub events: usize,
    /// Directory that relative input paths are resolved against.
    pub input_dir: Option<PathBuf>,
    pub output: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            mean_current: 0.0,
            seed: None,
            events: 1,
            input_dir: None,
            output: PathBuf::from("adc_counts.dat"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub electronics: ElectronicsConfig,
    pub inputs: InputPaths,
    pub run: RunSettings,
}

impl RunConfig {
    /// Load configuration from a YAML file, writing the defaults there if it does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Configuration file not found at {:?}, creating default", path);
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        let config: RunConfig = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;
        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.electronics
            .validate()
            .context("Invalid electronics section")?;
        if self.run.events == 0 {
            anyhow::bail!("run.events must be at least 1");
        }
        if !self.run.mean_current.is_finite() || self.run.mean_current < 0.0 {
            anyhow::bail!(
                "run.mean_current must be finite and non-negative, got {}",
                self.run.mean_current
            );
        }
        Ok(())
    }

    /// Input paths with `run.input_dir` applied.
    pub fn resolved_inputs(&self) -> InputPaths {
        match &self.run.input_dir {
            Some(dir) => self.inputs.rooted_at(dir),
            None => self.inputs.clone(),
        }
    }

    /// Override configuration values with command line arguments.
    pub fn apply_args(
        &mut self,
        input_dir: Option<PathBuf>,
        hits: Option<PathBuf>,
        output: Option<PathBuf>,
        seed: Option<u64>,
        events: Option<usize>,
        mean_current: Option<f64>,
    ) {
        if let Some(dir) = input_dir {
            debug!("Overriding input directory from command line: {:?}", dir);
            self.run.input_dir = Some(dir);
        }
        if let Some(hits) = hits {
            debug!("Overriding hit list from command line: {:?}", hits);
            self.inputs.hits = hits;
        }
        if let Some(output) = output {
            debug!("Overriding output from command line: {:?}", output);
            self.run.output = output;
        }
        if let Some(seed) = seed {
            debug!("Overriding seed from command line: {}", seed);
            self.run.seed = Some(seed);
        }
        if let Some(events) = events {
            debug!("Overriding event count from command line: {}", events);
            self.run.events = events;
        }
        if let Some(current) = mean_current {
            debug!("Overriding mean current from command line: {}", current);
            self.run.mean_current = current;
        }
    }
}
