pub mod adc;
pub mod background;
pub mod hits;
pub mod pulse;
pub mod waveform;

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Analog sub-samples per digitized output bin.
pub const SUBSAMPLES_PER_BIN: usize = 25;

/// Converts hit arrival times into analog sub-sample units.
pub const HIT_TIME_SCALE: f64 = 2.0;

/// Fraction of the acquisition window placed before `Tmin`.
pub const WINDOW_FRACTION: f64 = 0.45;

/// Fixed dimensions and conversion constants of the front-end electronics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectronicsConfig {
    pub n_chan: usize,
    pub pulse_length: usize,
    pub amp_size: usize,
    pub interf_length: usize,
    pub bin_2_gen: usize,
    /// Photons per output bin per unit of anode current.
    pub curr_to_photon: f64,
}

impl Default for ElectronicsConfig {
    fn default() -> Self {
        Self {
            n_chan: 109,
            pulse_length: 1000,
            amp_size: 10_000,
            interf_length: 6200,
            bin_2_gen: 1020,
            curr_to_photon: 1.0,
        }
    }
}

impl ElectronicsConfig {
    /// Sub-samples covered by the digitized acquisition window.
    pub fn window_len(&self) -> usize {
        self.bin_2_gen * SUBSAMPLES_PER_BIN
    }

    /// Length of every per-channel analog buffer, including pulse padding on both ends.
    pub fn analog_len(&self) -> usize {
        self.window_len() + 2 * self.pulse_length + 2
    }

    /// Range of placement times for background photons.
    pub fn background_len(&self) -> usize {
        self.window_len() + self.pulse_length + SUBSAMPLES_PER_BIN
    }

    /// Constant shift that puts a hit at `Tmin` inside the padded buffer.
    pub fn window_offset(&self) -> f64 {
        (WINDOW_FRACTION * self.window_len() as f64 + self.pulse_length as f64).floor()
    }

    /// Buffer indices averaged into the per-channel baseline.
    pub fn baseline_range(&self) -> RangeInclusive<usize> {
        self.pulse_length..=self.window_len() + self.pulse_length
    }

    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("n_chan", self.n_chan),
            ("pulse_length", self.pulse_length),
            ("amp_size", self.amp_size),
            ("interf_length", self.interf_length),
            ("bin_2_gen", self.bin_2_gen),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(SimError::Config(format!("{name} must be positive")));
            }
        }
        if !self.curr_to_photon.is_finite() || self.curr_to_photon < 0.0 {
            return Err(SimError::Config(format!(
                "curr_to_photon must be finite and non-negative, got {}",
                self.curr_to_photon
            )));
        }
        Ok(())
    }
}

/// Detector tables consumed by the synthesis, background and digitization stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    /// Single-photoelectron impulse response.
    pub pulse: Vec<f64>,
    /// Inverse CDF of the single-photoelectron gain.
    pub amplitudes: Vec<f64>,
    pub relative_current: Vec<f64>,
    pub calibration: Vec<f64>,
    /// Even-bin and odd-bin pedestal rails per channel.
    pub pedestals: Vec<[f64; 2]>,
    /// Per-channel timing skew in analog sub-samples.
    pub timing_offsets: Vec<i64>,
    pub interference: Vec<f64>,
    pub interference_amp: Vec<f64>,
    pub mean_current: f64,
}

impl ParameterSet {
    /// Check that every table is fully populated for `config`.
    pub fn validate(&self, config: &ElectronicsConfig) -> Result<()> {
        check_len("pulse template", self.pulse.len(), config.pulse_length)?;
        check_len("amplitude table", self.amplitudes.len(), config.amp_size)?;
        check_len("relative current", self.relative_current.len(), config.n_chan)?;
        check_len("calibration", self.calibration.len(), config.n_chan)?;
        check_len("pedestals", self.pedestals.len(), config.n_chan)?;
        check_len("timing offsets", self.timing_offsets.len(), config.n_chan)?;
        check_len("interference waveform", self.interference.len(), config.interf_length)?;
        check_len("interference amplitude", self.interference_amp.len(), config.n_chan)?;

        check_finite("pulse template", &self.pulse)?;
        check_finite("amplitude table", &self.amplitudes)?;
        check_finite("relative current", &self.relative_current)?;
        check_finite("calibration", &self.calibration)?;
        check_finite("pedestals", self.pedestals.as_flattened())?;
        check_finite("interference waveform", &self.interference)?;
        check_finite("interference amplitude", &self.interference_amp)?;

        if !self.mean_current.is_finite() {
            return Err(SimError::Config(format!(
                "mean current must be finite, got {}",
                self.mean_current
            )));
        }
        Ok(())
    }
}

fn check_len(table: &'static str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(SimError::TableLength {
            table,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_finite(table: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(SimError::Config(format!(
            "{table} entry {index} is {}",
            values[index]
        ))),
        None => Ok(()),
    }
}
