//! Dark-current background.
//!
//! Each channel receives a homogeneous Poisson stream of single-photoelectron
//! pulses whose rate scales with the channel's relative anode current.
//! Channels are independent and are processed in parallel, each with its own
//! generator seeded from the caller's generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;

use crate::error::{Result, SimError};

use super::pulse::{self, AnalogBuffers};
use super::{ElectronicsConfig, ParameterSet, SUBSAMPLES_PER_BIN};

/// Expected number of background photons on `channel` over the background window.
pub fn expected_photons(config: &ElectronicsConfig, params: &ParameterSet, channel: usize) -> f64 {
    let rate_per_bin = params.mean_current * params.relative_current[channel] * config.curr_to_photon;
    rate_per_bin * config.background_len() as f64 / SUBSAMPLES_PER_BIN as f64
}

/// Draw the background photon count for one channel and superpose its pulses.
///
/// Returns the number of photons added.
pub fn inject_channel<R: Rng + ?Sized>(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    channel: usize,
    buffer: &mut [f64],
    rng: &mut R,
) -> Result<u64> {
    let count = draw_count(expected_photons(config, params, channel), channel, rng)?;
    let window = config.background_len();

    for _ in 0..count {
        let amplitude = pulse::draw_amplitude(&params.amplitudes, rng);
        let start = rng.random_range(0..window);
        // The window overhangs the buffer end by a few sub-samples that are never digitized.
        pulse::superpose_pulse_clipped(buffer, &params.pulse, start, amplitude);
    }
    Ok(count)
}

/// Add background to every channel. Returns the photon count per channel.
pub fn inject_background<R: Rng + ?Sized>(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    buffers: &mut AnalogBuffers,
    rng: &mut R,
) -> Result<Vec<u64>> {
    let seeds: Vec<u64> = (0..buffers.n_chan()).map(|_| rng.random()).collect();

    let counts = buffers
        .channels_mut()
        .par_iter_mut()
        .zip(seeds.par_iter())
        .enumerate()
        .map(|(channel, (buffer, &seed))| {
            let mut channel_rng = StdRng::seed_from_u64(seed);
            inject_channel(config, params, channel, buffer, &mut channel_rng)
        })
        .collect::<Result<Vec<u64>>>()?;

    log::debug!(
        "Injected {} background photons across {} channels",
        counts.iter().sum::<u64>(),
        counts.len()
    );
    Ok(counts)
}

fn draw_count<R: Rng + ?Sized>(mean: f64, channel: usize, rng: &mut R) -> Result<u64> {
    if mean == 0.0 {
        return Ok(0);
    }
    if !mean.is_finite() || mean < 0.0 {
        return Err(SimError::InvalidRate { channel, mean });
    }
    let dist = Poisson::new(mean).map_err(|_| SimError::InvalidRate { channel, mean })?;
    let count: f64 = dist.sample(rng);
    Ok(count as u64)
}
