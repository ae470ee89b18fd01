use std::time::Instant;

use rand::Rng;

use crate::error::Result;
use crate::pmt::adc::{self, DigitizedMatrix};
use crate::pmt::background;
use crate::pmt::hits::HitList;
use crate::pmt::pulse::AnalogBuffers;
use crate::pmt::waveform;
use crate::pmt::{ElectronicsConfig, ParameterSet};

/// Result of one simulated event.
#[derive(Debug, Clone)]
pub struct SimulatedEvent {
    /// Channel-major ADC counts.
    pub matrix: DigitizedMatrix,
    /// Background photons drawn per channel.
    pub background_counts: Vec<u64>,
}

/// Validated inputs shared by every event of a run.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: ElectronicsConfig,
    params: ParameterSet,
    hits: HitList,
}

impl Simulation {
    /// Check the configuration, tables and hits against each other.
    pub fn new(config: ElectronicsConfig, params: ParameterSet, hits: HitList) -> Result<Self> {
        config.validate()?;
        params.validate(&config)?;
        hits.validate(&config)?;
        Ok(Self {
            config,
            params,
            hits,
        })
    }

    pub fn config(&self) -> &ElectronicsConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn hits(&self) -> &HitList {
        &self.hits
    }

    pub fn run_event<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SimulatedEvent> {
        simulate_event(&self.config, &self.params, &self.hits, rng)
    }
}

/// Run the full front-end chain for one event.
///
/// Inputs are assumed validated (see [`Simulation::new`]).
pub fn simulate_event<R: Rng + ?Sized>(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    hits: &HitList,
    rng: &mut R,
) -> Result<SimulatedEvent> {
    let start = Instant::now();

    // Step 1: zero-filled analog buffers
    let mut buffers = AnalogBuffers::new(config);

    // Step 2: signal
    waveform::synthesize(config, params, hits, &mut buffers, rng)?;

    // Step 3: dark-current background
    let background_counts = background::inject_background(config, params, &mut buffers, rng)?;

    // Step 4: ADC
    let matrix = adc::digitize(config, params, &buffers, rng)?;

    log::info!(
        "Event done: {} hits, {} background photons, {:.1}ms",
        hits.len(),
        background_counts.iter().sum::<u64>(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(SimulatedEvent {
        matrix,
        background_counts,
    })
}
