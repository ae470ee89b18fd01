use rand::Rng;

use crate::error::{Result, SimError, Stage};

use super::hits::HitList;
use super::pulse::{self, AnalogBuffers};
use super::{ElectronicsConfig, HIT_TIME_SCALE, ParameterSet};

/// Buffer index at which the pulse of a hit arriving at `time` starts.
pub fn placement_offset(config: &ElectronicsConfig, time: f64, t_min: f64) -> i64 {
    (HIT_TIME_SCALE * (time - t_min) + config.window_offset()).floor() as i64
}

/// Superpose one gain-scaled pulse template per hit into the analog buffers.
///
/// Hits are placed relative to the list's `Tmin`. A hit whose pulse would not
/// fit inside its channel buffer aborts synthesis.
pub fn synthesize<R: Rng + ?Sized>(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    hits: &HitList,
    buffers: &mut AnalogBuffers,
    rng: &mut R,
) -> Result<()> {
    let t_min = hits.t_min();

    for hit in hits {
        let amplitude = pulse::draw_amplitude(&params.amplitudes, rng);
        let offset = placement_offset(config, hit.time, t_min);
        pulse::superpose_pulse(buffers.channel_mut(hit.channel), &params.pulse, offset, amplitude)
            .map_err(|e| SimError::OutOfRange {
                stage: Stage::Synthesis,
                channel: hit.channel,
                offset: e.offset,
                len: e.len,
            })?;
    }

    log::debug!(
        "Synthesized {} hits into {} channels (Tmin = {})",
        hits.len(),
        buffers.n_chan(),
        t_min
    );
    Ok(())
}
