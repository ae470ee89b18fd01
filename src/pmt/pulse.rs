//! Analog buffers and single-photoelectron pulse superposition.

use rand::Rng;

use super::ElectronicsConfig;

/// Per-channel analog signal, sampled at the sub-sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogBuffers {
    channels: Vec<Vec<f64>>,
}

impl AnalogBuffers {
    /// Allocate zero-filled buffers sized for `config`.
    pub fn new(config: &ElectronicsConfig) -> Self {
        Self {
            channels: vec![vec![0.0; config.analog_len()]; config.n_chan],
        }
    }

    pub fn n_chan(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, channel: usize) -> &[f64] {
        &self.channels[channel]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f64] {
        &mut self.channels[channel]
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Mutable per-channel buffers; their lengths must not change.
    pub(crate) fn channels_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.channels
    }
}

/// Placement that would write outside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub offset: i64,
    pub len: usize,
}

/// Draw a gain-distributed amplitude from the inverse-CDF table.
pub fn draw_amplitude<R: Rng + ?Sized>(table: &[f64], rng: &mut R) -> f64 {
    table[rng.random_range(0..table.len())]
}

/// Add `amplitude * pulse` into `buffer` starting at `offset`.
///
/// The whole pulse must fit; nothing is written otherwise.
pub fn superpose_pulse(
    buffer: &mut [f64],
    pulse: &[f64],
    offset: i64,
    amplitude: f64,
) -> Result<(), OutOfBounds> {
    let out_of_bounds = OutOfBounds {
        offset,
        len: buffer.len(),
    };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds)?;
    let end = start
        .checked_add(pulse.len())
        .filter(|&end| end <= buffer.len())
        .ok_or(out_of_bounds)?;

    for (sample, &shape) in buffer[start..end].iter_mut().zip(pulse) {
        *sample += amplitude * shape;
    }
    Ok(())
}

/// Like [`superpose_pulse`], but drops the part of the pulse past the buffer end.
pub fn superpose_pulse_clipped(buffer: &mut [f64], pulse: &[f64], offset: usize, amplitude: f64) {
    let Some(tail) = buffer.get_mut(offset..) else {
        return;
    };
    for (sample, &shape) in tail.iter_mut().zip(pulse) {
        *sample += amplitude * shape;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pulse_is_added_not_overwritten() {
        let mut buffer = vec![1.0; 8];
        superpose_pulse(&mut buffer, &[1.0, 2.0, 3.0], 2, 2.0).unwrap();
        assert_eq!(buffer, vec![1.0, 1.0, 3.0, 5.0, 7.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn pulse_ending_at_buffer_end_fits() {
        let mut buffer = vec![0.0; 4];
        superpose_pulse(&mut buffer, &[1.0, 1.0], 2, 1.0).unwrap();
        assert_eq!(buffer, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn overhanging_pulse_is_rejected_untouched() {
        let mut buffer = vec![0.0; 4];
        let err = superpose_pulse(&mut buffer, &[1.0, 1.0], 3, 1.0).unwrap_err();
        assert_eq!(err, OutOfBounds { offset: 3, len: 4 });
        assert_eq!(buffer, vec![0.0; 4]);

        let err = superpose_pulse(&mut buffer, &[1.0], -1, 1.0).unwrap_err();
        assert_eq!(err.offset, -1);
    }

    #[test]
    fn clipped_pulse_keeps_in_buffer_part() {
        let mut buffer = vec![0.0; 4];
        superpose_pulse_clipped(&mut buffer, &[1.0, 2.0, 3.0], 2, 1.0);
        assert_eq!(buffer, vec![0.0, 0.0, 1.0, 2.0]);
        superpose_pulse_clipped(&mut buffer, &[1.0], 9, 1.0);
        assert_eq!(buffer, vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn amplitudes_come_from_table() {
        let table = [0.5, 1.0, 1.5, 4.0];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let amp = draw_amplitude(&table, &mut rng);
            assert!(table.contains(&amp));
        }
    }
}
