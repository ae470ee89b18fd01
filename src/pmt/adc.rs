use rand::Rng;
use rayon::prelude::*;

use crate::error::{Result, SimError, Stage};

use super::pulse::AnalogBuffers;
use super::{ElectronicsConfig, ParameterSet, SUBSAMPLES_PER_BIN};

/// Row-major integer matrix of ADC counts.
///
/// As produced by [`digitize`] rows are channels and columns are time bins;
/// [`DigitizedMatrix::transposed`] gives the bin-major view used for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitizedMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
}

impl DigitizedMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Build from equal-length rows; `None` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks() rejects a zero size
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    pub fn transposed(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        out
    }
}

/// Per-channel jitter drawn once per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPhase {
    /// Sub-sample shift of the sampling clock, in [0, 25).
    pub shift: usize,
    /// Starting index into the interference waveform.
    pub interference: usize,
}

impl ChannelPhase {
    pub fn draw<R: Rng + ?Sized>(config: &ElectronicsConfig, rng: &mut R) -> Self {
        Self {
            shift: rng.random_range(0..SUBSAMPLES_PER_BIN),
            interference: rng.random_range(0..config.interf_length),
        }
    }
}

/// Mean of the analog samples over the acquisition window.
pub fn baseline(config: &ElectronicsConfig, buffer: &[f64]) -> f64 {
    let window = &buffer[config.baseline_range()];
    window.iter().sum::<f64>() / window.len() as f64
}

/// Convert one channel's analog buffer into `bin_2_gen` ADC counts.
///
/// Each bin reads one sub-sample, removes the baseline, applies the
/// calibration, adds the pedestal rail selected by bin parity and the scaled
/// interference waveform, then truncates toward zero.
pub fn digitize_channel(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    channel: usize,
    buffer: &[f64],
    phase: ChannelPhase,
    out: &mut [i32],
) -> Result<()> {
    let cal = params.calibration[channel];
    if cal == 0.0 {
        return Err(SimError::ZeroCalibration { channel });
    }

    let s_avg = baseline(config, buffer);
    let timing_offset = params.timing_offsets[channel];
    let pedestals = params.pedestals[channel];
    let interf_amp = params.interference_amp[channel];
    let interf_len = config.interf_length as i64;

    for (i, count) in out.iter_mut().enumerate().take(config.bin_2_gen) {
        let step = (i * SUBSAMPLES_PER_BIN) as i64;
        let index = config.pulse_length as i64 + phase.shift as i64 + step + timing_offset;
        let sample = usize::try_from(index)
            .ok()
            .and_then(|k| buffer.get(k))
            .ok_or_else(|| SimError::OutOfRange {
                stage: Stage::Digitization,
                channel,
                offset: index,
                len: buffer.len(),
            })?;

        let interf_index = (step + timing_offset + phase.interference as i64).rem_euclid(interf_len);
        let value = (sample - s_avg) / cal
            + pedestals[i % 2]
            + interf_amp * params.interference[interf_index as usize];
        *count = value as i32;
    }
    Ok(())
}

/// Digitize every channel with freshly drawn phases.
pub fn digitize<R: Rng + ?Sized>(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    buffers: &AnalogBuffers,
    rng: &mut R,
) -> Result<DigitizedMatrix> {
    let phases: Vec<ChannelPhase> = (0..buffers.n_chan())
        .map(|_| ChannelPhase::draw(config, rng))
        .collect();
    digitize_with_phases(config, params, buffers, &phases)
}

/// Digitize every channel with the given per-channel phases.
pub fn digitize_with_phases(
    config: &ElectronicsConfig,
    params: &ParameterSet,
    buffers: &AnalogBuffers,
    phases: &[ChannelPhase],
) -> Result<DigitizedMatrix> {
    if phases.len() != buffers.n_chan() {
        return Err(SimError::TableLength {
            table: "channel phases",
            expected: buffers.n_chan(),
            found: phases.len(),
        });
    }
    let mut matrix = DigitizedMatrix::zeros(buffers.n_chan(), config.bin_2_gen);

    // lowest failing channel wins, whatever the scheduling
    let outcomes: Vec<Result<()>> = matrix
        .data
        .par_chunks_mut(config.bin_2_gen)
        .zip(buffers.channels().par_iter())
        .zip(phases.par_iter())
        .enumerate()
        .map(|(channel, ((out, buffer), &phase))| {
            digitize_channel(config, params, channel, buffer, phase, out)
        })
        .collect();
    outcomes.into_iter().collect::<Result<()>>()?;

    log::debug!(
        "Digitized {} channels x {} bins",
        matrix.rows(),
        matrix.cols()
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> ElectronicsConfig {
        ElectronicsConfig {
            n_chan: 2,
            pulse_length: 4,
            amp_size: 1,
            interf_length: 6,
            bin_2_gen: 6,
            curr_to_photon: 1.0,
        }
    }

    fn params(config: &ElectronicsConfig) -> ParameterSet {
        ParameterSet {
            pulse: vec![1.0; config.pulse_length],
            amplitudes: vec![1.0],
            relative_current: vec![0.0; config.n_chan],
            calibration: vec![1.0; config.n_chan],
            pedestals: vec![[0.0; 2]; config.n_chan],
            timing_offsets: vec![0; config.n_chan],
            interference: vec![0.0; config.interf_length],
            interference_amp: vec![0.0; config.n_chan],
            mean_current: 0.0,
        }
    }

    const NO_JITTER: ChannelPhase = ChannelPhase {
        shift: 0,
        interference: 0,
    };

    #[test]
    fn pedestal_alternates_with_bin_parity() {
        let config = config();
        let mut params = params(&config);
        params.pedestals[0] = [100.7, -20.9];
        let buffer = vec![0.0; config.analog_len()];
        let mut out = vec![0; config.bin_2_gen];

        digitize_channel(&config, &params, 0, &buffer, NO_JITTER, &mut out).unwrap();

        assert_eq!(out, vec![100, -20, 100, -20, 100, -20]);
    }

    #[test]
    fn interference_follows_phase_and_offset() {
        let config = config();
        let mut params = params(&config);
        params.interference = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        params.interference_amp[1] = 10.0;
        params.timing_offsets[1] = -2;
        let buffer = vec![0.0; config.analog_len()];
        let mut out = vec![0; config.bin_2_gen];
        let phase = ChannelPhase {
            shift: 3,
            interference: 4,
        };

        digitize_channel(&config, &params, 1, &buffer, phase, &mut out).unwrap();

        // index = (25 i - 2 + 4) mod 6 = (i + 2) mod 6
        let expected: Vec<i32> = (0..6).map(|i| 10 * ((i + 2) % 6)).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn baseline_is_removed_before_calibration() {
        let config = config();
        let mut params = params(&config);
        params.calibration[0] = 0.5;
        // constant 3.0 everywhere: baseline 3.0, every sample reads zero
        let mut buffer = vec![3.0; config.analog_len()];
        // single spike read by bin 2
        buffer[4 + 50] += 1.0;
        let mut out = vec![0; config.bin_2_gen];

        digitize_channel(&config, &params, 0, &buffer, NO_JITTER, &mut out).unwrap();

        let s_avg = 3.0 + 1.0 / 151.0;
        assert!((baseline(&config, &buffer) - s_avg).abs() < 1e-12);
        assert_eq!(out[2], ((4.0 - s_avg) / 0.5) as i32);
        assert_eq!(out[2], 1);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn truncation_is_toward_zero() {
        let config = config();
        let mut params = params(&config);
        params.pedestals[0] = [-1.9, 1.9];
        let buffer = vec![0.0; config.analog_len()];
        let mut out = vec![0; config.bin_2_gen];

        digitize_channel(&config, &params, 0, &buffer, NO_JITTER, &mut out).unwrap();

        assert_eq!(&out[..2], &[-1, 1]);
    }

    #[test]
    fn zero_calibration_names_channel() {
        let config = config();
        let mut params = params(&config);
        params.calibration[1] = 0.0;
        let buffers = AnalogBuffers::new(&config);

        let err = digitize_with_phases(&config, &params, &buffers, &[NO_JITTER; 2]).unwrap_err();
        assert!(matches!(err, SimError::ZeroCalibration { channel: 1 }));
    }

    #[test]
    fn first_failing_channel_is_reported() {
        let config = ElectronicsConfig {
            n_chan: 16,
            ..config()
        };
        let mut params = params(&config);
        for ch in [3, 9, 14] {
            params.calibration[ch] = 0.0;
        }
        params.timing_offsets[5] = -10;
        let buffers = AnalogBuffers::new(&config);

        for _ in 0..20 {
            let err =
                digitize_with_phases(&config, &params, &buffers, &[NO_JITTER; 16]).unwrap_err();
            assert!(matches!(err, SimError::ZeroCalibration { channel: 3 }));
        }
    }

    #[test]
    fn drawn_phases_stay_in_range() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(17);
        let mut seen_shift = [false; SUBSAMPLES_PER_BIN];
        let mut seen_interf = vec![false; config.interf_length];

        for _ in 0..2000 {
            let phase = ChannelPhase::draw(&config, &mut rng);
            assert!(phase.shift < SUBSAMPLES_PER_BIN);
            assert!(phase.interference < config.interf_length);
            seen_shift[phase.shift] = true;
            seen_interf[phase.interference] = true;
        }
        assert!(seen_shift.iter().all(|&s| s));
        assert!(seen_interf.iter().all(|&s| s));
    }

    #[test]
    fn timing_offset_past_buffer_is_out_of_range() {
        let config = config();
        let mut params = params(&config);
        params.timing_offsets[0] = -10;
        let buffers = AnalogBuffers::new(&config);

        let err = digitize_with_phases(&config, &params, &buffers, &[NO_JITTER; 2]).unwrap_err();
        assert!(matches!(
            err,
            SimError::OutOfRange {
                stage: Stage::Digitization,
                channel: 0,
                offset: -6,
                ..
            }
        ));
    }

    #[test]
    fn transpose_twice_is_identity() {
        let mut m = DigitizedMatrix::zeros(3, 4);
        for (k, v) in m.data.iter_mut().enumerate() {
            *v = k as i32 * 7 - 5;
        }
        let t = m.transposed();
        assert_eq!((t.rows(), t.cols()), (4, 3));
        assert_eq!(t.get(1, 2), m.get(2, 1));
        assert_eq!(m.row(1), &[23, 30, 37, 44]);
        assert_eq!(t.row(3), &[16, 44, 72]);
        assert_eq!(t.transposed(), m);
    }

    #[test]
    fn matrix_shape_is_channels_by_bins() {
        let config = config();
        let params = params(&config);
        let buffers = AnalogBuffers::new(&config);
        let mut rng = StdRng::seed_from_u64(0);

        let m = digitize(&config, &params, &buffers, &mut rng).unwrap();

        assert_eq!((m.rows(), m.cols()), (2, 6));
        assert_eq!(m.iter_rows().count(), 2);
        assert!(m.iter_rows().all(|row| row.len() == 6));
    }
}
