//! Flat-text inputs and the ADC matrix writer.
//!
//! Every table is loaded by its own task inside one rayon scope; each task
//! owns its result until the scope joins.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::pmt::adc::DigitizedMatrix;
use crate::pmt::hits::{Hit, HitList};
use crate::pmt::{ElectronicsConfig, ParameterSet};

/// Hit list column holding the channel id.
const HIT_CHANNEL_COLUMN: usize = 0;
/// Hit list column holding the arrival time.
const HIT_TIME_COLUMN: usize = 5;
/// Calibration file column holding the per-channel constant.
const CALIBRATION_COLUMN: usize = 13;

/// Locations of every input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    pub hits: PathBuf,
    pub calibration: PathBuf,
    pub relative_current: PathBuf,
    pub pulse: PathBuf,
    pub amplitudes: PathBuf,
    pub pedestals: PathBuf,
    pub timing_offsets: PathBuf,
    pub interference: PathBuf,
    pub interference_amp: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            hits: PathBuf::from("mosaic_hits_m01_Fe_1PeV_15_001_c001"),
            calibration: PathBuf::from("14484.cal"),
            relative_current: PathBuf::from("CurRels.dat"),
            pulse: PathBuf::from("Impulse2GHz.dat"),
            amplitudes: PathBuf::from("AmpDistrib.dat"),
            pedestals: PathBuf::from("Pedestals.dat"),
            timing_offsets: PathBuf::from("Toff.dat"),
            interference: PathBuf::from("Interf.dat"),
            interference_amp: PathBuf::from("InterfAmp.dat"),
        }
    }
}

impl InputPaths {
    /// Resolve every relative path against `dir`.
    pub fn rooted_at(&self, dir: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { dir.join(p) };
        Self {
            hits: join(&self.hits),
            calibration: join(&self.calibration),
            relative_current: join(&self.relative_current),
            pulse: join(&self.pulse),
            amplitudes: join(&self.amplitudes),
            pedestals: join(&self.pedestals),
            timing_offsets: join(&self.timing_offsets),
            interference: join(&self.interference),
            interference_amp: join(&self.interference_amp),
        }
    }
}

/// Load the hit list and every parameter table in parallel.
pub fn load_inputs(
    paths: &InputPaths,
    config: &ElectronicsConfig,
    mean_current: f64,
) -> Result<(ParameterSet, HitList)> {
    let n_chan = config.n_chan;

    let mut hits = None;
    let mut calibration = None;
    let mut relative_current = None;
    let mut pulse = None;
    let mut amplitudes = None;
    let mut pedestals = None;
    let mut timing_offsets = None;
    let mut interference = None;
    let mut interference_amp = None;

    rayon::scope(|s| {
        s.spawn(|_| hits = Some(load_hits(&paths.hits)));
        s.spawn(|_| calibration = Some(load_calibration(&paths.calibration, n_chan)));
        s.spawn(|_| relative_current = Some(load_values::<f64>(&paths.relative_current, n_chan)));
        s.spawn(|_| pulse = Some(load_values::<f64>(&paths.pulse, config.pulse_length)));
        s.spawn(|_| amplitudes = Some(load_values::<f64>(&paths.amplitudes, config.amp_size)));
        s.spawn(|_| pedestals = Some(load_pedestals(&paths.pedestals, n_chan)));
        s.spawn(|_| timing_offsets = Some(load_values::<i64>(&paths.timing_offsets, n_chan)));
        s.spawn(|_| interference = Some(load_values::<f64>(&paths.interference, config.interf_length)));
        s.spawn(|_| interference_amp = Some(load_values::<f64>(&paths.interference_amp, n_chan)));
    });

    let params = ParameterSet {
        pulse: joined(pulse)?,
        amplitudes: joined(amplitudes)?,
        relative_current: joined(relative_current)?,
        calibration: joined(calibration)?,
        pedestals: joined(pedestals)?,
        timing_offsets: joined(timing_offsets)?,
        interference: joined(interference)?,
        interference_amp: joined(interference_amp)?,
        mean_current,
    };
    let hits = joined(hits)?;

    log::info!(
        "Loaded {} hits (Tmin = {}) and parameter tables for {} channels",
        hits.len(),
        hits.t_min(),
        n_chan
    );
    Ok((params, hits))
}

fn joined<T>(slot: Option<Result<T>>) -> Result<T> {
    slot.unwrap_or_else(|| Err(SimError::Config("loader task did not complete".to_string())))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A number that may appear in an input table.
pub trait TableValue: FromStr {
    /// `false` for NaN and infinities, which `f64::from_str` accepts.
    fn is_finite(&self) -> bool;
}

impl TableValue for f64 {
    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl TableValue for i64 {
    fn is_finite(&self) -> bool {
        true
    }
}

fn parse_token<T: TableValue>(path: &Path, line: usize, token: &str) -> Result<T> {
    let bad_token = || SimError::Parse {
        path: path.to_path_buf(),
        line,
        token: token.to_string(),
    };
    let value: T = token.parse().map_err(|_| bad_token())?;
    if !value.is_finite() {
        return Err(bad_token());
    }
    Ok(value)
}

fn column<'a>(path: &Path, line: usize, tokens: &[&'a str], index: usize) -> Result<&'a str> {
    tokens.get(index).copied().ok_or_else(|| SimError::MissingColumn {
        path: path.to_path_buf(),
        line,
        column: index,
    })
}

/// Numbered non-blank lines (1-based).
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
}

/// Read the first `count` whitespace-separated values on the first line.
pub fn load_values<T: TableValue>(path: &Path, count: usize) -> Result<Vec<T>> {
    let text = read_text(path)?;
    let first = text.lines().next().unwrap_or("");
    let values = first
        .split_whitespace()
        .take(count)
        .map(|token| parse_token(path, 1, token))
        .collect::<Result<Vec<T>>>()?;

    if values.len() < count {
        return Err(SimError::ShortFile {
            path: path.to_path_buf(),
            expected: count,
            found: values.len(),
        });
    }
    Ok(values)
}

/// One calibration constant per line, taken from the fourteenth column.
pub fn load_calibration(path: &Path, n_chan: usize) -> Result<Vec<f64>> {
    let text = read_text(path)?;
    let values = data_lines(&text)
        .take(n_chan)
        .map(|(line, l)| {
            let tokens: Vec<&str> = l.split_whitespace().collect();
            parse_token(path, line, column(path, line, &tokens, CALIBRATION_COLUMN)?)
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() < n_chan {
        return Err(SimError::ShortFile {
            path: path.to_path_buf(),
            expected: n_chan,
            found: values.len(),
        });
    }
    Ok(values)
}

/// One line per channel: even-rail pedestal, odd-rail pedestal.
pub fn load_pedestals(path: &Path, n_chan: usize) -> Result<Vec<[f64; 2]>> {
    let text = read_text(path)?;
    let values = data_lines(&text)
        .take(n_chan)
        .map(|(line, l)| {
            let tokens: Vec<&str> = l.split_whitespace().collect();
            Ok([
                parse_token(path, line, column(path, line, &tokens, 0)?)?,
                parse_token(path, line, column(path, line, &tokens, 1)?)?,
            ])
        })
        .collect::<Result<Vec<[f64; 2]>>>()?;

    if values.len() < n_chan {
        return Err(SimError::ShortFile {
            path: path.to_path_buf(),
            expected: n_chan,
            found: values.len(),
        });
    }
    Ok(values)
}

/// Hit list: a header line, then channel id in column 0 and arrival time in column 5.
///
/// The header is the first non-blank line.
pub fn load_hits(path: &Path) -> Result<HitList> {
    let text = read_text(path)?;
    let hits = data_lines(&text)
        .skip(1)
        .map(|(line, l)| {
            let tokens: Vec<&str> = l.split_whitespace().collect();
            let raw = column(path, line, &tokens, HIT_CHANNEL_COLUMN)?;
            let id: f64 = parse_token(path, line, raw)?;
            if id < 0.0 {
                return Err(SimError::Parse {
                    path: path.to_path_buf(),
                    line,
                    token: raw.to_string(),
                });
            }
            let time = parse_token(path, line, column(path, line, &tokens, HIT_TIME_COLUMN)?)?;
            Ok(Hit {
                channel: id as usize,
                time,
            })
        })
        .collect::<Result<Vec<Hit>>>()?;

    Ok(HitList::new(hits))
}

/// Write the matrix bin-major: one line per time bin, channels tab-separated.
pub fn write_matrix<W: Write>(matrix: &DigitizedMatrix, mut writer: W) -> std::io::Result<()> {
    let by_bin = matrix.transposed();
    for bin in 0..by_bin.rows() {
        let line: Vec<String> = by_bin.row(bin).iter().map(i32::to_string).collect();
        writeln!(writer, "{}", line.join("\t"))?;
    }
    writer.flush()
}

/// Write `matrix` to `path`, leaving no file behind if the write fails.
pub fn save_matrix(matrix: &DigitizedMatrix, path: &Path) -> Result<()> {
    write_replacing(path, |writer| write_matrix(matrix, writer))?;
    log::info!(
        "Wrote {} bins x {} channels to {}",
        matrix.cols(),
        matrix.rows(),
        path.display()
    );
    Ok(())
}

/// Write through a sibling `.partial` file and rename it over `path` once complete.
fn write_replacing<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> std::io::Result<()>,
{
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = File::create(&partial)
        .and_then(|file| write(BufWriter::new(file)))
        .and_then(|()| fs::rename(&partial, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&partial);
        return Err(SimError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Output file for event `index` of `total`; a single event keeps `base` unchanged.
pub fn event_output_path(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "event".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{index:04}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{index:04}"),
    };
    base.with_file_name(name)
}
