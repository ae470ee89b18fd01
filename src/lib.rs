//! Photomultiplier front-end electronics simulator.
//!
//! Turns per-channel photoelectron arrival times into digitized ADC samples:
//! pulse-template superposition, Poisson dark-current background, and a
//! calibrated, pedestal- and interference-corrected digitizer.

pub mod config;
pub mod data_io;
pub mod error;
pub mod pipeline;
pub mod pmt;

pub use error::{Result, SimError, Stage};
