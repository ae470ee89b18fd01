use crate::error::{Result, SimError};

use super::ElectronicsConfig;

/// A single detected photoelectron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub channel: usize,
    pub time: f64,
}

/// Hits of one simulated event together with their earliest arrival time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitList {
    hits: Vec<Hit>,
    t_min: f64,
}

impl HitList {
    /// Build a hit list, taking `Tmin` from the hits themselves (0 when empty).
    pub fn new(hits: Vec<Hit>) -> Self {
        let t_min = hits
            .iter()
            .map(|h| h.time)
            .min_by(f64::total_cmp)
            .unwrap_or(0.0);
        Self { hits, t_min }
    }

    /// Build a hit list with an externally computed `Tmin`.
    pub fn with_t_min(hits: Vec<Hit>, t_min: f64) -> Self {
        Self { hits, t_min }
    }

    pub fn t_min(&self) -> f64 {
        self.t_min
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.hits.iter()
    }

    pub fn validate(&self, config: &ElectronicsConfig) -> Result<()> {
        if !self.t_min.is_finite() {
            return Err(SimError::Config(format!("Tmin must be finite, got {}", self.t_min)));
        }
        for (i, hit) in self.hits.iter().enumerate() {
            if hit.channel >= config.n_chan {
                return Err(SimError::Config(format!(
                    "hit {i}: channel {} outside [0, {})",
                    hit.channel, config.n_chan
                )));
            }
            if !hit.time.is_finite() {
                return Err(SimError::Config(format!(
                    "hit {i}: non-finite arrival time {}",
                    hit.time
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HitList {
    type Item = &'a Hit;
    type IntoIter = std::slice::Iter<'a, Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_min_is_earliest_time() {
        let hits = HitList::new(vec![
            Hit { channel: 0, time: 12.5 },
            Hit { channel: 1, time: -3.0 },
            Hit { channel: 0, time: 4.0 },
        ]);
        assert_eq!(hits.t_min(), -3.0);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn empty_list_has_zero_t_min() {
        let hits = HitList::new(Vec::new());
        assert!(hits.is_empty());
        assert_eq!(hits.t_min(), 0.0);
    }

    #[test]
    fn channel_outside_array_is_rejected() {
        let config = ElectronicsConfig {
            n_chan: 2,
            ..ElectronicsConfig::default()
        };
        let hits = HitList::new(vec![Hit { channel: 2, time: 0.0 }]);
        assert!(matches!(hits.validate(&config), Err(SimError::Config(_))));
    }
}
