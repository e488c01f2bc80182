//! Ordered temperatures for parallel tempering, coldest (exactly 1.0) first.

use crate::error::ConfigError;

/// Temperatures used by [`crate::tempering::ParallelTemperingSampler`].
///
/// The first entry is the identity temperature `1.0`; every entry is positive and finite.
/// Later entries are "hotter" and flatten the likelihood surface. The ladder is not
/// required to be increasing, only to start at 1.0.
///
/// ```rust
/// use tempered_mcmc::ladder::TemperatureLadder;
///
/// let ladder = TemperatureLadder::new(vec![1.0, 2.0, 5.0]).unwrap();
/// assert_eq!(ladder.len(), 3);
/// assert!(TemperatureLadder::new(vec![2.0, 5.0]).is_err());
///
/// let geometric = TemperatureLadder::geometric(4, 8.0).unwrap();
/// assert_eq!(geometric.len(), 4);
/// assert_eq!(geometric.get(0), Some(1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLadder(Vec<f64>);

impl TemperatureLadder {
    pub fn new(temperatures: Vec<f64>) -> Result<Self, ConfigError> {
        match temperatures.first() {
            None => return Err(ConfigError::InvalidLadder("ladder is empty".to_string())),
            Some(&first) if first != 1.0 => {
                return Err(ConfigError::InvalidLadder(format!(
                    "first temperature must be exactly 1.0, got {first}"
                )))
            }
            Some(_) => {}
        }
        if let Some((i, t)) = temperatures
            .iter()
            .enumerate()
            .find(|(_, t)| !(t.is_finite() && **t > 0.0))
        {
            return Err(ConfigError::InvalidLadder(format!(
                "temperature {i} must be positive and finite, got {t}"
            )));
        }
        Ok(Self(temperatures))
    }

    /// `n` temperatures spaced geometrically from 1.0 up to `max`.
    pub fn geometric(n: usize, max: f64) -> Result<Self, ConfigError> {
        if n == 0 {
            return Err(ConfigError::InvalidLadder("ladder is empty".to_string()));
        }
        let temps = (0..n)
            .map(|i| {
                if i == 0 {
                    1.0
                } else {
                    max.powf(i as f64 / (n - 1) as f64)
                }
            })
            .collect();
        Self::new(temps)
    }

    /// A single-rung ladder, equivalent to plain Metropolis-Hastings.
    pub fn identity() -> Self {
        Self(vec![1.0])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Number of adjacent `(t, t + 1)` pairs considered at each swap checkpoint.
    pub fn adjacent_pairs(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}
