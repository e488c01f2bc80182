/*!
Gaussian random-walk proposals and the adaptive jump-scale controller.

Each parameter `j` is perturbed independently by `Normal(0, scale[j])`. When bounds are
configured, the perturbation for a component is redrawn until the candidate lands inside
its interval, up to a retry cap.

When the caller does not fix the jump scale, the sampler runs a warm-up window of `W`
iterations and hands the observed acceptance fraction to
[`ProposalController::tune_after_warmup`]. Fractions outside the acceptable band shrink
(too few acceptances) or grow (too many) every scale by a random factor, and the caller
restarts the warm-up. Fractions far from the band get a larger correction than fractions
near it.
*/

use log::{info, warn};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ConfigError, McmcError, McmcResult};
use crate::parameters::Bounds;

/// Per-parameter standard deviations of the Gaussian proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpScale(Vec<f64>);

impl JumpScale {
    /// Creates a jump scale; every entry must be positive and finite.
    pub fn new(values: Vec<f64>) -> Result<Self, ConfigError> {
        for (index, &value) in values.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidJumpScale { index, value });
            }
        }
        Ok(Self(values))
    }

    /// Draws an untuned starting scale, each entry uniform on `(0, 1]`.
    pub fn random<R: Rng + ?Sized>(n_params: usize, rng: &mut R) -> Self {
        Self((0..n_params).map(|_| 1.0 - rng.gen::<f64>()).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

/// Thresholds and correction magnitudes of the warm-up tuning loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningConfig {
    /// Number of iterations in one warm-up window.
    pub window: usize,
    /// Below this fraction the scale is shrunk by the far factor.
    pub far_low: f64,
    /// Lower edge of the acceptable band (inclusive).
    pub acceptable_low: f64,
    /// Upper edge of the acceptable band (inclusive).
    pub acceptable_high: f64,
    /// Above this fraction the scale is grown by the far factor.
    pub far_high: f64,
    /// Corrections far from the band use a factor drawn from `Uniform(1, far_factor)`.
    pub far_factor: f64,
    /// Corrections near the band use a factor drawn from `Uniform(1, near_factor)`.
    pub near_factor: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            window: 300,
            far_low: 0.30,
            acceptable_low: 0.55,
            acceptable_high: 0.85,
            far_high: 0.95,
            far_factor: 5.0,
            near_factor: 2.0,
        }
    }
}

impl TuningConfig {
    /// Sets the acceptable band `[low, high]`, leaving the far thresholds untouched.
    pub fn with_acceptable_band(mut self, low: f64, high: f64) -> Self {
        self.acceptable_low = low;
        self.acceptable_high = high;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::NonPositive("tuning window"));
        }
        let edges = [
            0.0,
            self.far_low,
            self.acceptable_low,
            self.acceptable_high,
            self.far_high,
            1.0,
        ];
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::InvalidTuning(format!(
                "need 0 <= far_low <= acceptable_low <= acceptable_high <= far_high <= 1, got {:?}",
                &edges[1..5]
            )));
        }
        if self.acceptable_low >= self.acceptable_high {
            return Err(ConfigError::InvalidTuning(
                "acceptable band is empty".to_string(),
            ));
        }
        if !(self.far_factor > 1.0 && self.near_factor > 1.0) {
            return Err(ConfigError::InvalidTuning(
                "correction factors must exceed 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Places an acceptance fraction in one of the five bands.
    pub fn classify(&self, fraction: f64) -> AcceptanceBand {
        if fraction < self.acceptable_low {
            if fraction < self.far_low {
                AcceptanceBand::FarLow
            } else {
                AcceptanceBand::NearLow
            }
        } else if fraction > self.acceptable_high {
            if fraction > self.far_high {
                AcceptanceBand::FarHigh
            } else {
                AcceptanceBand::NearHigh
            }
        } else {
            AcceptanceBand::Acceptable
        }
    }
}

/// Where an observed warm-up acceptance fraction falls relative to the target band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceBand {
    FarLow,
    NearLow,
    Acceptable,
    NearHigh,
    FarHigh,
}

/// Result of one tuning checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningOutcome {
    /// The scale is final; the warm-up samples are kept.
    Finalized,
    /// The scale was corrected; the caller must restart the warm-up.
    Adjusted(AcceptanceBand),
}

impl TuningOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, TuningOutcome::Finalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TuningPhase {
    Adapting,
    Finalized,
    Fixed,
}

/// Owns the jump scale and the warm-up tuning state.
#[derive(Debug, Clone)]
pub struct ProposalController {
    scale: JumpScale,
    tuning: TuningConfig,
    phase: TuningPhase,
    rounds: usize,
    max_rounds: usize,
    max_bound_retries: usize,
}

impl ProposalController {
    /// A controller whose scale is supplied by the caller and never tuned.
    pub fn fixed(scale: JumpScale, max_bound_retries: usize) -> Self {
        Self {
            scale,
            tuning: TuningConfig::default(),
            phase: TuningPhase::Fixed,
            rounds: 0,
            max_rounds: 0,
            max_bound_retries,
        }
    }

    /// A controller that starts from `initial` and adapts it during warm-up.
    pub fn adaptive(
        initial: JumpScale,
        tuning: TuningConfig,
        max_rounds: usize,
        max_bound_retries: usize,
    ) -> Self {
        Self {
            scale: initial,
            tuning,
            phase: TuningPhase::Adapting,
            rounds: 0,
            max_rounds,
            max_bound_retries,
        }
    }

    pub fn scale(&self) -> &JumpScale {
        &self.scale
    }

    /// `true` while a warm-up checkpoint is still pending.
    pub fn needs_tuning(&self) -> bool {
        self.phase == TuningPhase::Adapting
    }

    /// Number of corrections applied so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Draws a candidate from the current position with the owned scale.
    pub fn propose<R: Rng + ?Sized>(
        &self,
        current: &[f64],
        bounds: Option<&Bounds>,
        rng: &mut R,
    ) -> McmcResult<Vec<f64>> {
        propose(current, &self.scale, bounds, self.max_bound_retries, rng)
    }

    /// Classifies the warm-up acceptance fraction and corrects the scale in place.
    ///
    /// Returns [`McmcError::TuningExhausted`] once more than the configured number of
    /// corrections would be needed.
    pub fn tune_after_warmup<R: Rng + ?Sized>(
        &mut self,
        acceptance_fraction: f64,
        rng: &mut R,
    ) -> McmcResult<TuningOutcome> {
        if self.phase != TuningPhase::Adapting {
            return Ok(TuningOutcome::Finalized);
        }

        let band = self.tuning.classify(acceptance_fraction);
        let upper = match band {
            AcceptanceBand::Acceptable => {
                self.phase = TuningPhase::Finalized;
                info!(
                    "jump scale finalized at {:?} (acceptance {:.3})",
                    self.scale.as_slice(),
                    acceptance_fraction
                );
                return Ok(TuningOutcome::Finalized);
            }
            AcceptanceBand::FarLow | AcceptanceBand::FarHigh => self.tuning.far_factor,
            AcceptanceBand::NearLow | AcceptanceBand::NearHigh => self.tuning.near_factor,
        };

        if self.rounds >= self.max_rounds {
            return Err(McmcError::TuningExhausted {
                rounds: self.rounds,
            });
        }
        self.rounds += 1;

        let shrink = matches!(band, AcceptanceBand::FarLow | AcceptanceBand::NearLow);
        for s in self.scale.0.iter_mut() {
            let factor = rng.gen_range(1.0..upper);
            if shrink {
                *s /= factor;
            } else {
                *s *= factor;
            }
        }

        warn!(
            "acceptance {:.3} outside [{}, {}]; jump scales too {}, changed to {:?}",
            acceptance_fraction,
            self.tuning.acceptable_low,
            self.tuning.acceptable_high,
            if shrink { "large" } else { "small" },
            self.scale.as_slice()
        );
        Ok(TuningOutcome::Adjusted(band))
    }
}

/// Draws `current[j] + Normal(0, scale[j])` for every component.
///
/// With bounds, each component is redrawn independently until it lies inside its
/// interval; after `max_retries` failed draws the call returns
/// [`McmcError::NonTerminationRisk`].
pub fn propose<R: Rng + ?Sized>(
    current: &[f64],
    scale: &JumpScale,
    bounds: Option<&Bounds>,
    max_retries: usize,
    rng: &mut R,
) -> McmcResult<Vec<f64>> {
    let mut proposed = Vec::with_capacity(current.len());
    for (j, (&x, &s)) in current.iter().zip(scale.as_slice()).enumerate() {
        let normal = Normal::new(0.0, s)
            .map_err(|_| ConfigError::InvalidJumpScale { index: j, value: s })?;
        let next = match bounds.and_then(|b| b.get(j)) {
            None => x + normal.sample(rng),
            Some(interval) => {
                let mut retries = 0;
                loop {
                    let candidate = x + normal.sample(rng);
                    if interval.contains(candidate) {
                        break candidate;
                    }
                    retries += 1;
                    if retries >= max_retries {
                        return Err(McmcError::NonTerminationRisk {
                            parameter: j,
                            retries,
                        });
                    }
                }
            }
        };
        proposed.push(next);
    }
    Ok(proposed)
}
