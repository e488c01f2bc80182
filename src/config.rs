/*!
Immutable run configuration shared by both samplers.

A [`SamplerConfig`] is assembled once with consuming builder methods and validated when
a sampler is constructed, so a sampler never observes a half-configured state.

# Examples

```rust
use tempered_mcmc::config::SamplerConfig;
use tempered_mcmc::likelihood::LikelihoodMode;
use tempered_mcmc::parameters::{Bounds, ParameterSpace};

let space = ParameterSpace::new(["x", "y"])
    .unwrap()
    .with_bounds(Bounds::new([(0.0, 1.0), (-5.0, 5.0)]).unwrap())
    .unwrap();
let config = SamplerConfig::new(space)
    .with_mode(LikelihoodMode::Linear)
    .with_jump_scale(vec![0.1, 0.5])
    .with_temperatures(vec![1.0, 2.0, 4.0])
    .set_seed(42);
assert!(config.validate().is_ok());

let bad = config.clone().with_jump_scale(vec![0.1]);
assert!(bad.validate().is_err());
```
*/

use rand::{thread_rng, Rng};

use crate::error::ConfigError;
use crate::ladder::TemperatureLadder;
use crate::likelihood::LikelihoodMode;
use crate::parameters::ParameterSpace;
use crate::proposal::{JumpScale, TuningConfig};

/// Default number of iterations between swap checkpoints.
pub const DEFAULT_SWAP_INTERVAL: usize = 10;
/// Default number of draws per component before a bounded proposal gives up.
pub const DEFAULT_MAX_BOUND_RETRIES: usize = 100_000;
/// Default number of warm-up corrections before tuning gives up.
pub const DEFAULT_MAX_TUNING_ROUNDS: usize = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub space: ParameterSpace,
    pub mode: LikelihoodMode,
    /// Fixed jump scale. `None` enables warm-up tuning.
    pub jump_scale: Option<Vec<f64>>,
    /// Temperature ladder for parallel tempering. `None` means `[1.0]`.
    pub temperatures: Option<Vec<f64>>,
    /// Starting point. `None` draws one at random.
    pub initial_point: Option<Vec<f64>>,
    pub tuning: TuningConfig,
    pub swap_interval: usize,
    pub max_bound_retries: usize,
    pub max_tuning_rounds: usize,
    pub seed: u64,
    /// Step the temperatures of a tempering run on the rayon pool.
    pub parallel: bool,
}

impl SamplerConfig {
    /// Log-scale likelihood, tuned jump scale, a random seed and default limits.
    pub fn new(space: ParameterSpace) -> Self {
        Self {
            space,
            mode: LikelihoodMode::Log,
            jump_scale: None,
            temperatures: None,
            initial_point: None,
            tuning: TuningConfig::default(),
            swap_interval: DEFAULT_SWAP_INTERVAL,
            max_bound_retries: DEFAULT_MAX_BOUND_RETRIES,
            max_tuning_rounds: DEFAULT_MAX_TUNING_ROUNDS,
            seed: thread_rng().gen::<u64>(),
            parallel: true,
        }
    }

    pub fn with_mode(mut self, mode: LikelihoodMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_jump_scale(mut self, scale: Vec<f64>) -> Self {
        self.jump_scale = Some(scale);
        self
    }

    pub fn with_temperatures(mut self, temperatures: Vec<f64>) -> Self {
        self.temperatures = Some(temperatures);
        self
    }

    pub fn with_initial_point(mut self, point: Vec<f64>) -> Self {
        self.initial_point = Some(point);
        self
    }

    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_swap_interval(mut self, interval: usize) -> Self {
        self.swap_interval = interval;
        self
    }

    pub fn with_max_bound_retries(mut self, retries: usize) -> Self {
        self.max_bound_retries = retries;
        self
    }

    pub fn with_max_tuning_rounds(mut self, rounds: usize) -> Self {
        self.max_tuning_rounds = rounds;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the seed; chain `i` of a tempering run is seeded with `seed + i`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks every field against the parameter space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jump_scale()?;
        self.ladder()?;
        if let Some(point) = &self.initial_point {
            self.space.check_point(point)?;
        }
        self.tuning.validate()?;
        if self.swap_interval == 0 {
            return Err(ConfigError::NonPositive("swap interval"));
        }
        if self.max_bound_retries == 0 {
            return Err(ConfigError::NonPositive("bound retry cap"));
        }
        if self.max_tuning_rounds == 0 {
            return Err(ConfigError::NonPositive("tuning round cap"));
        }
        Ok(())
    }

    /// The validated fixed jump scale, if one was supplied.
    pub fn jump_scale(&self) -> Result<Option<JumpScale>, ConfigError> {
        self.jump_scale
            .as_ref()
            .map(|scale| {
                self.space.check_len("jump scale", scale.len())?;
                JumpScale::new(scale.clone())
            })
            .transpose()
    }

    /// The validated temperature ladder, `[1.0]` when none was supplied.
    pub fn ladder(&self) -> Result<TemperatureLadder, ConfigError> {
        match &self.temperatures {
            Some(temps) => TemperatureLadder::new(temps.clone()),
            None => Ok(TemperatureLadder::identity()),
        }
    }
}
