/*!
# Single-chain Metropolis-Hastings

[`SingleChainSampler`] runs one Metropolis chain for `N` iterations. A run goes through
three phases:

1. **Initialize**: draw a starting point (uniform inside the bounds, or on `[0, 1)` per
   component without bounds) unless one is configured, and evaluate it.
2. **Warm-up / tuning**: only when no jump scale was configured. After the first `W`
   iterations the acceptance fraction is handed to the
   [`ProposalController`]. If the scale had to be corrected, history and counters are
   discarded and the chain restarts from the same starting point with the new scale.
3. **Production**: the remaining iterations run with a frozen scale.

Every iteration records exactly one row, whether the proposal was accepted or the
previous position repeated, so a successful run leaves `N` rows in the history.

## Example

```rust
use tempered_mcmc::config::SamplerConfig;
use tempered_mcmc::parameters::ParameterSpace;
use tempered_mcmc::single_chain::SingleChainSampler;

let loglike = |_: &(), p: &[f64]| -0.5 * (p[0] - 3.0).powi(2);
let config = SamplerConfig::new(ParameterSpace::new(["x"]).unwrap())
    .with_jump_scale(vec![0.5])
    .set_seed(42);
let mut sampler = SingleChainSampler::new(config, loglike, ()).unwrap();
let summary = sampler.run(1_000).unwrap();

assert_eq!(sampler.history().iterations(), 1_000);
assert!(summary.acceptance_percent > 0.0);
```
*/

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};

use crate::config::SamplerConfig;
use crate::error::{ConfigError, McmcResult};
use crate::history::{AcceptanceCounters, ChainHistory};
use crate::likelihood::{Likelihood, LikelihoodAdapter};
use crate::metropolis::ChainWalker;
use crate::proposal::{JumpScale, ProposalController};

const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// What a single-chain run reports besides its history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    pub iterations: usize,
    pub acceptance: AcceptanceCounters,
    /// Accepted proposals as a percentage of the iteration count.
    pub acceptance_percent: f64,
    /// Jump scale used for the production phase.
    pub jump_scale: JumpScale,
    /// Number of warm-up restarts caused by scale corrections.
    pub tuning_rounds: usize,
}

/// Metropolis-Hastings over a user likelihood `L` evaluated on dataset `D`.
pub struct SingleChainSampler<D, L> {
    pub config: SamplerConfig,
    pub likelihood: L,
    pub data: D,
    history: ChainHistory,
}

impl<D, L> SingleChainSampler<D, L>
where
    L: Likelihood<D>,
{
    /// Validates `config` and builds a sampler. Nothing is evaluated until [`run`](Self::run).
    pub fn new(config: SamplerConfig, likelihood: L, data: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let history = ChainHistory::new(config.space.len(), 1);
        Ok(Self {
            config,
            likelihood,
            data,
            history,
        })
    }

    /// Runs the chain for `n_iterations` recorded iterations.
    ///
    /// If the run fails, the rows recorded before the failure remain available through
    /// [`history`](Self::history).
    pub fn run(&mut self, n_iterations: usize) -> McmcResult<ChainSummary> {
        self.run_inner(n_iterations, None)
    }

    /// Like [`run`](Self::run), while drawing an [`indicatif`] progress bar that shows the
    /// running acceptance rate.
    pub fn run_progress(&mut self, n_iterations: usize) -> McmcResult<ChainSummary> {
        let pb = ProgressBar::new(n_iterations as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        pb.set_prefix("Chain");
        let res = self.run_inner(n_iterations, Some(&pb));
        pb.finish_with_message("Done!");
        res
    }

    pub fn history(&self) -> &ChainHistory {
        &self.history
    }

    pub fn into_history(self) -> ChainHistory {
        self.history
    }

    fn run_inner(
        &mut self,
        n_iterations: usize,
        pb: Option<&ProgressBar>,
    ) -> McmcResult<ChainSummary> {
        if n_iterations == 0 {
            return Err(ConfigError::NonPositive("iteration count").into());
        }
        let config = &self.config;
        let space = &config.space;
        let adapter = LikelihoodAdapter::new(&self.likelihood, &self.data, config.mode);
        self.history = ChainHistory::with_capacity(space.len(), 1, n_iterations);

        let mut walker = ChainWalker::start(
            adapter,
            space,
            config.initial_point.as_deref(),
            1.0,
            config.seed,
        )?;
        let initial = walker.state.clone();

        let mut controller = match config.jump_scale()? {
            Some(scale) => ProposalController::fixed(scale, config.max_bound_retries),
            None => ProposalController::adaptive(
                JumpScale::random(space.len(), &mut walker.rng),
                config.tuning.clone(),
                config.max_tuning_rounds,
                config.max_bound_retries,
            ),
        };
        let window = config.tuning.window;
        if controller.needs_tuning() && n_iterations < window {
            warn!(
                "run of {n_iterations} iterations is shorter than the {window}-iteration \
                 warm-up window; the jump scale will not be tuned"
            );
        }
        debug!(
            "single chain: {} iterations, {} parameters, seed {}",
            n_iterations,
            space.len(),
            config.seed
        );

        let mut last_update = Instant::now();
        let mut i = 0;
        while i < n_iterations {
            walker.step(adapter, &controller, space)?;
            self.history.push([&walker.state]);
            i += 1;

            if i == window && controller.needs_tuning() {
                let fraction = walker.acceptance.fraction();
                let outcome = controller.tune_after_warmup(fraction, &mut walker.rng)?;
                if !outcome.is_finalized() {
                    walker.reset_to(initial.clone());
                    self.history.clear();
                    i = 0;
                }
            }

            if let Some(pb) = pb {
                if last_update.elapsed() >= UPDATE_INTERVAL || i == n_iterations {
                    pb.set_position(i as u64);
                    pb.set_message(format!("AcceptRate={:.3}", walker.acceptance.fraction()));
                    last_update = Instant::now();
                }
            }
        }

        Ok(ChainSummary {
            iterations: n_iterations,
            acceptance: walker.acceptance,
            acceptance_percent: walker.acceptance.percent_of(n_iterations),
            jump_scale: controller.scale().clone(),
            tuning_rounds: controller.rounds(),
        })
    }
}

/// Tunes a jump scale on a throw-away temperature-1 chain.
///
/// Warm-up windows are repeated from the same starting point until the acceptance
/// fraction falls in the acceptable band; the samples themselves are discarded.
/// Used by parallel tempering, which shares one scale across all temperatures.
pub fn tune_jump_scale<D, L>(
    adapter: LikelihoodAdapter<'_, D, L>,
    config: &SamplerConfig,
    seed: u64,
) -> McmcResult<ProposalController>
where
    L: Likelihood<D>,
{
    let space = &config.space;
    let initial_point = config.initial_point.as_deref();
    let mut walker = ChainWalker::start(adapter, space, initial_point, 1.0, seed)?;
    let initial = walker.state.clone();
    let mut controller = ProposalController::adaptive(
        JumpScale::random(space.len(), &mut walker.rng),
        config.tuning.clone(),
        config.max_tuning_rounds,
        config.max_bound_retries,
    );

    loop {
        for _ in 0..config.tuning.window {
            walker.step(adapter, &controller, space)?;
        }
        let fraction = walker.acceptance.fraction();
        if controller
            .tune_after_warmup(fraction, &mut walker.rng)?
            .is_finalized()
        {
            return Ok(controller);
        }
        walker.reset_to(initial.clone());
    }
}
