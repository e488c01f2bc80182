/*!
# Parallel tempering

[`ParallelTemperingSampler`] runs one Metropolis chain per rung of a
[`TemperatureLadder`]. Every iteration each chain takes one step against its own
tempered likelihood; every `K` iterations neighbors `(t, t + 1)` are offered an exchange
of their positions, visited in ladder order.

For untempered likelihoods `L1` (chain `t`) and `L2` (chain `t + 1`) the exchange is
accepted iff

```text
( |L2|^(1/T_t) * |L1|^(1/T_{t+1}) ) / ( |L1|^(1/T_t) * |L2|^(1/T_{t+1}) ) >= u,  u ~ Uniform[0, 1)
```

In log mode the user function returns `ln L`, so the same ratio is evaluated in log space
as `exp((1/T_t - 1/T_{t+1}) * (ln L2 - ln L1))`.

The per-temperature steps only depend on each chain's own state and random stream, so
they run on the rayon pool when [`SamplerConfig::parallel`] is set. Swaps run
sequentially after all chains have stepped.

If no jump scale is configured, one is tuned on a separate temperature-1 chain before
the tempering loop starts and then shared by all temperatures.

## Example

```rust
use tempered_mcmc::config::SamplerConfig;
use tempered_mcmc::parameters::ParameterSpace;
use tempered_mcmc::tempering::ParallelTemperingSampler;

// Two well-separated modes at -4 and +4.
let bimodal = |_: &(), p: &[f64]| {
    let a = -0.5 * (p[0] + 4.0).powi(2);
    let b = -0.5 * (p[0] - 4.0).powi(2);
    a.max(b) + (1.0 + (-(a - b).abs()).exp()).ln()
};
let config = SamplerConfig::new(ParameterSpace::new(["x"]).unwrap())
    .with_jump_scale(vec![1.0])
    .with_temperatures(vec![1.0, 3.0, 9.0, 27.0])
    .set_seed(7);
let mut pt = ParallelTemperingSampler::new(config, bimodal, ()).unwrap();
let summary = pt.run(2_000).unwrap();

assert_eq!(pt.history().n_entries(), 2_000 * 4);
assert!(summary.swaps.accepted > 0);
```
*/

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::SamplerConfig;
use crate::error::{ConfigError, McmcResult};
use crate::history::{AcceptanceCounters, ChainHistory, SwapCounter};
use crate::ladder::TemperatureLadder;
use crate::likelihood::{Likelihood, LikelihoodAdapter, LikelihoodMode};
use crate::metropolis::ChainWalker;
use crate::proposal::{JumpScale, ProposalController};
use crate::single_chain::tune_jump_scale;

const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Exchange ratio for moving the state with untempered likelihood `l2` to temperature
/// `t1` and the state with `l1` to temperature `t2`.
///
/// Swapping the arguments gives the reciprocal ratio.
///
/// ```rust
/// use tempered_mcmc::likelihood::LikelihoodMode;
/// use tempered_mcmc::tempering::swap_ratio;
///
/// // The better state (4.0 > 1.0) moving to the colder rung is favored.
/// let r = swap_ratio(LikelihoodMode::Linear, 1.0, 4.0, 1.0, 2.0);
/// assert!((r - 2.0).abs() < 1e-12);
/// let back = swap_ratio(LikelihoodMode::Linear, 4.0, 1.0, 1.0, 2.0);
/// assert!((r * back - 1.0).abs() < 1e-12);
/// ```
pub fn swap_ratio(mode: LikelihoodMode, l1: f64, l2: f64, t1: f64, t2: f64) -> f64 {
    match mode {
        LikelihoodMode::Log => {
            let beta = 1.0 / t1 - 1.0 / t2;
            if beta == 0.0 {
                1.0
            } else {
                (beta * (l2 - l1)).exp()
            }
        }
        LikelihoodMode::Linear => {
            let top = l2.abs().powf(1.0 / t1) * l1.abs().powf(1.0 / t2);
            let bottom = l1.abs().powf(1.0 / t1) * l2.abs().powf(1.0 / t2);
            top / bottom
        }
    }
}

/// What a tempering run reports besides its history.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperingSummary {
    pub iterations: usize,
    pub temperatures: Vec<f64>,
    /// Acceptance counters, one per temperature.
    pub acceptance: Vec<AcceptanceCounters>,
    /// Accepted proposals as a percentage of the iteration count, one per temperature.
    pub acceptance_percent: Vec<f64>,
    pub swaps: SwapCounter,
    pub jump_scale: JumpScale,
    pub tuning_rounds: usize,
}

/// Replica-exchange Metropolis over a user likelihood `L` evaluated on dataset `D`.
pub struct ParallelTemperingSampler<D, L> {
    pub config: SamplerConfig,
    pub likelihood: L,
    pub data: D,
    ladder: TemperatureLadder,
    history: ChainHistory,
}

impl<D, L> ParallelTemperingSampler<D, L>
where
    L: Likelihood<D> + Sync,
    D: Sync,
{
    /// Validates `config` and builds a sampler. Without configured temperatures the ladder
    /// is `[1.0]`.
    pub fn new(config: SamplerConfig, likelihood: L, data: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let ladder = config.ladder()?;
        let history = ChainHistory::new(config.space.len(), ladder.len());
        Ok(Self {
            config,
            likelihood,
            data,
            ladder,
            history,
        })
    }

    pub fn ladder(&self) -> &TemperatureLadder {
        &self.ladder
    }

    pub fn history(&self) -> &ChainHistory {
        &self.history
    }

    pub fn into_history(self) -> ChainHistory {
        self.history
    }

    /// Runs all temperatures for `n_iterations` recorded iterations.
    ///
    /// If the run fails, the rows recorded before the failure remain available through
    /// [`history`](Self::history).
    pub fn run(&mut self, n_iterations: usize) -> McmcResult<TemperingSummary> {
        self.run_inner(n_iterations, None)
    }

    /// Like [`run`](Self::run), with an [`indicatif`] progress bar showing the cold-chain
    /// acceptance rate and the number of accepted swaps.
    pub fn run_progress(&mut self, n_iterations: usize) -> McmcResult<TemperingSummary> {
        let pb = ProgressBar::new(n_iterations as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        pb.set_prefix(format!("{} temperatures", self.ladder.len()));
        let res = self.run_inner(n_iterations, Some(&pb));
        pb.finish_with_message("Done!");
        res
    }

    fn run_inner(
        &mut self,
        n_iterations: usize,
        pb: Option<&ProgressBar>,
    ) -> McmcResult<TemperingSummary> {
        if n_iterations == 0 {
            return Err(ConfigError::NonPositive("iteration count").into());
        }
        let config = &self.config;
        let space = &config.space;
        let mode = config.mode;
        let n_temps = self.ladder.len() as u64;
        let adapter = LikelihoodAdapter::new(&self.likelihood, &self.data, mode);
        self.history = ChainHistory::with_capacity(space.len(), self.ladder.len(), n_iterations);

        let controller = match config.jump_scale()? {
            Some(scale) => ProposalController::fixed(scale, config.max_bound_retries),
            None => tune_jump_scale(adapter, config, config.seed.wrapping_add(n_temps + 1))?,
        };

        let initial = config.initial_point.as_deref();
        let mut walkers = self
            .ladder
            .as_slice()
            .iter()
            .enumerate()
            .map(|(t, &temperature)| {
                let seed = config.seed.wrapping_add(t as u64);
                ChainWalker::start(adapter, space, initial, temperature, seed)
            })
            .collect::<McmcResult<Vec<_>>>()?;
        let mut swap_rng = SmallRng::seed_from_u64(config.seed.wrapping_add(n_temps));
        let mut swaps = SwapCounter::default();

        debug!(
            "parallel tempering: {} iterations, ladder {:?}, swap interval {}, seed {}",
            n_iterations,
            self.ladder.as_slice(),
            config.swap_interval,
            config.seed
        );

        let mut last_update = Instant::now();
        for i in 1..=n_iterations {
            if config.parallel {
                walkers
                    .par_iter_mut()
                    .try_for_each(|w| w.step(adapter, &controller, space).map(|_| ()))?;
            } else {
                for w in walkers.iter_mut() {
                    w.step(adapter, &controller, space)?;
                }
            }

            if i % config.swap_interval == 0 {
                attempt_swaps(&mut walkers, mode, &mut swap_rng, &mut swaps);
            }

            self.history.push(walkers.iter().map(|w| &w.state));

            if let Some(pb) = pb {
                if last_update.elapsed() >= UPDATE_INTERVAL || i == n_iterations {
                    pb.set_position(i as u64);
                    pb.set_message(format!(
                        "AcceptRate={:.3} Swaps={}",
                        walkers[0].acceptance.fraction(),
                        swaps.accepted
                    ));
                    last_update = Instant::now();
                }
            }
        }

        let acceptance: Vec<AcceptanceCounters> = walkers.iter().map(|w| w.acceptance).collect();
        Ok(TemperingSummary {
            iterations: n_iterations,
            temperatures: self.ladder.as_slice().to_vec(),
            acceptance_percent: acceptance
                .iter()
                .map(|a| a.percent_of(n_iterations))
                .collect(),
            acceptance,
            swaps,
            jump_scale: controller.scale().clone(),
            tuning_rounds: controller.rounds(),
        })
    }
}

/// Offers one exchange to every adjacent pair, coldest pair first.
///
/// An accepted exchange swaps positions and untempered likelihoods; each chain then
/// re-tempers the value for its own rung. Acceptance counters stay with their rung.
fn attempt_swaps<R: Rng + ?Sized>(
    walkers: &mut [ChainWalker],
    mode: LikelihoodMode,
    rng: &mut R,
    swaps: &mut SwapCounter,
) {
    for t in 0..walkers.len().saturating_sub(1) {
        let (left, right) = walkers.split_at_mut(t + 1);
        let (cold, hot) = (&mut left[t], &mut right[0]);
        let ratio = swap_ratio(
            mode,
            cold.state.raw,
            hot.state.raw,
            cold.temperature,
            hot.temperature,
        );
        let u: f64 = rng.gen();
        let accepted = ratio >= u;
        swaps.record(accepted);
        if accepted {
            std::mem::swap(&mut cold.state, &mut hot.state);
            cold.state.tempered = mode.temper(cold.state.raw, cold.temperature);
            hot.state.tempered = mode.temper(hot.state.raw, hot.temperature);
            trace!("swapped temperatures {} and {} (ratio {ratio:.4})", t, t + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McmcError;
    use crate::likelihood::Fallible;
    use crate::parameters::{Bounds, ParameterSpace};
    use crate::single_chain::SingleChainSampler;
    use approx::assert_abs_diff_eq;

    fn x_space() -> ParameterSpace {
        ParameterSpace::new(["x"]).unwrap()
    }

    fn bimodal(_: &(), p: &[f64]) -> f64 {
        let a = -0.5 * ((p[0] + 4.0) / 0.5).powi(2);
        let b = -0.5 * ((p[0] - 4.0) / 0.5).powi(2);
        a.max(b) + (1.0 + (-(a - b).abs()).exp()).ln()
    }

    #[test]
    fn swap_ratio_is_reciprocal() {
        for mode in [LikelihoodMode::Log, LikelihoodMode::Linear] {
            for &(l1, l2, t1, t2) in &[
                (-3.0, -1.0, 1.0, 2.0),
                (0.2, 0.7, 1.0, 5.0),
                (-0.4, 2.5, 2.0, 3.0),
                (1.5, -8.0, 1.0, 10.0),
            ] {
                let forward = swap_ratio(mode, l1, l2, t1, t2);
                let backward = swap_ratio(mode, l2, l1, t1, t2);
                assert_abs_diff_eq!(forward * backward, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn swap_ratio_matches_closed_forms() {
        // Linear: (|L2|/|L1|)^(1/T1 - 1/T2).
        let r = swap_ratio(LikelihoodMode::Linear, 0.5, 2.0, 1.0, 4.0);
        assert_abs_diff_eq!(r, 4.0_f64.powf(0.75), epsilon = 1e-12);
        // Log: exp((1/T1 - 1/T2) (l2 - l1)).
        let r = swap_ratio(LikelihoodMode::Log, -5.0, -1.0, 1.0, 2.0);
        assert_abs_diff_eq!(r, 2.0_f64.exp(), epsilon = 1e-12);
        // Equal temperatures always exchange.
        assert_eq!(swap_ratio(LikelihoodMode::Log, -5.0, f64::NEG_INFINITY, 2.0, 2.0), 1.0);
    }

    #[test]
    fn history_has_entry_per_iteration_and_temperature() {
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![1.0])
            .with_temperatures(vec![1.0, 2.0, 5.0])
            .set_seed(5);
        let mut pt = ParallelTemperingSampler::new(config, bimodal, ()).unwrap();
        let summary = pt.run(500).unwrap();
        let h = pt.history();
        assert_eq!(h.iterations(), 500);
        assert_eq!(h.n_entries(), 500 * 3);
        assert_eq!(h.params_array().shape(), &[500, 1, 3]);
        assert_eq!(h.likelihoods_array().shape(), &[500, 3]);
        assert_eq!(summary.acceptance.len(), 3);
        assert_eq!(summary.acceptance_percent.len(), 3);
        assert!(summary.acceptance.iter().all(|a| a.proposed == 500));
    }

    #[test]
    fn swap_count_is_bounded_by_checkpoints() {
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![1.0])
            .with_temperatures(vec![1.0, 2.0, 5.0])
            .with_swap_interval(10)
            .set_seed(9);
        let mut pt = ParallelTemperingSampler::new(config, bimodal, ()).unwrap();
        let summary = pt.run(500).unwrap();
        assert_eq!(summary.swaps.attempted, (500 / 10) * 2);
        assert!(summary.swaps.accepted <= summary.swaps.attempted);
    }

    #[test]
    fn single_rung_matches_single_chain() {
        let loglike = |_: &(), p: &[f64]| -0.5 * (p[0] - 3.0).powi(2) - 0.5 * p[1].powi(2);
        let space = ParameterSpace::new(["x", "y"]).unwrap();
        let config = SamplerConfig::new(space)
            .with_jump_scale(vec![0.5, 0.8])
            .set_seed(2024);

        let mut single = SingleChainSampler::new(config.clone(), loglike, ()).unwrap();
        let single_summary = single.run(1_000).unwrap();

        let mut pt = ParallelTemperingSampler::new(config, loglike, ()).unwrap();
        let pt_summary = pt.run(1_000).unwrap();

        assert_eq!(single.history(), pt.history());
        assert_eq!(single_summary.acceptance, pt_summary.acceptance[0]);
        assert_eq!(pt_summary.swaps, SwapCounter::default());
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![0.7])
            .with_temperatures(vec![1.0, 1.5, 3.0, 6.0])
            .set_seed(77);
        let mut par = ParallelTemperingSampler::new(config.clone(), bimodal, ()).unwrap();
        let mut seq =
            ParallelTemperingSampler::new(config.with_parallel(false), bimodal, ()).unwrap();
        let a = par.run(300).unwrap();
        let b = seq.run(300).unwrap();
        assert_eq!(a, b);
        assert_eq!(par.history(), seq.history());
    }

    #[test]
    fn hot_chains_flatten_likelihood() {
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![1.0])
            .with_temperatures(vec![1.0, 4.0])
            .set_seed(31);
        let mut pt = ParallelTemperingSampler::new(config, bimodal, ()).unwrap();
        pt.run(200).unwrap();
        // Stored likelihoods are the tempered ones: the hot rung holds raw / 4.
        let h = pt.history();
        for i in 0..h.iterations() {
            let x = h.sample(i, 1);
            assert_abs_diff_eq!(h.likelihood(i, 1), bimodal(&(), x) / 4.0, epsilon = 1e-9);
            let x = h.sample(i, 0);
            assert_abs_diff_eq!(h.likelihood(i, 0), bimodal(&(), x), epsilon = 1e-9);
        }
    }

    #[test]
    fn cold_chain_visits_both_modes() {
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![0.5])
            .with_temperatures(vec![1.0, 4.0, 16.0, 64.0])
            .with_initial_point(vec![-4.0])
            .set_seed(3);
        let mut pt = ParallelTemperingSampler::new(config, bimodal, ()).unwrap();
        let summary = pt.run(20_000).unwrap();
        let cold = pt.history().cold_chain();
        let right = cold.iter().filter(|&&x| x > 0.0).count() as f64 / cold.len() as f64;
        assert!(right > 0.2 && right < 0.8, "fraction in right mode {right}");
        assert!(summary.swaps.accepted > 0);
    }

    #[test]
    fn bounded_linear_run_stays_inside() {
        let like = |_: &(), p: &[f64]| (-(p[0] - 0.3).powi(2) - (p[1] + 1.0).powi(2)).exp();
        let space = ParameterSpace::new(["a", "b"])
            .unwrap()
            .with_bounds(Bounds::new([(0.0, 1.0), (-2.0, 0.0)]).unwrap())
            .unwrap();
        let config = SamplerConfig::new(space.clone())
            .with_mode(LikelihoodMode::Linear)
            .with_jump_scale(vec![0.3, 0.3])
            .with_temperatures(vec![1.0, 2.0, 3.0])
            .set_seed(13);
        let mut pt = ParallelTemperingSampler::new(config, like, ()).unwrap();
        pt.run(1_000).unwrap();
        let h = pt.history();
        for i in 0..h.iterations() {
            for t in 0..3 {
                assert!(space.contains(h.sample(i, t)));
            }
        }
    }

    #[test]
    fn tunes_shared_scale_when_unset() {
        let loglike = |_: &(), p: &[f64]| -0.5 * (p[0] / 3.0).powi(2);
        let config = SamplerConfig::new(x_space())
            .with_temperatures(vec![1.0, 2.0])
            .set_seed(8);
        let mut pt = ParallelTemperingSampler::new(config, loglike, ()).unwrap();
        let summary = pt.run(500).unwrap();
        assert!(summary.jump_scale.as_slice()[0] > 0.0);
        assert_eq!(pt.history().iterations(), 500);
    }

    #[test]
    fn evaluation_error_stops_the_run() {
        let failing = Fallible(|_: &(), p: &[f64]| {
            if p[0] > 2.0 {
                Err("left the tabulated range")
            } else {
                Ok(0.0)
            }
        });
        let config = SamplerConfig::new(x_space())
            .with_jump_scale(vec![1.0])
            .with_temperatures(vec![1.0, 2.0])
            .with_initial_point(vec![0.0])
            .set_seed(1);
        let mut pt = ParallelTemperingSampler::new(config, failing, ()).unwrap();
        let err = pt.run(10_000).unwrap_err();
        assert!(matches!(err, McmcError::LikelihoodEvaluation { .. }));
        assert!(pt.history().iterations() < 10_000);
    }

    #[test]
    fn bad_ladder_is_rejected() {
        let config = SamplerConfig::new(x_space()).with_temperatures(vec![2.0, 1.0]);
        assert!(matches!(
            ParallelTemperingSampler::new(config, bimodal, ()),
            Err(ConfigError::InvalidLadder(_))
        ));
    }
}
