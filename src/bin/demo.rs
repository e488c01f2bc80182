//! Samples a two-peaked 1D target with and without parallel tempering and prints how
//! much time the cold chain spends in each peak.

use std::error::Error;

use tempered_mcmc::config::SamplerConfig;
use tempered_mcmc::history::ChainHistory;
use tempered_mcmc::ladder::TemperatureLadder;
use tempered_mcmc::parameters::ParameterSpace;
use tempered_mcmc::single_chain::SingleChainSampler;
use tempered_mcmc::tempering::ParallelTemperingSampler;

/// Equal mixture of N(-4, 0.5^2) and N(4, 0.5^2), on the log scale.
fn bimodal(_: &(), p: &[f64]) -> f64 {
    let a = -0.5 * ((p[0] + 4.0) / 0.5).powi(2);
    let b = -0.5 * ((p[0] - 4.0) / 0.5).powi(2);
    a.max(b) + (1.0 + (-(a - b).abs()).exp()).ln()
}

fn right_peak_share(history: &ChainHistory) -> f64 {
    let cold = history.cold_chain();
    cold.iter().filter(|&&x| x > 0.0).count() as f64 / cold.len() as f64
}

fn main() -> Result<(), Box<dyn Error>> {
    const ITERATIONS: usize = 50_000;
    const SEED: u64 = 42;

    let config = SamplerConfig::new(ParameterSpace::new(["x"])?)
        .with_initial_point(vec![-4.0])
        .set_seed(SEED);

    let mut single = SingleChainSampler::new(config.clone(), bimodal, ())?;
    let summary = single.run_progress(ITERATIONS)?;
    println!(
        "Single chain: acceptance {:.1}%, jump scale {:?}, {} tuning rounds",
        summary.acceptance_percent,
        summary.jump_scale.as_slice(),
        summary.tuning_rounds
    );
    println!(
        "  share of samples in right peak: {:.3}",
        right_peak_share(single.history())
    );

    let ladder = TemperatureLadder::geometric(5, 81.0)?;
    let config = config.with_temperatures(ladder.as_slice().to_vec());
    let mut pt = ParallelTemperingSampler::new(config, bimodal, ())?;
    let summary = pt.run_progress(ITERATIONS)?;
    println!("Parallel tempering over {:?}", summary.temperatures);
    for (t, pct) in summary.temperatures.iter().zip(&summary.acceptance_percent) {
        println!("  T = {t:>5}: acceptance {pct:.1}%");
    }
    println!(
        "  swaps accepted {}/{} ({:.1}%)",
        summary.swaps.accepted,
        summary.swaps.attempted,
        summary.swaps.rate() * 100.0
    );
    println!(
        "  share of samples in right peak: {:.3}",
        right_peak_share(pt.history())
    );
    if let Some(mean) = pt.history().mean_after(0, 0.1) {
        println!("  cold-chain mean after 10% burn-in: {:.3}", mean[0]);
    }
    Ok(())
}
