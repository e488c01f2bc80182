/*!
The Metropolis accept rule and a single chain walking at a fixed temperature.

Both samplers advance chains through [`ChainWalker::step`], so a single-chain run and a
one-rung tempering run consume their random streams identically.

The accept rule depends on the likelihood scale:

- log scale: accept iff `proposed - current >= ln(u)`,
- linear scale: accept iff `proposed / current >= u`,

with `u ~ Uniform[0, 1)`. A proposal that does not decrease the (log-)likelihood is
therefore always accepted.
*/

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::McmcResult;
use crate::history::AcceptanceCounters;
use crate::likelihood::{Likelihood, LikelihoodAdapter, LikelihoodMode};
use crate::parameters::ParameterSpace;
use crate::proposal::ProposalController;

/// Current position of a chain together with its likelihood.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub params: Vec<f64>,
    /// Likelihood as returned by the user function.
    pub raw: f64,
    /// Likelihood after the temperature transform of the chain's rung.
    pub tempered: f64,
}

/// Decides a Metropolis transition given the tempered current and proposed values.
///
/// ```rust
/// use tempered_mcmc::likelihood::LikelihoodMode;
/// use tempered_mcmc::metropolis::accepts;
///
/// // Uphill moves are always taken.
/// assert!(accepts(LikelihoodMode::Log, -3.0, -1.0, 0.999));
/// // A drop of 1 nat is taken only if ln(u) <= -1.
/// assert!(accepts(LikelihoodMode::Log, 0.0, -1.0, 0.3));
/// assert!(!accepts(LikelihoodMode::Log, 0.0, -1.0, 0.4));
/// // Linear scale compares the ratio itself.
/// assert!(accepts(LikelihoodMode::Linear, 2.0, 1.0, 0.5));
/// assert!(!accepts(LikelihoodMode::Linear, 2.0, 1.0, 0.51));
/// ```
pub fn accepts(mode: LikelihoodMode, current: f64, proposed: f64, u: f64) -> bool {
    match mode {
        LikelihoodMode::Log => proposed - current >= u.ln(),
        LikelihoodMode::Linear => proposed / current >= u,
    }
}

/// Everything observed during one Metropolis step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub accepted: bool,
    pub current: f64,
    pub proposed: f64,
    pub uniform: f64,
}

/// One Metropolis chain at a fixed temperature with its own random stream.
#[derive(Debug, Clone)]
pub struct ChainWalker {
    pub state: ChainState,
    pub temperature: f64,
    pub acceptance: AcceptanceCounters,
    pub rng: SmallRng,
}

impl ChainWalker {
    /// Seeds the chain, draws (or takes) its starting point and evaluates it.
    pub fn start<D, L>(
        adapter: LikelihoodAdapter<'_, D, L>,
        space: &ParameterSpace,
        initial: Option<&[f64]>,
        temperature: f64,
        seed: u64,
    ) -> McmcResult<Self>
    where
        L: Likelihood<D>,
    {
        let mut rng = SmallRng::seed_from_u64(seed);
        let params = match initial {
            Some(point) => point.to_vec(),
            None => space.random_point(&mut rng),
        };
        let (raw, tempered) = adapter.evaluate(&params, temperature)?;
        Ok(Self {
            state: ChainState {
                params,
                raw,
                tempered,
            },
            temperature,
            acceptance: AcceptanceCounters::default(),
            rng,
        })
    }

    /// Puts the chain back at `state` and clears its counters. The random stream continues.
    pub fn reset_to(&mut self, state: ChainState) {
        self.state = state;
        self.acceptance.reset();
    }

    /// Proposes a move, evaluates it and applies the accept rule.
    ///
    /// On rejection the state is left untouched, so the caller records the previous
    /// position again.
    pub fn step<D, L>(
        &mut self,
        adapter: LikelihoodAdapter<'_, D, L>,
        controller: &ProposalController,
        space: &ParameterSpace,
    ) -> McmcResult<Transition>
    where
        L: Likelihood<D>,
    {
        let proposed = controller.propose(&self.state.params, space.bounds(), &mut self.rng)?;
        let (raw, tempered) = adapter.evaluate(&proposed, self.temperature)?;
        let uniform: f64 = self.rng.gen();
        let accepted = accepts(adapter.mode(), self.state.tempered, tempered, uniform);
        let transition = Transition {
            accepted,
            current: self.state.tempered,
            proposed: tempered,
            uniform,
        };
        if accepted {
            self.state = ChainState {
                params: proposed,
                raw,
                tempered,
            };
        }
        self.acceptance.record(accepted);
        Ok(transition)
    }
}
