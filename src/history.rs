/*!
Append-only record of a run: one row per iteration, one entry per temperature.

A single-chain run is stored as a history with one temperature, so both samplers hand
out the same type. Parameter vectors are stored row-major as
`[iteration][temperature][parameter]`; the ndarray views returned by
[`ChainHistory::params_array`] use the `(iteration, parameter, temperature)` axis order
expected by plotting code.
*/

use ndarray::{s, Array1, Array2, Array3, Axis};

use crate::metropolis::ChainState;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainHistory {
    n_params: usize,
    n_temps: usize,
    params: Vec<f64>,
    likelihoods: Vec<f64>,
}

impl ChainHistory {
    pub fn new(n_params: usize, n_temps: usize) -> Self {
        Self::with_capacity(n_params, n_temps, 0)
    }

    pub fn with_capacity(n_params: usize, n_temps: usize, iterations: usize) -> Self {
        Self {
            n_params,
            n_temps,
            params: Vec::with_capacity(iterations * n_temps * n_params),
            likelihoods: Vec::with_capacity(iterations * n_temps),
        }
    }

    /// Appends one iteration. `states` yields one chain state per temperature, in ladder order.
    pub fn push<'a, I>(&mut self, states: I)
    where
        I: IntoIterator<Item = &'a ChainState>,
    {
        let mut pushed = 0;
        for state in states {
            debug_assert_eq!(state.params.len(), self.n_params);
            self.params.extend_from_slice(&state.params);
            self.likelihoods.push(state.tempered);
            pushed += 1;
        }
        debug_assert_eq!(pushed, self.n_temps, "one state per temperature is required");
    }

    /// Drops every recorded iteration, keeping the allocation.
    pub fn clear(&mut self) {
        self.params.clear();
        self.likelihoods.clear();
    }

    /// Number of recorded iterations.
    pub fn iterations(&self) -> usize {
        if self.n_temps == 0 {
            0
        } else {
            self.likelihoods.len() / self.n_temps
        }
    }

    /// Number of stored (parameter vector, likelihood) entries: iterations × temperatures.
    pub fn n_entries(&self) -> usize {
        self.likelihoods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.likelihoods.is_empty()
    }

    pub fn n_params(&self) -> usize {
        self.n_params
    }

    pub fn n_temperatures(&self) -> usize {
        self.n_temps
    }

    /// Parameter vector recorded at `iteration` for temperature index `temp`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn sample(&self, iteration: usize, temp: usize) -> &[f64] {
        assert!(temp < self.n_temps, "temperature index out of range");
        let start = (iteration * self.n_temps + temp) * self.n_params;
        &self.params[start..start + self.n_params]
    }

    /// Tempered likelihood recorded at `iteration` for temperature index `temp`.
    pub fn likelihood(&self, iteration: usize, temp: usize) -> f64 {
        assert!(temp < self.n_temps, "temperature index out of range");
        self.likelihoods[iteration * self.n_temps + temp]
    }

    pub fn last(&self, temp: usize) -> Option<&[f64]> {
        self.iterations()
            .checked_sub(1)
            .map(|last| self.sample(last, temp))
    }

    /// Samples of one temperature as an `(iteration, parameter)` matrix.
    pub fn chain(&self, temp: usize) -> Array2<f64> {
        assert!(temp < self.n_temps, "temperature index out of range");
        Array2::from_shape_fn((self.iterations(), self.n_params), |(i, j)| {
            self.params[(i * self.n_temps + temp) * self.n_params + j]
        })
    }

    /// The temperature-1.0 chain, i.e. the samples of the target itself.
    pub fn cold_chain(&self) -> Array2<f64> {
        self.chain(0)
    }

    pub fn chain_likelihoods(&self, temp: usize) -> Array1<f64> {
        assert!(temp < self.n_temps, "temperature index out of range");
        (0..self.iterations())
            .map(|i| self.likelihoods[i * self.n_temps + temp])
            .collect()
    }

    /// All samples as an `(iteration, parameter, temperature)` array.
    pub fn params_array(&self) -> Array3<f64> {
        let (p, t) = (self.n_params, self.n_temps);
        Array3::from_shape_fn((self.iterations(), p, t), |(i, j, k)| {
            self.params[(i * t + k) * p + j]
        })
    }

    /// All tempered likelihoods as an `(iteration, temperature)` array.
    pub fn likelihoods_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.iterations(), self.n_temps), |(i, k)| {
            self.likelihoods[i * self.n_temps + k]
        })
    }

    /// Per-parameter mean of chain `temp` after discarding the first `burn_fraction` of it.
    ///
    /// Returns `None` if nothing is left after the burn.
    pub fn mean_after(&self, temp: usize, burn_fraction: f64) -> Option<Array1<f64>> {
        let n = self.iterations();
        let burn = ((n as f64) * burn_fraction.clamp(0.0, 1.0)) as usize;
        self.chain(temp).slice(s![burn.., ..]).mean_axis(Axis(0))
    }
}

/// Accepted versus total proposals for one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptanceCounters {
    pub accepted: u64,
    pub proposed: u64,
}

impl AcceptanceCounters {
    pub fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Accepted fraction of proposals, 0 when nothing was proposed.
    pub fn fraction(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    /// Acceptances as a percentage of `iterations`.
    pub fn percent_of(&self, iterations: usize) -> f64 {
        if iterations == 0 {
            0.0
        } else {
            self.accepted as f64 / iterations as f64 * 100.0
        }
    }
}

/// Neighbor exchanges in a parallel-tempering run. Never reset during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapCounter {
    pub accepted: u64,
    pub attempted: u64,
}

impl SwapCounter {
    pub fn record(&mut self, accepted: bool) {
        self.attempted += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn state(params: &[f64], tempered: f64) -> ChainState {
        ChainState {
            params: params.to_vec(),
            raw: tempered,
            tempered,
        }
    }

    #[test]
    fn layout_and_shapes() {
        let mut h = ChainHistory::new(2, 3);
        for i in 0..4 {
            let i = i as f64;
            h.push(&[
                state(&[i, 10.0 + i], -i),
                state(&[100.0 + i, 110.0 + i], -2.0 * i),
                state(&[200.0 + i, 210.0 + i], -3.0 * i),
            ]);
        }
        assert_eq!(h.iterations(), 4);
        assert_eq!(h.n_entries(), 12);
        assert_eq!(h.sample(2, 1), &[102.0, 112.0]);
        assert_eq!(h.likelihood(3, 2), -9.0);
        assert_eq!(h.last(0), Some(&[3.0, 13.0][..]));

        let arr = h.params_array();
        assert_eq!(arr.shape(), &[4, 2, 3]);
        assert_eq!(arr[[1, 0, 2]], 201.0);
        assert_eq!(arr[[1, 1, 2]], 211.0);

        let like = h.likelihoods_array();
        assert_eq!(like.shape(), &[4, 3]);
        assert_eq!(like[[2, 1]], -4.0);

        let hot = h.chain(2);
        assert_eq!(hot.shape(), &[4, 2]);
        assert_eq!(hot[[3, 0]], 203.0);
        assert_eq!(h.chain_likelihoods(0), arr1(&[0.0, -1.0, -2.0, -3.0]));
    }

    #[test]
    fn clear_and_mean_after() {
        let mut h = ChainHistory::new(1, 1);
        for i in 0..8 {
            h.push(&[state(&[i as f64], 0.0)]);
        }
        let mean = h.mean_after(0, 0.5).unwrap();
        assert_abs_diff_eq!(mean[0], 5.5, epsilon = 1e-12);
        assert!(h.mean_after(0, 1.0).is_none());

        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.iterations(), 0);
        assert_eq!(h.last(0), None);
    }

    #[test]
    fn counters() {
        let mut a = AcceptanceCounters::default();
        assert_eq!(a.fraction(), 0.0);
        for i in 0..10 {
            a.record(i % 4 == 0);
        }
        assert_eq!(a.accepted, 3);
        assert_eq!(a.proposed, 10);
        assert_abs_diff_eq!(a.percent_of(10), 30.0, epsilon = 1e-12);
        a.reset();
        assert_eq!(a, AcceptanceCounters::default());

        let mut s = SwapCounter::default();
        s.record(true);
        s.record(false);
        assert_eq!(s.accepted, 1);
        assert_abs_diff_eq!(s.rate(), 0.5);
    }
}
