/*!
Wrapping of the user-supplied likelihood.

The sampler treats the likelihood as an opaque, pure function of a dataset and a
parameter vector. Any `Fn(&D, &[f64]) -> f64` closure is a [`Likelihood`]; closures
that can fail are wrapped in [`Fallible`].

[`LikelihoodAdapter`] applies the temperature transform selected by [`LikelihoodMode`]:

- `Log`: the function returns a log-likelihood and tempering divides it by `T`.
- `Linear`: the function returns a likelihood and tempering raises its magnitude to
  `1/T` while keeping its sign, `sign(v) * |v|^(1/T)`.

# Examples

```rust
use tempered_mcmc::likelihood::{LikelihoodAdapter, LikelihoodMode};

let data = vec![1.0, 2.0, 3.0];
let loglike = |d: &Vec<f64>, p: &[f64]| -> f64 {
    d.iter().map(|x| -0.5 * (x - p[0]).powi(2)).sum()
};
let adapter = LikelihoodAdapter::new(&loglike, &data, LikelihoodMode::Log);
let (raw, tempered) = adapter.evaluate(&[2.0], 2.0).unwrap();
assert_eq!(raw, -1.0);
assert_eq!(tempered, -0.5);
```
*/

use crate::error::{BoxError, McmcError, McmcResult};

/// A likelihood (or log-likelihood) over a dataset `D`.
pub trait Likelihood<D> {
    /// Evaluates the untempered likelihood at `params`.
    fn evaluate(&self, data: &D, params: &[f64]) -> Result<f64, BoxError>;
}

impl<D, F> Likelihood<D> for F
where
    F: Fn(&D, &[f64]) -> f64,
{
    fn evaluate(&self, data: &D, params: &[f64]) -> Result<f64, BoxError> {
        Ok(self(data, params))
    }
}

/// Adapts a closure returning `Result<f64, E>` into a [`Likelihood`].
///
/// ```rust
/// use tempered_mcmc::likelihood::{Fallible, Likelihood};
///
/// let f = Fallible(|_: &(), p: &[f64]| {
///     if p[0] < 0.0 {
///         Err("negative rate")
///     } else {
///         Ok(-p[0])
///     }
/// });
/// assert!(f.evaluate(&(), &[-1.0]).is_err());
/// assert_eq!(f.evaluate(&(), &[2.0]).unwrap(), -2.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<D, F, E> Likelihood<D> for Fallible<F>
where
    F: Fn(&D, &[f64]) -> Result<f64, E>,
    E: Into<BoxError>,
{
    fn evaluate(&self, data: &D, params: &[f64]) -> Result<f64, BoxError> {
        (self.0)(data, params).map_err(Into::into)
    }
}

/// Scale on which the user function reports its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikelihoodMode {
    /// The function returns `ln L`.
    #[default]
    Log,
    /// The function returns `L` itself (possibly signed).
    Linear,
}

impl LikelihoodMode {
    /// Applies the temperature transform to an untempered value.
    pub fn temper(self, value: f64, temperature: f64) -> f64 {
        if temperature == 1.0 {
            return value;
        }
        match self {
            LikelihoodMode::Log => value / temperature,
            LikelihoodMode::Linear => {
                let scaled = value.abs().powf(1.0 / temperature);
                if value < 0.0 {
                    -scaled
                } else {
                    scaled
                }
            }
        }
    }
}

/// Borrowing view over a likelihood, its dataset and the mode.
///
/// The adapter has no state of its own; it is `Copy` and can be shared across threads
/// whenever the likelihood and dataset are `Sync`.
pub struct LikelihoodAdapter<'a, D, L> {
    likelihood: &'a L,
    data: &'a D,
    mode: LikelihoodMode,
}

impl<D, L> Clone for LikelihoodAdapter<'_, D, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, L> Copy for LikelihoodAdapter<'_, D, L> {}

impl<'a, D, L> LikelihoodAdapter<'a, D, L>
where
    L: Likelihood<D>,
{
    pub fn new(likelihood: &'a L, data: &'a D, mode: LikelihoodMode) -> Self {
        Self {
            likelihood,
            data,
            mode,
        }
    }

    pub fn mode(&self) -> LikelihoodMode {
        self.mode
    }

    /// Calls the user function. A failure or a NaN result becomes
    /// [`McmcError::LikelihoodEvaluation`].
    pub fn raw(&self, params: &[f64]) -> McmcResult<f64> {
        match self.likelihood.evaluate(self.data, params) {
            Ok(value) if value.is_nan() => Err(McmcError::LikelihoodEvaluation {
                params: params.to_vec(),
                source: "likelihood returned NaN".into(),
            }),
            Ok(value) => Ok(value),
            Err(source) => Err(McmcError::LikelihoodEvaluation {
                params: params.to_vec(),
                source,
            }),
        }
    }

    /// Returns `(untempered, tempered)` likelihood values at `params`.
    pub fn evaluate(&self, params: &[f64], temperature: f64) -> McmcResult<(f64, f64)> {
        let raw = self.raw(params)?;
        Ok((raw, self.mode.temper(raw, temperature)))
    }

    pub fn temper(&self, raw: f64, temperature: f64) -> f64 {
        self.mode.temper(raw, temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn log_mode_divides_by_temperature() {
        let m = LikelihoodMode::Log;
        assert_eq!(m.temper(-6.0, 1.0), -6.0);
        assert_eq!(m.temper(-6.0, 2.0), -3.0);
        assert_eq!(m.temper(4.0, 4.0), 1.0);
    }

    #[test]
    fn linear_mode_preserves_sign() {
        let m = LikelihoodMode::Linear;
        assert_abs_diff_eq!(m.temper(9.0, 2.0), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.temper(-9.0, 2.0), -3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.temper(-8.0, 3.0), -2.0, epsilon = 1e-12);
        assert_eq!(m.temper(0.0, 5.0), 0.0);
        assert_eq!(m.temper(-0.25, 1.0), -0.25);
    }

    #[test]
    fn nan_and_user_errors_become_evaluation_errors() {
        let nan = |_: &(), _: &[f64]| f64::NAN;
        let adapter = LikelihoodAdapter::new(&nan, &(), LikelihoodMode::Log);
        assert!(matches!(
            adapter.raw(&[1.0]),
            Err(McmcError::LikelihoodEvaluation { .. })
        ));

        let failing = Fallible(|_: &(), _: &[f64]| -> Result<f64, String> {
            Err("database offline".to_string())
        });
        let adapter = LikelihoodAdapter::new(&failing, &(), LikelihoodMode::Linear);
        let err = adapter.evaluate(&[0.5], 2.0).unwrap_err();
        assert!(err.to_string().contains("database offline"), "{err}");
    }

    #[test]
    fn infinite_values_pass_through() {
        let wall = |_: &(), p: &[f64]| if p[0] < 0.0 { f64::NEG_INFINITY } else { 0.0 };
        let adapter = LikelihoodAdapter::new(&wall, &(), LikelihoodMode::Log);
        let (raw, tempered) = adapter.evaluate(&[-1.0], 3.0).unwrap();
        assert_eq!(raw, f64::NEG_INFINITY);
        assert_eq!(tempered, f64::NEG_INFINITY);
    }
}
