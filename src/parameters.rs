/*!
Static description of the parameters being sampled.

A [`ParameterSpace`] is an ordered list of unique parameter names with an optional
per-parameter box constraint ([`Bounds`]). Every vector that flows through the
samplers (initial point, jump scale, proposals) is checked against its length.

# Examples

```rust
use tempered_mcmc::parameters::{Bounds, ParameterSpace};

let space = ParameterSpace::new(["mu", "sigma"])
    .unwrap()
    .with_bounds(Bounds::new([(-10.0, 10.0), (0.0, 5.0)]).unwrap())
    .unwrap();
assert_eq!(space.len(), 2);
assert!(space.contains(&[1.0, 2.0]));
assert!(!space.contains(&[1.0, -2.0]));
```
*/

use rand::Rng;
use std::collections::HashSet;

use crate::error::ConfigError;

/// A closed interval `[lo, hi]` with `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }

    /// Draws a value uniformly from `[lo, hi)`.
    ///
    /// Intervals wider than `f64::MAX` are sampled on the halved range and scaled back.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if (self.hi - self.lo).is_finite() {
            return rng.gen_range(self.lo..self.hi);
        }
        let (lo, hi) = (self.lo / 2.0, self.hi / 2.0);
        let u: f64 = rng.gen();
        (2.0 * (lo + u * (hi - lo))).clamp(self.lo, self.hi)
    }
}

/// One closed interval per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    intervals: Vec<Interval>,
}

impl Bounds {
    /// Builds a bounds set from `(lo, hi)` pairs, rejecting empty or non-finite intervals.
    pub fn new<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let intervals = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (lo, hi))| {
                if lo.is_finite() && hi.is_finite() && lo < hi {
                    Ok(Interval { lo, hi })
                } else {
                    Err(ConfigError::InvalidBound { index, lo, hi })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { intervals })
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Interval> {
        self.intervals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.intervals.len()
            && self.intervals.iter().zip(point).all(|(b, &x)| b.contains(x))
    }
}

/// Names (and optional bounds) of the sampled parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    names: Vec<String>,
    bounds: Option<Bounds>,
}

impl ParameterSpace {
    /// Creates an unconstrained parameter space. Names must be unique and non-empty as a list.
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::NoParameters);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateParameter(name.clone()));
            }
        }
        Ok(Self {
            names,
            bounds: None,
        })
    }

    /// Attaches a box constraint; it must have exactly one interval per parameter.
    pub fn with_bounds(mut self, bounds: Bounds) -> Result<Self, ConfigError> {
        self.check_len("bounds", bounds.len())?;
        self.bounds = Some(bounds);
        Ok(self)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns `true` if `point` has the right length and respects the bounds, if any.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.len() && self.bounds.as_ref().map_or(true, |b| b.contains(point))
    }

    /// Fails with [`ConfigError::LengthMismatch`] unless `found` equals the parameter count.
    pub fn check_len(&self, what: &'static str, found: usize) -> Result<(), ConfigError> {
        if found == self.len() {
            Ok(())
        } else {
            Err(ConfigError::LengthMismatch {
                what,
                expected: self.len(),
                found,
            })
        }
    }

    /// Checks a caller-supplied starting point for length and bounds.
    pub fn check_point(&self, point: &[f64]) -> Result<(), ConfigError> {
        self.check_len("initial point", point.len())?;
        if let Some(bounds) = &self.bounds {
            for (index, (b, &value)) in bounds.iter().zip(point).enumerate() {
                if !b.contains(value) {
                    return Err(ConfigError::InitialPointOutOfBounds {
                        index,
                        value,
                        lo: b.lo,
                        hi: b.hi,
                    });
                }
            }
        }
        Ok(())
    }

    /// Draws a random starting point: `Uniform(lo, hi)` inside bounds, `Uniform[0, 1)` otherwise.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match &self.bounds {
            Some(bounds) => bounds.iter().map(|b| b.sample(rng)).collect(),
            None => (0..self.len()).map(|_| rng.gen::<f64>()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_duplicates_and_empty() {
        assert_eq!(
            ParameterSpace::new(Vec::<String>::new()),
            Err(ConfigError::NoParameters)
        );
        assert_eq!(
            ParameterSpace::new(["a", "b", "a"]),
            Err(ConfigError::DuplicateParameter("a".into()))
        );
    }

    #[test]
    fn bounds_must_match_length_and_be_ordered() {
        let space = ParameterSpace::new(["a", "b"]).unwrap();
        let err = space
            .clone()
            .with_bounds(Bounds::new([(0.0, 1.0)]).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::LengthMismatch {
                what: "bounds",
                expected: 2,
                found: 1
            }
        );
        assert!(matches!(
            Bounds::new([(0.0, 1.0), (2.0, 2.0)]),
            Err(ConfigError::InvalidBound { index: 1, .. })
        ));
        assert!(Bounds::new([(f64::NEG_INFINITY, 0.0)]).is_err());
    }

    #[test]
    fn check_point_reports_offending_component() {
        let space = ParameterSpace::new(["a", "b"])
            .unwrap()
            .with_bounds(Bounds::new([(0.0, 1.0), (-1.0, 1.0)]).unwrap())
            .unwrap();
        assert!(space.check_point(&[0.5, 0.0]).is_ok());
        assert!(matches!(
            space.check_point(&[0.5, 3.0]),
            Err(ConfigError::InitialPointOutOfBounds { index: 1, .. })
        ));
        assert!(space.check_point(&[0.5]).is_err());
    }

    #[test]
    fn random_points_respect_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let space = ParameterSpace::new(["a", "b"])
            .unwrap()
            .with_bounds(Bounds::new([(-3.0, -2.0), (10.0, 10.5)]).unwrap())
            .unwrap();
        for _ in 0..1000 {
            let p = space.random_point(&mut rng);
            assert!(space.contains(&p), "{p:?} escaped the bounds");
        }

        let free = ParameterSpace::new(["x"]).unwrap();
        for _ in 0..1000 {
            let p = free.random_point(&mut rng);
            assert!((0.0..1.0).contains(&p[0]));
        }
        assert_eq!(free.index_of("x"), Some(0));
        assert_eq!(free.index_of("y"), None);
    }

    #[test]
    fn near_max_width_intervals_are_sampled() {
        let mut rng = SmallRng::seed_from_u64(11);
        let wide = Bounds::new([(-1e308, 1e308), (-f64::MAX, f64::MAX)]).unwrap();
        let space = ParameterSpace::new(["a", "b"])
            .unwrap()
            .with_bounds(wide)
            .unwrap();
        let mut positive = 0;
        for _ in 0..1000 {
            let p = space.random_point(&mut rng);
            assert!(p.iter().all(|x| x.is_finite()), "{p:?} is not finite");
            assert!(space.contains(&p), "{p:?} escaped the bounds");
            if p[0] > 0.0 {
                positive += 1;
            }
        }
        // Both halves of the interval are reached.
        assert!(positive > 300 && positive < 700, "{positive} of 1000 draws above 0");
    }
}
