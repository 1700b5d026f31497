use crate::error::{check_finite, check_scale, Error, Result};
use rand::Rng;
use rand_distr::Distribution as _;
use std::sync::Arc;

/// ln(sqrt(2π))
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Distribution families known to the model.
///
/// Only `Normal` is implemented. The others are declared so that call sites
/// can name them; every operation on them returns
/// [`Error::UnsupportedKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistKind {
    Normal,
    Beta,
    Poisson,
    Uniform,
}

impl DistKind {
    /// Number of parameter slots the family takes.
    pub fn arity(self) -> usize {
        match self {
            DistKind::Normal => 2,
            DistKind::Beta => 2,
            DistKind::Poisson => 1,
            DistKind::Uniform => 2,
        }
    }

    pub fn is_supported(self) -> bool {
        matches!(self, DistKind::Normal)
    }
}

// ── Distribution node ───────────────────────────────────────────────

/// A parametrized distribution whose parameters are either literals or
/// drawn from supplier distributions.
///
/// Suppliers are held behind `Arc`, so one node can feed any number of
/// dependents and the whole tree is `Send + Sync`. Attaching a supplier
/// needs `&mut self`, which means a node that is already shared can never
/// be linked beneath itself: the dependency graph is acyclic by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    kind: DistKind,
    priors: Vec<f64>,
    deps: Vec<Option<Arc<Distribution>>>,
}

impl Distribution {
    /// Build a node with literal parameters. The length of `priors` must
    /// match the family's arity. The values themselves are checked at the
    /// start of every operation, and only for slots with no supplier bound,
    /// since a bound slot ignores its literal.
    pub fn new(kind: DistKind, priors: Vec<f64>) -> Result<Self> {
        if priors.len() != kind.arity() {
            return Err(Error::ArityMismatch {
                kind,
                expected: kind.arity(),
                actual: priors.len(),
            });
        }
        let deps = vec![None; priors.len()];
        Ok(Self { kind, priors, deps })
    }

    /// Normal(mu, sd) with both parameters fixed.
    pub fn normal(mu: f64, sd: f64) -> Result<Self> {
        check_finite("mu", mu)?;
        check_scale("sd", sd)?;
        Self::new(DistKind::Normal, vec![mu, sd])
    }

    pub fn kind(&self) -> DistKind {
        self.kind
    }

    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    pub fn dependency(&self, index: usize) -> Option<&Arc<Distribution>> {
        self.deps.get(index).and_then(Option::as_ref)
    }

    /// Bind parameter `index` to values sampled from `supplier`.
    pub fn attach(&mut self, index: usize, supplier: Arc<Distribution>) -> Result<()> {
        let arity = self.priors.len();
        let slot = self
            .deps
            .get_mut(index)
            .ok_or(Error::DependencyIndex { index, arity })?;
        *slot = Some(supplier);
        Ok(())
    }

    /// Builder form of [`attach`](Self::attach).
    pub fn with_dependency(
        mut self,
        index: usize,
        supplier: impl Into<Arc<Distribution>>,
    ) -> Result<Self> {
        self.attach(index, supplier.into())?;
        Ok(self)
    }

    /// Concrete parameter values: literals where no supplier is bound,
    /// a fresh prior draw from the supplier otherwise.
    ///
    /// Walks the dependency tree depth-first. Every supplier draw consumes
    /// entropy, so the result is random whenever any slot is bound.
    pub fn resolve_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        self.priors
            .iter()
            .zip(&self.deps)
            .map(|(&literal, dep)| match dep {
                Some(supplier) => supplier.sample_prior(rng),
                None => Ok(literal),
            })
            .collect()
    }

    /// One draw from the distribution after resolving its parameters.
    pub fn sample_prior<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.family(rng)?.sample(rng)
    }

    pub fn density<R: Rng + ?Sized>(&self, x: f64, rng: &mut R) -> Result<f64> {
        Ok(self.family(rng)?.density(x))
    }

    /// Natural log of the density, from the family's closed form.
    pub fn log_density<R: Rng + ?Sized>(&self, x: f64, rng: &mut R) -> Result<f64> {
        Ok(self.family(rng)?.ln_density(x))
    }

    /// Sum of log densities over `data`.
    ///
    /// Parameters are resolved once for the whole batch, so a hierarchical
    /// node contributes a single joint draw of its hyper-parameters.
    pub fn log_likelihood<R: Rng + ?Sized>(&self, data: &[f64], rng: &mut R) -> Result<f64> {
        let family = self.family(rng)?;
        Ok(data.iter().map(|&x| family.ln_density(x)).sum())
    }

    /// Kind and unbound literals are checked before any supplier is drawn,
    /// so a call that fails on them leaves `rng` untouched.
    fn family<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Family> {
        match self.kind {
            DistKind::Normal => {
                self.check_normal_literals()?;
                let params = self.resolve_params(rng)?;
                Family::normal(params[0], params[1])
            }
            kind => Err(Error::UnsupportedKind(kind)),
        }
    }

    fn check_normal_literals(&self) -> Result<()> {
        if self.deps[0].is_none() {
            check_finite("mu", self.priors[0])?;
        }
        if self.deps[1].is_none() {
            check_scale("sd", self.priors[1])?;
        }
        Ok(())
    }
}

// ── Resolved families ───────────────────────────────────────────────

/// A family with every parameter bound to a number.
#[derive(Debug, Clone, Copy)]
enum Family {
    Normal { mu: f64, sigma: f64 },
}

impl Family {
    fn normal(mu: f64, sigma: f64) -> Result<Self> {
        check_finite("mu", mu)?;
        check_scale("sd", sigma)?;
        Ok(Family::Normal { mu, sigma })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        match *self {
            Family::Normal { mu, sigma } => {
                let normal = rand_distr::Normal::new(mu, sigma).map_err(|_| {
                    Error::InvalidParameter {
                        name: "sd",
                        value: sigma,
                    }
                })?;
                Ok(normal.sample(rng))
            }
        }
    }

    fn density(&self, x: f64) -> f64 {
        match *self {
            Family::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                (-0.5 * z * z).exp() / (sigma * std::f64::consts::TAU.sqrt())
            }
        }
    }

    fn ln_density(&self, x: f64) -> f64 {
        match *self {
            Family::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn variance(xs: &[f64]) -> f64 {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn test_resolve_literals_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::normal(5.0, 0.5).unwrap();
        assert_eq!(d.resolve_params(&mut rng).unwrap(), vec![5.0, 0.5]);
    }

    #[test]
    fn test_resolve_with_dependency() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = Distribution::normal(0.0, 0.5).unwrap();
        let b = Distribution::normal(123.0, 0.5)
            .unwrap()
            .with_dependency(0, a)
            .unwrap();

        let first = b.resolve_params(&mut rng).unwrap();
        let second = b.resolve_params(&mut rng).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1], 0.5);
        assert_eq!(second[1], 0.5);
        // The literal 123 is ignored once a supplier is bound.
        assert!(first[0].abs() < 5.0, "location came from literal: {}", first[0]);
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn test_normal_density_known_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::normal(0.0, 1.0).unwrap();
        let p = d.density(0.0, &mut rng).unwrap();
        assert!((p - 1.0 / std::f64::consts::TAU.sqrt()).abs() < 1e-12);

        let lp = d.log_density(1.5, &mut rng).unwrap();
        let expected = -0.5 * 1.5_f64.powi(2) - 0.5 * std::f64::consts::TAU.ln();
        assert!((lp - expected).abs() < 1e-12);
    }

    #[test]
    fn test_log_density_matches_ln_density() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::normal(2.0, 0.7).unwrap();
        for x in [-3.0, 0.0, 1.9, 2.0, 4.25, 7.5] {
            let p = d.density(x, &mut rng).unwrap();
            let lp = d.log_density(x, &mut rng).unwrap();
            assert!((lp - p.ln()).abs() < 1e-9, "x={}: {} vs {}", x, lp, p.ln());
        }
    }

    #[test]
    fn test_log_density_far_tail_stays_finite() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::normal(0.0, 1.0).unwrap();
        assert_eq!(d.density(60.0, &mut rng).unwrap(), 0.0);
        let lp = d.log_density(60.0, &mut rng).unwrap();
        assert!(lp.is_finite());
        assert!((lp - (-1800.0 - LN_SQRT_2PI)).abs() < 1e-9);
    }

    #[test]
    fn test_log_likelihood_is_sum() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::normal(1.0, 2.0).unwrap();
        let data = [0.5, 1.0, 3.0, -2.0];
        let total = d.log_likelihood(&data, &mut rng).unwrap();
        let by_point: f64 = data
            .iter()
            .map(|&x| d.log_density(x, &mut rng).unwrap())
            .sum();
        assert!((total - by_point).abs() < 1e-12);
    }

    #[test]
    fn test_literal_density_draws_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut reference = rng.clone();
        let d = Distribution::normal(0.0, 1.0).unwrap();
        d.density(0.3, &mut rng).unwrap();
        d.log_density(0.3, &mut rng).unwrap();
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_hierarchical_density_draws_from_supplier() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut reference = rng.clone();
        let d = Distribution::normal(0.0, 1.0)
            .unwrap()
            .with_dependency(0, Distribution::normal(0.0, 1.0).unwrap())
            .unwrap();

        let p1 = d.density(0.3, &mut rng).unwrap();
        let p2 = d.density(0.3, &mut rng).unwrap();
        let lp1 = d.log_density(0.3, &mut rng).unwrap();
        let lp2 = d.log_density(0.3, &mut rng).unwrap();
        assert_ne!(p1, p2);
        assert_ne!(lp1, lp2);
        assert_ne!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_invalid_literal_scale_fails_before_drawing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut reference = rng.clone();
        let d = Distribution::new(DistKind::Normal, vec![0.0, -1.0])
            .unwrap()
            .with_dependency(0, Distribution::normal(0.0, 1.0).unwrap())
            .unwrap();

        let err = Error::InvalidParameter {
            name: "sd",
            value: -1.0,
        };
        assert_eq!(d.log_density(0.0, &mut rng), Err(err.clone()));
        assert_eq!(d.density(0.0, &mut rng), Err(err.clone()));
        assert_eq!(d.sample_prior(&mut rng), Err(err));
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_unsupported_kinds_fail_everywhere() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for kind in [DistKind::Beta, DistKind::Poisson, DistKind::Uniform] {
            let d = Distribution::new(kind, vec![1.0; kind.arity()]).unwrap();
            let err = Error::UnsupportedKind(kind);
            assert_eq!(d.sample_prior(&mut rng), Err(err.clone()));
            assert_eq!(d.density(0.5, &mut rng), Err(err.clone()));
            assert_eq!(d.log_density(0.5, &mut rng), Err(err.clone()));
            assert_eq!(d.log_likelihood(&[0.5], &mut rng), Err(err));
        }
    }

    #[test]
    fn test_unsupported_supplier_propagates() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let beta = Distribution::new(DistKind::Beta, vec![2.0, 2.0]).unwrap();
        let d = Distribution::normal(0.0, 1.0)
            .unwrap()
            .with_dependency(0, beta)
            .unwrap();
        assert_eq!(
            d.sample_prior(&mut rng),
            Err(Error::UnsupportedKind(DistKind::Beta))
        );
    }

    #[test]
    fn test_arity_is_per_family() {
        assert_eq!(
            Distribution::new(DistKind::Poisson, vec![1.0, 2.0]),
            Err(Error::ArityMismatch {
                kind: DistKind::Poisson,
                expected: 1,
                actual: 2,
            })
        );
        assert!(Distribution::new(DistKind::Poisson, vec![3.0]).is_ok());
        assert!(Distribution::new(DistKind::Normal, vec![0.0]).is_err());
    }

    #[test]
    fn test_attach_out_of_range() {
        let mut d = Distribution::normal(0.0, 1.0).unwrap();
        let supplier = Arc::new(Distribution::normal(0.0, 1.0).unwrap());
        assert_eq!(
            d.attach(2, supplier.clone()),
            Err(Error::DependencyIndex { index: 2, arity: 2 })
        );
        d.attach(1, supplier).unwrap();
        assert!(d.dependency(0).is_none());
        assert!(d.dependency(1).is_some());
    }

    #[test]
    fn test_invalid_literal_scale() {
        assert!(Distribution::normal(0.0, 0.0).is_err());
        assert!(Distribution::normal(f64::NAN, 1.0).is_err());

        // `new` defers the check until the value is actually used.
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let d = Distribution::new(DistKind::Normal, vec![0.0, -1.0]).unwrap();
        assert_eq!(
            d.sample_prior(&mut rng),
            Err(Error::InvalidParameter {
                name: "sd",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_scale_from_supplier_overrides_literal() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let scale = Distribution::normal(3.0, 0.01).unwrap();
        // Literal scale of zero is never read.
        let d = Distribution::new(DistKind::Normal, vec![0.0, 0.0])
            .unwrap()
            .with_dependency(1, scale)
            .unwrap();
        let params = d.resolve_params(&mut rng).unwrap();
        assert!((params[1] - 3.0).abs() < 0.1);
        assert!(d.sample_prior(&mut rng).is_ok());
    }

    #[test]
    fn test_negative_resolved_scale_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let scale = Distribution::normal(-10.0, 0.01).unwrap();
        let d = Distribution::normal(0.0, 1.0)
            .unwrap()
            .with_dependency(1, scale)
            .unwrap();
        assert!(matches!(
            d.log_density(0.0, &mut rng),
            Err(Error::InvalidParameter { name: "sd", .. })
        ));
    }

    #[test]
    fn test_shared_supplier_deep_chain() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let root = Arc::new(Distribution::normal(10.0, 0.1).unwrap());
        let mut node = Distribution::normal(0.0, 0.1).unwrap();
        node.attach(0, root.clone()).unwrap();
        for _ in 0..4 {
            node = Distribution::normal(0.0, 0.1)
                .unwrap()
                .with_dependency(0, node)
                .unwrap();
        }
        let sibling = Distribution::normal(0.0, 0.1)
            .unwrap()
            .with_dependency(0, root)
            .unwrap();

        let x = node.sample_prior(&mut rng).unwrap();
        let y = sibling.sample_prior(&mut rng).unwrap();
        assert!((x - 10.0).abs() < 2.0, "deep chain drifted: {}", x);
        assert!((y - 10.0).abs() < 1.0, "sibling drifted: {}", y);
    }

    #[test]
    fn test_hierarchical_prior_adds_variance() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let a = Arc::new(Distribution::normal(0.0, 0.5).unwrap());
        let b = Distribution::normal(0.0, 0.5)
            .unwrap()
            .with_dependency(0, a.clone())
            .unwrap();

        let n = 20_000;
        let from_a: Vec<f64> = (0..n).map(|_| a.sample_prior(&mut rng).unwrap()).collect();
        let from_b: Vec<f64> = (0..n).map(|_| b.sample_prior(&mut rng).unwrap()).collect();

        let (va, vb) = (variance(&from_a), variance(&from_b));
        // Expected 0.25 vs 0.5.
        assert!(vb > va, "hierarchical variance {} <= flat {}", vb, va);
        assert!((va - 0.25).abs() < 0.02, "flat variance {}", va);
        assert!((vb - 0.5).abs() < 0.04, "hierarchical variance {}", vb);
    }

    #[test]
    fn test_distribution_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Distribution>();
    }
}
