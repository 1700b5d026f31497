//! Synthetic observations for exercising the sampler.

use crate::distributions::Distribution;
use crate::error::Result;
use rand::Rng;

/// `n` independent draws from Normal(`mu`, `sd`).
pub fn generate_normal<R: Rng + ?Sized>(mu: f64, sd: f64, n: usize, rng: &mut R) -> Result<Vec<f64>> {
    let dist = Distribution::normal(mu, sd)?;
    (0..n).map(|_| dist.sample_prior(rng)).collect()
}
