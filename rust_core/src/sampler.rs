use crate::error::{check_finite, check_scale, Error, Result};
use crate::metropolis::{self, Trace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Configuration for a seeded sampler run.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub prior_mean: f64,
    /// Prior spread, also used as the fixed observation scale.
    pub prior_scale: f64,
    pub proposal_scale: f64,
    pub num_iterations: usize,
    /// Leading iterations excluded from [`SampleResult::posterior`].
    pub burn_in: usize,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            prior_mean: 5.0,
            prior_scale: 2.0,
            proposal_scale: 0.2,
            num_iterations: 2000,
            burn_in: 500,
            seed: 42,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        check_finite("prior_mean", self.prior_mean)?;
        check_scale("prior_scale", self.prior_scale)?;
        check_scale("proposal_scale", self.proposal_scale)?;
        if self.num_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "num_iterations",
                value: 0.0,
            });
        }
        if self.burn_in >= self.num_iterations {
            return Err(Error::InvalidParameter {
                name: "burn_in",
                value: self.burn_in as f64,
            });
        }
        Ok(())
    }
}

/// Result of a seeded run.
///
/// Only built by [`sample`], which guarantees `burn_in < trace.len()`, so
/// the posterior slice is never empty.
#[derive(Debug, Clone)]
pub struct SampleResult {
    trace: Trace,
    burn_in: usize,
    seed: u64,
}

impl SampleResult {
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Trace with the burn-in removed.
    pub fn posterior(&self) -> &[f64] {
        self.trace.after_burn_in(self.burn_in)
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.trace.acceptance_rate()
    }

    /// Posterior mean over the post-burn-in samples.
    pub fn mean(&self) -> f64 {
        let post = self.posterior();
        post.iter().sum::<f64>() / post.len() as f64
    }

    /// Posterior standard deviation over the post-burn-in samples.
    pub fn std(&self) -> f64 {
        let post = self.posterior();
        let mean = self.mean();
        let sum_sq: f64 = post.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_sq / post.len() as f64).sqrt()
    }
}

/// Run one chain with a `ChaCha8Rng` seeded from `config.seed`.
///
/// Identical config and data always give a bit-identical trace.
pub fn sample(data: &[f64], config: &SamplerConfig) -> Result<SampleResult> {
    config.validate()?;
    tracing::debug!(seed = config.seed, "seeding chain");

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let trace = metropolis::run(
        config.prior_mean,
        config.prior_scale,
        config.proposal_scale,
        data,
        config.num_iterations,
        &mut rng,
    )?;

    Ok(SampleResult {
        trace,
        burn_in: config.burn_in,
        seed: config.seed,
    })
}
