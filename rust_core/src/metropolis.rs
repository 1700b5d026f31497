use crate::distributions::Distribution;
use crate::error::{check_finite, check_scale, Error, Result};
use rand::distributions::Open01;
use rand::Rng;

/// The chain produced by one sampler run.
///
/// One entry per iteration in generation order. A rejected iteration
/// repeats the previous value exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    samples: Vec<f64>,
    accepted: usize,
}

impl Trace {
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of iterations whose proposal was accepted.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.accepted as f64 / self.samples.len() as f64
        }
    }

    /// Samples with the first `burn_in` iterations dropped.
    pub fn after_burn_in(&self, burn_in: usize) -> &[f64] {
        &self.samples[burn_in.min(self.samples.len())..]
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

/// Random-walk Metropolis over the mean of a normal observation model.
///
/// The observation scale is held fixed; only the mean moves. The prior over
/// the mean is any [`Distribution`], so a hierarchical prior drops in
/// without touching the loop.
#[derive(Debug, Clone)]
pub struct MetropolisSampler {
    prior: Distribution,
    observation_scale: f64,
    proposal_scale: f64,
}

impl MetropolisSampler {
    pub fn new(prior: Distribution, observation_scale: f64, proposal_scale: f64) -> Result<Self> {
        check_scale("observation_scale", observation_scale)?;
        check_scale("proposal_scale", proposal_scale)?;
        Ok(Self {
            prior,
            observation_scale,
            proposal_scale,
        })
    }

    pub fn prior(&self) -> &Distribution {
        &self.prior
    }

    /// Run `iterations` Metropolis steps starting from `initial`.
    ///
    /// All arguments are validated before the first draw. The run either
    /// returns a full trace or an error; there are no partial traces.
    pub fn run<R: Rng + ?Sized>(
        &self,
        initial: f64,
        data: &[f64],
        iterations: usize,
        rng: &mut R,
    ) -> Result<Trace> {
        check_finite("initial", initial)?;
        if data.is_empty() {
            return Err(Error::EmptyData);
        }
        if iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "iterations",
                value: 0.0,
            });
        }

        let _span = tracing::info_span!("metropolis", iterations).entered();
        tracing::debug!(initial, observations = data.len(), "starting chain");

        let mut current = initial;
        let mut samples = Vec::with_capacity(iterations);
        let mut accepted = 0usize;

        for _ in 0..iterations {
            if let Some(proposed) = self.step(current, data, rng)? {
                current = proposed;
                accepted += 1;
            }
            samples.push(current);
        }

        let trace = Trace { samples, accepted };
        tracing::info!(
            accepted,
            iterations,
            acceptance_rate = trace.acceptance_rate(),
            "chain finished"
        );
        Ok(trace)
    }

    /// One proposal. Returns the new value if it was accepted.
    fn step<R: Rng + ?Sized>(&self, current: f64, data: &[f64], rng: &mut R) -> Result<Option<f64>> {
        // Symmetric kernel, so no Hastings correction.
        let proposed = Distribution::normal(current, self.proposal_scale)?.sample_prior(rng)?;

        // Summed logs; a product of 2000 densities underflows to zero.
        let ll_current =
            Distribution::normal(current, self.observation_scale)?.log_likelihood(data, rng)?;
        let ll_proposed =
            Distribution::normal(proposed, self.observation_scale)?.log_likelihood(data, rng)?;

        let lp_current = self.prior.log_density(current, rng)?;
        let lp_proposed = self.prior.log_density(proposed, rng)?;

        let log_ratio = (ll_proposed + lp_proposed) - (ll_current + lp_current);

        let u: f64 = rng.sample(Open01);
        if u.ln() < log_ratio {
            Ok(Some(proposed))
        } else {
            Ok(None)
        }
    }
}

/// Sample the posterior of a normal mean under a Normal(`prior_mean`,
/// `prior_scale`) prior.
///
/// The chain starts at `prior_mean` and the observation scale is fixed at
/// `prior_scale`.
pub fn run<R: Rng + ?Sized>(
    prior_mean: f64,
    prior_scale: f64,
    proposal_scale: f64,
    data: &[f64],
    iteration_count: usize,
    rng: &mut R,
) -> Result<Trace> {
    check_finite("prior_mean", prior_mean)?;
    check_scale("prior_scale", prior_scale)?;
    check_scale("proposal_scale", proposal_scale)?;

    let prior = Distribution::normal(prior_mean, prior_scale)?;
    MetropolisSampler::new(prior, prior_scale, proposal_scale)?.run(
        prior_mean,
        data,
        iteration_count,
        rng,
    )
}
