pub mod data;
pub mod distributions;
pub mod error;
pub mod metropolis;
pub mod sampler;

pub use distributions::{DistKind, Distribution};
pub use error::{Error, Result};
pub use metropolis::{MetropolisSampler, Trace};
pub use sampler::{SampleResult, SamplerConfig};

// Future: Beta, Poisson and Uniform families slot into `distributions::Family`
// once their closed forms and samplers are added; `DistKind::arity` already
// carries their parameter counts.
