use hiermc_core::data;
use hiermc_core::distributions::Distribution;
use hiermc_core::sampler::{self, SampleResult, SamplerConfig};
use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn to_py_err(err: hiermc_core::Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Seedable random source handed to every sampling call from Python.
#[pyclass(name = "RandomSource")]
struct PyRandomSource {
    rng: ChaCha8Rng,
}

#[pymethods]
impl PyRandomSource {
    #[new]
    #[pyo3(signature = (seed=42))]
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

/// Python view of a distribution node. Cloning shares the underlying tree.
#[pyclass(name = "Distribution", frozen)]
#[derive(Clone)]
struct PyDistribution {
    inner: Arc<Distribution>,
}

#[pymethods]
impl PyDistribution {
    #[staticmethod]
    fn normal(mu: f64, sd: f64) -> PyResult<Self> {
        let inner = Distribution::normal(mu, sd).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// New node equal to this one with parameter `index` drawn from `supplier`.
    fn with_dependency(&self, index: usize, supplier: &PyDistribution) -> PyResult<Self> {
        let inner = (*self.inner)
            .clone()
            .with_dependency(index, supplier.inner.clone())
            .map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    fn resolve_params(&self, mut rng: PyRefMut<'_, PyRandomSource>) -> PyResult<Vec<f64>> {
        self.inner.resolve_params(&mut rng.rng).map_err(to_py_err)
    }

    fn sample_prior(&self, mut rng: PyRefMut<'_, PyRandomSource>) -> PyResult<f64> {
        self.inner.sample_prior(&mut rng.rng).map_err(to_py_err)
    }

    fn density(&self, x: f64, mut rng: PyRefMut<'_, PyRandomSource>) -> PyResult<f64> {
        self.inner.density(x, &mut rng.rng).map_err(to_py_err)
    }

    fn log_density(&self, x: f64, mut rng: PyRefMut<'_, PyRandomSource>) -> PyResult<f64> {
        self.inner.log_density(x, &mut rng.rng).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        let slots: Vec<String> = self
            .inner
            .priors()
            .iter()
            .enumerate()
            .map(|(i, p)| match self.inner.dependency(i) {
                Some(_) => "<dep>".to_string(),
                None => format!("{}", p),
            })
            .collect();
        format!("Distribution.{:?}({})", self.inner.kind(), slots.join(", "))
    }
}

#[pyclass]
struct TraceResult {
    result: SampleResult,
}

#[pymethods]
impl TraceResult {
    /// Full trace, burn-in included.
    fn samples<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_slice(py, self.result.trace().samples())
    }

    /// Trace with the burn-in removed.
    fn posterior<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_slice(py, self.result.posterior())
    }

    #[getter]
    fn accepted(&self) -> usize {
        self.result.trace().accepted()
    }

    #[getter]
    fn acceptance_rate(&self) -> f64 {
        self.result.acceptance_rate()
    }

    fn mean(&self) -> f64 {
        self.result.mean()
    }

    fn std(&self) -> f64 {
        self.result.std()
    }

    fn __repr__(&self) -> String {
        format!(
            "hiermc TraceResult ({} iterations, burn-in {}, seed {})\n  mu: mean={:.4}, std={:.4}, accepted={:.1}%",
            self.result.trace().len(),
            self.result.burn_in(),
            self.result.seed(),
            self.result.mean(),
            self.result.std(),
            self.result.acceptance_rate() * 100.0,
        )
    }
}

#[pyfunction]
fn generate_normal<'py>(
    py: Python<'py>,
    mu: f64,
    sd: f64,
    n: usize,
    mut rng: PyRefMut<'_, PyRandomSource>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let values = data::generate_normal(mu, sd, n, &mut rng.rng).map_err(to_py_err)?;
    Ok(PyArray1::from_vec(py, values))
}

#[pyfunction]
#[pyo3(signature = (data, prior_mean=5.0, prior_scale=2.0, proposal_scale=0.2, iterations=2000, burn_in=500, seed=42))]
#[allow(clippy::too_many_arguments)]
fn sample_mean(
    py: Python<'_>,
    data: PyReadonlyArray1<'_, f64>,
    prior_mean: f64,
    prior_scale: f64,
    proposal_scale: f64,
    iterations: usize,
    burn_in: usize,
    seed: u64,
) -> PyResult<TraceResult> {
    let observations: Vec<f64> = data.as_array().to_vec();

    let config = SamplerConfig {
        prior_mean,
        prior_scale,
        proposal_scale,
        num_iterations: iterations,
        burn_in,
        seed,
    };

    let result = py
        .allow_threads(|| sampler::sample(&observations, &config))
        .map_err(to_py_err)?;

    Ok(TraceResult { result })
}

#[pymodule]
fn hiermc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRandomSource>()?;
    m.add_class::<PyDistribution>()?;
    m.add_class::<TraceResult>()?;
    m.add_function(wrap_pyfunction!(generate_normal, m)?)?;
    m.add_function(wrap_pyfunction!(sample_mean, m)?)?;
    Ok(())
}
