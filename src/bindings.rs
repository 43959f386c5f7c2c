//! Python bindings for the array-level kernels

use crate::core::cloud_mask::CloudMaskFilter;
use crate::core::composite::{Statistic, TemporalAggregator};
use crate::core::fvc::FractionalCoverModel;
use crate::core::index::{normalized_difference_pixel, rescale_reflectance};
use crate::core::threshold::ThresholdPair;
use crate::types::{CompositeError, RealImage};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn to_py_err(e: CompositeError) -> PyErr {
    match e {
        CompositeError::UnknownSatellite(_)
        | CompositeError::UnsupportedStatistic(_)
        | CompositeError::InvalidConfig(_)
        | CompositeError::DegenerateThreshold { .. }
        | CompositeError::DimensionMismatch { .. } => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

/// Python module definition
#[pymodule]
fn landcomp(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rescale, m)?)?;
    m.add_function(wrap_pyfunction!(normalized_difference, m)?)?;
    m.add_function(wrap_pyfunction!(cloud_mask, m)?)?;
    m.add_function(wrap_pyfunction!(fractional_cover, m)?)?;
    m.add_function(wrap_pyfunction!(temporal_composite, m)?)?;
    Ok(())
}

/// Convert Collection 2 Level-2 DNs to surface reflectance
#[pyfunction]
fn rescale<'py>(py: Python<'py>, dn: PyReadonlyArray2<'py, u16>) -> &'py PyArray2<f32> {
    rescale_reflectance(&dn.as_array().to_owned()).into_pyarray(py)
}

/// (a - b) / (a + b) clamped to [-1, 1]
#[pyfunction]
fn normalized_difference<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'py, f32>,
    b: PyReadonlyArray2<'py, f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let a = a.as_array();
    let b = b.as_array();
    if a.dim() != b.dim() {
        return Err(to_py_err(CompositeError::DimensionMismatch {
            expected: a.dim(),
            found: b.dim(),
        }));
    }
    let result = ndarray::Zip::from(&a)
        .and(&b)
        .map_collect(|&a, &b| normalized_difference_pixel(a, b));
    Ok(result.into_pyarray(py))
}

/// Boolean validity mask from a QA_PIXEL band
#[pyfunction]
fn cloud_mask<'py>(py: Python<'py>, qa: PyReadonlyArray2<'py, u16>) -> &'py PyArray2<bool> {
    CloudMaskFilter::validity_mask(&qa.as_array().to_owned()).into_pyarray(py)
}

#[pyfunction]
#[pyo3(signature = (ndvi, ndvi_soil = 0.2, ndvi_veg = 0.86))]
fn fractional_cover<'py>(
    py: Python<'py>,
    ndvi: PyReadonlyArray2<'py, f32>,
    ndvi_soil: f64,
    ndvi_veg: f64,
) -> PyResult<&'py PyArray2<f32>> {
    let model = FractionalCoverModel::new(ThresholdPair { ndvi_soil, ndvi_veg }).map_err(to_py_err)?;
    Ok(model.apply(&ndvi.as_array().to_owned()).into_pyarray(py))
}

/// Per-pixel mean or max across a list of rasters, ignoring NaN
#[pyfunction]
#[pyo3(signature = (rasters, statistic = "mean"))]
fn temporal_composite<'py>(
    py: Python<'py>,
    rasters: Vec<PyReadonlyArray2<'py, f32>>,
    statistic: &str,
) -> PyResult<&'py PyArray2<f32>> {
    let statistic: Statistic = statistic.parse().map_err(to_py_err)?;
    let owned: Vec<RealImage> = rasters.iter().map(|r| r.as_array().to_owned()).collect();
    let refs: Vec<&RealImage> = owned.iter().collect();
    let (data, _) = TemporalAggregator::new(statistic)
        .aggregate_arrays(&refs)
        .map_err(to_py_err)?;
    Ok(data.into_pyarray(py))
}
