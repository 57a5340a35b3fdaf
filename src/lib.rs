//! risat1-reader: RISAT-1 scene ingestion
//!
//! Reads a RISAT-1 delivery (per-polarization GeoTIFF or CEOS files plus the
//! `BAND_META.txt` vendor header) into one normalized SAR product with a uniform band
//! layout, derived intensity bands and vendor-neutral abstracted metadata.

pub mod config;
pub mod core;
pub mod io;
pub mod product;
pub mod reader;
pub mod types;

// Re-export main types and functions for easier access
pub use config::ReaderConfig;
pub use product::{Band, MetadataElement, Product};
pub use reader::Risat1ProductReader;
pub use types::{AcquisitionMode, BandRole, Polarization, SarError, SarResult, Window};

#[cfg(feature = "python")]
mod python {
    use crate::product::abstracted;
    use crate::{ReaderConfig, Risat1ProductReader, Product, Window};
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::prelude::*;
    use std::collections::HashMap;

    fn runtime_error(e: crate::SarError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyRisat1Reader>()?;
        Ok(())
    }

    /// Python wrapper for a product read by Risat1ProductReader
    #[pyclass(name = "Risat1Reader")]
    struct PyRisat1Reader {
        product: Product,
    }

    #[pymethods]
    impl PyRisat1Reader {
        #[new]
        fn new(path: String) -> PyResult<Self> {
            let product = Risat1ProductReader::new(*ReaderConfig::global())
                .read_product(&path)
                .map_err(runtime_error)?;
            Ok(PyRisat1Reader { product })
        }

        fn band_names(&self) -> Vec<String> {
            self.product.band_names()
        }

        /// Abstracted metadata attributes as strings
        fn metadata(&self) -> HashMap<String, String> {
            abstracted::abstracted(&self.product.metadata)
                .map(|abs| {
                    abs.attributes()
                        .iter()
                        .map(|a| (a.name.clone(), a.value.to_string()))
                        .collect()
                })
                .unwrap_or_default()
        }

        fn read_band<'py>(&self, py: Python<'py>, name: &str) -> PyResult<&'py PyArray2<f64>> {
            let band = self.product.band(name).ok_or_else(|| {
                PyErr::new::<pyo3::exceptions::PyKeyError, _>(format!("No band named '{}'", name))
            })?;
            let data = self
                .product
                .read_band(name, Window::full(band.width, band.height))
                .map_err(runtime_error)?;
            Ok(data.into_pyarray(py))
        }

        fn __repr__(&self) -> String {
            format!(
                "Risat1Reader(product='{}', {}x{}, bands={})",
                self.product.name,
                self.product.width,
                self.product.height,
                self.product.num_bands()
            )
        }
    }
}
