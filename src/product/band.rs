use crate::types::{BandRole, PixelDataType, SarError, SarResult, Window};
use ndarray::Array2;
use std::sync::Arc;

/// Pixel access for a stored band
pub trait BandRaster: Send + Sync + std::fmt::Debug {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Read a window of samples as f64 (rows = lines, cols = samples)
    fn read(&self, window: Window) -> SarResult<Array2<f64>>;
}

/// Raster held in memory
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    data: Array2<f64>,
}

impl InMemoryRaster {
    pub fn new(data: Array2<f64>) -> Self {
        Self { data }
    }
}

impl BandRaster for InMemoryRaster {
    fn width(&self) -> usize {
        self.data.ncols()
    }

    fn height(&self) -> usize {
        self.data.nrows()
    }

    fn read(&self, window: Window) -> SarResult<Array2<f64>> {
        read_window(&self.data, window)
    }
}

/// Copy a window out of a full-resolution plane
pub fn read_window(data: &Array2<f64>, window: Window) -> SarResult<Array2<f64>> {
    if !window.fits_within(data.ncols(), data.nrows()) {
        return Err(SarError::Processing(format!(
            "Window {:?} outside {}x{} raster",
            window,
            data.ncols(),
            data.nrows()
        )));
    }
    Ok(data
        .slice(ndarray::s![
            window.y..window.y + window.height,
            window.x..window.x + window.width
        ])
        .to_owned())
}

/// Expression of a derived intensity band. Sources are band names on the same product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualIntensity {
    /// real² + imaginary²
    FromComplex { real: String, imaginary: String },
    /// amplitude²
    FromAmplitude { amplitude: String },
}

impl VirtualIntensity {
    pub fn sources(&self) -> Vec<&str> {
        match self {
            VirtualIntensity::FromComplex { real, imaginary } => vec![real.as_str(), imaginary.as_str()],
            VirtualIntensity::FromAmplitude { amplitude } => vec![amplitude.as_str()],
        }
    }

    pub fn expression(&self) -> String {
        match self {
            VirtualIntensity::FromComplex { real, imaginary } => {
                format!("{r} * {r} + {i} * {i}", r = real, i = imaginary)
            }
            VirtualIntensity::FromAmplitude { amplitude } => format!("{a} * {a}", a = amplitude),
        }
    }
}

/// Where a band's samples come from
#[derive(Debug, Clone)]
pub enum BandSource {
    Stored(Arc<dyn BandRaster>),
    Virtual(VirtualIntensity),
}

/// Raster band of a product
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub role: Option<BandRole>,
    pub unit: String,
    pub data_type: PixelDataType,
    pub width: usize,
    pub height: usize,
    pub no_data_value: f64,
    pub no_data_used: bool,
    pub source: BandSource,
}

impl Band {
    pub fn stored(
        name: impl Into<String>,
        data_type: PixelDataType,
        width: usize,
        height: usize,
        raster: Arc<dyn BandRaster>,
    ) -> Self {
        Self {
            name: name.into(),
            role: None,
            unit: String::new(),
            data_type,
            width,
            height,
            no_data_value: 0.0,
            no_data_used: false,
            source: BandSource::Stored(raster),
        }
    }

    pub fn virtual_intensity(
        name: impl Into<String>,
        width: usize,
        height: usize,
        expression: VirtualIntensity,
    ) -> Self {
        Self {
            name: name.into(),
            role: Some(BandRole::VirtualIntensity),
            unit: BandRole::VirtualIntensity.unit().to_string(),
            data_type: PixelDataType::Float32,
            width,
            height,
            no_data_value: 0.0,
            no_data_used: true,
            source: BandSource::Virtual(expression),
        }
    }

    /// Tag the band with a role, its unit and no-data = 0 masking
    pub fn with_role(mut self, role: BandRole) -> Self {
        self.role = Some(role);
        self.unit = role.unit().to_string();
        self.no_data_value = 0.0;
        self.no_data_used = true;
        self
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.source, BandSource::Virtual(_))
    }

    /// Copy of this band under a new name. Stored pixels are shared, not duplicated.
    pub fn copy_as(&self, name: impl Into<String>) -> Self {
        let mut band = self.clone();
        band.name = name.into();
        band
    }
}
