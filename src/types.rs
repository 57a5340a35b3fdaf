use serde::{Deserialize, Serialize};

/// Polarization channels delivered by RISAT-1
///
/// `RH` and `RV` are the compact-polarimetric channels (right circular transmit,
/// linear receive); the other four are the standard linear channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarization {
    HH,
    HV,
    VV,
    VH,
    RH,
    RV,
}

impl Polarization {
    /// All channels in scene folder traversal order
    pub const ALL: [Polarization; 6] = [
        Polarization::HH,
        Polarization::HV,
        Polarization::VV,
        Polarization::VH,
        Polarization::RH,
        Polarization::RV,
    ];

    pub fn is_compact(&self) -> bool {
        matches!(self, Polarization::RH | Polarization::RV)
    }

    /// Suffix used in band and metadata element names
    pub fn band_suffix(&self) -> &'static str {
        match self {
            Polarization::HH => "HH",
            Polarization::HV => "HV",
            Polarization::VV => "VV",
            Polarization::VH => "VH",
            Polarization::RH => "RCH",
            Polarization::RV => "RCV",
        }
    }

    /// Vendor sub-folder holding this channel's files
    pub fn scene_folder(&self) -> String {
        format!("scene_{}", self)
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::HH => write!(f, "HH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::RH => write!(f, "RH"),
            Polarization::RV => write!(f, "RV"),
        }
    }
}

/// Acquisition mode, decided once from the vendor `ProductType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode {
    /// Single look complex (slant range), real + imaginary bands per channel
    Complex,
    /// Detected amplitude, one band per channel
    Detected,
}

impl AcquisitionMode {
    pub fn from_product_type(product_type: &str) -> Self {
        if product_type.contains("SLANT") {
            AcquisitionMode::Complex
        } else {
            AcquisitionMode::Detected
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, AcquisitionMode::Complex)
    }

    pub fn sample_type(&self) -> &'static str {
        match self {
            AcquisitionMode::Complex => "COMPLEX",
            AcquisitionMode::Detected => "DETECTED",
        }
    }
}

/// Sample data type of a raster band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelDataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PixelDataType {
    /// Map TIFF/GDAL style (sample format, bits) to a data type.
    /// Sample format codes: 1 = unsigned, 2 = signed, 3 = IEEE float.
    pub fn from_sample_format(sample_format: u16, bits: u16) -> Option<Self> {
        match (sample_format, bits) {
            (1, 8) => Some(PixelDataType::UInt8),
            (1, 16) => Some(PixelDataType::UInt16),
            (1, 32) => Some(PixelDataType::UInt32),
            (1, 64) => Some(PixelDataType::UInt64),
            (2, 8) => Some(PixelDataType::Int8),
            (2, 16) => Some(PixelDataType::Int16),
            (2, 32) => Some(PixelDataType::Int32),
            (2, 64) => Some(PixelDataType::Int64),
            (3, 32) => Some(PixelDataType::Float32),
            (3, 64) => Some(PixelDataType::Float64),
            _ => None,
        }
    }
}

/// Band roles and their canonical unit tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandRole {
    Real,
    Imaginary,
    Amplitude,
    VirtualIntensity,
}

impl BandRole {
    pub fn unit(&self) -> &'static str {
        match self {
            BandRole::Real => "real",
            BandRole::Imaginary => "imaginary",
            BandRole::Amplitude => "amplitude",
            BandRole::VirtualIntensity => "intensity",
        }
    }
}

/// Physical container a scene file is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// GeoTIFF imagery (`imagery_*.tif`)
    GeoRaster,
    /// CEOS volume (`vdf_*.001`)
    LegacyBinary,
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// Map coordinates of a (fractional) pixel position
    pub fn pixel_to_map(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.top_left_x + x * self.pixel_width + y * self.rotation_x,
            self.top_left_y + x * self.rotation_y + y * self.pixel_height,
        )
    }
}

/// Geolocation attached to a raster product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCoding {
    pub transform: GeoTransform,
    /// Coordinate reference system description (WKT or EPSG code), if known
    pub crs: Option<String>,
}

/// Preferred tiling hint for pixel access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: usize,
    pub height: usize,
}

impl TileSize {
    const DEFAULT_SIDE: usize = 512;

    /// Default hint for a raster without its own tiling
    pub fn preferred_for(width: usize, height: usize) -> Self {
        Self {
            width: width.clamp(1, Self::DEFAULT_SIDE),
            height: height.clamp(1, Self::DEFAULT_SIDE),
        }
    }
}

/// Rectangular pixel region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let x_fits = self.x.checked_add(self.width).map_or(false, |end| end <= width);
        let y_fits = self.y.checked_add(self.height).map_or(false, |end| end <= height);
        x_fits && y_fits
    }
}

/// Error types for SAR product ingestion
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("No reader available for {0}")]
    NoReader(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
