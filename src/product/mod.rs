//! Generic raster product model populated by the reader

pub mod abstracted;
pub mod band;
pub mod metadata;

pub use band::{Band, BandRaster, BandSource, InMemoryRaster, VirtualIntensity};
pub use metadata::{AttributeValue, MetadataAttribute, MetadataElement};

use crate::types::{GeoCoding, SarError, SarResult, TileSize, Window};
use ndarray::{Array2, Zip};
use num_complex::Complex;

/// Coarse grid of values sampled every `sub_sampling` pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TiePointGrid {
    pub name: String,
    pub grid_width: usize,
    pub grid_height: usize,
    pub offset_x: f64,
    pub offset_y: f64,
    pub sub_sampling_x: f64,
    pub sub_sampling_y: f64,
    pub data: Vec<f32>,
    pub unit: String,
}

impl TiePointGrid {
    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col < self.grid_width && row < self.grid_height {
            self.data.get(row * self.grid_width + col).copied()
        } else {
            None
        }
    }
}

/// SAR raster product: bands, metadata tree, optional geolocation
#[derive(Debug, Clone)]
pub struct Product {
    pub name: String,
    pub product_type: String,
    pub description: String,
    pub width: usize,
    pub height: usize,
    bands: Vec<Band>,
    pub metadata: MetadataElement,
    pub geocoding: Option<GeoCoding>,
    pub preferred_tile_size: Option<TileSize>,
    tie_point_grids: Vec<TiePointGrid>,
}

impl Product {
    pub fn new(name: impl Into<String>, product_type: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            product_type: product_type.into(),
            description: String::new(),
            width,
            height,
            bands: Vec::new(),
            metadata: MetadataElement::new("metadata"),
            geocoding: None,
            preferred_tile_size: None,
            tie_point_grids: Vec::new(),
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_at(&self, index: usize) -> Option<&Band> {
        self.bands.get(index)
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    /// Add a band. Names are unique within a product.
    pub fn add_band(&mut self, band: Band) -> SarResult<()> {
        if self.band(&band.name).is_some() {
            return Err(SarError::InvalidFormat(format!(
                "Product '{}' already contains a band named '{}'",
                self.name, band.name
            )));
        }
        if let BandSource::Virtual(expr) = &band.source {
            for source in expr.sources() {
                if self.band(source).is_none() {
                    return Err(SarError::Processing(format!(
                        "Virtual band '{}' references unknown band '{}'",
                        band.name, source
                    )));
                }
            }
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn tie_point_grids(&self) -> &[TiePointGrid] {
        &self.tie_point_grids
    }

    pub fn add_tie_point_grid(&mut self, grid: TiePointGrid) {
        self.tie_point_grids.push(grid);
    }

    pub fn tie_point_grid(&self, name: &str) -> Option<&TiePointGrid> {
        self.tie_point_grids.iter().find(|g| g.name == name)
    }

    /// Hand this product's geolocation and tiling hint to `target`
    pub fn transfer_geocoding_to(&self, target: &mut Product) -> bool {
        match &self.geocoding {
            Some(geocoding) => {
                target.geocoding = Some(geocoding.clone());
                target.preferred_tile_size = Some(
                    self.preferred_tile_size
                        .unwrap_or_else(|| TileSize::preferred_for(self.width, self.height)),
                );
                true
            }
            None => false,
        }
    }

    /// Read a window of a band. Virtual bands are evaluated from their sources on every call.
    pub fn read_band(&self, name: &str, window: Window) -> SarResult<Array2<f64>> {
        let band = self
            .band(name)
            .ok_or_else(|| SarError::Processing(format!("No band named '{}'", name)))?;

        if !window.fits_within(band.width, band.height) {
            return Err(SarError::Processing(format!(
                "Window {:?} outside band '{}' ({}x{})",
                window, name, band.width, band.height
            )));
        }

        match &band.source {
            BandSource::Stored(raster) => raster.read(window),
            BandSource::Virtual(VirtualIntensity::FromComplex { real, imaginary }) => {
                let re = self.read_band(real, window)?;
                let im = self.read_band(imaginary, window)?;
                Ok(complex_intensity(&re, &im))
            }
            BandSource::Virtual(VirtualIntensity::FromAmplitude { amplitude }) => {
                let amp = self.read_band(amplitude, window)?;
                Ok(amplitude_intensity(&amp))
            }
        }
    }

    pub fn read_pixel(&self, name: &str, x: usize, y: usize) -> SarResult<f64> {
        let data = self.read_band(name, Window::new(x, y, 1, 1))?;
        Ok(data[[0, 0]])
    }
}

fn complex_intensity(re: &Array2<f64>, im: &Array2<f64>) -> Array2<f64> {
    let zip = Zip::from(re).and(im);
    #[cfg(feature = "parallel")]
    {
        zip.par_map_collect(|&r, &i| Complex::new(r, i).norm_sqr())
    }
    #[cfg(not(feature = "parallel"))]
    {
        zip.map_collect(|&r, &i| Complex::new(r, i).norm_sqr())
    }
}

fn amplitude_intensity(amp: &Array2<f64>) -> Array2<f64> {
    let zip = Zip::from(amp);
    #[cfg(feature = "parallel")]
    {
        zip.par_map_collect(|&a| a * a)
    }
    #[cfg(not(feature = "parallel"))]
    {
        zip.map_collect(|&a| a * a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandRole, GeoTransform, PixelDataType};
    use ndarray::array;
    use std::sync::Arc;

    fn stored(name: &str, data: Array2<f64>) -> Band {
        let (h, w) = data.dim();
        Band::stored(name, PixelDataType::Float32, w, h, Arc::new(InMemoryRaster::new(data)))
    }

    #[test]
    fn test_complex_intensity_is_lazy_and_exact() {
        let mut product = Product::new("p", "SLANT_RANGE", 3, 1);
        product.add_band(stored("i_HH", array![[0.0, -3.0, 1.5]]).with_role(BandRole::Real)).unwrap();
        product.add_band(stored("q_HH", array![[0.0, 4.0, -2.0]]).with_role(BandRole::Imaginary)).unwrap();
        product
            .add_band(Band::virtual_intensity(
                "Intensity_HH",
                3,
                1,
                VirtualIntensity::FromComplex {
                    real: "i_HH".into(),
                    imaginary: "q_HH".into(),
                },
            ))
            .unwrap();

        let intensity = product.read_band("Intensity_HH", Window::full(3, 1)).unwrap();
        assert_eq!(intensity, array![[0.0, 25.0, 6.25]]);
        assert_eq!(product.read_pixel("Intensity_HH", 1, 0).unwrap(), 25.0);
    }

    #[test]
    fn test_amplitude_intensity() {
        let mut product = Product::new("p", "GROUND_RANGE", 2, 2);
        product.add_band(stored("Amplitude_VV", array![[0.0, 2.0], [3.0, 10.0]])).unwrap();
        product
            .add_band(Band::virtual_intensity(
                "Intensity_VV",
                2,
                2,
                VirtualIntensity::FromAmplitude {
                    amplitude: "Amplitude_VV".into(),
                },
            ))
            .unwrap();

        let intensity = product.read_band("Intensity_VV", Window::full(2, 2)).unwrap();
        assert_eq!(intensity, array![[0.0, 4.0], [9.0, 100.0]]);
    }

    #[test]
    fn test_duplicate_and_dangling_bands_rejected() {
        let mut product = Product::new("p", "t", 1, 1);
        product.add_band(stored("a", array![[1.0]])).unwrap();
        assert!(product.add_band(stored("a", array![[2.0]])).is_err());

        let dangling = Band::virtual_intensity(
            "Intensity_HH",
            1,
            1,
            VirtualIntensity::FromAmplitude {
                amplitude: "missing".into(),
            },
        );
        assert!(product.add_band(dangling).is_err());
        assert_eq!(product.num_bands(), 1);
    }

    #[test]
    fn test_transfer_geocoding_uses_default_tile_hint() {
        let mut source = Product::new("src", "t", 1000, 300);
        source.geocoding = Some(GeoCoding {
            transform: GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, -1.0]),
            crs: None,
        });
        let mut target = Product::new("dst", "t", 1000, 300);

        assert!(source.transfer_geocoding_to(&mut target));
        assert_eq!(target.geocoding, source.geocoding);
        assert_eq!(target.preferred_tile_size, Some(TileSize { width: 512, height: 300 }));
    }
}
