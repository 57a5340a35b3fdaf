//! GDAL-backed raster decoder (`gdal` feature)

use crate::io::decoder::{ImageStream, RasterDecoder, StreamBand};
use crate::io::source::{SceneFile, SceneStream};
use crate::io::tiff_reader::TiffRasterDecoder;
use crate::product::{Band, Product};
use crate::types::{GeoCoding, GeoTransform, PixelDataType, SarError, SarResult, TileSize, Window};
use gdal::Dataset;
use ndarray::Array2;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Raster decoder delegating to GDAL
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalRasterDecoder;

impl RasterDecoder for GdalRasterDecoder {
    fn name(&self) -> &str {
        "GDAL"
    }

    fn can_decode(&self, header: &[u8]) -> bool {
        TiffRasterDecoder::is_tiff_header(header)
    }

    fn decode_product(&self, file: &SceneFile, stream: SceneStream) -> SarResult<Product> {
        let image = Arc::new(GdalImage::read(file.file_name.clone(), file.disk_path().map(PathBuf::from), stream)?);
        sub_product(file, &image)
    }

    fn open_stream(&self, name: &str, stream: SceneStream) -> SarResult<Arc<dyn ImageStream>> {
        Ok(Arc::new(GdalImage::read(name.to_string(), None, stream)?))
    }

    fn open_with_product(
        &self,
        file: &SceneFile,
        stream: SceneStream,
        _reopen: &mut dyn FnMut() -> SarResult<SceneStream>,
    ) -> SarResult<(Arc<dyn ImageStream>, Product)> {
        let image = Arc::new(GdalImage::read(file.file_name.clone(), file.disk_path().map(PathBuf::from), stream)?);
        let product = sub_product(file, &image)?;
        Ok((image, product))
    }
}

fn sub_product(file: &SceneFile, image: &Arc<GdalImage>) -> SarResult<Product> {
    let mut product = Product::new(file.stem(), "GeoTIFF", image.width, image.height);
    product.geocoding = image.geocoding.clone();
    product.preferred_tile_size = image.tile_size;
    for b in 0..image.planes.len() {
        product.add_band(Band::stored(
            format!("band_{}", b + 1),
            image.data_type,
            image.width,
            image.height,
            Arc::new(StreamBand::new(image.clone(), b)),
        ))?;
    }
    Ok(product)
}

/// Bands read eagerly through GDAL
#[derive(Debug)]
pub struct GdalImage {
    name: String,
    width: usize,
    height: usize,
    data_type: PixelDataType,
    tile_size: Option<TileSize>,
    geocoding: Option<GeoCoding>,
    planes: Vec<Array2<f64>>,
}

impl GdalImage {
    fn read(name: String, disk_path: Option<PathBuf>, mut stream: SceneStream) -> SarResult<Self> {
        // GDAL needs a path; in-memory streams are spilled to a temporary file
        let mut _temp = None;
        let path = match disk_path {
            Some(p) => p,
            None => {
                let mut temp_file = NamedTempFile::new()?;
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                std::io::Write::write_all(&mut temp_file, &bytes)?;
                let p = temp_file.path().to_path_buf();
                _temp = Some(temp_file);
                p
            }
        };
        drop(stream);

        let dataset = Dataset::open(&path)?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        log::debug!("GDAL opened {}: {} x {}, bands: {}", name, width, height, band_count);

        let mut planes = Vec::with_capacity(band_count);
        let mut data_type = PixelDataType::Float64;
        let mut tile_size = None;
        for i in 1..=band_count {
            let band = dataset.rasterband(i as isize)?;
            if i == 1 {
                data_type = map_band_type(&band);
                let (bw, bh) = band.block_size();
                tile_size = Some(TileSize { width: bw, height: bh });
            }
            let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
            let plane = Array2::from_shape_vec((height, width), buffer.data)
                .map_err(|e| SarError::Processing(format!("{}: {}", name, e)))?;
            planes.push(plane);
        }

        let geocoding = dataset.geo_transform().ok().map(|gt| GeoCoding {
            transform: GeoTransform::from_gdal(gt),
            crs: Some(dataset.projection()).filter(|p| !p.is_empty()),
        });

        Ok(Self {
            name,
            width,
            height,
            data_type,
            tile_size,
            geocoding,
            planes,
        })
    }
}

fn map_band_type(band: &gdal::raster::RasterBand) -> PixelDataType {
    let band_type = band.band_type();
    let sample_format = if band_type.is_floating() {
        3
    } else if band_type.is_signed() {
        2
    } else {
        1
    };
    PixelDataType::from_sample_format(sample_format, band_type.bits() as u16).unwrap_or(PixelDataType::Float64)
}

impl ImageStream for GdalImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn num_bands(&self) -> usize {
        self.planes.len()
    }

    fn data_type(&self) -> PixelDataType {
        self.data_type
    }

    fn read_band(&self, band: usize, window: Window) -> SarResult<Array2<f64>> {
        let plane = self.planes.get(band).ok_or_else(|| {
            SarError::Processing(format!("{}: band {} out of range", self.name, band))
        })?;
        crate::product::band::read_window(plane, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::DecoderRegistry;
    use tiff::encoder::{colortype, TiffEncoder};

    fn gray16_file(dir: &std::path::Path, data: &[u16]) -> PathBuf {
        let path = dir.join("imagery_HH.tif");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder.write_image::<colortype::Gray16>(2, 2, data).unwrap();
        path
    }

    #[test]
    fn test_default_registry_prefers_gdal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = gray16_file(dir.path(), &[1, 2, 3, 400]);
        let file = SceneFile::on_disk("scene_HH/imagery_HH.tif", path.clone());

        let registry = DecoderRegistry::default();
        let mut stream = SceneStream::File(std::io::BufReader::new(std::fs::File::open(&path).unwrap()));
        let decoder = registry.raster_decoder_for(&file, &mut stream).unwrap();
        assert_eq!(decoder.name(), "GDAL");

        let (image, product) = decoder
            .open_with_product(&file, stream, &mut || Err(SarError::Processing("unused".into())))
            .unwrap();
        assert_eq!((image.width(), image.height()), (2, 2));
        assert_eq!(image.data_type(), PixelDataType::UInt16);
        assert_eq!(product.band_names(), vec!["band_1"]);
        assert_eq!(product.read_pixel("band_1", 1, 1).unwrap(), 400.0);
    }

    #[test]
    fn test_in_memory_stream_is_spilled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = gray16_file(dir.path(), &[5, 6, 7, 8]);
        let bytes = std::fs::read(&path).unwrap();

        let image = GdalRasterDecoder
            .open_stream("imagery_hh.tif", SceneStream::from_bytes(bytes))
            .unwrap();
        assert_eq!(image.read_band(0, Window::new(0, 1, 2, 1)).unwrap(), ndarray::array![[7.0, 8.0]]);
    }
}
