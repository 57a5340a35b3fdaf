//! Decoder boundary: raster containers and legacy binary volumes

use crate::io::source::{SceneFile, SceneStream};
#[cfg(feature = "gdal")]
use crate::io::gdal_reader::GdalRasterDecoder;
use crate::io::tiff_reader::TiffRasterDecoder;
use crate::product::{BandRaster, Product};
use crate::types::{PixelDataType, SarError, SarResult, Window};
use ndarray::Array2;
use std::sync::Arc;

/// Number of leading bytes handed to `RasterDecoder::can_decode`
pub const HEADER_PEEK_LEN: usize = 16;

/// Per-band streaming access to one raster file
pub trait ImageStream: Send + Sync + std::fmt::Debug {
    /// Logical name (lower-cased file name)
    fn name(&self) -> &str;
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn num_bands(&self) -> usize;
    fn data_type(&self) -> PixelDataType;
    fn read_band(&self, band: usize, window: Window) -> SarResult<Array2<f64>>;
}

/// Decoder for raster containers (GeoTIFF imagery)
pub trait RasterDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the leading bytes of a stream look like something this decoder reads
    fn can_decode(&self, header: &[u8]) -> bool;

    /// Fully decoded sub-product (bands, geolocation, tiling hint)
    fn decode_product(&self, file: &SceneFile, stream: SceneStream) -> SarResult<Product>;

    /// Low-level streaming handle over the same file
    fn open_stream(&self, name: &str, stream: SceneStream) -> SarResult<Arc<dyn ImageStream>>;

    /// Streaming handle and sub-product of one file.
    ///
    /// The provided version decodes the file twice, pulling a second stream from `reopen`.
    /// Decoders that can serve both from one opened image override it.
    fn open_with_product(
        &self,
        file: &SceneFile,
        stream: SceneStream,
        reopen: &mut dyn FnMut() -> SarResult<SceneStream>,
    ) -> SarResult<(Arc<dyn ImageStream>, Product)> {
        let product = self.decode_product(file, reopen()?)?;
        let image = self.open_stream(&file.file_name, stream)?;
        Ok((image, product))
    }
}

/// Decoder for legacy binary volumes (CEOS `vdf_*.001`)
pub trait LegacyDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// Decoded sub-product carrying its own `Original_Product_Metadata`
    fn decode(&self, file: &SceneFile, stream: SceneStream) -> SarResult<Product>;
}

/// One band of an `ImageStream` viewed as a stored band raster
#[derive(Debug, Clone)]
pub struct StreamBand {
    stream: Arc<dyn ImageStream>,
    band: usize,
}

impl StreamBand {
    pub fn new(stream: Arc<dyn ImageStream>, band: usize) -> Self {
        Self { stream, band }
    }
}

impl BandRaster for StreamBand {
    fn width(&self) -> usize {
        self.stream.width()
    }

    fn height(&self) -> usize {
        self.stream.height()
    }

    fn read(&self, window: Window) -> SarResult<Array2<f64>> {
        self.stream.read_band(self.band, window)
    }
}

/// Decoders available to an ingestion
pub struct DecoderRegistry {
    raster: Vec<Box<dyn RasterDecoder>>,
    legacy: Option<Box<dyn LegacyDecoder>>,
}

impl Default for DecoderRegistry {
    /// GDAL first when the `gdal` feature is on, then the built-in TIFF reader
    fn default() -> Self {
        let mut raster: Vec<Box<dyn RasterDecoder>> = Vec::new();
        #[cfg(feature = "gdal")]
        raster.push(Box::new(GdalRasterDecoder));
        raster.push(Box::new(TiffRasterDecoder));
        Self { raster, legacy: None }
    }
}

impl DecoderRegistry {
    /// Registry without any decoder
    pub fn empty() -> Self {
        Self {
            raster: Vec::new(),
            legacy: None,
        }
    }

    pub fn with_raster_decoder(mut self, decoder: Box<dyn RasterDecoder>) -> Self {
        self.raster.push(decoder);
        self
    }

    pub fn with_legacy_decoder(mut self, decoder: Box<dyn LegacyDecoder>) -> Self {
        self.legacy = Some(decoder);
        self
    }

    /// First raster decoder accepting the stream's header
    pub fn raster_decoder_for(&self, file: &SceneFile, stream: &mut SceneStream) -> SarResult<&dyn RasterDecoder> {
        let header = stream.peek_header(HEADER_PEEK_LEN)?;
        self.raster
            .iter()
            .find(|d| d.can_decode(&header))
            .map(|d| d.as_ref())
            .ok_or_else(|| SarError::NoReader(format!("Unable to open {}", file.relative_path)))
    }

    pub fn legacy_decoder(&self, file: &SceneFile) -> SarResult<&dyn LegacyDecoder> {
        self.legacy
            .as_deref()
            .ok_or_else(|| SarError::NoReader(format!("No legacy decoder for {}", file.relative_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn imagery_file() -> SceneFile {
        SceneFile::on_disk("scene_HH/imagery_HH.tif", PathBuf::from("/tmp/scene_HH/imagery_HH.tif"))
    }

    #[test]
    fn test_registry_rejects_unknown_stream() {
        let registry = DecoderRegistry::default();
        let file = imagery_file();
        let mut stream = SceneStream::from_bytes(b"not a tiff at all".to_vec());
        let err = registry.raster_decoder_for(&file, &mut stream).err().unwrap();
        assert!(matches!(err, SarError::NoReader(_)));
        assert!(registry.legacy_decoder(&file).is_err());
    }

    #[test]
    fn test_registry_accepts_tiff_magic() {
        let registry = DecoderRegistry::default();
        let file = imagery_file();
        let mut stream = SceneStream::from_bytes(b"II*\0\x08\0\0\0".to_vec());
        let decoder = registry.raster_decoder_for(&file, &mut stream).unwrap();
        let expected = if cfg!(feature = "gdal") { "GDAL" } else { "GeoTIFF" };
        assert_eq!(decoder.name(), expected);
        // header peek leaves the stream at the start
        assert_eq!(stream.available().unwrap(), 8);
    }
}
