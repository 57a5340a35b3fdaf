//! Scene file access and decoders

pub mod band_meta;
pub mod classify;
pub mod decoder;
#[cfg(feature = "gdal")]
pub mod gdal_reader;
pub mod layout;
pub mod source;
pub mod tiff_reader;

pub use band_meta::BandMetaParser;
pub use classify::{RasterFileClassifier, RasterFileDescriptor};
pub use decoder::{DecoderRegistry, ImageStream, LegacyDecoder, RasterDecoder, StreamBand};
#[cfg(feature = "gdal")]
pub use gdal_reader::GdalRasterDecoder;
pub use layout::SceneFileLocator;
pub use source::{ProductSource, SceneFile, SceneStream};
pub use tiff_reader::TiffRasterDecoder;
