//! Classification of candidate scene files and dispatch to the decoders

use crate::io::decoder::{DecoderRegistry, ImageStream};
use crate::io::source::{ProductSource, SceneFile};
use crate::product::Product;
use crate::types::{ContainerKind, SarResult};
use std::sync::Arc;

const IMAGERY_MARKER: &str = "imagery";
const VOLUME_MARKER: &str = "vdf_";
const LEGACY_EXTENSION: &str = ".001";
const CHANNEL_FOLDER_MARKER: &str = "scene_";

/// What a candidate file is, judged from its name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    GeoRaster,
    LegacyBinary,
    NotData,
}

impl FileClass {
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            FileClass::GeoRaster => Some(ContainerKind::GeoRaster),
            FileClass::LegacyBinary => Some(ContainerKind::LegacyBinary),
            FileClass::NotData => None,
        }
    }
}

/// Classify a file by name. Matching is case-insensitive.
pub fn classify(file_name: &str) -> FileClass {
    let name = file_name.to_lowercase();
    if (name.ends_with("tif") || name.ends_with("tiff")) && name.contains(IMAGERY_MARKER) {
        FileClass::GeoRaster
    } else if name.ends_with(LEGACY_EXTENSION) && name.contains(VOLUME_MARKER) {
        FileClass::LegacyBinary
    } else {
        FileClass::NotData
    }
}

/// Two characters following the channel-folder marker, e.g. `HH` in `scene_HH/vdf_x.001`
pub fn channel_from_path(relative_path: &str) -> Option<&str> {
    let start = relative_path.find(CHANNEL_FOLDER_MARKER)? + CHANNEL_FOLDER_MARKER.len();
    relative_path.get(start..start + 2)
}

/// One physical data file after decoding
#[derive(Debug)]
pub enum RasterFileDescriptor {
    /// GeoTIFF imagery: streaming handle, plus the decoded sub-product when not read from an archive
    GeoRaster {
        name: String,
        stream: Arc<dyn ImageStream>,
        sub_product: Option<Product>,
    },
    /// CEOS volume decoded by the legacy decoder
    LegacyBinary { name: String, sub_product: Product },
}

impl RasterFileDescriptor {
    pub fn name(&self) -> &str {
        match self {
            RasterFileDescriptor::GeoRaster { name, .. } => name,
            RasterFileDescriptor::LegacyBinary { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            RasterFileDescriptor::GeoRaster { .. } => ContainerKind::GeoRaster,
            RasterFileDescriptor::LegacyBinary { .. } => ContainerKind::LegacyBinary,
        }
    }

    pub fn band_count(&self) -> usize {
        match self {
            RasterFileDescriptor::GeoRaster { stream, .. } => stream.num_bands(),
            RasterFileDescriptor::LegacyBinary { sub_product, .. } => sub_product.num_bands(),
        }
    }

    /// (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            RasterFileDescriptor::GeoRaster { stream, .. } => (stream.width(), stream.height()),
            RasterFileDescriptor::LegacyBinary { sub_product, .. } => (sub_product.width, sub_product.height),
        }
    }
}

/// Turns candidate files into decoded descriptors
pub struct RasterFileClassifier;

impl RasterFileClassifier {
    /// Decode one candidate file.
    ///
    /// Returns `Ok(None)` for files that are not data files and for empty placeholders.
    /// A missing decoder or a decoder failure is an error.
    pub fn ingest(
        source: &mut ProductSource,
        registry: &DecoderRegistry,
        file: &SceneFile,
    ) -> SarResult<Option<RasterFileDescriptor>> {
        match classify(&file.file_name) {
            FileClass::GeoRaster => Self::ingest_geo_raster(source, registry, file),
            FileClass::LegacyBinary => Self::ingest_legacy(source, registry, file).map(Some),
            FileClass::NotData => {
                log::debug!("Ignoring {}", file.relative_path);
                Ok(None)
            }
        }
    }

    fn ingest_geo_raster(
        source: &mut ProductSource,
        registry: &DecoderRegistry,
        file: &SceneFile,
    ) -> SarResult<Option<RasterFileDescriptor>> {
        let mut stream = source.open_stream(file)?;
        if stream.available()? == 0 {
            log::debug!("Skipping empty placeholder {}", file.relative_path);
            return Ok(None);
        }

        let decoder = registry.raster_decoder_for(file, &mut stream)?;
        log::debug!("Classified {} as GeoRaster ({})", file.relative_path, decoder.name());

        let (image, sub_product) = if source.is_compressed() {
            (decoder.open_stream(&file.file_name, stream)?, None)
        } else {
            let (image, product) = decoder.open_with_product(file, stream, &mut || source.open_stream(file))?;
            (image, Some(product))
        };

        Ok(Some(RasterFileDescriptor::GeoRaster {
            name: file.file_name.clone(),
            stream: image,
            sub_product,
        }))
    }

    fn ingest_legacy(
        source: &mut ProductSource,
        registry: &DecoderRegistry,
        file: &SceneFile,
    ) -> SarResult<RasterFileDescriptor> {
        let decoder = registry.legacy_decoder(file)?;
        log::debug!("Classified {} as LegacyBinary ({})", file.relative_path, decoder.name());

        let stream = source.open_stream(file)?;
        let mut sub_product = decoder.decode(file, stream)?;
        if let Some(channel) = channel_from_path(&file.relative_path) {
            sub_product.name = format!("{}_{}", sub_product.name, channel);
        }

        Ok(RasterFileDescriptor::LegacyBinary {
            name: file.file_name.clone(),
            sub_product,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::LegacyDecoder;
    use crate::io::source::{SceneStream, BAND_HEADER_NAME};
    use crate::types::SarError;
    use tempfile::TempDir;

    #[test]
    fn test_classify_names() {
        assert_eq!(classify("imagery_hh.tif"), FileClass::GeoRaster);
        assert_eq!(classify("IMAGERY_VV.TIFF"), FileClass::GeoRaster);
        assert_eq!(classify("preview.tif"), FileClass::NotData);
        assert_eq!(classify("vdf_12345.001"), FileClass::LegacyBinary);
        assert_eq!(classify("dat_12345.001"), FileClass::NotData);
        assert_eq!(classify("band_meta.txt"), FileClass::NotData);
        assert_eq!(classify("vdf_12345.001").container_kind(), Some(ContainerKind::LegacyBinary));
    }

    #[test]
    fn test_channel_from_path() {
        assert_eq!(channel_from_path("scene_HV/vdf_1.001"), Some("HV"));
        assert_eq!(channel_from_path("a/scene_RV/vdf_1.001"), Some("RV"));
        assert_eq!(channel_from_path("vdf_1.001"), None);
    }

    struct FailingLegacy;

    impl LegacyDecoder for FailingLegacy {
        fn name(&self) -> &str {
            "failing"
        }

        fn decode(&self, file: &SceneFile, _stream: SceneStream) -> SarResult<Product> {
            Err(SarError::Decoder(format!("corrupt volume {}", file.relative_path)))
        }
    }

    struct NamedLegacy;

    impl LegacyDecoder for NamedLegacy {
        fn name(&self) -> &str {
            "named"
        }

        fn decode(&self, _file: &SceneFile, _stream: SceneStream) -> SarResult<Product> {
            Ok(Product::new("RISAT1_CEOS", "CEOS", 4, 4))
        }
    }

    fn scene_dir(folder: &str, file: &str, bytes: &[u8]) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(BAND_HEADER_NAME), "").unwrap();
        std::fs::create_dir(dir.path().join(folder)).unwrap();
        std::fs::write(dir.path().join(folder).join(file), bytes).unwrap();
        dir
    }

    #[test]
    fn test_empty_placeholder_is_skipped() {
        let dir = scene_dir("scene_HH", "imagery_HH.tif", b"");
        let mut source = ProductSource::open(dir.path()).unwrap();
        let files = source.list_folder("scene_HH").unwrap();
        let result = RasterFileClassifier::ingest(&mut source, &DecoderRegistry::empty(), &files[0]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_undecodable_raster_is_fatal() {
        let dir = scene_dir("scene_HH", "imagery_HH.tif", b"definitely not a tiff");
        let mut source = ProductSource::open(dir.path()).unwrap();
        let files = source.list_folder("scene_HH").unwrap();
        let err = RasterFileClassifier::ingest(&mut source, &DecoderRegistry::default(), &files[0]).unwrap_err();
        assert!(matches!(err, SarError::NoReader(_)));
    }

    #[test]
    fn test_legacy_sub_product_renamed_with_channel() {
        let dir = scene_dir("scene_VH", "VDF_0001.001", b"ceos");
        let mut source = ProductSource::open(dir.path()).unwrap();
        let files = source.list_folder("scene_VH").unwrap();
        let registry = DecoderRegistry::empty().with_legacy_decoder(Box::new(NamedLegacy));

        let descriptor = RasterFileClassifier::ingest(&mut source, &registry, &files[0])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.kind(), ContainerKind::LegacyBinary);
        assert_eq!(descriptor.dimensions(), (4, 4));
        match descriptor {
            RasterFileDescriptor::LegacyBinary { sub_product, .. } => {
                assert_eq!(sub_product.name, "RISAT1_CEOS_VH")
            }
            other => panic!("unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn test_legacy_failures_propagate() {
        let dir = scene_dir("scene_HH", "vdf_0001.001", b"ceos");
        let mut source = ProductSource::open(dir.path()).unwrap();
        let files = source.list_folder("scene_HH").unwrap();

        let missing = RasterFileClassifier::ingest(&mut source, &DecoderRegistry::empty(), &files[0]).unwrap_err();
        assert!(matches!(missing, SarError::NoReader(_)));

        let registry = DecoderRegistry::empty().with_legacy_decoder(Box::new(FailingLegacy));
        let failed = RasterFileClassifier::ingest(&mut source, &registry, &files[0]).unwrap_err();
        assert!(matches!(failed, SarError::Decoder(_)));
    }
}
