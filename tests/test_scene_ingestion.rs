use ndarray::{array, Array2};
use risat1_reader::io::{DecoderRegistry, ImageStream, LegacyDecoder, RasterDecoder, SceneFile, SceneStream, StreamBand};
use risat1_reader::product::abstracted::{self, COMPACT_MODE, POLSAR_DATA};
use risat1_reader::product::{Band, Product};
use risat1_reader::types::{GeoCoding, GeoTransform, PixelDataType};
use risat1_reader::{ReaderConfig, Risat1ProductReader, SarError, Window};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};

const PLANAR_MAGIC: &[u8; 4] = b"PLNR";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Minimal planar test container: magic, width, height, band count, then i8 samples band by band
fn planar_bytes(width: u8, height: u8, planes: &[&[i8]]) -> Vec<u8> {
    let mut bytes = PLANAR_MAGIC.to_vec();
    bytes.extend_from_slice(&[width, height, planes.len() as u8]);
    for plane in planes {
        bytes.extend(plane.iter().map(|v| *v as u8));
    }
    bytes
}

fn parse_planar(mut stream: SceneStream) -> risat1_reader::SarResult<(usize, usize, Vec<Array2<f64>>)> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    if bytes.len() < 7 || &bytes[..4] != PLANAR_MAGIC {
        return Err(SarError::InvalidFormat("not a planar test file".into()));
    }
    let (w, h, n) = (bytes[4] as usize, bytes[5] as usize, bytes[6] as usize);
    let planes = (0..n)
        .map(|b| {
            let start = 7 + b * w * h;
            let values = bytes[start..start + w * h].iter().map(|v| *v as i8 as f64).collect();
            Array2::from_shape_vec((h, w), values).unwrap()
        })
        .collect();
    Ok((w, h, planes))
}

#[derive(Debug)]
struct PlanarImage {
    name: String,
    planes: Vec<Array2<f64>>,
}

impl ImageStream for PlanarImage {
    fn name(&self) -> &str {
        &self.name
    }
    fn width(&self) -> usize {
        self.planes[0].ncols()
    }
    fn height(&self) -> usize {
        self.planes[0].nrows()
    }
    fn num_bands(&self) -> usize {
        self.planes.len()
    }
    fn data_type(&self) -> PixelDataType {
        PixelDataType::Int8
    }
    fn read_band(&self, band: usize, window: Window) -> risat1_reader::SarResult<Array2<f64>> {
        risat1_reader::product::band::read_window(&self.planes[band], window)
    }
}

fn planar_product(name: String, planes: Vec<Array2<f64>>, w: usize, h: usize) -> Product {
    let image = Arc::new(PlanarImage {
        name: name.clone(),
        planes,
    });
    let mut product = Product::new(name, "PLANAR", w, h);
    for b in 0..image.num_bands() {
        let raster = Arc::new(StreamBand::new(image.clone(), b));
        product
            .add_band(Band::stored(format!("band_{}", b + 1), PixelDataType::Int8, w, h, raster))
            .unwrap();
    }
    product
}

/// Raster decoder for the planar test container; sub-products carry a fixed geocoding
struct PlanarRasterDecoder;

fn test_geocoding() -> GeoCoding {
    GeoCoding {
        transform: GeoTransform::from_gdal([77.0, 0.001, 0.0, 13.0, 0.0, -0.001]),
        crs: Some("EPSG:4326".into()),
    }
}

impl RasterDecoder for PlanarRasterDecoder {
    fn name(&self) -> &str {
        "planar"
    }

    fn can_decode(&self, header: &[u8]) -> bool {
        header.starts_with(PLANAR_MAGIC)
    }

    fn decode_product(&self, file: &SceneFile, stream: SceneStream) -> risat1_reader::SarResult<Product> {
        let (w, h, planes) = parse_planar(stream)?;
        let mut product = planar_product(file.stem(), planes, w, h);
        product.geocoding = Some(test_geocoding());
        Ok(product)
    }

    fn open_stream(&self, name: &str, stream: SceneStream) -> risat1_reader::SarResult<Arc<dyn ImageStream>> {
        let (_, _, planes) = parse_planar(stream)?;
        Ok(Arc::new(PlanarImage {
            name: name.to_string(),
            planes,
        }))
    }
}

/// Legacy decoder reading the planar container from `vdf_*.001` files
struct PlanarCeosDecoder;

impl LegacyDecoder for PlanarCeosDecoder {
    fn name(&self) -> &str {
        "planar-ceos"
    }

    fn decode(&self, file: &SceneFile, stream: SceneStream) -> risat1_reader::SarResult<Product> {
        let (w, h, planes) = parse_planar(stream).map_err(|e| SarError::Decoder(e.to_string()))?;
        let mut product = planar_product("RISAT1_CEOS".to_string(), planes, w, h);
        abstracted::original_product_metadata_mut(&mut product.metadata).set_value("volume", file.file_name.as_str());
        Ok(product)
    }
}

fn write_header(dir: &Path, product_type: &str) {
    let header = format!(
        "ProductType={}\nNode=DESCENDING\nbeamModeMnemonic=FRS1\nproductId=4242\n\
         SceneStartTime=05-MAR-2015 06:30:00.000000\nSceneEndTime=05-MAR-2015 06:30:04.000000\n",
        product_type
    );
    std::fs::write(dir.join("BAND_META.txt"), header).expect("Failed to write header");
}

fn write_file(dir: &Path, folder: &str, name: &str, bytes: &[u8]) {
    std::fs::create_dir_all(dir.join(folder)).expect("Failed to create folder");
    std::fs::write(dir.join(folder).join(name), bytes).expect("Failed to write file");
}

fn gray16_tiff(width: u32, height: u32, data: &[u16]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).expect("Failed to create encoder");
        encoder
            .write_image::<colortype::Gray16>(width, height, data)
            .expect("Failed to encode image");
    }
    buf.into_inner()
}

fn planar_reader() -> Risat1ProductReader {
    Risat1ProductReader::new(ReaderConfig::default())
        .with_decoders(DecoderRegistry::empty().with_raster_decoder(Box::new(PlanarRasterDecoder)))
}

fn ceos_reader() -> Risat1ProductReader {
    Risat1ProductReader::new(ReaderConfig::default()).with_legacy_decoder(Box::new(PlanarCeosDecoder))
}

#[test]
fn test_detected_geotiff_scene() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "GROUND_RANGE");
    write_file(dir.path(), "scene_HH", "imagery_HH.tif", &gray16_tiff(3, 2, &[0, 1, 2, 3, 4, 500]));
    write_file(dir.path(), "scene_VV", "imagery_VV.tif", &gray16_tiff(3, 2, &[6, 5, 4, 3, 2, 1]));
    write_file(dir.path(), "scene_VV", "BAND_META.txt", b"not imagery");

    let product = Risat1ProductReader::new(ReaderConfig::default()).read_product(dir.path())?;
    println!("Bands: {:?}", product.band_names());

    assert_eq!(product.name, "RISAT1-GROUND_RANGE-FRS1-DSC-05-Mar-2015_06.30-4242");
    assert_eq!((product.width, product.height), (3, 2));
    assert_eq!(
        product.band_names(),
        vec!["Amplitude_HH", "Intensity_HH", "Amplitude_VV", "Intensity_VV"]
    );

    let amplitude = product.band("Amplitude_HH").unwrap();
    assert_eq!(amplitude.unit, "amplitude");
    assert_eq!(amplitude.data_type, PixelDataType::UInt32);
    assert!(amplitude.no_data_used);
    assert_eq!(amplitude.no_data_value, 0.0);
    assert!(product.band("Intensity_HH").unwrap().is_virtual());

    let intensity = product.read_band("Intensity_HH", Window::full(3, 2))?;
    assert_eq!(intensity, array![[0.0, 1.0, 4.0], [9.0, 16.0, 250000.0]]);
    assert_eq!(product.read_pixel("Intensity_VV", 0, 0)?, 36.0);

    let abs = abstracted::abstracted(&product.metadata).unwrap();
    assert_eq!(abs.attribute_int(POLSAR_DATA, 0), abstracted::NO_METADATA);
    assert_eq!(abs.attribute_string(COMPACT_MODE, "x"), abstracted::NO_METADATA_STRING);
    Ok(())
}

#[test]
fn test_empty_placeholder_does_not_change_product() -> anyhow::Result<()> {
    init_logging();
    let build = |with_placeholder: bool| -> anyhow::Result<Product> {
        let dir = TempDir::new()?;
        write_header(dir.path(), "GROUND_RANGE");
        write_file(dir.path(), "scene_HH", "imagery_HH.tif", &gray16_tiff(2, 2, &[1, 2, 3, 4]));
        if with_placeholder {
            write_file(dir.path(), "scene_HV", "imagery_HV.tif", b"");
            write_file(dir.path(), "scene_HH", "imagery_HH_copy.tiff", b"");
        }
        Ok(Risat1ProductReader::new(ReaderConfig::default()).read_product(dir.path())?)
    };

    let plain = build(false)?;
    let with_placeholder = build(true)?;

    assert_eq!(plain.name, with_placeholder.name);
    assert_eq!((plain.width, plain.height), (with_placeholder.width, with_placeholder.height));
    assert_eq!(plain.band_names(), with_placeholder.band_names());
    assert_eq!(plain.metadata, with_placeholder.metadata);
    assert_eq!(
        plain.read_band("Intensity_HH", Window::full(2, 2))?,
        with_placeholder.read_band("Intensity_HH", Window::full(2, 2))?
    );
    Ok(())
}

#[test]
fn test_compact_pol_scene_sets_polsar_attributes() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "GROUND_RANGE");
    write_file(dir.path(), "scene_RH", "imagery_RH.tif", &gray16_tiff(2, 1, &[3, 4]));
    write_file(dir.path(), "scene_RV", "imagery_RV.tif", &gray16_tiff(2, 1, &[5, 6]));

    let product = Risat1ProductReader::new(ReaderConfig::default()).read_product(dir.path())?;
    assert_eq!(
        product.band_names(),
        vec!["Amplitude_RCH", "Intensity_RCH", "Amplitude_RCV", "Intensity_RCV"]
    );

    let abs = abstracted::abstracted(&product.metadata).unwrap();
    assert_eq!(abs.attribute_int(POLSAR_DATA, 0), 1);
    assert_eq!(abs.attribute_string(COMPACT_MODE, ""), "Right Circular Hybrid Mode");
    Ok(())
}

#[test]
fn test_complex_streaming_scene() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "SLANT_RANGE");
    write_file(
        dir.path(),
        "scene_HH",
        "imagery_HH.tif",
        &planar_bytes(2, 2, &[&[0, -3, 2, -1], &[0, 4, -2, 0]]),
    );
    write_file(
        dir.path(),
        "scene_VH",
        "imagery_VH.tif",
        &planar_bytes(2, 2, &[&[1, 1, 1, 1], &[-1, 0, 1, 2]]),
    );

    let product = planar_reader().read_product(dir.path())?;
    assert_eq!(
        product.band_names(),
        vec!["i_HH", "q_HH", "Intensity_HH", "i_VH", "q_VH", "Intensity_VH"]
    );
    assert_eq!(product.band("i_HH").unwrap().unit, "real");
    assert_eq!(product.band("q_VH").unwrap().unit, "imaginary");
    assert_eq!(product.band("q_VH").unwrap().data_type, PixelDataType::Int32);

    assert_eq!(product.read_band("Intensity_HH", Window::full(2, 2))?, array![[0.0, 25.0], [8.0, 1.0]]);
    assert_eq!(product.read_band("Intensity_VH", Window::full(2, 2))?, array![[2.0, 1.0], [2.0, 5.0]]);
    assert_eq!(product.read_band("q_HH", Window::new(0, 1, 2, 1))?, array![[-2.0, 0.0]]);

    // geocoding and tiling hint come from the decoded sub-product
    assert_eq!(product.geocoding, Some(test_geocoding()));
    assert!(product.preferred_tile_size.is_some());

    let abs = abstracted::abstracted(&product.metadata).unwrap();
    assert_eq!(abs.attribute_string(abstracted::SAMPLE_TYPE, ""), "COMPLEX");
    assert_eq!(abs.attribute_int(abstracted::SRGR_FLAG, -1), 0);
    Ok(())
}

#[test]
fn test_complex_legacy_scene_has_three_bands_per_channel() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "SLANT_RANGE");
    write_file(dir.path(), "scene_HH", "vdf_0001.001", &planar_bytes(2, 1, &[&[3, 0], &[-4, 0]]));
    write_file(dir.path(), "scene_HV", "vdf_0002.001", &planar_bytes(2, 1, &[&[-1, 2], &[1, -2]]));
    write_file(dir.path(), "scene_HV", "lea_0002.001", b"leader file");

    let product = ceos_reader().read_product(dir.path())?;
    let names = product.band_names();
    println!("Bands: {:?}", names);
    assert_eq!(names.len(), 3 * 2);
    assert_eq!(
        names,
        vec!["band_1_HH", "band_2_HH", "Intensity_HH", "band_1_HV", "band_2_HV", "Intensity_HV"]
    );
    assert_eq!(product.read_band("Intensity_HH", Window::full(2, 1))?, array![[25.0, 0.0]]);
    assert_eq!(product.read_band("Intensity_HV", Window::full(2, 1))?, array![[2.0, 8.0]]);

    let orig = abstracted::original_product_metadata(&product.metadata).unwrap();
    assert!(orig.element("ProductMetadata").is_some());
    assert_eq!(
        orig.element("HH_Metadata").unwrap().attribute_string("volume", ""),
        "vdf_0001.001"
    );
    assert_eq!(
        orig.element("HV_Metadata").unwrap().attribute_string("volume", ""),
        "vdf_0002.001"
    );
    Ok(())
}

#[test]
fn test_detected_legacy_scene_has_two_bands_per_channel() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "GROUND_RANGE");
    for (folder, value) in [("scene_HH", 2i8), ("scene_HV", 3), ("scene_VV", -5)] {
        write_file(dir.path(), folder, "vdf_a.001", &planar_bytes(1, 1, &[&[value]]));
    }

    let product = ceos_reader().read_product(dir.path())?;
    assert_eq!(product.num_bands(), 2 * 3);
    assert_eq!(product.read_pixel("Intensity_HH", 0, 0)?, 4.0);
    assert_eq!(product.read_pixel("Intensity_HV", 0, 0)?, 9.0);
    assert_eq!(product.read_pixel("Intensity_VV", 0, 0)?, 25.0);
    assert_eq!(product.band("Amplitude_VV").unwrap().unit, "amplitude");
    Ok(())
}

#[test]
fn test_raster_and_legacy_in_one_channel_raster_wins() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write_header(dir.path(), "GROUND_RANGE");
    write_file(dir.path(), "scene_HH", "imagery_HH.tif", &gray16_tiff(3, 2, &[1, 2, 3, 4, 5, 6]));
    write_file(dir.path(), "scene_HH", "vdf_x.001", &planar_bytes(1, 1, &[&[9]]));

    let product = ceos_reader().read_product(dir.path())?;
    println!("Bands: {:?}", product.band_names());

    // pixel bands only from the streaming handle, so no duplicate Amplitude_HH
    assert_eq!(product.band_names(), vec!["Amplitude_HH", "Intensity_HH"]);
    assert_eq!(product.read_band("Intensity_HH", Window::full(3, 2))?, array![[1.0, 4.0, 9.0], [16.0, 25.0, 36.0]]);

    // size of the first sub-product in file order (the GeoTIFF), not the 1x1 volume
    assert_eq!((product.width, product.height), (3, 2));

    let orig = abstracted::original_product_metadata(&product.metadata).unwrap();
    assert_eq!(
        orig.element("HH_Metadata").unwrap().attribute_string("volume", ""),
        "vdf_x.001"
    );
    Ok(())
}

#[test]
fn test_zip_delivery_reads_streams_only() -> anyhow::Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let zip_path = dir.path().join("RISAT1_delivery.zip");
    {
        let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
        let options = zip::write::FileOptions::default();
        zip.start_file("product/BAND_META.txt", options)?;
        zip.write_all(b"ProductType=SLANT_RANGE\nNode=ASCENDING\nNoPixels=2\nNoScans=1\n")?;
        zip.start_file("product/scene_VV/imagery_VV.tif", options)?;
        zip.write_all(&planar_bytes(2, 1, &[&[1, -2], &[2, 2]]))?;
        zip.start_file("product/scene_HH/imagery_HH.tif", options)?;
        zip.finish()?;
    }

    let product = planar_reader().read_product(&zip_path)?;
    assert_eq!(product.band_names(), vec!["i_VV", "q_VV", "Intensity_VV"]);
    assert_eq!((product.width, product.height), (2, 1));
    assert_eq!(product.read_band("Intensity_VV", Window::full(2, 1))?, array![[5.0, 8.0]]);
    // no sub-product is decoded from an archive, so nothing to take geocoding from
    assert!(product.geocoding.is_none());
    Ok(())
}

#[test]
fn test_missing_decoders_are_fatal() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_header(dir.path(), "GROUND_RANGE");
    write_file(dir.path(), "scene_HH", "imagery_HH.tif", b"not a raster container");

    let err = Risat1ProductReader::new(ReaderConfig::default())
        .read_product(dir.path())
        .unwrap_err();
    assert!(matches!(err, SarError::NoReader(_)), "unexpected error: {}", err);

    let legacy_dir = TempDir::new().unwrap();
    write_header(legacy_dir.path(), "GROUND_RANGE");
    write_file(legacy_dir.path(), "scene_VV", "vdf_1.001", b"volume");
    let err = Risat1ProductReader::new(ReaderConfig::default())
        .read_product(legacy_dir.path())
        .unwrap_err();
    assert!(matches!(err, SarError::NoReader(_)), "unexpected error: {}", err);
}

#[test]
fn test_legacy_decoder_failure_propagates() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_header(dir.path(), "GROUND_RANGE");
    write_file(dir.path(), "scene_HH", "vdf_1.001", b"truncated");

    let err = ceos_reader().read_product(dir.path()).unwrap_err();
    assert!(matches!(err, SarError::Decoder(_)), "unexpected error: {}", err);
}

#[test]
fn test_missing_header_is_fatal() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "scene_HH", "imagery_HH.tif", &gray16_tiff(1, 1, &[1]));

    let err = Risat1ProductReader::new(ReaderConfig::default())
        .read_product(dir.path())
        .unwrap_err();
    assert!(matches!(err, SarError::InvalidFormat(_)), "unexpected error: {}", err);
}
