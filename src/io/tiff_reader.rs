//! GeoTIFF imagery decoder built on the `tiff` crate
//!
//! Windows are served strip by strip (or tile by tile): only the chunks a window touches
//! are decoded. One opened image backs both the sub-product bands and the streaming handle.

use crate::io::decoder::{ImageStream, RasterDecoder, StreamBand};
use crate::io::source::{SceneFile, SceneStream};
use crate::product::{Band, Product};
use crate::types::{GeoCoding, GeoTransform, PixelDataType, SarError, SarResult, TileSize, Window};
use ndarray::Array2;
use num_traits::ToPrimitive;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

const GEO_KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const GEO_KEY_PROJECTED_CS_TYPE: u32 = 3072;

/// Decoded chunks kept per image
const CHUNK_CACHE_CAPACITY: usize = 64;

/// Pure-Rust reader for (Geo)TIFF imagery
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffRasterDecoder;

impl TiffRasterDecoder {
    /// Classic TIFF and BigTIFF, both byte orders
    pub fn is_tiff_header(header: &[u8]) -> bool {
        matches!(
            header,
            [b'I', b'I', 42, 0, ..] | [b'M', b'M', 0, 42, ..] | [b'I', b'I', 43, 0, ..] | [b'M', b'M', 0, 43, ..]
        )
    }

    fn sub_product(file: &SceneFile, image: &Arc<TiffImage>) -> SarResult<Product> {
        let mut product = Product::new(file.stem(), "GeoTIFF", image.width, image.height);
        product.geocoding = image.geocoding.clone();
        product.preferred_tile_size = image.tile_size;

        for b in 0..image.samples {
            let raster = Arc::new(StreamBand::new(image.clone(), b));
            product.add_band(Band::stored(
                format!("band_{}", b + 1),
                image.data_type,
                image.width,
                image.height,
                raster,
            ))?;
        }

        log::debug!(
            "Decoded GeoTIFF sub-product {}: {}x{}, {} band(s), geocoded: {}",
            product.name,
            product.width,
            product.height,
            product.num_bands(),
            product.geocoding.is_some()
        );
        Ok(product)
    }
}

impl RasterDecoder for TiffRasterDecoder {
    fn name(&self) -> &str {
        "GeoTIFF"
    }

    fn can_decode(&self, header: &[u8]) -> bool {
        Self::is_tiff_header(header)
    }

    fn decode_product(&self, file: &SceneFile, stream: SceneStream) -> SarResult<Product> {
        let image = Arc::new(TiffImage::open(file.file_name.clone(), stream)?);
        Self::sub_product(file, &image)
    }

    fn open_stream(&self, name: &str, stream: SceneStream) -> SarResult<Arc<dyn ImageStream>> {
        Ok(Arc::new(TiffImage::open(name.to_string(), stream)?))
    }

    fn open_with_product(
        &self,
        file: &SceneFile,
        stream: SceneStream,
        _reopen: &mut dyn FnMut() -> SarResult<SceneStream>,
    ) -> SarResult<(Arc<dyn ImageStream>, Product)> {
        let image = Arc::new(TiffImage::open(file.file_name.clone(), stream)?);
        let product = Self::sub_product(file, &image)?;
        Ok((image, product))
    }
}

/// One decoded strip or tile, samples interleaved pixel by pixel
#[derive(Debug)]
struct Chunk {
    width: usize,
    height: usize,
    samples: Vec<f64>,
}

#[derive(Default)]
struct ChunkCache {
    chunks: HashMap<u32, Arc<Chunk>>,
    order: VecDeque<u32>,
}

impl ChunkCache {
    fn get(&self, index: u32) -> Option<Arc<Chunk>> {
        self.chunks.get(&index).cloned()
    }

    fn insert(&mut self, index: u32, chunk: Arc<Chunk>) {
        if self.order.len() >= CHUNK_CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.chunks.remove(&oldest);
            }
        }
        self.order.push_back(index);
        self.chunks.insert(index, chunk);
    }
}

/// Opened TIFF decoded chunk by chunk on demand
pub struct TiffImage {
    name: String,
    width: usize,
    height: usize,
    samples: usize,
    data_type: PixelDataType,
    chunk_width: usize,
    chunk_height: usize,
    tile_size: Option<TileSize>,
    geocoding: Option<GeoCoding>,
    decoder: Mutex<Decoder<SceneStream>>,
    cache: Mutex<ChunkCache>,
}

impl std::fmt::Debug for TiffImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiffImage")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples", &self.samples)
            .field("data_type", &self.data_type)
            .field("chunk", &(self.chunk_width, self.chunk_height))
            .finish()
    }
}

impl TiffImage {
    pub fn open(name: String, stream: SceneStream) -> SarResult<Self> {
        let mut decoder = Decoder::new(stream)?;
        let (width, height) = decoder.dimensions()?;

        let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1).max(1) as usize;
        let bits = first_u32(&mut decoder, Tag::BitsPerSample).unwrap_or(8);
        let sample_format = first_u32(&mut decoder, Tag::SampleFormat).unwrap_or(1);
        let data_type = PixelDataType::from_sample_format(sample_format as u16, bits as u16).ok_or_else(|| {
            SarError::InvalidFormat(format!(
                "{}: unsupported sample format {} with {} bits",
                name, sample_format, bits
            ))
        })?;

        let tile_size = match (decoder.get_tag_u32(Tag::TileWidth), decoder.get_tag_u32(Tag::TileLength)) {
            (Ok(w), Ok(h)) => Some(TileSize {
                width: w as usize,
                height: h as usize,
            }),
            _ => None,
        };
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(SarError::InvalidFormat(format!("{}: empty strip or tile layout", name)));
        }
        let geocoding = read_geocoding(&mut decoder);

        log::debug!(
            "Opened TIFF {}: {}x{}, {} sample(s) of {:?}, chunks {}x{}",
            name,
            width,
            height,
            samples,
            data_type,
            chunk_width,
            chunk_height
        );

        Ok(Self {
            name,
            width: width as usize,
            height: height as usize,
            samples,
            data_type,
            chunk_width: chunk_width as usize,
            chunk_height: chunk_height as usize,
            tile_size,
            geocoding,
            decoder: Mutex::new(decoder),
            cache: Mutex::new(ChunkCache::default()),
        })
    }

    pub fn geocoding(&self) -> Option<&GeoCoding> {
        self.geocoding.as_ref()
    }

    pub fn tile_size(&self) -> Option<TileSize> {
        self.tile_size
    }

    fn chunks_across(&self) -> usize {
        (self.width + self.chunk_width - 1) / self.chunk_width
    }

    /// Decoded chunk at (`col`, `row`) of the chunk grid. A failed decode leaves the decoder usable.
    fn chunk(&self, col: usize, row: usize) -> SarResult<Arc<Chunk>> {
        let index = u32::try_from(row * self.chunks_across() + col)
            .map_err(|_| SarError::InvalidFormat(format!("{}: chunk index out of range", self.name)))?;
        if let Some(chunk) = self.lock_cache()?.get(index) {
            return Ok(chunk);
        }

        let width = self.chunk_width.min(self.width - col * self.chunk_width);
        let height = self.chunk_height.min(self.height - row * self.chunk_height);
        let decoded = {
            let mut decoder = self
                .decoder
                .lock()
                .map_err(|_| SarError::Processing(format!("{}: decoder poisoned", self.name)))?;
            decoder.read_chunk(index)?
        };
        let samples = widen(decoded)?;
        if samples.len() < width * height * self.samples {
            return Err(SarError::InvalidFormat(format!(
                "{}: chunk {} holds {} samples, expected {}",
                self.name,
                index,
                samples.len(),
                width * height * self.samples
            )));
        }

        let chunk = Arc::new(Chunk { width, height, samples });
        self.lock_cache()?.insert(index, chunk.clone());
        Ok(chunk)
    }

    fn lock_cache(&self) -> SarResult<std::sync::MutexGuard<'_, ChunkCache>> {
        self.cache
            .lock()
            .map_err(|_| SarError::Processing(format!("{}: chunk cache poisoned", self.name)))
    }
}

impl ImageStream for TiffImage {
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
        self.samples
    }

    fn data_type(&self) -> PixelDataType {
        self.data_type
    }

    fn read_band(&self, band: usize, window: Window) -> SarResult<Array2<f64>> {
        if band >= self.samples {
            return Err(SarError::Processing(format!(
                "{}: band {} out of range ({} bands)",
                self.name, band, self.samples
            )));
        }
        if !window.fits_within(self.width, self.height) {
            return Err(SarError::Processing(format!(
                "Window {:?} outside {}x{} raster {}",
                window, self.width, self.height, self.name
            )));
        }

        let mut out = Array2::zeros((window.height, window.width));
        if window.width == 0 || window.height == 0 {
            return Ok(out);
        }

        let (x_end, y_end) = (window.x + window.width, window.y + window.height);
        for row in window.y / self.chunk_height..=(y_end - 1) / self.chunk_height {
            for col in window.x / self.chunk_width..=(x_end - 1) / self.chunk_width {
                let chunk = self.chunk(col, row)?;
                let (x0, y0) = (col * self.chunk_width, row * self.chunk_height);
                for y in window.y.max(y0)..y_end.min(y0 + chunk.height) {
                    for x in window.x.max(x0)..x_end.min(x0 + chunk.width) {
                        let offset = ((y - y0) * chunk.width + (x - x0)) * self.samples + band;
                        out[[y - window.y, x - window.x]] = chunk.samples[offset];
                    }
                }
            }
        }
        Ok(out)
    }
}

fn first_u32(decoder: &mut Decoder<SceneStream>, tag: Tag) -> Option<u32> {
    decoder.get_tag_u32_vec(tag).ok().and_then(|v| v.first().copied())
}

fn to_f64_vec<T: ToPrimitive>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect()
}

fn widen(result: DecodingResult) -> SarResult<Vec<f64>> {
    #[allow(unreachable_patterns)]
    match result {
        DecodingResult::U8(v) => Ok(to_f64_vec(v)),
        DecodingResult::U16(v) => Ok(to_f64_vec(v)),
        DecodingResult::U32(v) => Ok(to_f64_vec(v)),
        DecodingResult::U64(v) => Ok(to_f64_vec(v)),
        DecodingResult::I8(v) => Ok(to_f64_vec(v)),
        DecodingResult::I16(v) => Ok(to_f64_vec(v)),
        DecodingResult::I32(v) => Ok(to_f64_vec(v)),
        DecodingResult::I64(v) => Ok(to_f64_vec(v)),
        DecodingResult::F32(v) => Ok(to_f64_vec(v)),
        DecodingResult::F64(v) => Ok(v),
        _ => Err(SarError::InvalidFormat("Unsupported TIFF sample type".to_string())),
    }
}

/// Affine transform from ModelTransformation, or ModelPixelScale + a single tie point
fn read_geocoding(decoder: &mut Decoder<SceneStream>) -> Option<GeoCoding> {
    let transform = if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() < 8 {
            return None;
        }
        GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        // tie points without a pixel scale are a GCP grid, not an affine transform
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
        let tie = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
        if scale.len() < 2 || tie.len() < 6 {
            return None;
        }
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        GeoTransform::from_gdal([x - i * scale[0], scale[0], 0.0, y + j * scale[1], 0.0, -scale[1]])
    };

    Some(GeoCoding {
        transform,
        crs: read_epsg(decoder),
    })
}

fn read_epsg(decoder: &mut Decoder<SceneStream>) -> Option<String> {
    let keys = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).ok()?;
    // header: version, revision, minor, key count; then (id, location, count, value)
    let entries = keys.get(4..)?;
    let lookup = |wanted: u32| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
    };
    lookup(GEO_KEY_PROJECTED_CS_TYPE)
        .or_else(|| lookup(GEO_KEY_GEOGRAPHIC_TYPE))
        .filter(|code| *code != 0 && *code != 32767)
        .map(|code| format!("EPSG:{}", code))
}
