//! Band synthesis for the composite product
//!
//! Two band-producing paths exist. Decoded sub-products (legacy volumes, or GeoTIFFs read
//! without streaming handles) contribute copies of their bands; streaming handles contribute
//! bands read straight from the imagery. When any streaming handle exists the streaming path
//! alone produces bands and the sub-products only serve geocoding and metadata.

use crate::core::polarization::PolarizationResolver;
use crate::io::decoder::{ImageStream, StreamBand};
use crate::product::abstracted::{self, COMPACT_MODE, NUM_OUTPUT_LINES, NUM_SAMPLES_PER_LINE, POLSAR_DATA};
use crate::product::{Band, MetadataElement, Product, VirtualIntensity};
use crate::types::{AcquisitionMode, BandRole, ContainerKind, PixelDataType, Polarization, SarError, SarResult};
use std::sync::Arc;

/// Fixed description written when compact-pol channels are present
pub const COMPACT_MODE_DESCRIPTION: &str = "Right Circular Hybrid Mode";

/// A sub-product decoded from one physical file
#[derive(Debug)]
pub struct DecodedSubProduct {
    pub product: Product,
    pub kind: ContainerKind,
}

impl DecodedSubProduct {
    pub fn new(product: Product, kind: ContainerKind) -> Self {
        Self { product, kind }
    }
}

/// Name of the derived intensity band for a channel
pub fn intensity_band_name(pol: Polarization) -> String {
    format!("Intensity_{}", pol.band_suffix())
}

/// Builds the band set of the composite product
pub struct BandSynthesizer<'a> {
    mode: AcquisitionMode,
    resolver: &'a mut PolarizationResolver,
}

impl<'a> BandSynthesizer<'a> {
    pub fn new(mode: AcquisitionMode, resolver: &'a mut PolarizationResolver) -> Self {
        Self { mode, resolver }
    }

    /// Composite raster size: first sub-product, then the vendor line/pixel counts,
    /// then the first streaming handle.
    pub fn composite_dimensions(
        sub_products: &[DecodedSubProduct],
        streams: &[Arc<dyn ImageStream>],
        metadata: &MetadataElement,
    ) -> SarResult<(usize, usize)> {
        if let Some(first) = sub_products.first() {
            return Ok((first.product.width, first.product.height));
        }

        if let Some(abs) = abstracted::abstracted(metadata) {
            let width = abs.attribute_int(NUM_SAMPLES_PER_LINE, abstracted::NO_METADATA);
            let height = abs.attribute_int(NUM_OUTPUT_LINES, abstracted::NO_METADATA);
            let valid = |v: i64| v > 0 && v != abstracted::NO_METADATA;
            if valid(width) && valid(height) {
                return Ok((width as usize, height as usize));
            }
        }

        if let Some(stream) = streams.first() {
            log::debug!("Raster size taken from {}", stream.name());
            return Ok((stream.width(), stream.height()));
        }

        Err(SarError::InvalidFormat(
            "No imagery found and no raster size in the vendor metadata".to_string(),
        ))
    }

    /// Add all bands to `product` and finish the compact-pol attributes
    pub fn synthesize(
        &mut self,
        product: &mut Product,
        sub_products: &[DecodedSubProduct],
        streams: &[Arc<dyn ImageStream>],
    ) -> SarResult<()> {
        if !sub_products.is_empty() {
            if streams.is_empty() {
                for sub in sub_products {
                    self.add_sub_product_bands(product, &sub.product)?;
                }
            } else {
                log::debug!(
                    "{} streaming handle(s) present; sub-products used for geocoding and metadata only",
                    streams.len()
                );
            }
            self.attach_legacy_metadata(product, sub_products);
            propagate_geocoding(product, sub_products);
        }

        for stream in streams {
            self.add_stream_bands(product, stream)?;
        }

        if self.resolver.compact_pol_mode() {
            let abs = abstracted::abstracted_mut(&mut product.metadata);
            abs.set_value(POLSAR_DATA, 1);
            abs.set_value(COMPACT_MODE, COMPACT_MODE_DESCRIPTION);
        }

        log::info!("Synthesized {} band(s) for {}", product.num_bands(), product.name);
        Ok(())
    }

    fn add_sub_product_bands(&mut self, product: &mut Product, sub: &Product) -> SarResult<()> {
        let pol = match self.resolver.resolve(&sub.name) {
            Some(pol) => pol,
            None => {
                log::debug!("No channel in sub-product name '{}', skipped", sub.name);
                return Ok(());
            }
        };
        let suffix = pol.band_suffix();

        if self.mode.is_complex() {
            let (i_band, q_band) = match (sub.band_at(0), sub.band_at(1)) {
                (Some(i), Some(q)) => (i, q),
                _ => {
                    return Err(SarError::InvalidFormat(format!(
                        "Complex sub-product '{}' has {} band(s), expected real and imaginary",
                        sub.name,
                        sub.num_bands()
                    )))
                }
            };
            let real = i_band
                .copy_as(format!("{}_{}", i_band.name, suffix))
                .with_role(BandRole::Real);
            let imaginary = q_band
                .copy_as(format!("{}_{}", q_band.name, suffix))
                .with_role(BandRole::Imaginary);
            let expression = VirtualIntensity::FromComplex {
                real: real.name.clone(),
                imaginary: imaginary.name.clone(),
            };
            product.add_band(real)?;
            product.add_band(imaginary)?;
            self.add_intensity(product, pol, expression)
        } else {
            let source = sub.band_at(0).ok_or_else(|| {
                SarError::InvalidFormat(format!("Detected sub-product '{}' has no bands", sub.name))
            })?;
            let amplitude = source
                .copy_as(format!("Amplitude_{}", suffix))
                .with_role(BandRole::Amplitude);
            let expression = VirtualIntensity::FromAmplitude {
                amplitude: amplitude.name.clone(),
            };
            product.add_band(amplitude)?;
            self.add_intensity(product, pol, expression)
        }
    }

    fn add_stream_bands(&mut self, product: &mut Product, stream: &Arc<dyn ImageStream>) -> SarResult<()> {
        let pol = match self.resolver.resolve(stream.name()) {
            Some(pol) => pol,
            None => {
                log::debug!("No channel in image name '{}', skipped", stream.name());
                return Ok(());
            }
        };
        let suffix = pol.band_suffix();
        let (width, height) = (product.width, product.height);

        if self.mode.is_complex() {
            let mut last_real: Option<String> = None;
            for b in 0..stream.num_bands() {
                let raster = Arc::new(StreamBand::new(stream.clone(), b));
                if b % 2 == 0 {
                    let band = Band::stored(format!("i_{}", suffix), PixelDataType::Int32, width, height, raster)
                        .with_role(BandRole::Real);
                    last_real = Some(band.name.clone());
                    product.add_band(band)?;
                } else {
                    let band = Band::stored(format!("q_{}", suffix), PixelDataType::Int32, width, height, raster)
                        .with_role(BandRole::Imaginary);
                    let imaginary = band.name.clone();
                    product.add_band(band)?;
                    if let Some(real) = last_real.take() {
                        self.add_intensity(product, pol, VirtualIntensity::FromComplex { real, imaginary })?;
                    }
                }
            }
            if last_real.is_some() {
                log::warn!(
                    "{}: odd number of bands ({}), last real band has no imaginary partner",
                    stream.name(),
                    stream.num_bands()
                );
            }
        } else {
            for b in 0..stream.num_bands() {
                let raster = Arc::new(StreamBand::new(stream.clone(), b));
                let band = Band::stored(format!("Amplitude_{}", suffix), PixelDataType::UInt32, width, height, raster)
                    .with_role(BandRole::Amplitude);
                let amplitude = band.name.clone();
                product.add_band(band)?;
                self.add_intensity(product, pol, VirtualIntensity::FromAmplitude { amplitude })?;
            }
        }
        Ok(())
    }

    fn add_intensity(&self, product: &mut Product, pol: Polarization, expression: VirtualIntensity) -> SarResult<()> {
        let band = Band::virtual_intensity(intensity_band_name(pol), product.width, product.height, expression);
        product.add_band(band)
    }

    /// Nest each legacy sub-product's raw metadata under `<channel>_Metadata`
    fn attach_legacy_metadata(&mut self, product: &mut Product, sub_products: &[DecodedSubProduct]) {
        for sub in sub_products.iter().filter(|s| s.kind == ContainerKind::LegacyBinary) {
            let pol = match self.resolver.resolve(&sub.product.name) {
                Some(pol) => pol,
                None => {
                    log::warn!("No channel for legacy sub-product '{}', metadata not attached", sub.product.name);
                    continue;
                }
            };
            let mut elem = abstracted::original_product_metadata(&sub.product.metadata)
                .cloned()
                .unwrap_or_else(|| MetadataElement::new(abstracted::ORIGINAL_PRODUCT_METADATA));
            elem.set_name(format!("{}_Metadata", pol.band_suffix()));
            abstracted::original_product_metadata_mut(&mut product.metadata).add_element(elem);
        }
    }
}

/// Transfer geolocation from the first sub-product that carries it and matches the
/// composite size. Does nothing when the composite already has geolocation.
pub fn propagate_geocoding(product: &mut Product, sub_products: &[DecodedSubProduct]) -> bool {
    if product.geocoding.is_some() {
        return false;
    }
    let candidate = sub_products.iter().map(|s| &s.product).find(|sub| {
        sub.geocoding.is_some() && sub.width == product.width && sub.height == product.height
    });
    match candidate {
        Some(sub) => {
            log::debug!("Geocoding transferred from {}", sub.name);
            sub.transfer_geocoding_to(product)
        }
        None => false,
    }
}
