//! RISAT-1 product reader: one ingestion pass from a delivery to a normalized product

use crate::config::ReaderConfig;
use crate::core::{BandSynthesizer, DecodedSubProduct, MetadataNormalizer, PolarizationResolver};
use crate::io::{
    BandMetaParser, DecoderRegistry, LegacyDecoder, ProductSource, RasterDecoder, RasterFileClassifier,
    RasterFileDescriptor, SceneFileLocator,
};
use crate::product::abstracted::{abstracted_metadata_header, original_product_metadata_mut};
use crate::product::{MetadataElement, Product};
use crate::types::{ContainerKind, SarResult};
use std::path::Path;
use std::time::Instant;

/// Reads RISAT-1 deliveries (directory, header file or zip archive)
pub struct Risat1ProductReader {
    config: ReaderConfig,
    decoders: DecoderRegistry,
}

impl Default for Risat1ProductReader {
    fn default() -> Self {
        Self::new(*ReaderConfig::global())
    }
}

impl Risat1ProductReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            decoders: DecoderRegistry::default(),
        }
    }

    /// Replace the decoder registry
    pub fn with_decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = decoders;
        self
    }

    /// Register an additional raster decoder, tried after the existing ones
    pub fn with_raster_decoder(mut self, decoder: Box<dyn RasterDecoder>) -> Self {
        self.decoders = self.decoders.with_raster_decoder(decoder);
        self
    }

    pub fn with_legacy_decoder(mut self, decoder: Box<dyn LegacyDecoder>) -> Self {
        self.decoders = self.decoders.with_legacy_decoder(decoder);
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Ingest a delivery into a single product.
    ///
    /// Any decoder failure aborts the whole read; there is no partial product.
    pub fn read_product<P: AsRef<Path>>(&self, input: P) -> SarResult<Product> {
        let start = Instant::now();
        let mut source = ProductSource::open(input)?;
        log::info!("Reading RISAT-1 product from {}", source.description());

        let mut metadata = MetadataElement::new("metadata");
        metadata.add_element(abstracted_metadata_header());
        let header = BandMetaParser::parse(&source.read_header()?);
        original_product_metadata_mut(&mut metadata).add_element(header);
        let summary = MetadataNormalizer::new(self.config).normalize(&mut metadata);

        let mut sub_products = Vec::new();
        let mut streams = Vec::new();
        for file in SceneFileLocator::locate(&mut source)? {
            match RasterFileClassifier::ingest(&mut source, &self.decoders, &file)? {
                Some(RasterFileDescriptor::GeoRaster {
                    name,
                    stream,
                    sub_product,
                }) => {
                    log::info!(
                        "Opened {} ({}x{}, {} band(s))",
                        name,
                        stream.width(),
                        stream.height(),
                        stream.num_bands()
                    );
                    if let Some(product) = sub_product {
                        sub_products.push(DecodedSubProduct::new(product, ContainerKind::GeoRaster));
                    }
                    streams.push(stream);
                }
                Some(RasterFileDescriptor::LegacyBinary { name, sub_product }) => {
                    log::info!("Decoded legacy volume {} as {}", name, sub_product.name);
                    sub_products.push(DecodedSubProduct::new(sub_product, ContainerKind::LegacyBinary));
                }
                None => {}
            }
        }

        let (width, height) = BandSynthesizer::composite_dimensions(&sub_products, &streams, &metadata)?;
        let mut product = Product::new(summary.product_name, summary.product_type, width, height);
        product.metadata = metadata;

        let mut resolver = PolarizationResolver::new();
        BandSynthesizer::new(summary.mode, &mut resolver).synthesize(&mut product, &sub_products, &streams)?;

        log::info!(
            "Read {} ({}x{}, {} band(s)) in {:?}",
            product.name,
            product.width,
            product.height,
            product.num_bands(),
            start.elapsed()
        );
        Ok(product)
    }
}
