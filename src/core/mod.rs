//! Scene normalization: channels, bands, metadata and geometry

pub mod bands;
pub mod geometry;
pub mod metadata;
pub mod polarization;

// Re-export main types
pub use bands::{propagate_geocoding, BandSynthesizer, DecodedSubProduct};
pub use geometry::{incidence_angle_grid, slant_range_time_grid, GeometryParams};
pub use metadata::{CoefficientSegment, HeaderSummary, MetadataNormalizer, OrbitVector};
pub use polarization::PolarizationResolver;
