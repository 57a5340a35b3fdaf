//! Canonical (vendor-neutral) SAR metadata schema
//!
//! Every reader in the family fills the same `Abstracted_Metadata` element. Keys are
//! created up-front with sentinel defaults so a missing vendor field never leaves a
//! hole in the schema.

use super::metadata::{AttributeValue, MetadataAttribute, MetadataElement};
use chrono::{DateTime, TimeZone, Utc};

pub const ABSTRACTED_METADATA: &str = "Abstracted_Metadata";
pub const ORIGINAL_PRODUCT_METADATA: &str = "Original_Product_Metadata";

pub const NO_METADATA: i64 = 99999;
pub const NO_METADATA_STRING: &str = " ";

/// Sentinel timestamp (MJD 2000 epoch)
pub fn no_metadata_utc() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub const PRODUCT: &str = "PRODUCT";
pub const PRODUCT_TYPE: &str = "PRODUCT_TYPE";
pub const SPH_DESCRIPTOR: &str = "SPH_DESCRIPTOR";
pub const MISSION: &str = "MISSION";
pub const ACQUISITION_MODE: &str = "ACQUISITION_MODE";
pub const ANTENNA_POINTING: &str = "antenna_pointing";
pub const BEAMS: &str = "BEAMS";
pub const PASS: &str = "PASS";
pub const SAMPLE_TYPE: &str = "SAMPLE_TYPE";
pub const PROC_TIME: &str = "PROC_TIME";
pub const PROCESSING_SYSTEM_IDENTIFIER: &str = "Processing_system_identifier";
pub const ABS_ORBIT: &str = "ABS_ORBIT";
pub const FIRST_LINE_TIME: &str = "first_line_time";
pub const LAST_LINE_TIME: &str = "last_line_time";
pub const STATE_VECTOR_TIME: &str = "STATE_VECTOR_TIME";
pub const RADAR_FREQUENCY: &str = "radar_frequency";
pub const RANGE_LOOKS: &str = "range_looks";
pub const AZIMUTH_LOOKS: &str = "azimuth_looks";
pub const NUM_OUTPUT_LINES: &str = "num_output_lines";
pub const NUM_SAMPLES_PER_LINE: &str = "num_samples_per_line";
pub const RANGE_SPACING: &str = "range_spacing";
pub const AZIMUTH_SPACING: &str = "azimuth_spacing";
pub const LINE_TIME_INTERVAL: &str = "line_time_interval";
pub const SLANT_RANGE_TO_FIRST_PIXEL: &str = "slant_range_to_first_pixel";
pub const ANT_ELEV_CORR_FLAG: &str = "ant_elev_corr_flag";
pub const RANGE_SPREAD_COMP_FLAG: &str = "range_spread_comp_flag";
pub const SRGR_FLAG: &str = "srgr_flag";
pub const POLSAR_DATA: &str = "polsarData";
pub const COMPACT_MODE: &str = "compact_mode";
pub const POLAR_TAGS: [&str; 4] = [
    "mds1_tx_rx_polar",
    "mds2_tx_rx_polar",
    "mds3_tx_rx_polar",
    "mds4_tx_rx_polar",
];

pub const ORBIT_STATE_VECTORS: &str = "Orbit_State_Vectors";
pub const ORBIT_VECTOR: &str = "orbit_vector";
pub const ORBIT_VECTOR_TIME: &str = "time";
pub const ORBIT_VECTOR_X_POS: &str = "x_pos";
pub const ORBIT_VECTOR_Y_POS: &str = "y_pos";
pub const ORBIT_VECTOR_Z_POS: &str = "z_pos";
pub const ORBIT_VECTOR_X_VEL: &str = "x_vel";
pub const ORBIT_VECTOR_Y_VEL: &str = "y_vel";
pub const ORBIT_VECTOR_Z_VEL: &str = "z_vel";

pub const SRGR_COEFFICIENTS: &str = "SRGR_Coefficients";
pub const SRGR_COEF_LIST: &str = "srgr_coef_list";
pub const SRGR_COEF_TIME: &str = "zero_doppler_time";
pub const GROUND_RANGE_ORIGIN: &str = "ground_range_origin";
pub const SRGR_COEF: &str = "srgr_coef";

pub const DOP_COEFFICIENTS: &str = "Doppler_Centroid_Coefficients";
pub const DOP_COEF_LIST: &str = "dop_coef_list";
pub const DOP_COEF_TIME: &str = "zero_doppler_time";
pub const SLANT_RANGE_TIME: &str = "slant_range_time";
pub const DOP_COEF: &str = "dop_coef";

pub const COEFFICIENT: &str = "coefficient";

enum Kind {
    Str,
    Int,
    Double,
    Utc,
}

/// (key, kind, unit, description)
const SCHEMA: &[(&str, Kind, &str, &str)] = &[
    (PRODUCT, Kind::Str, "", "Product name"),
    (PRODUCT_TYPE, Kind::Str, "", "Product type"),
    (SPH_DESCRIPTOR, Kind::Str, "", "Description"),
    (MISSION, Kind::Str, "", "Satellite mission"),
    (ACQUISITION_MODE, Kind::Str, "", "Acquisition mode"),
    (ANTENNA_POINTING, Kind::Str, "", "Right or left facing"),
    (BEAMS, Kind::Str, "", "Beams used"),
    (PASS, Kind::Str, "", "ASCENDING or DESCENDING"),
    (SAMPLE_TYPE, Kind::Str, "", "DETECTED or COMPLEX"),
    (PROC_TIME, Kind::Utc, "utc", "Processed time"),
    (PROCESSING_SYSTEM_IDENTIFIER, Kind::Str, "", "Processing system identifier"),
    (ABS_ORBIT, Kind::Int, "", "Absolute orbit"),
    (FIRST_LINE_TIME, Kind::Utc, "utc", "First zero doppler azimuth time"),
    (LAST_LINE_TIME, Kind::Utc, "utc", "Last zero doppler azimuth time"),
    (STATE_VECTOR_TIME, Kind::Utc, "utc", "Time of orbit state vector"),
    (POLAR_TAGS[0], Kind::Str, "", "Polarization"),
    (POLAR_TAGS[1], Kind::Str, "", "Polarization"),
    (POLAR_TAGS[2], Kind::Str, "", "Polarization"),
    (POLAR_TAGS[3], Kind::Str, "", "Polarization"),
    (POLSAR_DATA, Kind::Int, "flag", "Polarimetric matrix"),
    (COMPACT_MODE, Kind::Str, "", "Compact polarimetric mode"),
    (RADAR_FREQUENCY, Kind::Double, "MHz", "Radar frequency"),
    (RANGE_LOOKS, Kind::Double, "", "Range looks"),
    (AZIMUTH_LOOKS, Kind::Double, "", "Azimuth looks"),
    (RANGE_SPACING, Kind::Double, "m", "Range sample spacing"),
    (AZIMUTH_SPACING, Kind::Double, "m", "Azimuth sample spacing"),
    (LINE_TIME_INTERVAL, Kind::Double, "s", "Line time interval"),
    (NUM_OUTPUT_LINES, Kind::Int, "lines", "Raster height"),
    (NUM_SAMPLES_PER_LINE, Kind::Int, "samples", "Raster width"),
    (SLANT_RANGE_TO_FIRST_PIXEL, Kind::Double, "m", "Slant range to 1st data sample"),
    (ANT_ELEV_CORR_FLAG, Kind::Int, "flag", "Antenna elevation applied"),
    (RANGE_SPREAD_COMP_FLAG, Kind::Int, "flag", "Range spread compensation applied"),
    (SRGR_FLAG, Kind::Int, "flag", "SRGR applied"),
];

/// Create the abstracted element with every key at its default
pub fn abstracted_metadata_header() -> MetadataElement {
    let mut abs = MetadataElement::new(ABSTRACTED_METADATA);
    for (key, kind, unit, description) in SCHEMA {
        let value = match kind {
            Kind::Str => AttributeValue::String(NO_METADATA_STRING.to_string()),
            Kind::Int => AttributeValue::Int(NO_METADATA),
            Kind::Double => AttributeValue::Double(NO_METADATA as f64),
            Kind::Utc => AttributeValue::Utc(no_metadata_utc()),
        };
        abs.add_attribute(MetadataAttribute::new(*key, value).with_unit(unit, description));
    }
    abs.add_element(MetadataElement::new(ORBIT_STATE_VECTORS));
    abs.add_element(MetadataElement::new(SRGR_COEFFICIENTS));
    abs.add_element(MetadataElement::new(DOP_COEFFICIENTS));
    abs
}

/// True when a double/int attribute still holds the sentinel
pub fn is_no_metadata(value: f64) -> bool {
    value == NO_METADATA as f64
}

/// Abstracted element of a product metadata root
pub fn abstracted(root: &MetadataElement) -> Option<&MetadataElement> {
    root.element(ABSTRACTED_METADATA)
}

pub fn abstracted_mut(root: &mut MetadataElement) -> &mut MetadataElement {
    if root.element(ABSTRACTED_METADATA).is_none() {
        root.add_element(abstracted_metadata_header());
    }
    root.element_or_insert(ABSTRACTED_METADATA)
}

pub fn original_product_metadata(root: &MetadataElement) -> Option<&MetadataElement> {
    root.element(ORIGINAL_PRODUCT_METADATA)
}

pub fn original_product_metadata_mut(root: &mut MetadataElement) -> &mut MetadataElement {
    root.element_or_insert(ORIGINAL_PRODUCT_METADATA)
}
