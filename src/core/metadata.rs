//! Vendor metadata normalization into the abstracted schema
//!
//! The vendor header is a flat record; every field is read with a default so a missing or
//! malformed value never aborts ingestion. Orbit, SRGR and Doppler record builders are kept
//! for deliveries that carry those elements; the header-only path does not call them.

use crate::config::ReaderConfig;
use crate::io::band_meta::PRODUCT_METADATA;
use crate::product::abstracted::{self as am, no_metadata_utc, NO_METADATA, NO_METADATA_STRING};
use crate::product::{MetadataAttribute, MetadataElement};
use crate::types::AcquisitionMode;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Mission name used in product identifiers
pub const MISSION: &str = "RISAT1";

/// Radar carrier frequency in MHz. Not delivered in the header.
pub const RADAR_FREQUENCY_MHZ: f64 = 5350.0;

/// Vendor timestamp layout, e.g. `01-JAN-2019 10:20:30.123456`
pub const VENDOR_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S%.f";

/// Date layout embedded in product identifiers, e.g. `01-Jan-2019_10.20`
pub const PRODUCT_ID_DATE_FORMAT: &str = "%d-%b-%Y_%H.%M";

/// Outcome of normalizing one vendor header
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSummary {
    pub product_name: String,
    pub product_type: String,
    pub mode: AcquisitionMode,
}

/// Parse a vendor timestamp. Input is upper-cased and trimmed first.
pub fn parse_vendor_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().to_uppercase();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(&value, VENDOR_TIME_FORMAT)
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}

/// Timestamp attribute of a vendor element, `NO_METADATA_UTC` when absent or unparseable
pub fn vendor_time(elem: &MetadataElement, tag: &str) -> DateTime<Utc> {
    let raw = elem.attribute_string(tag, NO_METADATA_STRING);
    match parse_vendor_time(&raw) {
        Some(t) => t,
        None => {
            if !raw.trim().is_empty() {
                log::warn!("Unparseable {} '{}', using no-metadata time", tag, raw);
            }
            no_metadata_utc()
        }
    }
}

/// `FALSE`/`0` → 0, `TRUE`/`1` → 1, anything else → -1
pub fn parse_flag(value: &str) -> i64 {
    match value.to_uppercase().as_str() {
        "FALSE" | "0" => 0,
        "TRUE" | "1" => 1,
        _ => -1,
    }
}

/// Human readable product identifier
pub fn product_identifier(
    product_type: &str,
    beam_mode: &str,
    pass: &str,
    start: DateTime<Utc>,
    product_id: &str,
) -> String {
    let pass_str = if pass == "ASCENDING" { "ASC" } else { "DSC" };
    format!(
        "{}-{}-{}-{}-{}-{}",
        MISSION,
        product_type,
        beam_mode,
        pass_str,
        start.format(PRODUCT_ID_DATE_FORMAT),
        product_id
    )
}

/// Maps the vendor `ProductMetadata` record into `Abstracted_Metadata`
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataNormalizer {
    config: ReaderConfig,
}

impl MetadataNormalizer {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Normalize `Original_Product_Metadata/ProductMetadata` of `root` into its abstracted element
    pub fn normalize(&self, root: &mut MetadataElement) -> HeaderSummary {
        let vendor = am::original_product_metadata(root)
            .and_then(|orig| orig.element(PRODUCT_METADATA))
            .cloned()
            .unwrap_or_else(|| {
                log::warn!("No {} element, abstracted metadata stays at defaults", PRODUCT_METADATA);
                MetadataElement::new(PRODUCT_METADATA)
            });
        let abs = am::abstracted_mut(root);
        self.normalize_into(&vendor, abs)
    }

    /// Write every abstracted attribute derivable from the flat vendor record
    pub fn normalize_into(&self, vendor: &MetadataElement, abs: &mut MetadataElement) -> HeaderSummary {
        let def = NO_METADATA_STRING;
        let product_type = vendor.attribute_string("ProductType", def);

        abs.set_value(am::SPH_DESCRIPTOR, product_type.as_str());
        abs.set_value(am::ACQUISITION_MODE, vendor.attribute_string("ImagingMode", def));
        abs.set_value(
            am::ANTENNA_POINTING,
            vendor.attribute_string("SensorOrientation", def).to_lowercase(),
        );
        abs.set_value(am::BEAMS, vendor.attribute_string("NumberOfBeams", def));

        let pass = vendor.attribute_string("Node", def).to_uppercase();
        abs.set_value(am::PASS, pass.as_str());
        abs.set_value(
            am::ABS_ORBIT,
            vendor.attribute_double("ImagingOrbitNo", NO_METADATA as f64) as i64,
        );

        let mode = AcquisitionMode::from_product_type(&product_type);
        abs.set_value(am::SAMPLE_TYPE, mode.sample_type());

        let (start, stop) = if self.config.flip_to_sar_geometry && pass == "ASCENDING" {
            (vendor_time(vendor, "SceneEndTime"), vendor_time(vendor, "SceneStartTime"))
        } else {
            (vendor_time(vendor, "SceneStartTime"), vendor_time(vendor, "SceneEndTime"))
        };

        let product_name = product_identifier(
            &product_type,
            &vendor.attribute_string("beamModeMnemonic", def),
            &pass,
            start,
            &vendor.attribute_string("productId", def),
        );

        abs.set_value(am::PRODUCT_TYPE, product_type.as_str());
        abs.set_value(am::RADAR_FREQUENCY, RADAR_FREQUENCY_MHZ);
        abs.set_value(am::PRODUCT, product_name.as_str());
        abs.set_value(am::MISSION, MISSION);
        abs.set_value(
            am::PROCESSING_SYSTEM_IDENTIFIER,
            format!(
                "{}-{}",
                vendor.attribute_string("processingFacility", def),
                vendor.attribute_string("softwareVersion", def)
            ),
        );
        abs.set_value(am::PROC_TIME, vendor_time(vendor, "processingTime"));

        abs.set_value(
            am::ANT_ELEV_CORR_FLAG,
            parse_flag(&vendor.attribute_string("elevationPatternCorrection", def)),
        );
        abs.set_value(
            am::RANGE_SPREAD_COMP_FLAG,
            parse_flag(&vendor.attribute_string("rangeSpreadingLossCorrection", def)),
        );
        abs.set_value(am::SRGR_FLAG, if mode.is_complex() { 0 } else { 1 });

        abs.set_value(am::FIRST_LINE_TIME, start);
        abs.set_value(am::LAST_LINE_TIME, stop);

        abs.set_value(am::RANGE_LOOKS, vendor.attribute_double("RangeLooks", NO_METADATA as f64));
        abs.set_value(am::AZIMUTH_LOOKS, vendor.attribute_double("AzimuthLooks", NO_METADATA as f64));

        let lines = vendor.attribute_int("NoScans", NO_METADATA);
        abs.set_value(am::NUM_OUTPUT_LINES, lines);
        abs.set_value(am::NUM_SAMPLES_PER_LINE, vendor.attribute_int("NoPixels", NO_METADATA));
        if let Some(interval) = line_time_interval(start, stop, lines) {
            abs.set_value(am::LINE_TIME_INTERVAL, interval);
        }

        abs.set_value(
            am::RANGE_SPACING,
            vendor.attribute_double("OutputPixelSpacing", NO_METADATA as f64),
        );
        abs.set_value(
            am::AZIMUTH_SPACING,
            vendor.attribute_double("OutputLineSpacing", NO_METADATA as f64),
        );

        set_polarizations(vendor, abs);

        log::info!("Normalized vendor header: {} ({})", product_name, mode.sample_type());
        HeaderSummary {
            product_name,
            product_type,
            mode,
        }
    }
}

/// Seconds between lines, when both times and the line count are known
fn line_time_interval(start: DateTime<Utc>, stop: DateTime<Utc>, lines: i64) -> Option<f64> {
    let sentinel = no_metadata_utc();
    if start == sentinel || stop == sentinel || lines <= 1 || lines == NO_METADATA {
        return None;
    }
    let span = (stop - start).num_microseconds()? as f64 / 1e6;
    Some(span / (lines - 1) as f64)
}

/// `TxRxPol1`, `TxRxPol2` into the first free polarization slots
fn set_polarizations(vendor: &MetadataElement, abs: &mut MetadataElement) {
    let mut slot = 0;
    for tag in ["TxRxPol1", "TxRxPol2"] {
        if let Some(pol) = vendor.attribute_string_opt(tag) {
            abs.set_value(am::POLAR_TAGS[slot], pol.to_uppercase());
            slot += 1;
        }
    }
}

/// Orbit state vector
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitVector {
    pub time: DateTime<Utc>,
    pub x_pos: f64,
    pub y_pos: f64,
    pub z_pos: f64,
    pub x_vel: f64,
    pub y_vel: f64,
    pub z_vel: f64,
}

/// Time-tagged polynomial: SRGR (origin = ground range origin, m) or
/// Doppler centroid (origin = reference slant range time, ns)
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSegment {
    pub time: DateTime<Utc>,
    pub origin: f64,
    pub coefficients: Vec<f64>,
}

/// Value stored either as a child element of the same name or as a plain attribute
fn nested_double(elem: &MetadataElement, name: &str) -> f64 {
    match elem.element(name) {
        Some(child) => child.attribute_double(name, 0.0),
        None => elem.attribute_double(name, 0.0),
    }
}

fn parse_coefficients(elem: &MetadataElement, tag: &str) -> Vec<f64> {
    let raw = elem.attribute_string(tag, "");
    raw.split_whitespace()
        .filter_map(|token| match token.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Skipping unparseable {} token '{}' in {}", tag, token, elem.name());
                None
            }
        })
        .collect()
}

/// One vector per child element of the vendor orbit record, in order
pub fn orbit_vectors_from(orbit_information: &MetadataElement) -> Vec<OrbitVector> {
    orbit_information
        .elements()
        .iter()
        .map(|sv| OrbitVector {
            time: vendor_time(sv, "timeStamp"),
            x_pos: nested_double(sv, "xPosition"),
            y_pos: nested_double(sv, "yPosition"),
            z_pos: nested_double(sv, "zPosition"),
            x_vel: nested_double(sv, "xVelocity"),
            y_vel: nested_double(sv, "yVelocity"),
            z_vel: nested_double(sv, "zVelocity"),
        })
        .collect()
}

/// `slantRangeToGroundRange` elements, in delivery order
pub fn srgr_segments_from(image_generation_parameters: &MetadataElement) -> Vec<CoefficientSegment> {
    image_generation_parameters
        .elements()
        .iter()
        .filter(|e| e.name().eq_ignore_ascii_case("slantRangeToGroundRange"))
        .map(|e| CoefficientSegment {
            time: vendor_time(e, "zeroDopplerAzimuthTime"),
            origin: nested_double(e, "groundRangeOrigin"),
            coefficients: parse_coefficients(e, "groundToSlantRangeCoefficients"),
        })
        .collect()
}

/// `dopplerCentroid` elements, reference time converted to ns
pub fn doppler_segments_from(image_generation_parameters: &MetadataElement) -> Vec<CoefficientSegment> {
    image_generation_parameters
        .elements()
        .iter()
        .filter(|e| e.name().eq_ignore_ascii_case("dopplerCentroid"))
        .map(|e| CoefficientSegment {
            time: vendor_time(e, "timeOfDopplerCentroidEstimate"),
            origin: nested_double(e, "dopplerCentroidReferenceTime") * 1e9,
            coefficients: parse_coefficients(e, "dopplerCentroidCoefficients"),
        })
        .collect()
}

/// Write `orbit_vector<N>` elements and fill `STATE_VECTOR_TIME` if still unset
pub fn add_orbit_state_vectors(abs: &mut MetadataElement, vectors: &[OrbitVector]) {
    let list = abs.element_or_insert(am::ORBIT_STATE_VECTORS);
    for (i, v) in vectors.iter().enumerate() {
        let mut elem = MetadataElement::new(format!("{}{}", am::ORBIT_VECTOR, i + 1));
        elem.set_value(am::ORBIT_VECTOR_TIME, v.time);
        elem.set_value(am::ORBIT_VECTOR_X_POS, v.x_pos);
        elem.set_value(am::ORBIT_VECTOR_Y_POS, v.y_pos);
        elem.set_value(am::ORBIT_VECTOR_Z_POS, v.z_pos);
        elem.set_value(am::ORBIT_VECTOR_X_VEL, v.x_vel);
        elem.set_value(am::ORBIT_VECTOR_Y_VEL, v.y_vel);
        elem.set_value(am::ORBIT_VECTOR_Z_VEL, v.z_vel);
        list.add_element(elem);
    }

    if let Some(first) = vectors.first() {
        if abs.attribute_utc(am::STATE_VECTOR_TIME, no_metadata_utc()) == no_metadata_utc() {
            abs.set_value(am::STATE_VECTOR_TIME, first.time);
        }
    }
}

/// Write `srgr_coef_list.<N>` elements
pub fn add_srgr_coefficients(abs: &mut MetadataElement, segments: &[CoefficientSegment]) {
    let parent = abs.element_or_insert(am::SRGR_COEFFICIENTS);
    for (i, seg) in segments.iter().enumerate() {
        let mut list = MetadataElement::new(format!("{}.{}", am::SRGR_COEF_LIST, i + 1));
        list.set_value(am::SRGR_COEF_TIME, seg.time);
        list.add_attribute(
            MetadataAttribute::new(am::GROUND_RANGE_ORIGIN, seg.origin).with_unit("m", "Ground Range Origin"),
        );
        for (j, c) in seg.coefficients.iter().enumerate() {
            let mut coef = MetadataElement::new(format!("{}.{}", am::COEFFICIENT, j + 1));
            coef.add_attribute(MetadataAttribute::new(am::SRGR_COEF, *c).with_unit("", "SRGR Coefficient"));
            list.add_element(coef);
        }
        parent.add_element(list);
    }
}

/// Write `dop_coef_list.<N>` elements
pub fn add_doppler_coefficients(abs: &mut MetadataElement, segments: &[CoefficientSegment]) {
    let parent = abs.element_or_insert(am::DOP_COEFFICIENTS);
    for (i, seg) in segments.iter().enumerate() {
        let mut list = MetadataElement::new(format!("{}.{}", am::DOP_COEF_LIST, i + 1));
        list.set_value(am::DOP_COEF_TIME, seg.time);
        list.add_attribute(
            MetadataAttribute::new(am::SLANT_RANGE_TIME, seg.origin).with_unit("ns", "Slant Range Time"),
        );
        for (j, c) in seg.coefficients.iter().enumerate() {
            let mut coef = MetadataElement::new(format!("{}.{}", am::COEFFICIENT, j + 1));
            coef.add_attribute(
                MetadataAttribute::new(am::DOP_COEF, *c).with_unit("", "Doppler Centroid Coefficient"),
            );
            list.add_element(coef);
        }
        parent.add_element(list);
    }
}
