//! Tie-point geometry grids: incidence angle and slant range time
//!
//! Not part of ingestion. Callers that know the scene centre latitude and the near range
//! incidence angle can build the grids and attach them with `Product::add_tie_point_grid`.

use crate::config::ReaderConfig;
use crate::core::metadata::CoefficientSegment;
use crate::product::abstracted as am;
use crate::product::{MetadataElement, TiePointGrid};
use crate::types::{SarError, SarResult};
use chrono::{DateTime, Utc};

pub const GRID_WIDTH: usize = 11;
pub const GRID_HEIGHT: usize = 11;

/// WGS84 equatorial radius (m)
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 polar radius (m)
pub const WGS84_SEMI_MINOR_AXIS: f64 = 6_356_752.314_245;

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
pub const HALF_LIGHT_SPEED: f64 = SPEED_OF_LIGHT / 2.0;

pub const INCIDENCE_ANGLE_GRID: &str = "incident_angle";
pub const SLANT_RANGE_TIME_GRID: &str = "slant_range_time";

/// Scene geometry needed by the grid builders
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryParams {
    pub width: usize,
    pub height: usize,
    /// Slant range to first pixel (m)
    pub slant_range_to_first_pixel: f64,
    /// Range pixel spacing (m)
    pub range_spacing: f64,
    /// True for ground range (detected) products
    pub srgr_applied: bool,
    pub descending: bool,
    pub antenna_pointing_right: bool,
    /// Scene centre latitude (deg)
    pub scene_center_latitude: f64,
    /// Near range incidence angle (deg)
    pub near_range_incidence_angle: f64,
    pub first_line_time: DateTime<Utc>,
    /// Seconds
    pub line_time_interval: f64,
    pub flip_to_sar_geometry: bool,
}

impl GeometryParams {
    /// Pull what the abstracted metadata holds; the two angles come from the caller
    pub fn from_abstracted(
        abs: &MetadataElement,
        width: usize,
        height: usize,
        scene_center_latitude: f64,
        near_range_incidence_angle: f64,
        config: &ReaderConfig,
    ) -> Self {
        Self {
            width,
            height,
            slant_range_to_first_pixel: abs.attribute_double(am::SLANT_RANGE_TO_FIRST_PIXEL, 0.0),
            range_spacing: abs.attribute_double(am::RANGE_SPACING, 0.0),
            srgr_applied: abs.attribute_int(am::SRGR_FLAG, 0) != 0,
            descending: abs.attribute_string(am::PASS, "") == "DESCENDING",
            antenna_pointing_right: abs.attribute_string(am::ANTENNA_POINTING, "") == "right",
            scene_center_latitude,
            near_range_incidence_angle,
            first_line_time: abs.attribute_utc(am::FIRST_LINE_TIME, am::no_metadata_utc()),
            line_time_interval: abs.attribute_double(am::LINE_TIME_INTERVAL, 0.0),
            flip_to_sar_geometry: config.flip_to_sar_geometry,
        }
    }

    /// Grids run against the image columns for descending right-looking and
    /// ascending left-looking passes
    pub fn flip_needed(&self) -> bool {
        !self.flip_to_sar_geometry
            && ((self.descending && self.antenna_pointing_right) || (!self.descending && !self.antenna_pointing_right))
    }

    fn sub_sampling(&self) -> SarResult<(usize, usize)> {
        let sx = self.width / (GRID_WIDTH - 1);
        let sy = self.height / (GRID_HEIGHT - 1);
        if sx == 0 || sy == 0 {
            return Err(SarError::Processing(format!(
                "Raster {}x{} too small for a {}x{} tie-point grid",
                self.width, self.height, GRID_WIDTH, GRID_HEIGHT
            )));
        }
        Ok((sx, sy))
    }
}

fn grid(name: &str, unit: &str, sub_sampling: (usize, usize), data: Vec<f32>) -> TiePointGrid {
    TiePointGrid {
        name: name.to_string(),
        grid_width: GRID_WIDTH,
        grid_height: GRID_HEIGHT,
        offset_x: 0.0,
        offset_y: 0.0,
        sub_sampling_x: sub_sampling.0 as f64,
        sub_sampling_y: sub_sampling.1 as f64,
        data,
        unit: unit.to_string(),
    }
}

/// Local earth radius at `latitude` (deg) on the WGS84 ellipsoid
pub fn local_earth_radius(latitude: f64) -> f64 {
    let a = WGS84_SEMI_MAJOR_AXIS;
    let b = WGS84_SEMI_MINOR_AXIS;
    let lambda = latitude.to_radians();
    let cos2 = lambda.cos().powi(2);
    let sin2 = lambda.sin().powi(2);
    let e2 = (b * b) / (a * a);
    a * ((cos2 + e2 * e2 * sin2) / (cos2 + e2 * sin2)).sqrt()
}

/// Incidence angle (deg) across range, identical for every grid row
pub fn incidence_angle_grid(params: &GeometryParams) -> SarResult<TiePointGrid> {
    let (sub_x, sub_y) = params.sub_sampling()?;

    let alpha1 = params.near_range_incidence_angle.to_radians();
    let rt = local_earth_radius(params.scene_center_latitude);
    let rt2 = rt * rt;

    let mut ground_range_spacing = if params.srgr_applied {
        params.range_spacing
    } else {
        params.range_spacing / alpha1.sin()
    };
    let mut delta_psi = ground_range_spacing / rt;

    let r1 = params.slant_range_to_first_pixel;
    let rt_plus_h = (rt2 + r1 * r1 + 2.0 * rt * r1 * alpha1.cos()).sqrt();
    let rt_plus_h2 = rt_plus_h * rt_plus_h;
    let theta1 = ((r1 + rt * alpha1.cos()) / rt_plus_h).acos();
    let mut psi = alpha1 - theta1;

    let flip = params.flip_needed();
    let mut row = vec![0f32; GRID_WIDTH];
    let mut k = 0;
    for i in 0..GRID_WIDTH * sub_x {
        let ri = (rt2 + rt_plus_h2 - 2.0 * rt * rt_plus_h * psi.cos()).sqrt();
        let alpha = ((rt_plus_h2 - ri * ri - rt2) / (2.0 * ri * rt)).acos();
        if i % sub_x == 0 {
            let index = if flip { GRID_WIDTH - 1 - k } else { k };
            row[index] = alpha.to_degrees() as f32;
            k += 1;
        }
        if !params.srgr_applied {
            ground_range_spacing = params.range_spacing / alpha.sin();
            delta_psi = ground_range_spacing / rt;
        }
        psi += delta_psi;
    }

    let data = row.iter().copied().cycle().take(GRID_WIDTH * GRID_HEIGHT).collect();
    Ok(grid(INCIDENCE_ANGLE_GRID, "deg", (sub_x, sub_y), data))
}

fn seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
}

/// Two-way slant range time (ns) from the ground-to-slant range polynomials.
///
/// Each grid row uses the first segment not earlier than the row time (the last segment
/// past the end). Segments need at least five coefficients.
pub fn slant_range_time_grid(params: &GeometryParams, segments: &[CoefficientSegment]) -> SarResult<TiePointGrid> {
    let (sub_x, sub_y) = params.sub_sampling()?;
    if segments.is_empty() {
        return Err(SarError::Metadata("No SRGR coefficient segments".to_string()));
    }
    if let Some(short) = segments.iter().find(|s| s.coefficients.len() < 5) {
        return Err(SarError::Metadata(format!(
            "SRGR segment at {} has {} coefficient(s), 5 required",
            short.time,
            short.coefficients.len()
        )));
    }

    let start = seconds(params.first_line_time);
    let mut range_dist = Vec::with_capacity(GRID_WIDTH * GRID_HEIGHT);
    let mut c = 0;
    for j in 0..GRID_HEIGHT {
        let time = start + j as f64 * params.line_time_interval;
        while c < segments.len() && seconds(segments[c].time) < time {
            c += 1;
        }
        let seg = &segments[c.min(segments.len() - 1)];
        let s = &seg.coefficients;

        for i in 0..GRID_WIDTH {
            let ground_range = (i * sub_x) as f64 * params.range_spacing;
            let g = ground_range - seg.origin;
            let g2 = g * g;
            range_dist.push(s[0] + s[1] * g + s[2] * g2 + s[3] * g2 * g + s[4] * g2 * g2);
        }
    }

    let flip = params.flip_needed();
    let n = range_dist.len();
    let mut range_time = vec![0f32; n];
    for (i, dist) in range_dist.iter().enumerate() {
        let index = if flip { n - 1 - i } else { i };
        range_time[index] = (dist / HALF_LIGHT_SPEED * 1e9) as f32;
    }

    Ok(grid(SLANT_RANGE_TIME_GRID, "ns", (sub_x, sub_y), range_time))
}
