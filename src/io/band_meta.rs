//! `BAND_META.txt` vendor header

use crate::product::MetadataElement;

/// Name of the element holding the raw vendor fields
pub const PRODUCT_METADATA: &str = "ProductMetadata";

/// Parser for the flat `key=value` vendor header
pub struct BandMetaParser;

impl BandMetaParser {
    /// Parse header text into a `ProductMetadata` element of string attributes.
    ///
    /// Lines without `=`, blank lines and `#` comments are ignored. A repeated key keeps its
    /// first position and takes the last value.
    pub fn parse(content: &str) -> MetadataElement {
        let mut elem = MetadataElement::new(PRODUCT_METADATA);
        let mut skipped = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    elem.set_value(key.trim(), value.trim());
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("Skipped {} malformed line(s) in vendor header", skipped);
        }
        log::debug!("Parsed {} vendor header field(s)", elem.attributes().len());
        elem
    }
}
