use crate::types::Polarization;

/// Match order: compact channels first so `RH`/`RV` are never claimed by a linear token
const MATCH_ORDER: [Polarization; 6] = [
    Polarization::RH,
    Polarization::RV,
    Polarization::HH,
    Polarization::HV,
    Polarization::VV,
    Polarization::VH,
];

/// Resolves channel tokens found in file and product names.
///
/// Seeing a compact channel switches the ingestion into compact-pol mode; the flag
/// never resets for the lifetime of the resolver.
#[derive(Debug, Default, Clone)]
pub struct PolarizationResolver {
    compact_pol_mode: bool,
}

impl PolarizationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel contained in `token` (case-insensitive), or `None` when unrecognized
    pub fn resolve(&mut self, token: &str) -> Option<Polarization> {
        let upper = token.to_uppercase();
        let pol = MATCH_ORDER
            .iter()
            .copied()
            .find(|p| upper.contains(&p.to_string()))?;
        if pol.is_compact() && !self.compact_pol_mode {
            log::info!("Compact polarimetric channel found in '{}'", token);
            self.compact_pol_mode = true;
        }
        Some(pol)
    }

    pub fn compact_pol_mode(&self) -> bool {
        self.compact_pol_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_tokens() {
        let mut resolver = PolarizationResolver::new();
        assert_eq!(resolver.resolve("imagery_hh.tif"), Some(Polarization::HH));
        assert_eq!(resolver.resolve("IMAGERY_HV"), Some(Polarization::HV));
        assert_eq!(resolver.resolve("x_vv"), Some(Polarization::VV));
        assert_eq!(resolver.resolve("x_vh"), Some(Polarization::VH));
        assert!(!resolver.compact_pol_mode());
    }

    #[test]
    fn test_compact_tokens_win_and_latch() {
        let mut resolver = PolarizationResolver::new();
        // "rhh" contains both RH and HH
        assert_eq!(resolver.resolve("imagery_rhh.tif"), Some(Polarization::RH));
        assert!(resolver.compact_pol_mode());

        assert_eq!(resolver.resolve("imagery_vv.tif"), Some(Polarization::VV));
        assert!(resolver.compact_pol_mode());

        let mut other = PolarizationResolver::new();
        assert_eq!(other.resolve("RISAT1_CEOS_RV"), Some(Polarization::RV));
        assert!(other.compact_pol_mode());
    }

    #[test]
    fn test_unrecognized_token() {
        let mut resolver = PolarizationResolver::new();
        assert_eq!(resolver.resolve("imagery.tif"), None);
        assert_eq!(resolver.resolve(""), None);
        assert!(!resolver.compact_pol_mode());
    }
}
