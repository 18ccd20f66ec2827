//! Signal catalog: the closed set of addressable signal points.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Signal identifier (OID).
///
/// Resolved from the first token of a received line. The wire spelling is
/// the canonical name and matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Oid {
    #[serde(rename = "oid1")]
    Oid1,
    #[serde(rename = "oid2")]
    Oid2,
    #[serde(rename = "oid3")]
    Oid3,
    #[serde(rename = "oid4")]
    Oid4,

    // Overhead panel
    OverheadBrightForOledStep,
    OverheadBrightForLcdStep,
    OverheadBrightForLedStep,
    OverheadAnnunciatorTest,

    // Pedestal
    PedestalTrimWheel,
    PedestalTrimIndicator,
    PedestalSpeedBrake,
    PedestalFlapsLever,
    PedestalParkingBrake,

    // Glareshield
    GlareshieldMasterWarning,
    GlareshieldMasterCaution,

    /// Sentinel for names outside the catalog. Must stay the last variant
    /// for `#[serde(other)]`.
    #[serde(other)]
    Undefined,
}

impl Oid {
    /// Every addressable signal, excluding `Undefined`.
    pub const ALL: [Oid; 15] = [
        Self::Oid1,
        Self::Oid2,
        Self::Oid3,
        Self::Oid4,
        Self::OverheadBrightForOledStep,
        Self::OverheadBrightForLcdStep,
        Self::OverheadBrightForLedStep,
        Self::OverheadAnnunciatorTest,
        Self::PedestalTrimWheel,
        Self::PedestalTrimIndicator,
        Self::PedestalSpeedBrake,
        Self::PedestalFlapsLever,
        Self::PedestalParkingBrake,
        Self::GlareshieldMasterWarning,
        Self::GlareshieldMasterCaution,
    ];

    /// Returns the canonical (wire) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Oid1 => "oid1",
            Self::Oid2 => "oid2",
            Self::Oid3 => "oid3",
            Self::Oid4 => "oid4",
            Self::OverheadBrightForOledStep => "OverheadBrightForOledStep",
            Self::OverheadBrightForLcdStep => "OverheadBrightForLcdStep",
            Self::OverheadBrightForLedStep => "OverheadBrightForLedStep",
            Self::OverheadAnnunciatorTest => "OverheadAnnunciatorTest",
            Self::PedestalTrimWheel => "PedestalTrimWheel",
            Self::PedestalTrimIndicator => "PedestalTrimIndicator",
            Self::PedestalSpeedBrake => "PedestalSpeedBrake",
            Self::PedestalFlapsLever => "PedestalFlapsLever",
            Self::PedestalParkingBrake => "PedestalParkingBrake",
            Self::GlareshieldMasterWarning => "GlareshieldMasterWarning",
            Self::GlareshieldMasterCaution => "GlareshieldMasterCaution",
        }
    }

    /// Resolves a signal from its canonical name.
    ///
    /// Unknown names resolve to `Undefined`. That is a valid result, not an
    /// error; callers check it with [`Oid::is_undefined`].
    pub fn resolve(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|oid| oid.as_str() == name)
            .unwrap_or(Self::Undefined)
    }

    /// Returns true for the `Undefined` sentinel.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl Default for Oid {
    fn default() -> Self {
        Self::Undefined
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Oid {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::resolve(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_names() {
        assert_eq!(
            Oid::resolve("OverheadBrightForOledStep"),
            Oid::OverheadBrightForOledStep
        );
        assert_eq!(Oid::resolve("oid1"), Oid::Oid1);
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert_eq!(Oid::resolve("OID1"), Oid::Undefined);
        assert_eq!(Oid::resolve("overheadbrightforoledstep"), Oid::Undefined);
    }

    #[test]
    fn test_resolve_unknown_is_undefined() {
        let oid = Oid::resolve("NoSuchSignal");
        assert!(oid.is_undefined());
        assert!(Oid::resolve("").is_undefined());
    }

    #[test]
    fn test_catalog_names_round_trip() {
        for oid in Oid::ALL {
            assert_eq!(Oid::resolve(oid.as_str()), oid);
            assert!(!oid.is_undefined());
        }
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Oid::Oid2).unwrap();
        assert_eq!(json, "\"oid2\"");

        let oid: Oid = serde_json::from_str("\"PedestalSpeedBrake\"").unwrap();
        assert_eq!(oid, Oid::PedestalSpeedBrake);

        let unknown: Oid = serde_json::from_str("\"future-signal\"").unwrap();
        assert_eq!(unknown, Oid::Undefined);
    }

    #[test]
    fn test_undefined_serializes_by_name() {
        assert_eq!(serde_json::to_string(&Oid::Undefined).unwrap(), "\"Undefined\"");
        let oid: Oid = serde_json::from_str("\"Undefined\"").unwrap();
        assert_eq!(oid, Oid::Undefined);
    }
}
