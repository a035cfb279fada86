/// Feature Flags Module
///
/// Capability bits a backend may support and a caller may switch on or off.

/// A single optional capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Feature {
    /// Backend-side cursor library
    Cursor = 0x0001,
    /// Transactions through start/commit/rollback
    Transactions = 0x0002,
    /// Strip trailing whitespace from fetched strings
    AutoTrim = 0x0004,
}

impl Feature {
    pub fn bit(self) -> u16 {
        self as u16
    }
}

/// A bitset of [`Feature`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSet(u16);

impl FeatureSet {
    pub const EMPTY: FeatureSet = FeatureSet(0);

    pub fn of(features: &[Feature]) -> Self {
        features
            .iter()
            .fold(FeatureSet::EMPTY, |set, feature| set.with(*feature))
    }

    pub fn contains(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub fn with(self, feature: Feature) -> Self {
        FeatureSet(self.0 | feature.bit())
    }

    pub fn without(self, feature: Feature) -> Self {
        FeatureSet(self.0 & !feature.bit())
    }

    pub fn intersection(self, other: FeatureSet) -> Self {
        FeatureSet(self.0 & other.0)
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}
