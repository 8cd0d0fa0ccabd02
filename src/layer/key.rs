use std::{fmt, sync::Arc};

/// Stable key for a feature or a dissolve group.
/// Keeps the original text (leading zeros included) without repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey(Arc<str>);

impl FeatureKey {
    pub fn new(key: impl AsRef<str>) -> Self { Self(Arc::from(key.as_ref())) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for FeatureKey {
    fn from(key: &str) -> Self { Self::new(key) }
}

impl From<String> for FeatureKey {
    fn from(key: String) -> Self { Self(Arc::from(key)) }
}
