mod key;
mod layer;
mod selector;

pub use key::FeatureKey;
pub use layer::{FeatureLayer, GeometryKind};
pub use selector::{LayerInfo, LayerSelector};
