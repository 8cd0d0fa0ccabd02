mod bbox;
mod geom;
mod union;
mod validate;

use bbox::BoundingBox;
pub use geom::Geometries;
pub(crate) use union::union_all;
pub(crate) use validate::{check_shape, ShapeProblem};
