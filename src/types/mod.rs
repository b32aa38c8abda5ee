//! Core value types shared by the evaluator and the mapping engine:
//! - `Raster` - H×W×C float images
//! - `Plane` / `Mask` - per-pixel numeric and boolean layers
//! - `Value` - runtime results of expressions, including `Range` and `Slice`

mod raster;
mod value;

pub use raster::{Mask, Plane, Raster, ALPHA};
pub use value::{Arith, Compare, Logic, Range, Slice, Value};
