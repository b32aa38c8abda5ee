//! colormap - colorspace-aware pixel masking and recolouring
//!
//! A small rule language compiled into an ordered, first-match-wins pipeline
//! of masks and pixel transforms, plus the engine that runs it over images.

pub mod config;
pub mod error;
pub mod eval;
pub mod mapper;
pub mod parser;
pub mod script;
pub mod space;
pub mod types;

pub use config::MapperConfig;
pub use error::{MapError, Result};
pub use eval::{evaluate, execute, Environment};
pub use mapper::{Action, Mapper, MappingContext, MappingEntry, Masker};
pub use parser::{parse, parse_expression, tokenize, tokenize_strict, AlphaPolicy, Expr, Program};
pub use script::{compile_script, compile_script_with, CompiledScript};
pub use space::{Bands, ColorSpace, ColorSpaceRegistry, MaskValue};
pub use types::{Mask, Plane, Range, Raster, Value};
