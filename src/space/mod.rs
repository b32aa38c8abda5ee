//! Colorspaces and named band access.
//!
//! A [`ColorSpace`] is an `encode`/`decode` pair over [`Raster`]s plus a
//! table naming its bands. Only the first three bands are converted; a
//! fourth (alpha) band passes through both directions untouched.
//!
//! Colorspaces are looked up by name through a [`ColorSpaceRegistry`] that
//! callers hand to the mapper and the script compiler.

mod bands;
mod convert;

use std::collections::BTreeMap;
use std::fmt;

pub use bands::{
    Bands, HedBands, HsvBands, LabBands, LuvBands, MaskValue, RgbBands, XyzBands,
};

use crate::error::{MapError, Result};
use crate::types::{Raster, ALPHA};

/// Name of the alpha band in every colorspace.
pub const ALPHA_BAND: &str = "alpha";

/// Conversion function between RGB(A) and a representation.
pub type Conversion = fn(&Raster) -> Raster;

/// A named image representation.
#[derive(Clone, Copy)]
pub struct ColorSpace {
    key: &'static str,
    components: [&'static str; 3],
    encode: Conversion,
    decode: Conversion,
}

impl ColorSpace {
    pub const fn new(
        key: &'static str,
        components: [&'static str; 3],
        encode: Conversion,
        decode: Conversion,
    ) -> Self {
        Self {
            key,
            components,
            encode,
            decode,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Band names, in band order.
    pub fn components(&self) -> &[&'static str; 3] {
        &self.components
    }

    /// True for the RGB colorspace, whose conversions are no-ops.
    pub fn is_identity(&self) -> bool {
        self.key == RGB.key
    }

    /// Convert an RGB(A) image into this representation.
    pub fn encode(&self, image: &Raster) -> Raster {
        (self.encode)(image)
    }

    /// Convert a representation back to RGB(A).
    pub fn decode(&self, representation: &Raster) -> Raster {
        (self.decode)(representation)
    }

    /// Band index of a component name; `alpha` is always band 3.
    pub fn component_index(&self, name: &str) -> Option<usize> {
        if name == ALPHA_BAND {
            return Some(ALPHA);
        }
        self.components.iter().position(|c| *c == name)
    }
}

impl PartialEq for ColorSpace {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ColorSpace {}

impl fmt::Debug for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorSpace")
            .field("key", &self.key)
            .field("components", &self.components)
            .finish()
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)
    }
}

pub const RGB: ColorSpace =
    ColorSpace::new("rgb", ["r", "g", "b"], convert::identity, convert::identity);
pub const HSV: ColorSpace =
    ColorSpace::new("hsv", ["h", "s", "v"], convert::rgb_to_hsv, convert::hsv_to_rgb);
pub const XYZ: ColorSpace =
    ColorSpace::new("xyz", ["x", "y", "z"], convert::rgb_to_xyz, convert::xyz_to_rgb);
pub const LAB: ColorSpace =
    ColorSpace::new("lab", ["l", "a", "b"], convert::rgb_to_lab, convert::lab_to_rgb);
pub const LUV: ColorSpace =
    ColorSpace::new("luv", ["l", "u", "v"], convert::rgb_to_luv, convert::luv_to_rgb);
pub const HED: ColorSpace =
    ColorSpace::new("hed", ["h", "e", "d"], convert::rgb_to_hed, convert::hed_to_rgb);

/// Colorspaces by name.
#[derive(Debug, Clone)]
pub struct ColorSpaceRegistry {
    spaces: BTreeMap<&'static str, ColorSpace>,
}

impl ColorSpaceRegistry {
    /// A registry with no colorspaces at all.
    pub fn empty() -> Self {
        Self {
            spaces: BTreeMap::new(),
        }
    }

    /// rgb, hsv, xyz, lab, luv and hed.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for space in [RGB, HSV, XYZ, LAB, LUV, HED] {
            registry.register(space);
        }
        registry
    }

    /// Add a colorspace, returning the one it replaces.
    pub fn register(&mut self, space: ColorSpace) -> Option<ColorSpace> {
        self.spaces.insert(space.key(), space)
    }

    pub fn get(&self, name: &str) -> Option<ColorSpace> {
        self.spaces.get(name).copied()
    }

    /// Like [`get`](Self::get), failing with a helpful error.
    pub fn resolve(&self, name: &str) -> Result<ColorSpace> {
        self.get(name).ok_or_else(|| MapError::Config {
            message: format!("Unknown colorspace '{}'", name),
            help: Some(format!("Known colorspaces: {}", self.names().collect::<Vec<_>>().join(", "))),
        })
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.spaces.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}

impl Default for ColorSpaceRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SPACE_NAMES;

    #[test]
    fn test_component_index() {
        assert_eq!(HSV.component_index("h"), Some(0));
        assert_eq!(HSV.component_index("v"), Some(2));
        assert_eq!(HSV.component_index("alpha"), Some(ALPHA));
        assert_eq!(HSV.component_index("r"), None);
        assert_eq!(LAB.component_index("b"), Some(2));
    }

    #[test]
    fn test_standard_registry_matches_keywords() {
        let registry = ColorSpaceRegistry::standard();
        for name in SPACE_NAMES {
            assert_eq!(registry.resolve(name).unwrap().key(), name);
        }
        assert_eq!(registry.len(), SPACE_NAMES.len());
    }

    #[test]
    fn test_unknown_colorspace() {
        let err = ColorSpaceRegistry::standard().resolve("cmyk").unwrap_err();
        assert!(matches!(err, MapError::Config { .. }));
    }

    #[test]
    fn test_register_custom() {
        fn invert(image: &Raster) -> Raster {
            let mut out = image.clone();
            for pixel in out.pixels_mut() {
                for value in pixel.iter_mut().take(3) {
                    *value = 1.0 - *value;
                }
            }
            out
        }

        let mut registry = ColorSpaceRegistry::empty();
        assert!(registry.is_empty());
        let negative = ColorSpace::new("neg", ["c", "m", "y"], invert, invert);
        assert!(registry.register(negative).is_none());

        let image = Raster::from_rgb_pixels(1, 1, &[[0.25, 0.5, 1.0]]).unwrap();
        let space = registry.resolve("neg").unwrap();
        assert_eq!(space.encode(&image).data(), &[0.75, 0.5, 0.0]);
        assert_eq!(space.decode(&space.encode(&image)), image);
    }

    #[test]
    fn test_every_standard_space_keeps_alpha() {
        let image = Raster::from_rgba_pixels(
            2,
            1,
            &[[0.8, 0.4, 0.2, 0.3], [0.1, 0.9, 0.5, 0.7]],
        )
        .unwrap();
        for space in [RGB, HSV, XYZ, LAB, LUV, HED] {
            let encoded = space.encode(&image);
            let decoded = space.decode(&encoded);
            for (before, after) in image.pixels().zip(decoded.pixels()) {
                assert_eq!(before[ALPHA].to_bits(), after[ALPHA].to_bits(), "{}", space);
            }
        }
    }
}
