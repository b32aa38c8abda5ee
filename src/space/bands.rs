//! Named band access over a colorspace representation.

use std::borrow::{Borrow, BorrowMut};

use crate::error::{MapError, Result};
use crate::types::{Mask, Plane, Range, Raster, Value};

use super::{ColorSpace, HED, HSV, LAB, LUV, RGB, XYZ};

/// What a band mask tests for.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskValue {
    /// Every listed band equals this number.
    Number(f32),
    /// Each listed band equals the matching number.
    Tuple(Vec<f32>),
    /// Every listed band lies in the range.
    Range(Range),
}

impl From<f32> for MaskValue {
    fn from(value: f32) -> Self {
        MaskValue::Number(value)
    }
}

impl From<Vec<f32>> for MaskValue {
    fn from(values: Vec<f32>) -> Self {
        MaskValue::Tuple(values)
    }
}

impl From<&[f32]> for MaskValue {
    fn from(values: &[f32]) -> Self {
        MaskValue::Tuple(values.to_vec())
    }
}

impl<const N: usize> From<[f32; N]> for MaskValue {
    fn from(values: [f32; N]) -> Self {
        MaskValue::Tuple(values.to_vec())
    }
}

impl From<Range> for MaskValue {
    fn from(range: Range) -> Self {
        MaskValue::Range(range)
    }
}

impl TryFrom<Value> for MaskValue {
    type Error = MapError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Scalar(n) => Ok(MaskValue::Number(n)),
            Value::Vector(items) => Ok(MaskValue::Tuple(items)),
            Value::Range(range) => Ok(MaskValue::Range(range)),
            other => Err(MapError::Type {
                message: format!("Cannot build a band mask from a {}", other.kind()),
                help: Some("Use a number, a vector of numbers or a range".to_string()),
            }),
        }
    }
}

/// A representation paired with the colorspace that names its bands.
///
/// `R` is `&Raster` for read-only access (predicates) or `&mut Raster` when
/// bands are rewritten (transforms).
#[derive(Debug)]
pub struct Bands<R> {
    space: ColorSpace,
    raster: R,
}

impl<R: Borrow<Raster>> Bands<R> {
    pub fn new(space: ColorSpace, raster: R) -> Self {
        Self { space, raster }
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    pub fn raster(&self) -> &Raster {
        self.raster.borrow()
    }

    pub fn into_inner(self) -> R {
        self.raster
    }

    /// Band index for `name`, or a type error naming the colorspace.
    pub fn index(&self, name: &str) -> Result<usize> {
        self.space.component_index(name).ok_or_else(|| MapError::Type {
            message: format!("Colorspace {} has no band '{}'", self.space, name),
            help: Some(format!(
                "Bands of {}: {}, alpha",
                self.space,
                self.space.components().join(", ")
            )),
        })
    }

    pub fn band(&self, name: &str) -> Result<Plane> {
        self.raster().band(self.index(name)?)
    }

    /// Names of the bands present in the representation, alpha included.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = self.space.components().to_vec();
        if self.raster().has_alpha() {
            names.push(super::ALPHA_BAND);
        }
        names
    }

    /// Select pixels whose listed bands match `value`.
    pub fn band_mask(&self, names: &[&str], value: impl Into<MaskValue>) -> Result<Mask> {
        let value = value.into();
        if names.is_empty() {
            return Err(MapError::type_error("A band mask needs at least one band"));
        }
        if let MaskValue::Tuple(values) = &value {
            if values.len() != names.len() {
                return Err(MapError::Type {
                    message: format!(
                        "Mask tuple has {} value(s) for {} band(s)",
                        values.len(),
                        names.len()
                    ),
                    help: Some("Give exactly one value per band".to_string()),
                });
            }
        }

        let (width, height) = (self.raster().width(), self.raster().height());
        let mut mask = Mask::filled(width, height, true);
        for (i, name) in names.iter().enumerate() {
            let plane = self.band(name)?;
            let matched = match &value {
                MaskValue::Number(n) => plane.test(|v| v == *n),
                MaskValue::Tuple(values) => plane.test(|v| v == values[i]),
                MaskValue::Range(range) => range.contains_plane(&plane),
            };
            mask = mask.and(&matched)?;
        }
        Ok(mask)
    }
}

impl<R: BorrowMut<Raster>> Bands<R> {
    pub fn raster_mut(&mut self) -> &mut Raster {
        self.raster.borrow_mut()
    }

    pub fn set_band(&mut self, name: &str, plane: &Plane) -> Result<()> {
        let index = self.index(name)?;
        self.raster_mut().set_band(index, plane)
    }

    pub fn fill_band(&mut self, name: &str, value: f32) -> Result<()> {
        let index = self.index(name)?;
        self.raster_mut().fill_band(index, value)
    }
}

/// Typed band view for one colorspace: `x()`, `set_x()` and `x_is()` per band.
macro_rules! band_view {
    (
        $(#[$meta:meta])*
        $name:ident for $space:ident {
            $($band:ident, $setter:ident, $test:ident => $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<R>(Bands<R>);

        impl<R: Borrow<Raster>> $name<R> {
            pub fn new(raster: R) -> Self {
                Self(Bands::new($space, raster))
            }

            pub fn bands(&self) -> &Bands<R> {
                &self.0
            }

            pub fn into_bands(self) -> Bands<R> {
                self.0
            }

            pub fn alpha(&self) -> Result<Plane> {
                self.0.band(super::ALPHA_BAND)
            }

            pub fn alpha_is(&self, value: impl Into<MaskValue>) -> Result<Mask> {
                self.0.band_mask(&[super::ALPHA_BAND], value)
            }

            $(
                pub fn $band(&self) -> Result<Plane> {
                    self.0.band($label)
                }

                pub fn $test(&self, value: impl Into<MaskValue>) -> Result<Mask> {
                    self.0.band_mask(&[$label], value)
                }
            )+
        }

        impl<R: BorrowMut<Raster>> $name<R> {
            pub fn set_alpha(&mut self, plane: &Plane) -> Result<()> {
                self.0.set_band(super::ALPHA_BAND, plane)
            }

            $(
                pub fn $setter(&mut self, plane: &Plane) -> Result<()> {
                    self.0.set_band($label, plane)
                }
            )+
        }

        impl<R: Borrow<Raster>> From<$name<R>> for Bands<R> {
            fn from(view: $name<R>) -> Self {
                view.0
            }
        }
    };
}

band_view! {
    /// Red, green and blue.
    RgbBands for RGB {
        r, set_r, r_is => "r";
        g, set_g, g_is => "g";
        b, set_b, b_is => "b";
    }
}

band_view! {
    /// Hue (0..1), saturation and value.
    HsvBands for HSV {
        h, set_h, h_is => "h";
        s, set_s, s_is => "s";
        v, set_v, v_is => "v";
    }
}

band_view! {
    XyzBands for XYZ {
        x, set_x, x_is => "x";
        y, set_y, y_is => "y";
        z, set_z, z_is => "z";
    }
}

band_view! {
    LabBands for LAB {
        l, set_l, l_is => "l";
        a, set_a, a_is => "a";
        b, set_b, b_is => "b";
    }
}

band_view! {
    LuvBands for LUV {
        l, set_l, l_is => "l";
        u, set_u, u_is => "u";
        v, set_v, v_is => "v";
    }
}

band_view! {
    /// Haematoxylin, eosin and DAB stain amounts.
    HedBands for HED {
        h, set_h, h_is => "h";
        e, set_e, e_is => "e";
        d, set_d, d_is => "d";
    }
}
