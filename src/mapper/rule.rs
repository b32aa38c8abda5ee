//! Maskers and actions: the two halves of a mapping entry.
//!
//! Both come in two flavours chosen at construction: a native Rust closure
//! working on [`Bands`], or compiled script code evaluated with the
//! colorspace's band planes bound as `$<band>` variables.

use std::fmt;
use std::rc::Rc;

use crate::error::{MapError, Result};
use crate::eval::{evaluate, execute, Environment};
use crate::parser::{parse_expression, tokenize_strict, Assignment, Expr};
use crate::space::{Bands, ColorSpace, ALPHA_BAND, RGB};
use crate::types::{Mask, Raster, Value};

use super::context::MappingContext;

/// Native masking predicate.
pub type NativePredicate = Box<dyn Fn(&Bands<&Raster>) -> Result<Mask>>;

/// Native pixel transform.
pub type NativeTransform = Box<dyn Fn(&mut Bands<&mut Raster>) -> Result<()>>;

pub enum Predicate {
    Native(NativePredicate),
    Compiled {
        expr: Expr,
        globals: Rc<Environment>,
    },
}

pub enum Transform {
    Native(NativeTransform),
    Compiled {
        statements: Vec<Assignment>,
        globals: Rc<Environment>,
    },
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Native(_) => f.write_str("Predicate::Native"),
            Predicate::Compiled { expr, .. } => f.debug_tuple("Predicate::Compiled").field(expr).finish(),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Native(_) => f.write_str("Transform::Native"),
            Transform::Compiled { statements, .. } => {
                f.debug_tuple("Transform::Compiled").field(statements).finish()
            }
        }
    }
}

/// Selects pixels by evaluating a predicate in a colorspace.
#[derive(Debug)]
pub struct Masker {
    predicate: Predicate,
    space: ColorSpace,
}

impl Masker {
    pub fn new(predicate: Predicate, space: ColorSpace) -> Self {
        Self { predicate, space }
    }

    pub fn native<F>(space: ColorSpace, f: F) -> Self
    where
        F: Fn(&Bands<&Raster>) -> Result<Mask> + 'static,
    {
        Self::new(Predicate::Native(Box::new(f)), space)
    }

    pub fn compiled(space: ColorSpace, expr: Expr, globals: Rc<Environment>) -> Self {
        Self::new(Predicate::Compiled { expr, globals }, space)
    }

    /// Compile a standalone predicate such as `$h in 0 .. 0.1`.
    pub fn from_source(space: ColorSpace, source: &str) -> Result<Self> {
        let expr = parse_expression(&tokenize_strict(source)?)?;
        Ok(Self::compiled(space, expr, Rc::new(Environment::new())))
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Evaluate the predicate over the context's image.
    pub fn get_mask(&self, context: &mut MappingContext<'_>) -> Result<Mask> {
        let representation = context.process_image(&self.space);
        let (width, height) = (representation.width(), representation.height());
        let bands = Bands::new(self.space, representation);

        let mask = match &self.predicate {
            Predicate::Native(f) => f(&bands)?,
            Predicate::Compiled { expr, globals } => {
                let env = band_environment(&bands, globals)?;
                match evaluate(expr, &env)? {
                    Value::Mask(mask) => mask,
                    Value::Boolean(all) => Mask::filled(width, height, all),
                    other => {
                        return Err(MapError::Type {
                            message: format!("Predicate produced a {}, not a mask", other.kind()),
                            help: Some("Compare bands, e.g. $h in 0 .. 0.1".to_string()),
                        });
                    }
                }
            }
        };

        if mask.dims() != (width, height) {
            return Err(MapError::shape(format!(
                "Mask covers {}x{} pixels, image is {}x{}",
                mask.width(),
                mask.height(),
                width,
                height
            )));
        }
        Ok(mask)
    }
}

/// Rewrites pixels in a colorspace.
#[derive(Debug)]
pub struct Action {
    transform: Transform,
    space: ColorSpace,
}

impl Action {
    pub fn new(transform: Transform, space: ColorSpace) -> Self {
        Self { transform, space }
    }

    pub fn native<F>(space: ColorSpace, f: F) -> Self
    where
        F: Fn(&mut Bands<&mut Raster>) -> Result<()> + 'static,
    {
        Self::new(Transform::Native(Box::new(f)), space)
    }

    pub fn compiled(space: ColorSpace, statements: Vec<Assignment>, globals: Rc<Environment>) -> Self {
        Self::new(Transform::Compiled { statements, globals }, space)
    }

    /// Scale every RGB(A) band by the matching factor.
    pub fn scale(factors: Vec<f32>) -> Self {
        Self::native(RGB, move |bands| {
            let channels = bands.raster().channels();
            for pixel in bands.raster_mut().pixels_mut() {
                for (value, factor) in pixel.iter_mut().zip(&factors).take(channels) {
                    *value *= factor;
                }
            }
            Ok(())
        })
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Transform a chunk of RGB(A) pixels, returning the new chunk.
    pub fn execute(&self, chunk: &Raster) -> Result<Raster> {
        let mut representation = self.space.encode(chunk);
        let mut bands = Bands::new(self.space, &mut representation);

        match &self.transform {
            Transform::Native(f) => f(&mut bands)?,
            Transform::Compiled { statements, globals } => {
                let mut env = band_environment(&bands, globals)?;
                execute(statements, &mut env)?;
                write_back(&mut bands, &mut env)?;
            }
        }

        Ok(self.space.decode(&representation))
    }
}

/// Child of `globals` with every band bound as a plane.
fn band_environment<R>(bands: &Bands<R>, globals: &Rc<Environment>) -> Result<Environment>
where
    R: std::borrow::Borrow<Raster>,
{
    let mut env = Environment::child(Rc::clone(globals));
    for name in bands.names() {
        env.bind(name, Value::Plane(bands.band(name)?));
    }
    Ok(env)
}

/// Copy band variables back into the representation.
fn write_back(bands: &mut Bands<&mut Raster>, env: &mut Environment) -> Result<()> {
    for name in bands.names() {
        match env.take(name) {
            Some(Value::Plane(plane)) => bands.set_band(name, &plane)?,
            Some(Value::Scalar(value)) => bands.fill_band(name, value)?,
            Some(other) => {
                return Err(MapError::Type {
                    message: format!("Cannot store a {} in band ${}", other.kind(), name),
                    help: Some("Band variables hold numbers or band planes".to_string()),
                });
            }
            None => {}
        }
    }
    if !bands.raster().has_alpha() && env.take(ALPHA_BAND).is_some() {
        return Err(MapError::Type {
            message: format!("Cannot assign $alpha: the {} image has no alpha band", bands.space()),
            help: Some("Add 'alpha require;' or convert the image to RGBA".to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, tokenize};
    use crate::space::{HsvBands, HSV};
    use crate::types::Range;

    fn image() -> Raster {
        Raster::from_rgba_pixels(
            2,
            1,
            &[[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 0.5]],
        )
        .unwrap()
    }

    fn action_block(source: &str) -> Vec<Assignment> {
        let program = parse(&tokenize(&format!("on pixels having true do {} end;", source)).tokens)
            .unwrap();
        let rule = program.rules().next().unwrap();
        rule.actions[0].statements.clone()
    }

    #[test]
    fn test_native_masker() {
        let image = image();
        let mut context = MappingContext::new(&image, true);
        let masker = Masker::native(HSV, |bands| {
            HsvBands::new(bands.raster()).h_is(Range::new(0.0, 3.0 / 180.0))
        });
        assert_eq!(masker.get_mask(&mut context).unwrap().bits(), &[true, false]);
    }

    #[test]
    fn test_compiled_masker() {
        let image = image();
        let mut context = MappingContext::new(&image, true);
        let masker = Masker::from_source(RGB, "$b > 0.5 & $alpha < 1").unwrap();
        assert_eq!(masker.get_mask(&mut context).unwrap().bits(), &[false, true]);
    }

    #[test]
    fn test_boolean_predicate_is_broadcast() {
        let image = image();
        let mut context = MappingContext::new(&image, false);
        let masker = Masker::from_source(RGB, "true").unwrap();
        assert_eq!(masker.get_mask(&mut context).unwrap().count(), 2);
    }

    #[test]
    fn test_non_mask_predicate_is_rejected() {
        let image = image();
        let mut context = MappingContext::new(&image, false);
        let masker = Masker::from_source(RGB, "$r + 1").unwrap();
        assert!(matches!(masker.get_mask(&mut context), Err(MapError::Type { .. })));
    }

    #[test]
    fn test_predicate_sees_globals() {
        let image = image();
        let mut context = MappingContext::new(&image, false);
        let mut globals = Environment::new();
        globals.bind("limit", Value::Scalar(0.5));
        let expr = parse_expression(&tokenize("$r > $limit").tokens).unwrap();
        let masker = Masker::compiled(RGB, expr, Rc::new(globals));
        assert_eq!(masker.get_mask(&mut context).unwrap().bits(), &[true, false]);
    }

    #[test]
    fn test_scale_action() {
        let chunk = image();
        let out = Action::scale(vec![1.0, 1.0, 0.5, 1.0]).execute(&chunk).unwrap();
        assert_eq!(out.pixel(1, 0), &[0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_compiled_action_writes_bands() {
        let chunk = image();
        let action = Action::compiled(
            RGB,
            action_block("$g = 0.25; $r *= 0.5; $alpha = 1;"),
            Rc::new(Environment::new()),
        );
        let out = action.execute(&chunk).unwrap();
        assert_eq!(out.pixel(0, 0), &[0.5, 0.25, 0.0, 1.0]);
        assert_eq!(out.pixel(1, 0), &[0.0, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn test_compiled_action_in_hsv() {
        let chunk = image();
        let action = Action::compiled(HSV, action_block("$v *= 0.5;"), Rc::new(Environment::new()));
        let out = action.execute(&chunk).unwrap();
        assert!((out.pixel(0, 0)[0] - 0.5).abs() < 1e-4);
        assert!((out.pixel(1, 0)[2] - 0.5).abs() < 1e-4);
        assert_eq!(out.pixel(1, 0)[3], 0.5);
    }

    #[test]
    fn test_band_assigned_a_mask_is_rejected() {
        let chunk = image();
        let action = Action::compiled(RGB, action_block("$r = $g > 0;"), Rc::new(Environment::new()));
        assert!(matches!(action.execute(&chunk), Err(MapError::Type { .. })));
    }

    #[test]
    fn test_alpha_assignment_needs_an_alpha_band() {
        let action = Action::compiled(RGB, action_block("$alpha = 0;"), Rc::new(Environment::new()));

        let rgb = Raster::from_rgb_pixels(1, 1, &[[1.0, 0.0, 0.0]]).unwrap();
        assert!(matches!(action.execute(&rgb), Err(MapError::Type { .. })));

        let output = action.execute(&image()).unwrap();
        assert!(output.pixels().all(|p| p[3] == 0.0));
    }
}
