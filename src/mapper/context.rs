//! Per-run cache of colorspace representations.

use std::collections::HashMap;
use std::rc::Rc;

use crate::space::ColorSpace;
use crate::types::Raster;

/// Converts the image of one [`Mapper::run`](super::Mapper::run) into the
/// colorspaces its maskers ask for, converting each at most once when
/// caching is enabled.
#[derive(Debug)]
pub struct MappingContext<'a> {
    image: &'a Raster,
    cache: Option<HashMap<&'static str, Rc<Raster>>>,
    last: Option<(&'static str, Rc<Raster>)>,
    conversions: usize,
}

impl<'a> MappingContext<'a> {
    pub fn new(image: &'a Raster, enable_cache: bool) -> Self {
        Self {
            image,
            cache: enable_cache.then(HashMap::new),
            last: None,
            conversions: 0,
        }
    }

    /// The original RGB(A) image.
    pub fn image(&self) -> &'a Raster {
        self.image
    }

    pub fn caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of encodes performed so far.
    pub fn conversions(&self) -> usize {
        self.conversions
    }

    /// The image in `space`.
    ///
    /// RGB returns the original. A repeat of the previous request returns
    /// the previous result without consulting the cache.
    pub fn process_image(&mut self, space: &ColorSpace) -> &Raster {
        if space.is_identity() {
            return self.image;
        }

        let key = space.key();
        let repeat = matches!(&self.last, Some((last, _)) if *last == key);
        if repeat {
            log::trace!("Reusing last {} representation", key);
        } else {
            let cached = self.cache.as_ref().and_then(|cache| cache.get(key)).cloned();
            let representation = match cached {
                Some(representation) => {
                    log::trace!("Cache hit for {}", key);
                    representation
                }
                None => {
                    log::debug!("Converting image to {}", key);
                    self.conversions += 1;
                    let representation = Rc::new(space.encode(self.image));
                    if let Some(cache) = &mut self.cache {
                        cache.insert(key, Rc::clone(&representation));
                    }
                    representation
                }
            };
            self.last = Some((key, representation));
        }

        match &self.last {
            Some((_, representation)) => representation,
            None => self.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{HSV, LAB, RGB};

    fn image() -> Raster {
        Raster::from_rgb_pixels(2, 1, &[[1.0, 0.0, 0.0], [0.0, 0.5, 1.0]]).unwrap()
    }

    #[test]
    fn test_rgb_is_the_original() {
        let image = image();
        let mut context = MappingContext::new(&image, true);
        assert!(std::ptr::eq(context.process_image(&RGB), &image));
        assert_eq!(context.conversions(), 0);
    }

    #[test]
    fn test_cache_converts_each_space_once() {
        let image = image();
        let mut context = MappingContext::new(&image, true);
        let hsv = context.process_image(&HSV).clone();
        context.process_image(&LAB);
        assert_eq!(context.process_image(&HSV), &hsv);
        context.process_image(&LAB);
        assert_eq!(context.conversions(), 2);
    }

    #[test]
    fn test_without_cache_only_last_is_kept() {
        let image = image();
        let mut context = MappingContext::new(&image, false);
        context.process_image(&HSV);
        context.process_image(&HSV);
        assert_eq!(context.conversions(), 1);

        context.process_image(&LAB);
        context.process_image(&HSV);
        assert_eq!(context.conversions(), 3);
    }

    #[test]
    fn test_representation_matches_encode() {
        let image = image();
        let mut context = MappingContext::new(&image, true);
        assert_eq!(context.process_image(&HSV), &HSV.encode(&image));
    }
}
