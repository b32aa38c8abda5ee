//! Ordered, first-match-wins pixel mapping.
//!
//! A [`Mapper`] holds [`MappingEntry`] rules. Each entry pairs a [`Masker`]
//! selecting pixels with a list of [`Action`]s rewriting them. Entries are
//! tried in order and a pixel claimed by one entry is withheld from every
//! later one.
//!
//! ```ignore
//! use colormap::mapper::{Action, Mapper, Masker};
//! use colormap::space::{HsvBands, HSV};
//! use colormap::types::Range;
//!
//! let mut mapper = Mapper::default();
//! mapper
//!     .on(Masker::native(HSV, |bands| {
//!         HsvBands::new(bands.raster()).h_is(Range::new(0.0, 3.0 / 180.0))
//!     }))
//!     .then(Action::scale(vec![1.0, 1.0, 0.5, 1.0]));
//!
//! let output = mapper.run(&image, true)?;
//! ```

mod context;
mod rule;

pub use context::MappingContext;
pub use rule::{Action, Masker, NativePredicate, NativeTransform, Predicate, Transform};

use crate::config::MapperConfig;
use crate::error::{MapError, Result};
use crate::space::{ColorSpace, ColorSpaceRegistry};
use crate::types::{Mask, Raster};

/// One rule: a masker and the actions applied, in order, to what it selects.
#[derive(Debug)]
pub struct MappingEntry {
    masker: Masker,
    actions: Vec<Action>,
}

impl MappingEntry {
    pub fn new(masker: Masker) -> Self {
        Self {
            masker,
            actions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn then(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn masker(&self) -> &Masker {
        &self.masker
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Run every action over a chunk, each one seeing the previous output.
    fn apply(&self, chunk: Raster) -> Result<Raster> {
        self.actions
            .iter()
            .try_fold(chunk, |chunk, action| action.execute(&chunk))
    }
}

/// Ordered list of mapping entries.
#[derive(Debug, Default)]
pub struct Mapper {
    registry: ColorSpaceRegistry,
    entries: Vec<MappingEntry>,
}

impl Mapper {
    pub fn new(registry: ColorSpaceRegistry) -> Self {
        Self {
            registry,
            entries: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ColorSpaceRegistry {
        &self.registry
    }

    /// Look up a colorspace in this mapper's registry.
    pub fn space(&self, name: &str) -> Result<ColorSpace> {
        self.registry.resolve(name)
    }

    /// Append an entry for `masker`, returning it for adding actions.
    pub fn on(&mut self, masker: Masker) -> &mut MappingEntry {
        self.push(MappingEntry::new(masker))
    }

    pub fn push(&mut self, entry: MappingEntry) -> &mut MappingEntry {
        self.entries.push(entry);
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map `image`, returning a new image of the same shape.
    pub fn run(&self, image: &Raster, enable_cache: bool) -> Result<Raster> {
        if !(3..=4).contains(&image.channels()) {
            return Err(MapError::Image {
                message: format!(
                    "Expected an RGB or RGBA image, got {} channel(s)",
                    image.channels()
                ),
                help: Some("Images are shaped [height, width, 3 or 4]".to_string()),
            });
        }

        let mut context = MappingContext::new(image, enable_cache);
        let mut remaining = Mask::filled(image.width(), image.height(), true);
        let mut matches = Vec::with_capacity(self.entries.len());

        for (index, entry) in self.entries.iter().enumerate() {
            let mask = entry.masker.get_mask(&mut context)?;
            let matched = remaining.and(&mask)?;
            remaining = remaining.and(&matched.not())?;
            log::debug!(
                "Entry {} ({}) matched {} pixel(s)",
                index,
                entry.masker.space(),
                matched.count()
            );
            matches.push((matched, entry));
        }
        log::debug!(
            "Masking done with {} colorspace conversion(s)",
            context.conversions()
        );

        let [height, width, channels] = image.shape();
        let mut output = Raster::new(width, height, channels);

        for (mask, entry) in &matches {
            output.copy_masked(image, mask);
            if entry.actions.is_empty() || !mask.any() {
                continue;
            }
            let chunk = entry.apply(output.gather(mask))?;
            output.scatter(mask, &chunk)?;
        }

        output.copy_masked(image, &remaining);
        Ok(output)
    }

    /// [`run`](Self::run) with options from a config.
    pub fn run_with(&self, image: &Raster, config: &MapperConfig) -> Result<Raster> {
        self.run(image, config.enable_cache)
    }
}
