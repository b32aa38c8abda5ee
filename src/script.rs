//! Compiling whole scripts into mappers.
//!
//! Top-level assignments are evaluated once, in source order, into a global
//! environment shared by every rule. Each `on ... pixels having ... do ...
//! end;` rule becomes one mapping entry, in source order, so earlier rules
//! take precedence over later ones.

use std::rc::Rc;

use crate::config::MapperConfig;
use crate::error::{MapError, Result};
use crate::eval::{execute, Environment};
use crate::mapper::{Action, Mapper, MappingEntry, Masker};
use crate::parser::{tokenize, tokenize_strict, AlphaPolicy, Diagnostics, Parser, Rule, Statement};
use crate::space::ColorSpaceRegistry;
use crate::types::Raster;

/// A script ready to run against images.
#[derive(Debug)]
pub struct CompiledScript {
    mapper: Mapper,
    alpha: AlphaPolicy,
    globals: Rc<Environment>,
    diagnostics: Diagnostics,
}

/// Compile `source` with default options.
pub fn compile_script(source: &str, registry: &ColorSpaceRegistry) -> Result<CompiledScript> {
    compile_script_with(source, registry, &MapperConfig::default())
}

/// Compile `source`; `config.alpha` overrides the script's directive.
pub fn compile_script_with(
    source: &str,
    registry: &ColorSpaceRegistry,
    config: &MapperConfig,
) -> Result<CompiledScript> {
    let (tokens, mut diagnostics) = if config.strict_lexing {
        (tokenize_strict(source)?, Diagnostics::new())
    } else {
        let lexed = tokenize(source);
        (lexed.tokens, lexed.diagnostics)
    };

    let mut parser = Parser::new(&tokens);
    let program = parser.parse_program()?;
    diagnostics.merge(parser.into_diagnostics());

    let mut globals = Environment::new();
    let mut alpha = AlphaPolicy::default();
    for statement in &program.statements {
        match statement {
            Statement::Assign(assignment) => {
                execute(std::slice::from_ref(assignment), &mut globals)?;
            }
            Statement::Alpha(policy) => alpha = *policy,
            Statement::Rule(_) => {}
        }
    }
    let globals = Rc::new(globals);

    let mut mapper = Mapper::new(registry.clone());
    for rule in program.rules() {
        let entry = compile_rule(rule, &mapper, &globals)?;
        mapper.push(entry);
    }

    log::debug!(
        "Compiled script with {} rule(s) and {} diagnostic(s)",
        mapper.len(),
        diagnostics.iter().count()
    );

    Ok(CompiledScript {
        mapper,
        alpha: config.alpha.unwrap_or(alpha),
        globals,
        diagnostics,
    })
}

fn compile_rule(rule: &Rule, mapper: &Mapper, globals: &Rc<Environment>) -> Result<MappingEntry> {
    let space = mapper.space(&rule.space)?;
    let mut entry = MappingEntry::new(Masker::compiled(
        space,
        rule.predicate.clone(),
        Rc::clone(globals),
    ));
    for block in &rule.actions {
        let space = mapper.space(&block.space)?;
        entry.then(Action::compiled(
            space,
            block.statements.clone(),
            Rc::clone(globals),
        ));
    }
    Ok(entry)
}

impl CompiledScript {
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Effective alpha policy.
    pub fn alpha(&self) -> AlphaPolicy {
        self.alpha
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Warnings and skipped lexical errors.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Check `image` against an alpha policy.
    pub fn check_alpha(&self, image: &Raster, policy: AlphaPolicy) -> Result<()> {
        match (policy, image.has_alpha()) {
            (AlphaPolicy::Require, false) => Err(MapError::Image {
                message: "Script requires an alpha band but the image has none".to_string(),
                help: Some("Convert the image to RGBA first".to_string()),
            }),
            (AlphaPolicy::Forbid, true) => Err(MapError::Image {
                message: "Script forbids an alpha band but the image has one".to_string(),
                help: Some("Convert the image to RGB first".to_string()),
            }),
            _ => Ok(()),
        }
    }

    pub fn run(&self, image: &Raster, enable_cache: bool) -> Result<Raster> {
        self.check_alpha(image, self.alpha)?;
        self.mapper.run(image, enable_cache)
    }

    /// Run with options from `config`; its alpha policy wins when set.
    pub fn run_with(&self, image: &Raster, config: &MapperConfig) -> Result<Raster> {
        self.check_alpha(image, config.alpha.unwrap_or(self.alpha))?;
        self.mapper.run_with(image, config)
    }
}
