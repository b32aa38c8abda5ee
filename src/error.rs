use miette::Diagnostic;
use thiserror::Error;

use crate::parser::Location;

/// Main error type for colormap operations
#[derive(Error, Diagnostic, Debug)]
pub enum MapError {
    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(colormap::io))]
    Io {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Lexical error at {location}: {message}")]
    #[diagnostic(code(colormap::lex))]
    Lex {
        message: String,
        location: Location,
        #[help]
        help: Option<String>,
    },

    #[error("Syntax error at {location}: {message}")]
    #[diagnostic(code(colormap::syntax))]
    Syntax {
        message: String,
        location: Location,
        #[help]
        help: Option<String>,
    },

    #[error("Shape error: {message}")]
    #[diagnostic(code(colormap::shape))]
    Shape {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Type error: {message}")]
    #[diagnostic(code(colormap::type_mismatch))]
    Type {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Undefined variable: {name}")]
    #[diagnostic(code(colormap::undefined))]
    UndefinedVariable { name: String },

    #[error("Evaluation error: {message}")]
    #[diagnostic(code(colormap::eval))]
    Evaluation {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid image: {message}")]
    #[diagnostic(code(colormap::image))]
    Image {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(colormap::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl MapError {
    /// Shorthand for a type error without help text.
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        MapError::Type {
            message: message.into(),
            help: None,
        }
    }

    /// Shorthand for a shape error without help text.
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        MapError::Shape {
            message: message.into(),
            help: None,
        }
    }

    /// Shorthand for an evaluation error without help text.
    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        MapError::Evaluation {
            message: message.into(),
            help: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
