//! Text template rendering
//!
//! Interpolates request data into a template string using lodash-style
//! delimiters. Only property lookups are evaluated; there is no code
//! execution, no loops and no conditionals.

pub mod renderer;

pub use renderer::{TemplateError, TemplateRenderer};
