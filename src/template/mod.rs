//! A small text/template engine for bot messages.
//!
//! Message templates are written in Go's text/template syntax, so existing
//! configuration keeps working. This module supports the subset those
//! templates use: field chains, `$` and declared variables (`$x := ...`,
//! `$x = ...`, `range $i, $e := ...`), string and number literals, pipes,
//! `if`/`else if`/`else`, `range` (with `else`), `with`, trim markers,
//! comments, and the functions listed in `funcs`, including `printf` and
//! the comparison builtins.
//!
//! Templates render against any `Serialize` value, viewed as JSON.

mod exec;
mod format;
mod funcs;
mod lex;
mod parse;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    #[error("template: line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("template: line {line}: executing: {message}")]
    Exec { line: usize, message: String },

    #[error("template data could not be serialized: {0}")]
    Data(String),
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<parse::Node>,
}

impl Template {
    /// Parses template source. Unbalanced blocks, unknown functions and
    /// malformed actions are reported here rather than at render time.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = lex::lex(source)?;
        let nodes = parse::parse(tokens)?;
        Ok(Self { nodes })
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, TemplateError> {
        let value = serde_json::to_value(data).map_err(|e| TemplateError::Data(e.to_string()))?;
        let mut out = String::new();
        exec::execute(&self.nodes, &value, &mut out)?;
        Ok(out)
    }
}
