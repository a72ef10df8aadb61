//! A portable filter-expression language and its translation into the native
//! query syntax of several storage backends.
//!
//! ```text
//! "country in ['BG', 'NL'] && year >= 2020"
//!   → parser::parse_filter()      Expression
//!   → FilterConverter::convert()  {"$and": [...]} / node.`metadata.country` IN [...] / ...
//! ```

pub mod ast;
pub mod config;
pub mod converter;
pub mod document_dialect;
pub mod graph_dialect;
pub mod lexer;
pub mod lucene_dialect;
pub mod parser;
pub mod range_dialect;
pub mod sql_compiler;
pub mod token;

pub use ast::{Expression, ExpressionType, Group, Key, Operand, Value};
pub use config::{ConfigError, Dialect, FilterConfig};
pub use converter::{ConvertError, FilterConverter};
pub use document_dialect::DocumentFilterConverter;
pub use graph_dialect::GraphFilterConverter;
pub use lucene_dialect::LuceneFilterConverter;
pub use parser::{parse_filter, ParseError};
pub use range_dialect::RangeFilterConverter;
pub use sql_compiler::{CompileResult, Optimization, SqlCompilerConfig, SqlFilterCompiler};

use thiserror::Error;

/// Anything that makes a filter unusable; callers reject the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Parses `text` and renders it with `converter`.
pub fn convert_text<C: FilterConverter + ?Sized>(converter: &C, text: &str) -> Result<String, FilterError> {
    let expression = parse_filter(text)?;
    Ok(converter.convert(&expression)?)
}
