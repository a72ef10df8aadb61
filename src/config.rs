//! Configuration: dialect selection and per-dialect settings loaded from JSON.
//!
//! ```json
//! {
//!   "default_dialect": "graph",
//!   "graph": { "node_alias": "doc", "metadata_prefix": "meta." },
//!   "lucene": { "key_prefix": "metadata." },
//!   "sql": { "table": "chunks", "metadata_column": "meta", "max_or_conditions_for_in": 3 }
//! }
//! ```
//!
//! Every section and field is optional and falls back to its default.

use crate::ast::Expression;
use crate::converter::{ConvertError, FilterConverter};
use crate::document_dialect::DocumentFilterConverter;
use crate::graph_dialect::GraphFilterConverter;
use crate::lucene_dialect::LuceneFilterConverter;
use crate::range_dialect::RangeFilterConverter;
use crate::sql_compiler::{SqlCompilerConfig, SqlFilterCompiler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown dialect '{0}', expected one of: document, graph, lucene, range, sql")]
    UnknownDialect(String),
}

/// Target query syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Document,
    Graph,
    Lucene,
    Range,
    Sql,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Document,
        Dialect::Graph,
        Dialect::Lucene,
        Dialect::Range,
        Dialect::Sql,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Document => "document",
            Dialect::Graph => "graph",
            Dialect::Lucene => "lucene",
            Dialect::Range => "range",
            Dialect::Sql => "sql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Dialect::ALL
            .into_iter()
            .find(|dialect| dialect.name() == lowered)
            .ok_or_else(|| ConfigError::UnknownDialect(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Dialect used when none is requested explicitly; `None` renders every dialect.
    pub default_dialect: Option<Dialect>,
    pub graph: GraphFilterConverter,
    pub lucene: LuceneFilterConverter,
    pub sql: SqlCompilerConfig,
}

impl FilterConfig {
    /// Load the configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FilterConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), ?config, "loaded filter config");
        Ok(config)
    }

    /// Renders `expression` in the given dialect with this configuration.
    pub fn render(&self, dialect: Dialect, expression: &Expression) -> Result<String, ConvertError> {
        match dialect {
            Dialect::Document => DocumentFilterConverter.convert(expression),
            Dialect::Graph => self.graph.convert(expression),
            Dialect::Lucene => self.lucene.convert(expression),
            Dialect::Range => RangeFilterConverter.convert(expression),
            Dialect::Sql => SqlFilterCompiler::with_config(self.sql.clone())
                .compile(expression)
                .map(|result| result.sql),
        }
    }
}
