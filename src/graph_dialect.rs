//! Graph query `WHERE` clauses: ``node.`metadata.country` = "BG"``.

use crate::ast::{Expression, ExpressionType, Key};
use crate::converter::{null_check_key, ConvertError, FilterConverter};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_ALIAS: &str = "node";
pub const DEFAULT_METADATA_PREFIX: &str = "metadata.";

/// Keys resolve to properties of a bound node, as ``<alias>.`<prefix><key>` ``.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphFilterConverter {
    pub node_alias: String,
    pub metadata_prefix: String,
}

impl Default for GraphFilterConverter {
    fn default() -> Self {
        Self {
            node_alias: DEFAULT_NODE_ALIAS.to_string(),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
        }
    }
}

impl GraphFilterConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_alias(mut self, alias: impl Into<String>) -> Self {
        self.node_alias = alias.into();
        self
    }

    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    fn do_null_check(&self, expression: &Expression, suffix: &str, out: &mut String) -> Result<(), ConvertError> {
        let key = null_check_key(expression)?;
        self.do_key(key, out)?;
        out.push_str(suffix);
        Ok(())
    }
}

impl FilterConverter for GraphFilterConverter {
    fn dialect(&self) -> &'static str {
        "graph"
    }

    fn do_expression(&self, expression: &Expression, out: &mut String) -> Result<(), ConvertError> {
        match expression.kind {
            ExpressionType::And => self.do_logical(expression, " AND ", out),
            ExpressionType::Or => self.do_logical(expression, " OR ", out),
            ExpressionType::Not => self.do_negation(expression, "NOT ", out),
            ExpressionType::Eq => self.do_comparison(expression, " = ", out),
            ExpressionType::Ne => self.do_comparison(expression, " <> ", out),
            ExpressionType::Gt => self.do_comparison(expression, " > ", out),
            ExpressionType::Gte => self.do_comparison(expression, " >= ", out),
            ExpressionType::Lt => self.do_comparison(expression, " < ", out),
            ExpressionType::Lte => self.do_comparison(expression, " <= ", out),
            ExpressionType::In => self.do_comparison(expression, " IN ", out),
            ExpressionType::Nin => {
                out.push_str("NOT ");
                self.do_comparison(expression, " IN ", out)
            }
            ExpressionType::IsNull => self.do_null_check(expression, " IS NULL", out),
            ExpressionType::IsNotNull => self.do_null_check(expression, " IS NOT NULL", out),
        }
    }

    fn do_key(&self, key: &Key, out: &mut String) -> Result<(), ConvertError> {
        out.push_str(&self.node_alias);
        out.push_str(".`");
        out.push_str(&self.metadata_prefix.replace('`', "``"));
        out.push_str(&key.unquoted().replace('`', "``"));
        out.push('`');
        Ok(())
    }
}
