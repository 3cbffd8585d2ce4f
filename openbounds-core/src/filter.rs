//! Flat property filters declared by source descriptors.
//!
//! A [`FilterExpression`] is a list of [`FilterClause`]s joined by a single
//! [`FilterOperator`]. Nested expressions are not supported.
//!
//! # Examples
//! ```
//! use openbounds_core::{ComparisonOp, FilterClause, FilterExpression, FilterOperator};
//! use serde_json::json;
//!
//! let filter = FilterExpression::new(
//!     vec![FilterClause::new("status", ComparisonOp::Eq, json!("active"))],
//!     FilterOperator::And,
//! );
//! let properties = json!({"status": "active"});
//! assert!(filter.matches(properties.as_object().expect("object")));
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geojson::Properties;

/// Boolean combinator applied uniformly across all clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Every clause must hold.
    #[default]
    And,
    /// At least one clause must hold.
    Or,
}

impl FilterOperator {
    /// Return the operator as it appears in descriptor files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Comparison applied by a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal.
    #[serde(rename = "eq", alias = "==")]
    Eq,
    /// Not equal.
    #[serde(rename = "ne", alias = "neq", alias = "!=")]
    Ne,
    /// Strictly less than.
    #[serde(rename = "lt", alias = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "lte", alias = "le", alias = "<=")]
    Lte,
    /// Strictly greater than.
    #[serde(rename = "gt", alias = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = "gte", alias = "ge", alias = ">=")]
    Gte,
    /// Membership in an array of candidate values.
    #[serde(rename = "in")]
    In,
    /// Substring match for strings, element match for arrays.
    #[serde(rename = "contains")]
    Contains,
}

/// One `(property, op, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Feature property key the clause inspects.
    pub property: String,
    /// Comparison to apply.
    pub op: ComparisonOp,
    /// Expected value.
    pub value: Value,
}

impl FilterClause {
    /// Construct a clause.
    pub fn new(property: impl Into<String>, op: ComparisonOp, value: Value) -> Self {
        Self {
            property: property.into(),
            op,
            value,
        }
    }

    /// Evaluate the clause; a missing property never matches.
    pub fn matches(&self, properties: &Properties) -> bool {
        let Some(actual) = properties.get(&self.property) else {
            return false;
        };
        let expected = &self.value;
        match self.op {
            ComparisonOp::Eq => values_equal(actual, expected),
            ComparisonOp::Ne => !values_equal(actual, expected),
            ComparisonOp::Lt => compare(actual, expected) == Some(Ordering::Less),
            ComparisonOp::Lte => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ComparisonOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
            ComparisonOp::Gte => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ComparisonOp::In => expected
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| values_equal(actual, c))),
            ComparisonOp::Contains => match (actual, expected) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                _ => false,
            },
        }
    }
}

/// Flat predicate over feature properties.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    clauses: Vec<FilterClause>,
    combinator: FilterOperator,
}

impl FilterExpression {
    /// Build an expression from its clauses and combinator.
    pub fn new(clauses: Vec<FilterClause>, combinator: FilterOperator) -> Self {
        Self {
            clauses,
            combinator,
        }
    }

    /// Clauses evaluated by this expression.
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Combinator joining the clauses.
    pub const fn combinator(&self) -> FilterOperator {
        self.combinator
    }

    /// Whether a feature with `properties` is retained.
    ///
    /// Evaluation short-circuits. An expression without clauses retains every
    /// feature regardless of the combinator.
    pub fn matches(&self, properties: &Properties) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        match self.combinator {
            FilterOperator::And => self.clauses.iter().all(|clause| clause.matches(properties)),
            FilterOperator::Or => self.clauses.iter().any(|clause| clause.matches(properties)),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Numbers compare numerically against numbers or numeric strings; everything
/// else uses JSON equality.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (numeric(actual), numeric(expected)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        _ => actual == expected,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (numeric(actual), numeric(expected)) {
        return left.partial_cmp(&right);
    }
    match (actual, expected) {
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}
