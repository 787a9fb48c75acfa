//! Collection queries: field filters plus a single ordering field.

use std::cmp::Ordering;

use serde_json::Value;

use crate::StoredDocument;

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// The field is an array holding the filter value.
    ArrayContains,
}

impl FilterOp {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::ArrayContains => "@>",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::ArrayContains => false,
        }
    }
}

/// Sort direction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Compare one top-level field against a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Whether `doc` passes this filter. Documents lacking the field, or holding
    /// a value of a different JSON type, never match.
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::ArrayContains => match actual {
                Value::Array(items) => items.iter().any(|item| values_equal(item, &self.value)),
                _ => false,
            },
            FilterOp::Eq => values_equal(actual, &self.value),
            op => compare_values(actual, &self.value)
                .map(|ordering| op.accepts(ordering))
                .unwrap_or(false),
        }
    }
}

/// Filters (ANDed together) and an optional ordering field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Evaluate the query against an in-memory document set.
    ///
    /// When ordering, documents without the order field are excluded.
    pub fn apply(&self, docs: impl IntoIterator<Item = StoredDocument>) -> Vec<StoredDocument> {
        let mut matched: Vec<StoredDocument> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(&doc.data)))
            .collect();

        if let Some((field, direction)) = &self.order_by {
            matched.retain(|doc| doc.data.get(field).is_some());
            matched.sort_by(|a, b| {
                let ordering = compare_values(&a.data[field], &b.data[field])
                    .unwrap_or(Ordering::Equal);
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.key.cmp(&b.key))
            });
        }

        matched
    }
}

/// Equality with numbers compared by value, so `2` equals `2.0`.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Order two JSON scalars of the same type. Mixed types are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
