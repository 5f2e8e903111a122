use std::cmp::Ordering;
use std::fmt;

use crate::model::{FieldMap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gte,
    Lte,
    In,
}

/// A single predicate on one field. A predicate set is a conjunction of these.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub field: String,
    pub op: Comparator,
    pub terms: Vec<Value>,
}

pub fn eq(field: &str, term: impl Into<Value>) -> Relation {
    Relation { field: field.to_string(), op: Comparator::Eq, terms: vec![term.into()] }
}

pub fn gte(field: &str, term: impl Into<Value>) -> Relation {
    Relation { field: field.to_string(), op: Comparator::Gte, terms: vec![term.into()] }
}

pub fn lte(field: &str, term: impl Into<Value>) -> Relation {
    Relation { field: field.to_string(), op: Comparator::Lte, terms: vec![term.into()] }
}

/// Membership. An empty term list matches nothing.
pub fn is_in<I, V>(field: &str, terms: I) -> Relation
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Relation {
        field: field.to_string(),
        op: Comparator::In,
        terms: terms.into_iter().map(Into::into).collect(),
    }
}

impl Relation {
    /// Evaluate against a row. A missing field never matches.
    pub fn accepts(&self, row: &FieldMap) -> bool {
        let Some(value) = row.get(&self.field) else {
            return false;
        };
        match self.op {
            Comparator::Eq | Comparator::In => {
                self.terms.iter().any(|t| value.compare(t) == Some(Ordering::Equal))
            }
            Comparator::Gte => self.terms.first().map_or(false, |t| {
                matches!(value.compare(t), Some(Ordering::Greater | Ordering::Equal))
            }),
            Comparator::Lte => self.terms.first().map_or(false, |t| {
                matches!(value.compare(t), Some(Ordering::Less | Ordering::Equal))
            }),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Comparator::In => {
                let terms: Vec<String> = self.terms.iter().map(Value::to_literal).collect();
                write!(f, "{} IN ({})", self.field, terms.join(", "))
            }
            op => {
                let sign = match op {
                    Comparator::Eq => "=",
                    Comparator::Gte => ">=",
                    _ => "<=",
                };
                let term = self.terms.first().map(Value::to_literal).unwrap_or_default();
                write!(f, "{} {} {}", self.field, sign, term)
            }
        }
    }
}

/// True when every relation accepts the row.
pub fn matches_all(relations: &[Relation], row: &FieldMap) -> bool {
    relations.iter().all(|r| r.accepts(row))
}
