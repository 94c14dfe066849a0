//! Typed query structures compiled from product listing parameters
use serde_json::{Map, Value as JsonValue};

/// A query-string value exactly as received. It is only cast once the
/// target column type is known, so text comparisons see the original string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub raw: String,
}

impl Value {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.raw.trim().parse().ok()
    }

    /// Finite numbers only; `inf` and `NaN` are treated as text
    pub fn as_number(&self) -> Option<f64> {
        self.raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,  // field[gt]=v
    Gte, // field[gte]=v
    Lt,  // field[lt]=v
    Lte, // field[lte]=v
}

impl Comparator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Comparator::Gt),
            "gte" => Some(Comparator::Gte),
            "lt" => Some(Comparator::Lt),
            "lte" => Some(Comparator::Lte),
            _ => None,
        }
    }

    pub fn sql_operator(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub op: Comparator,
    pub value: Value,
}

/// Predicate tree over named product fields.
///
/// `And(vec![])` matches every record, `Or(vec![])` matches none.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals { field: String, value: Value },
    /// Case-insensitive substring match
    Contains { field: String, needle: String },
    Range { field: String, bounds: Vec<Bound> },
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    #[cfg(test)]
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Predicate::Contains {
            field: field.to_string(),
            needle: needle.to_string(),
        }
    }

    #[cfg(test)]
    pub fn matches_all(&self) -> bool {
        matches!(self, Predicate::And(clauses) if clauses.is_empty())
    }

    /// Top-level clauses of an AND, or the predicate itself otherwise
    #[cfg(test)]
    pub fn clauses(&self) -> &[Predicate] {
        match self {
            Predicate::And(clauses) => clauses,
            other => std::slice::from_ref(other),
        }
    }

    /// Fields compared by `Equals` leaves anywhere in the tree
    #[cfg(test)]
    pub fn equality_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_equality_fields(&mut fields);
        fields
    }

    #[cfg(test)]
    fn collect_equality_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Equals { field, .. } => out.push(field),
            Predicate::Or(children) | Predicate::And(children) => {
                for child in children {
                    child.collect_equality_fields(out);
                }
            }
            Predicate::Contains { .. } | Predicate::Range { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

/// Field projection requested through `fields`.
///
/// `_id` is kept unless explicitly excluded. Excluding `_id` is the only
/// exclusion allowed next to inclusions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub const ID_FIELD: &'static str = "_id";

    pub fn validate(&self) -> Result<(), String> {
        let mixes = !self.include.is_empty()
            && self.exclude.iter().any(|field| field != Self::ID_FIELD);
        if mixes {
            return Err(format!(
                "Projection cannot mix inclusion {:?} and exclusion {:?}",
                self.include, self.exclude
            ));
        }
        Ok(())
    }

    pub fn apply(&self, document: Map<String, JsonValue>) -> Map<String, JsonValue> {
        let excluded = |key: &str| self.exclude.iter().any(|f| f == key);
        if self.include.is_empty() {
            return document
                .into_iter()
                .filter(|(key, _)| !excluded(key))
                .collect();
        }
        document
            .into_iter()
            .filter(|(key, _)| {
                let wanted = key == Self::ID_FIELD || self.include.iter().any(|f| f == key);
                wanted && !excluded(key)
            })
            .collect()
    }
}

/// Page window as (skip, limit), with the 1-based page it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl PageWindow {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            skip: page.saturating_sub(1).saturating_mul(limit),
        }
    }
}

/// Everything the store needs to run one product listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub filter: Predicate,
    pub sort: Option<SortSpec>,
    pub projection: Option<Projection>,
    pub window: PageWindow,
}
