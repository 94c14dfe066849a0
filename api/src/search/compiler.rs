use super::params::{split_operator_key, RawQueryParams};
use super::types::{
    Bound, Comparator, PageWindow, Predicate, ProductQuery, Projection, SortKey, SortOrder,
    SortSpec, Value,
};
use std::collections::BTreeMap;

/// Parameters that configure the query itself and never filter data
pub const CONTROL_KEYS: [&str; 4] = ["limit", "sort", "page", "fields"];

/// Matched as case-insensitive substrings instead of by equality
const TEXT_MATCH_FIELDS: [&str; 2] = ["title", "category"];

/// Searched by the free-text `q` parameter
pub const FREE_TEXT_FIELDS: [&str; 4] = ["color", "title", "category", "brand"];

pub const DEFAULT_PAGE: u64 = 1;

/// Compiles listing parameters into a filter, sort, projection and page window.
pub fn compile(params: &RawQueryParams, default_limit: u64) -> ProductQuery {
    ProductQuery {
        filter: compile_filter(params),
        sort: params.get("sort").and_then(parse_sort),
        projection: params.get("fields").and_then(parse_projection),
        window: page_window(params.get("page"), params.get("limit"), default_limit),
    }
}

/// Builds the AND of the color clause, the direct field clauses and the
/// free-text clause. Absent clauses contribute nothing.
pub fn compile_filter(params: &RawQueryParams) -> Predicate {
    let mut color_clause = None;
    let mut free_text_clause = None;
    // One entry per field so fragments never overwrite each other
    let mut direct: BTreeMap<&str, Vec<Predicate>> = BTreeMap::new();

    for (key, values) in params.iter() {
        // `page[gt]` is still the page parameter
        let base = split_operator_key(key).map_or(key, |(field, _)| field);
        if CONTROL_KEYS.contains(&base) {
            continue;
        }

        if let Some((field, op)) =
            split_operator_key(key).and_then(|(f, t)| Some((f, Comparator::from_token(t)?)))
        {
            if let Some(raw) = values.last() {
                add_bound(direct.entry(field).or_default(), field, op, raw);
            }
            continue;
        }

        match key {
            "color" => color_clause = color_clause_for(values),
            "q" => free_text_clause = free_text_clause_for(values),
            field if TEXT_MATCH_FIELDS.contains(&field) => {
                if let Some(clause) = any_of(
                    non_empty(values)
                        .map(|needle| Predicate::contains(field, needle))
                        .collect(),
                ) {
                    direct.entry(field).or_default().push(clause);
                }
            }
            field => {
                let equalities = values
                    .iter()
                    .map(|raw| Predicate::Equals {
                        field: field.to_string(),
                        value: Value::new(raw),
                    })
                    .collect();
                if let Some(clause) = any_of(equalities) {
                    direct.entry(field).or_default().push(clause);
                }
            }
        }
    }

    let mut clauses = Vec::new();
    clauses.extend(color_clause);
    for (_, mut conditions) in direct {
        match conditions.len() {
            0 => {}
            1 => clauses.extend(conditions.pop()),
            _ => clauses.push(Predicate::And(conditions)),
        }
    }
    clauses.extend(free_text_clause);
    Predicate::And(clauses)
}

fn non_empty(values: &[String]) -> impl Iterator<Item = &str> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn any_of(mut predicates: Vec<Predicate>) -> Option<Predicate> {
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Predicate::Or(predicates)),
    }
}

fn add_bound(conditions: &mut Vec<Predicate>, field: &str, op: Comparator, raw: &str) {
    let bound = Bound {
        op,
        value: Value::new(raw),
    };
    for condition in conditions.iter_mut() {
        if let Predicate::Range { bounds, .. } = condition {
            bounds.retain(|b| b.op != op);
            bounds.push(bound);
            return;
        }
    }
    conditions.push(Predicate::Range {
        field: field.to_string(),
        bounds: vec![bound],
    });
}

/// `color=red,blue` -> any of the tokens, as substrings
fn color_clause_for(values: &[String]) -> Option<Predicate> {
    let tokens: Vec<Predicate> = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| Predicate::contains("color", token))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(Predicate::Or(tokens))
    }
}

fn free_text_clause_for(values: &[String]) -> Option<Predicate> {
    let matches: Vec<Predicate> = non_empty(values)
        .flat_map(|needle| {
            FREE_TEXT_FIELDS
                .iter()
                .map(move |field| Predicate::contains(field, needle))
        })
        .collect();
    if matches.is_empty() {
        None
    } else {
        Some(Predicate::Or(matches))
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `sort=-price,title` -> price descending, then title ascending
pub fn parse_sort(raw: &str) -> Option<SortSpec> {
    let keys: Vec<SortKey> = split_list(raw)
        .filter_map(|item| {
            let (field, order) = match item.strip_prefix('-') {
                Some(field) => (field, SortOrder::Desc),
                None => (item.strip_prefix('+').unwrap_or(item), SortOrder::Asc),
            };
            (!field.is_empty()).then(|| SortKey {
                field: field.to_string(),
                order,
            })
        })
        .collect();
    (!keys.is_empty()).then_some(SortSpec { keys })
}

/// `fields=title,price` includes, `fields=-description` excludes
pub fn parse_projection(raw: &str) -> Option<Projection> {
    let mut projection = Projection {
        include: Vec::new(),
        exclude: Vec::new(),
    };
    for item in split_list(raw) {
        match item.strip_prefix('-') {
            Some("") => {}
            Some(field) => projection.exclude.push(field.to_string()),
            None => projection.include.push(item.to_string()),
        }
    }
    if projection.include.is_empty() && projection.exclude.is_empty() {
        None
    } else {
        Some(projection)
    }
}

/// Absent, non-numeric or non-positive values fall back to the defaults
pub fn page_window(page: Option<&str>, limit: Option<&str>, default_limit: u64) -> PageWindow {
    let page = positive_integer(page).unwrap_or(DEFAULT_PAGE);
    let limit = positive_integer(limit).unwrap_or_else(|| default_limit.max(1));
    PageWindow::new(page, limit)
}

fn positive_integer(raw: Option<&str>) -> Option<u64> {
    let number = raw?.trim().parse::<f64>().ok()?;
    if number.is_finite() && number >= 1.0 && number.fract() == 0.0 && number <= u64::MAX as f64 {
        Some(number as u64)
    } else {
        None
    }
}
