use super::types::{Bound, Predicate, SortOrder, SortSpec, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Never true; stands in for conditions on fields that are not stored
const MATCH_NONE: &str = "0 = 1";
const MATCH_ALL: &str = "1 = 1";

/// Insertion order: the default ordering and the tiebreaker of every sort
const NATURAL_ORDER: &str = "rowid ASC";

static FIELD_ALLOWLIST: OnceLock<HashMap<&'static str, FieldConfig>> = OnceLock::new();

/// Field allowlist mapping API field names to product columns
fn field_allowlist() -> &'static HashMap<&'static str, FieldConfig> {
    FIELD_ALLOWLIST.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("_id", FieldConfig::new("id", FieldType::Text));
        map.insert("title", FieldConfig::new("title", FieldType::Text));
        map.insert("slug", FieldConfig::new("slug", FieldType::Text));
        map.insert(
            "description",
            FieldConfig::new("description", FieldType::Text),
        );
        map.insert("brand", FieldConfig::new("brand", FieldType::Text));
        map.insert("thumb", FieldConfig::new("thumb", FieldType::Text));
        map.insert("category", FieldConfig::new("category", FieldType::Text));
        map.insert("color", FieldConfig::new("color", FieldType::Text));
        map.insert("price", FieldConfig::new("price", FieldType::Float));
        map.insert("quantity", FieldConfig::new("quantity", FieldType::Int));
        map.insert("sold", FieldConfig::new("sold", FieldType::Int));
        map.insert(
            "totalRatings",
            FieldConfig::new("total_ratings", FieldType::Int),
        );
        map.insert("createdAt", FieldConfig::new("created_at", FieldType::Text));
        map.insert("updatedAt", FieldConfig::new("updated_at", FieldType::Text));
        // JSON-encoded URL list: substring search only
        map.insert("images", FieldConfig::new("images", FieldType::List));
        map
    })
}

#[derive(Debug, Clone)]
struct FieldConfig {
    db_column: &'static str,
    field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldType {
    Text,
    Int,
    Float,
    List,
}

impl FieldConfig {
    fn new(db_column: &'static str, field_type: FieldType) -> Self {
        Self {
            db_column,
            field_type,
        }
    }
}

/// Builds a SQL WHERE expression and its bind values from a predicate.
/// Uses SQLite positional placeholders (`?`), in bind order.
pub fn build_where(predicate: &Predicate) -> Result<(String, Vec<SqlValue>), String> {
    let mut bind_values = Vec::new();
    let sql = build_predicate_sql(predicate, &mut bind_values)?;
    Ok((sql, bind_values))
}

fn build_predicate_sql(
    predicate: &Predicate,
    bind_values: &mut Vec<SqlValue>,
) -> Result<String, String> {
    match predicate {
        Predicate::And(children) => build_group(children, " AND ", MATCH_ALL, bind_values),
        Predicate::Or(children) => build_group(children, " OR ", MATCH_NONE, bind_values),
        Predicate::Equals { field, value } => {
            let Some(config) = comparable_field(field) else {
                return Ok(MATCH_NONE.to_string());
            };
            bind_values.push(convert_value(value, field, &config.field_type)?);
            Ok(format!("{} = ?", config.db_column))
        }
        Predicate::Contains { field, needle } => {
            let Some(config) = field_allowlist().get(field.as_str()) else {
                return Ok(MATCH_NONE.to_string());
            };
            bind_values.push(SqlValue::Text(needle.clone()));
            Ok(format!(
                "instr(lower(CAST({} AS TEXT)), lower(?)) > 0",
                config.db_column
            ))
        }
        Predicate::Range { field, bounds } => {
            let Some(config) = comparable_field(field) else {
                return Ok(MATCH_NONE.to_string());
            };
            build_range_clause(config, field, bounds, bind_values)
        }
    }
}

fn build_group(
    children: &[Predicate],
    separator: &str,
    empty: &str,
    bind_values: &mut Vec<SqlValue>,
) -> Result<String, String> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = children
        .iter()
        .map(|child| build_predicate_sql(child, bind_values))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", parts.join(separator)))
}

/// Fields that support equality and ordering comparisons
fn comparable_field(field: &str) -> Option<&'static FieldConfig> {
    field_allowlist()
        .get(field)
        .filter(|config| config.field_type != FieldType::List)
}

fn build_range_clause(
    config: &FieldConfig,
    field: &str,
    bounds: &[Bound],
    bind_values: &mut Vec<SqlValue>,
) -> Result<String, String> {
    if bounds.is_empty() {
        return Ok(MATCH_ALL.to_string());
    }
    let mut parts = Vec::with_capacity(bounds.len());
    for bound in bounds {
        bind_values.push(convert_value(&bound.value, field, &config.field_type)?);
        parts.push(format!("{} {} ?", config.db_column, bound.op.sql_operator()));
    }
    Ok(format!("({})", parts.join(" AND ")))
}

/// Casts a query value to the column type, failing like a schema cast would.
/// Text columns receive the value unchanged.
fn convert_value(value: &Value, field: &str, field_type: &FieldType) -> Result<SqlValue, String> {
    let converted = match field_type {
        FieldType::Text => Some(SqlValue::Text(value.raw.clone())),
        FieldType::Int => value
            .as_integer()
            .map(SqlValue::Integer)
            .or_else(|| value.as_number().map(SqlValue::Float)),
        FieldType::Float => value.as_number().map(SqlValue::Float),
        FieldType::List => return Err(format!("Field \"{}\" cannot be compared", field)),
    };
    converted.ok_or_else(|| {
        format!(
            "Cast to {:?} failed for value \"{}\" at path \"{}\"",
            field_type, value.raw, field
        )
    })
}

/// Builds the ORDER BY list. Unknown fields are skipped; insertion order
/// always ends the list so pages stay stable.
pub fn build_order_by(sort: Option<&SortSpec>) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for key in sort.map(|s| s.keys.as_slice()).unwrap_or_default() {
        let Some(config) = comparable_field(&key.field) else {
            tracing::debug!("Ignoring sort on unknown field: {}", key.field);
            continue;
        };
        if seen.contains(&config.db_column) {
            continue;
        }
        seen.push(config.db_column);
        let direction = match key.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        parts.push(format!("{} {}", config.db_column, direction));
    }
    parts.push(NATURAL_ORDER.to_string());
    parts.join(", ")
}
