//! Compiles MongoDB-style metadata filters into parameterized SQLite predicates
//! over a JSON text column.
//!
//! Placeholders are numbered (`?N`) so the fragment can be spliced after the
//! statement's own parameters. Each leaf binds the JSON path of its field plus
//! its operand(s); `$exists` binds only the path.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("metadata filter must be an object")]
    NotAnObject,
    #[error("`{operator}` expects an array of filter objects")]
    InvalidLogical { operator: String },
    #[error("unknown filter operator `{operator}` on field `{field}`")]
    UnknownOperator { field: String, operator: String },
    #[error("operator `{operator}` on field `{field}` expects {expected}")]
    InvalidOperand {
        field: String,
        operator: String,
        expected: String,
    },
    #[error("invalid filter field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl CompiledFilter {
    pub fn always_true() -> Self {
        Self {
            sql: "1=1".to_string(),
            params: Vec::new(),
        }
    }

    pub fn next_param_index(&self, first_param_index: usize) -> usize {
        first_param_index + self.params.len()
    }
}

pub fn compile_filter(
    filter: &Value,
    column: &str,
    first_param_index: usize,
) -> Result<CompiledFilter, FilterError> {
    let Value::Object(map) = filter else {
        return Err(FilterError::NotAnObject);
    };
    let mut compiler = FilterCompiler {
        column,
        next_index: first_param_index,
        params: Vec::new(),
    };
    let sql = compiler.compile_object(map)?;
    Ok(CompiledFilter {
        sql,
        params: compiler.params,
    })
}

struct FilterCompiler<'a> {
    column: &'a str,
    next_index: usize,
    params: Vec<SqlValue>,
}

impl FilterCompiler<'_> {
    fn compile_object(&mut self, map: &Map<String, Value>) -> Result<String, FilterError> {
        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => self.compile_logical("$and", "AND", value)?,
                "$or" => self.compile_logical("$or", "OR", value)?,
                other if other.starts_with('$') => {
                    return Err(FilterError::UnknownOperator {
                        field: "<root>".to_string(),
                        operator: other.to_string(),
                    })
                }
                field => self.compile_field(field, value)?,
            };
            clauses.push(clause);
        }
        Ok(join_clauses(clauses, "AND"))
    }

    fn compile_logical(
        &mut self,
        operator: &str,
        joiner: &str,
        value: &Value,
    ) -> Result<String, FilterError> {
        let Value::Array(items) = value else {
            return Err(FilterError::InvalidLogical {
                operator: operator.to_string(),
            });
        };
        if items.is_empty() {
            return Ok("1=1".to_string());
        }
        let mut clauses = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(sub) = item else {
                return Err(FilterError::InvalidLogical {
                    operator: operator.to_string(),
                });
            };
            clauses.push(self.compile_object(sub)?);
        }
        Ok(format!("({})", clauses.join(&format!(" {joiner} "))))
    }

    fn compile_field(&mut self, field: &str, value: &Value) -> Result<String, FilterError> {
        validate_field(field)?;
        let Value::Object(operators) = value else {
            return self.compile_operator(field, "$eq", value);
        };
        if operators.is_empty() {
            return Err(FilterError::InvalidOperand {
                field: field.to_string(),
                operator: "{}".to_string(),
                expected: "at least one operator".to_string(),
            });
        }
        let mut clauses = Vec::with_capacity(operators.len());
        for (operator, operand) in operators {
            clauses.push(self.compile_operator(field, operator, operand)?);
        }
        Ok(join_clauses(clauses, "AND"))
    }

    fn compile_operator(
        &mut self,
        field: &str,
        operator: &str,
        operand: &Value,
    ) -> Result<String, FilterError> {
        match operator {
            "$eq" | "$ne" | "$contains" => {
                let text = scalar_text(field, operator, operand)?;
                let path = self.bind(json_path(field));
                let value = self.bind(SqlValue::Text(text));
                let expr = text_expr(self.column, path);
                Ok(match operator {
                    "$eq" => format!("{expr} = ?{value}"),
                    "$ne" => format!("{expr} != ?{value}"),
                    _ => format!("instr({expr}, ?{value}) > 0"),
                })
            }
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let Some(number) = operand.as_f64() else {
                    return Err(invalid_operand(field, operator, "a number"));
                };
                let path = self.bind(json_path(field));
                let value = self.bind(SqlValue::Real(number));
                let comparator = match operator {
                    "$gt" => ">",
                    "$gte" => ">=",
                    "$lt" => "<",
                    _ => "<=",
                };
                Ok(format!(
                    "CAST(json_extract({}, ?{path}) AS REAL) {comparator} ?{value}",
                    self.column
                ))
            }
            "$in" | "$nin" => {
                let Value::Array(items) = operand else {
                    return Err(invalid_operand(field, operator, "an array"));
                };
                let texts = items
                    .iter()
                    .map(|item| scalar_text(field, operator, item))
                    .collect::<Result<Vec<_>, _>>()?;
                if texts.is_empty() {
                    return Ok(if operator == "$in" { "1=0" } else { "1=1" }.to_string());
                }
                let path = self.bind(json_path(field));
                let placeholders = texts
                    .into_iter()
                    .map(|text| format!("?{}", self.bind(SqlValue::Text(text))))
                    .collect::<Vec<_>>()
                    .join(", ");
                let expr = text_expr(self.column, path);
                Ok(if operator == "$in" {
                    format!("{expr} IN ({placeholders})")
                } else {
                    format!("{expr} NOT IN ({placeholders})")
                })
            }
            "$exists" => {
                let Value::Bool(expected) = operand else {
                    return Err(invalid_operand(field, operator, "a boolean"));
                };
                let path = self.bind(json_path(field));
                let check = if *expected { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("json_type({}, ?{path}) {check}", self.column))
            }
            other => Err(FilterError::UnknownOperator {
                field: field.to_string(),
                operator: other.to_string(),
            }),
        }
    }

    fn bind(&mut self, value: SqlValue) -> usize {
        let index = self.next_index;
        self.params.push(value);
        self.next_index += 1;
        index
    }
}

fn join_clauses(clauses: Vec<String>, joiner: &str) -> String {
    match clauses.len() {
        0 => "1=1".to_string(),
        1 => clauses.into_iter().next().unwrap_or_default(),
        _ => format!("({})", clauses.join(&format!(" {joiner} "))),
    }
}

// Booleans render as `true`/`false` so text comparison matches JSON semantics.
fn text_expr(column: &str, path_index: usize) -> String {
    format!(
        "(CASE json_type({column}, ?{path_index}) WHEN 'true' THEN 'true' WHEN 'false' THEN 'false' ELSE CAST(json_extract({column}, ?{path_index}) AS TEXT) END)"
    )
}

fn json_path(field: &str) -> SqlValue {
    SqlValue::Text(format!("$.\"{field}\""))
}

fn scalar_text(field: &str, operator: &str, value: &Value) -> Result<String, FilterError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(invalid_operand(
            field,
            operator,
            "a string, number or boolean",
        )),
    }
}

fn invalid_operand(field: &str, operator: &str, expected: &str) -> FilterError {
    FilterError::InvalidOperand {
        field: field.to_string(),
        operator: operator.to_string(),
        expected: expected.to_string(),
    }
}

fn validate_field(field: &str) -> Result<(), FilterError> {
    if field.trim().is_empty() {
        return Err(FilterError::InvalidField {
            field: field.to_string(),
            reason: "field name must be non-empty".to_string(),
        });
    }
    if field.contains('"') || field.contains('\\') {
        return Err(FilterError::InvalidField {
            field: field.to_string(),
            reason: "field name must not contain quotes or backslashes".to_string(),
        });
    }
    Ok(())
}
