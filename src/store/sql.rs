use std::fmt::Write;

use crate::model::{CompareOp, Operand, Predicate, Record, RepositoryError, RepositoryResult, Value};
use crate::query::{Direction, QueryPlan, ResultShape};

// ============================================================================
// SQL Rendering
// ============================================================================
//
// Renders query plans and change-set entries to parameterised PostgreSQL.
//
// - identifiers are checked against Record::FIELDS and double-quoted
// - constants become $n parameters; NULL is written as a literal
// - ordered comparisons against a text constant use COLLATE "C" to match
//   in-memory byte order; field-to-field comparisons keep the column
//   collation, since column types are unknown here
// - NULLs sort last ascending and first descending, as in memory
// - the identity column is always the final sort key, so LIMIT/OFFSET
//   windows are deterministic
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<Value>,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct SqlWriter {
    text: String,
    params: Vec<Value>,
    columns: &'static [&'static str],
}

impl SqlWriter {
    fn new(columns: &'static [&'static str]) -> Self {
        Self {
            text: String::new(),
            params: Vec::new(),
            columns,
        }
    }

    fn push(&mut self, sql: &str) {
        self.text.push_str(sql);
    }

    fn column(&mut self, name: &str) -> RepositoryResult<()> {
        if !self.columns.contains(&name) {
            return Err(RepositoryError::validation(format!("unknown column '{}'", name)));
        }
        self.text.push_str(&quote_ident(name));
        Ok(())
    }

    fn param(&mut self, value: &Value) {
        if value.is_null() {
            self.text.push_str("NULL");
            return;
        }
        self.params.push(value.clone());
        let _ = write!(self.text, "${}", self.params.len());
    }

    fn operand(&mut self, operand: &Operand) -> RepositoryResult<()> {
        match operand {
            Operand::Field(name) => self.column(name),
            Operand::Constant(value) => {
                self.param(value);
                Ok(())
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> RepositoryResult<()> {
        match predicate {
            Predicate::True => self.push("TRUE"),
            Predicate::Compare { left, op, right } => {
                let text_operand = [left, right]
                    .iter()
                    .any(|o| matches!(o, Operand::Constant(Value::Text(_))));

                self.push("(");
                self.operand(left)?;
                if text_operand && op.is_ordering() {
                    self.push(" COLLATE \"C\"");
                }
                self.push(" ");
                self.push(op.as_sql());
                self.push(" ");
                self.operand(right)?;
                self.push(")");
            }
            Predicate::IsNull(operand) => {
                self.push("(");
                self.operand(operand)?;
                self.push(" IS NULL)");
            }
            Predicate::And(parts) => self.junction(parts, " AND ", "TRUE")?,
            Predicate::Or(parts) => self.junction(parts, " OR ", "FALSE")?,
            Predicate::Not(inner) => {
                self.push("(NOT ");
                self.predicate(inner)?;
                self.push(")");
            }
        }
        Ok(())
    }

    fn junction(&mut self, parts: &[Predicate], separator: &str, empty: &str) -> RepositoryResult<()> {
        if parts.is_empty() {
            self.push(empty);
            return Ok(());
        }

        self.push("(");
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                self.push(separator);
            }
            self.predicate(part)?;
        }
        self.push(")");
        Ok(())
    }

    fn finish(self) -> SqlStatement {
        SqlStatement {
            text: self.text,
            params: self.params,
        }
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_limit(plan: &QueryPlan, shape: &ResultShape) -> Option<u64> {
    let cap = match shape {
        ResultShape::FirstOrDefault => Some(1),
        ResultShape::Single => Some(2),
        _ => None,
    };
    match (plan.take(), cap) {
        (Some(take), Some(cap)) => Some(take.min(cap)),
        (take, cap) => take.or(cap),
    }
}

/// The SELECT for a plan, wrapped as needed for the requested shape.
pub fn select_statement<T: Record>(table: &str, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<SqlStatement> {
    let mut writer = SqlWriter::new(T::FIELDS);

    match shape {
        ResultShape::Count => writer.push("SELECT COUNT(*) FROM ("),
        ResultShape::Any => writer.push("SELECT EXISTS ("),
        ResultShape::Sum(field) | ResultShape::Average(field) => {
            let function = if matches!(shape, ResultShape::Sum(_)) { "SUM" } else { "AVG" };
            writer.push("SELECT CAST(");
            writer.push(function);
            writer.push("(q.");
            writer.column(field)?;
            writer.push(") AS DOUBLE PRECISION) FROM (");
        }
        ResultShape::ToList | ResultShape::FirstOrDefault | ResultShape::Single => {}
    }

    writer.push("SELECT ");
    writer.push(&column_list(T::FIELDS));
    writer.push(" FROM ");
    writer.push(&quote_ident(table));
    writer.push(" WHERE ");
    writer.predicate(&plan.predicate())?;

    writer.push(" ORDER BY ");
    for key in plan.order() {
        writer.column(&key.field)?;
        writer.push(match key.direction {
            Direction::Ascending => " ASC NULLS LAST, ",
            Direction::Descending => " DESC NULLS FIRST, ",
        });
    }
    writer.column(T::ID_FIELD)?;
    writer.push(" ASC");

    if let Some(limit) = row_limit(plan, shape) {
        writer.push(&format!(" LIMIT {}", limit));
    }
    if plan.skip() > 0 {
        writer.push(&format!(" OFFSET {}", plan.skip()));
    }

    match shape {
        ResultShape::Count | ResultShape::Sum(_) | ResultShape::Average(_) => writer.push(") AS q"),
        ResultShape::Any => writer.push(")"),
        ResultShape::ToList | ResultShape::FirstOrDefault | ResultShape::Single => {}
    }

    Ok(writer.finish())
}

fn field_value<T: Record>(record: &T, column: &str) -> Value {
    record.field(column).unwrap_or(Value::Null)
}

pub fn insert_statement<T: Record>(table: &str, record: &T) -> SqlStatement {
    let mut writer = SqlWriter::new(T::FIELDS);
    writer.push("INSERT INTO ");
    writer.push(&quote_ident(table));
    writer.push(" (");
    writer.push(&column_list(T::FIELDS));
    writer.push(") VALUES (");
    for (index, column) in T::FIELDS.iter().enumerate() {
        if index > 0 {
            writer.push(", ");
        }
        writer.param(&field_value(record, column));
    }
    writer.push(")");
    writer.finish()
}

pub fn update_statement<T: Record>(table: &str, record: &T) -> SqlStatement {
    let mut writer = SqlWriter::new(T::FIELDS);
    writer.push("UPDATE ");
    writer.push(&quote_ident(table));
    writer.push(" SET ");
    let columns = T::FIELDS.iter().filter(|column| **column != T::ID_FIELD);
    for (index, column) in columns.enumerate() {
        if index > 0 {
            writer.push(", ");
        }
        writer.push(&quote_ident(column));
        writer.push(" = ");
        writer.param(&field_value(record, column));
    }
    writer.push(" WHERE ");
    writer.push(&quote_ident(T::ID_FIELD));
    writer.push(" = ");
    writer.param(&record.id().into());
    writer.finish()
}

pub fn delete_statement<T: Record>(table: &str, record: &T) -> SqlStatement {
    let mut writer = SqlWriter::new(T::FIELDS);
    writer.push("DELETE FROM ");
    writer.push(&quote_ident(table));
    writer.push(" WHERE ");
    writer.push(&quote_ident(T::ID_FIELD));
    writer.push(" = ");
    writer.param(&record.id().into());
    writer.finish()
}
