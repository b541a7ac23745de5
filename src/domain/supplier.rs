use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::model::{Record, Value};
use crate::store::SqlRecord;

// ============================================================================
// Supplier Record
// ============================================================================

/// DDL for the `suppliers` table; column order follows `FIELDS`.
pub const SUPPLIERS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS suppliers (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    country TEXT NOT NULL,
    rating BIGINT,
    active BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)";

const SAMPLE_COUNTRIES: [&str; 4] = ["NL", "DE", "FR", "SE"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub country: String,
    /// 1..=5, unset until the first review
    pub rating: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub fn new(id: i64, name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            country: country.into(),
            rating: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Deterministic fixture: every third supplier is inactive.
    pub fn sample(id: i64) -> Self {
        Self {
            id,
            name: format!("Supplier {}", id),
            country: SAMPLE_COUNTRIES[id.rem_euclid(4) as usize].to_string(),
            rating: Some(id.rem_euclid(5) + 1),
            active: id % 3 != 0,
            created_at: DateTime::from_timestamp(1_700_000_000 + id * 3_600, 0).unwrap_or_default(),
        }
    }
}

impl Record for Supplier {
    type Id = i64;

    const FIELDS: &'static [&'static str] = &["id", "name", "country", "rating", "active", "created_at"];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "country" => self.country.as_str().into(),
            "rating" => self.rating.into(),
            "active" => self.active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        };
        Some(value)
    }
}

impl<'r> FromRow<'r, PgRow> for Supplier {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            country: row.try_get("country")?,
            rating: row.try_get("rating")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl SqlRecord for Supplier {
    const TABLE: &'static str = "suppliers";
}
