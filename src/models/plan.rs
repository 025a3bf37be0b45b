use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry a user can subscribe to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub features: Vec<String>,
    pub duration_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
