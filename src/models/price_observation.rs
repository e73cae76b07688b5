use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::models::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub id: String,
    pub target_id: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(target_id: String, price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            target_id,
            price,
            observed_at,
        }
    }
}
