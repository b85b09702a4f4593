// src/models.rs
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder stored for optional text fields the client left out.
pub const NOT_AVAILABLE: &str = "NA";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StockHolding {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub purchase_price: f64,
    pub purchase_date: String,
    pub shares: i64,
}

/// A validated add-request, before the store assigns an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewHolding {
    pub symbol: String,
    pub name: String,
    pub purchase_price: f64,
    pub purchase_date: String,
    pub shares: i64,
}

/// Fields to replace on an existing holding. `None` leaves the field alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HoldingUpdate {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub shares: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    NotFound,
    Unchanged,
    Modified,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StockValue {
    pub symbol: String,
    pub current_price: f64,
    pub stock_value: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PortfolioValueReport {
    pub date: String,
    pub portfolio_value: f64,
}

/// Above this magnitude an f64 has no cent digits left to round.
const ROUND2_LIMIT: f64 = 1e15;

pub fn round2(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= ROUND2_LIMIT {
        return value;
    }
    (value * 100.0).round() / 100.0
}

/// Reads a price out of a JSON number or numeric string.
pub fn price_from_value(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    price.is_finite().then_some(price)
}

/// The price as it will be stored: parsed, then rounded to cents.
pub fn stored_price(value: &Value) -> Option<f64> {
    price_from_value(value).map(round2)
}

/// Reads a share count out of a JSON integer or integer string.
pub fn shares_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn text_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

impl NewHolding {
    /// Builds a holding from an add-request record, naming the first field
    /// that cannot be read.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, ValidationError> {
        let symbol = text_field(record, "symbol")
            .ok_or_else(|| ValidationError::MissingField("symbol".to_string()))?;
        let price_value = record
            .get("purchase_price")
            .ok_or_else(|| ValidationError::MissingField("purchase_price".to_string()))?;
        let purchase_price = stored_price(price_value)
            .ok_or_else(|| ValidationError::InvalidPrice(price_value.to_string()))?;
        let shares_value = record
            .get("shares")
            .ok_or_else(|| ValidationError::MissingField("shares".to_string()))?;
        let shares = shares_from_value(shares_value)
            .ok_or_else(|| ValidationError::InvalidShares(shares_value.to_string()))?;

        Ok(NewHolding {
            symbol,
            name: text_field(record, "name").unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            purchase_price,
            purchase_date: text_field(record, "purchase_date")
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            shares,
        })
    }

    pub fn into_holding(self, id: String) -> StockHolding {
        StockHolding {
            id,
            symbol: self.symbol,
            name: self.name,
            purchase_price: self.purchase_price,
            purchase_date: self.purchase_date,
            shares: self.shares,
        }
    }
}

impl HoldingUpdate {
    pub fn from_record(record: &Map<String, Value>) -> Self {
        HoldingUpdate {
            symbol: text_field(record, "symbol"),
            name: text_field(record, "name"),
            purchase_price: record.get("purchase_price").and_then(stored_price),
            purchase_date: text_field(record, "purchase_date"),
            shares: record.get("shares").and_then(shares_from_value),
        }
    }

    /// Returns the holding with the provided fields replaced.
    pub fn apply_to(&self, holding: &StockHolding) -> StockHolding {
        StockHolding {
            id: holding.id.clone(),
            symbol: self.symbol.clone().unwrap_or_else(|| holding.symbol.clone()),
            name: self.name.clone().unwrap_or_else(|| holding.name.clone()),
            purchase_price: self.purchase_price.unwrap_or(holding.purchase_price),
            purchase_date: self
                .purchase_date
                .clone()
                .unwrap_or_else(|| holding.purchase_date.clone()),
            shares: self.shares.unwrap_or(holding.shares),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn new_holding_defaults_optional_fields() {
        let holding = NewHolding::from_record(&record(json!({
            "symbol": "AAPL",
            "purchase_price": 150.456,
            "shares": 10
        })))
        .unwrap();

        assert_eq!(holding.name, "NA");
        assert_eq!(holding.purchase_date, "NA");
        assert_eq!(holding.purchase_price, 150.46);
        assert_eq!(holding.shares, 10);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(price_from_value(&json!("12.5")), Some(12.5));
        assert_eq!(shares_from_value(&json!(" 7 ")), Some(7));
        assert_eq!(shares_from_value(&json!(7.5)), None);
        assert_eq!(price_from_value(&json!(true)), None);
    }

    #[test]
    fn rounding_keeps_huge_prices_finite() {
        assert_eq!(round2(0.001), 0.0);
        assert_eq!(round2(1e307), 1e307);
        assert_eq!(stored_price(&json!(1e307)), Some(1e307));
        assert_eq!(stored_price(&json!(2.345)), Some(2.35));
    }

    #[test]
    fn unreadable_add_record_names_the_field() {
        let err = NewHolding::from_record(&record(json!({
            "symbol": "AAPL",
            "purchase_price": 150.0,
            "shares": "many"
        })))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidShares(_)));

        let err = NewHolding::from_record(&record(json!({"symbol": "AAPL", "shares": 1})))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("purchase_price".to_string()));
    }

    #[test]
    fn update_keeps_fields_not_provided() {
        let holding = StockHolding {
            id: "abc".to_string(),
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            purchase_price: 150.0,
            purchase_date: "01-10-2023".to_string(),
            shares: 10,
        };
        let update = HoldingUpdate::from_record(&record(json!({"shares": "25"})));
        let updated = update.apply_to(&holding);

        assert_eq!(updated.shares, 25);
        assert_eq!(updated.symbol, "AAPL");
        assert_eq!(updated.id, "abc");
    }
}
