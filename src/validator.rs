// src/validator.rs
use crate::error::{ServiceError, ValidationError};
use crate::models::{shares_from_value, stored_price};
use crate::store::Store;
use log::{error, info};
use serde_json::{Map, Value};

pub const ADD_REQUIRED_FIELDS: &[&str] = &["symbol", "purchase_price", "shares"];

/// String form of a field, as the required-field check sees it.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn check_required(
    record: &Map<String, Value>,
    required_fields: &[&str],
) -> Result<(), ValidationError> {
    for field in required_fields {
        let present = record
            .get(*field)
            .map(|v| !field_text(v).trim().is_empty())
            .unwrap_or(false);
        if !present {
            return Err(ValidationError::MissingField(field.to_string()));
        }
    }
    Ok(())
}

/// A symbol must contain a letter and no lowercase characters.
pub fn check_symbol(value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::String(s)
            if s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase) =>
        {
            Ok(())
        }
        other => Err(ValidationError::InvalidSymbol(other.to_string())),
    }
}

/// Checks the price as it will be stored, after rounding to cents.
pub fn check_price(value: &Value) -> Result<(), ValidationError> {
    match stored_price(value) {
        Some(price) if price > 0.0 => Ok(()),
        _ => Err(ValidationError::InvalidPrice(value.to_string())),
    }
}

pub fn check_shares(value: &Value) -> Result<(), ValidationError> {
    match shares_from_value(value) {
        Some(shares) if shares > 0 => Ok(()),
        _ => Err(ValidationError::InvalidShares(value.to_string())),
    }
}

/// Runs the format and value checks on whichever of the checked fields the
/// record carries.
pub fn check_fields(record: &Map<String, Value>) -> Result<(), ValidationError> {
    if let Some(symbol) = record.get("symbol") {
        check_symbol(symbol)?;
    }
    if let Some(price) = record.get("purchase_price") {
        check_price(price)?;
    }
    if let Some(shares) = record.get("shares") {
        check_shares(shares)?;
    }
    Ok(())
}

/// Validates a candidate record against the portfolio held in `store`.
///
/// `check_uniqueness` is set on the add path only; updates may reuse a symbol
/// that another holding already carries.
pub async fn validate(
    record: &Map<String, Value>,
    required_fields: &[&str],
    check_uniqueness: bool,
    store: &dyn Store,
) -> Result<(), ServiceError> {
    let result = validate_inner(record, required_fields, check_uniqueness, store).await;
    match &result {
        Ok(()) => info!("Stock data validation passed."),
        Err(ServiceError::Validation(reason)) => error!("Validation failed: {}", reason),
        Err(e) => error!("Validation could not complete: {}", e),
    }
    result
}

async fn validate_inner(
    record: &Map<String, Value>,
    required_fields: &[&str],
    check_uniqueness: bool,
    store: &dyn Store,
) -> Result<(), ServiceError> {
    check_required(record, required_fields)?;

    if check_uniqueness {
        if let Some(Value::String(symbol)) = record.get("symbol") {
            if store.symbol_exists(symbol).await? {
                return Err(ValidationError::DuplicateSymbol(symbol.clone()).into());
            }
        }
    }

    check_fields(record)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewHolding;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn valid() -> Map<String, Value> {
        record(json!({"symbol": "AAPL", "purchase_price": 150.0, "shares": 10}))
    }

    #[test]
    fn missing_or_blank_required_fields_fail() {
        for field in ADD_REQUIRED_FIELDS {
            let mut missing = valid();
            missing.remove(*field);
            assert_eq!(
                check_required(&missing, ADD_REQUIRED_FIELDS),
                Err(ValidationError::MissingField(field.to_string()))
            );

            let mut blank = valid();
            blank.insert(field.to_string(), json!("   "));
            assert!(check_required(&blank, ADD_REQUIRED_FIELDS).is_err());

            let mut null = valid();
            null.insert(field.to_string(), Value::Null);
            assert!(check_required(&null, ADD_REQUIRED_FIELDS).is_err());
        }
        assert!(check_required(&valid(), ADD_REQUIRED_FIELDS).is_ok());
    }

    #[test]
    fn symbol_must_be_uppercase() {
        for bad in [json!("aapl"), json!("Aapl"), json!("aAPL"), json!("123"), json!(42)] {
            assert!(check_symbol(&bad).is_err(), "{} should fail", bad);
        }
        for good in [json!("AAPL"), json!("MSFT"), json!("BRK.B")] {
            assert!(check_symbol(&good).is_ok(), "{} should pass", good);
        }
    }

    #[test]
    fn price_must_be_positive_number() {
        for bad in [json!(0), json!(-1.5), json!("abc"), json!(null), json!([1])] {
            assert!(check_price(&bad).is_err(), "{} should fail", bad);
        }
        assert!(check_price(&json!(0.001)).is_err());
        assert!(check_price(&json!("0.004")).is_err());
        assert!(check_price(&json!(150.0)).is_ok());
        assert!(check_price(&json!(1e307)).is_ok());
        assert!(check_price(&json!("150.0")).is_ok());
    }

    #[test]
    fn shares_must_be_positive_integer() {
        for bad in [json!(0), json!(-3), json!(2.5), json!("ten"), json!(true)] {
            assert!(check_shares(&bad).is_err(), "{} should fail", bad);
        }
        assert!(check_shares(&json!(10)).is_ok());
        assert!(check_shares(&json!("10")).is_ok());
    }

    #[tokio::test]
    async fn add_path_rejects_existing_symbol() {
        let store = MemoryStore::new();
        store
            .insert(NewHolding::from_record(&valid()).unwrap())
            .await
            .unwrap();

        let err = validate(&valid(), ADD_REQUIRED_FIELDS, true, &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::DuplicateSymbol(ref s)) if s == "AAPL"
        ));
    }

    #[tokio::test]
    async fn update_path_allows_existing_symbol() {
        let store = MemoryStore::new();
        store
            .insert(NewHolding::from_record(&valid()).unwrap())
            .await
            .unwrap();

        assert!(validate(&valid(), &[], false, &store).await.is_ok());
    }

    #[tokio::test]
    async fn update_path_still_checks_formats() {
        let store = MemoryStore::new();
        let update = record(json!({"symbol": "msft"}));

        let err = validate(&update, &[], false, &store).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::InvalidSymbol(_))
        ));
    }

    #[tokio::test]
    async fn update_path_checks_price_and_shares() {
        let store = MemoryStore::new();

        for (update, expect_price) in [
            (json!({"purchase_price": -1}), true),
            (json!({"purchase_price": 0.001}), true),
            (json!({"shares": 2.5}), false),
            (json!({"shares": 0}), false),
        ] {
            let err = validate(&record(update.clone()), &[], false, &store)
                .await
                .unwrap_err();
            match err {
                ServiceError::Validation(ValidationError::InvalidPrice(_)) => {
                    assert!(expect_price, "{} should fail on shares", update)
                }
                ServiceError::Validation(ValidationError::InvalidShares(_)) => {
                    assert!(!expect_price, "{} should fail on price", update)
                }
                other => panic!("unexpected error for {}: {}", update, other),
            }
        }
    }
}
