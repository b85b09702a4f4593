// src/store.rs
use crate::error::{StoreError, ValidationError};
use crate::models::{HoldingUpdate, NewHolding, StockHolding, UpdateOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A single `<field>=<value>` match condition from a list query.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldMatch {
    Id(String),
    Symbol(String),
    Name(String),
    PurchaseDate(String),
    PurchasePrice(f64),
    Shares(f64),
    /// A field holdings do not have; matches nothing.
    Unknown(String),
}

impl FieldMatch {
    fn matches(&self, holding: &StockHolding) -> bool {
        match self {
            FieldMatch::Id(v) => &holding.id == v,
            FieldMatch::Symbol(v) => &holding.symbol == v,
            FieldMatch::Name(v) => &holding.name == v,
            FieldMatch::PurchaseDate(v) => &holding.purchase_date == v,
            FieldMatch::PurchasePrice(v) => holding.purchase_price == *v,
            FieldMatch::Shares(v) => holding.shares as f64 == *v,
            FieldMatch::Unknown(_) => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HoldingFilter {
    conditions: Vec<FieldMatch>,
}

impl HoldingFilter {
    pub fn all() -> Self {
        HoldingFilter::default()
    }

    pub fn by_symbol(symbol: &str) -> Self {
        HoldingFilter {
            conditions: vec![FieldMatch::Symbol(symbol.to_string())],
        }
    }

    /// Builds a filter from query-string pairs. Numeric fields must parse.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut conditions = Vec::with_capacity(params.len());
        for (key, value) in params {
            let numeric = |field: &str| {
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ValidationError::InvalidFilter {
                        field: field.to_string(),
                    })
            };
            let condition = match key.as_str() {
                "id" => FieldMatch::Id(value.clone()),
                "symbol" => FieldMatch::Symbol(value.clone()),
                "name" => FieldMatch::Name(value.clone()),
                "purchase_date" => FieldMatch::PurchaseDate(value.clone()),
                "purchase_price" => FieldMatch::PurchasePrice(numeric(key.as_str())?),
                "shares" => FieldMatch::Shares(numeric(key.as_str())?),
                other => FieldMatch::Unknown(other.to_string()),
            };
            conditions.push(condition);
        }
        Ok(HoldingFilter { conditions })
    }

    pub fn matches(&self, holding: &StockHolding) -> bool {
        self.conditions.iter().all(|c| c.matches(holding))
    }
}

/// Persistence for holdings, keyed by the server-assigned id.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, holding: NewHolding) -> Result<StockHolding, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<StockHolding>, StoreError>;

    async fn find(&self, filter: &HoldingFilter) -> Result<Vec<StockHolding>, StoreError>;

    async fn update_fields(
        &self,
        id: &str,
        update: &HoldingUpdate,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Returns whether a holding was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn symbol_exists(&self, symbol: &str) -> Result<bool, StoreError> {
        Ok(!self.find(&HoldingFilter::by_symbol(symbol)).await?.is_empty())
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Keeps holdings in insertion order in process memory.
#[derive(Default)]
pub struct MemoryStore {
    holdings: RwLock<Vec<StockHolding>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, holding: NewHolding) -> Result<StockHolding, StoreError> {
        let stored = holding.into_holding(new_id());
        self.holdings.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StockHolding>, StoreError> {
        let holdings = self.holdings.read().await;
        Ok(holdings.iter().find(|h| h.id == id).cloned())
    }

    async fn find(&self, filter: &HoldingFilter) -> Result<Vec<StockHolding>, StoreError> {
        let holdings = self.holdings.read().await;
        Ok(holdings.iter().filter(|h| filter.matches(h)).cloned().collect())
    }

    async fn update_fields(
        &self,
        id: &str,
        update: &HoldingUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut holdings = self.holdings.write().await;
        let Some(existing) = holdings.iter_mut().find(|h| h.id == id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        let updated = update.apply_to(existing);
        if updated == *existing {
            return Ok(UpdateOutcome::Unchanged);
        }
        *existing = updated;
        Ok(UpdateOutcome::Modified)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut holdings = self.holdings.write().await;
        let before = holdings.len();
        holdings.retain(|h| h.id != id);
        Ok(holdings.len() != before)
    }
}
