// src/service.rs
use crate::error::{ServiceError, ValidationError};
use crate::models::{
    round2, HoldingUpdate, NewHolding, PortfolioValueReport, StockHolding, StockValue,
    UpdateOutcome,
};
use crate::price::PriceLookup;
use crate::store::{HoldingFilter, Store};
use crate::validator::{validate, ADD_REQUIRED_FIELDS};
use chrono::Local;
use futures::future::try_join_all;
use log::{error, info};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of an update request that found its holding.
#[derive(Debug, PartialEq)]
pub enum UpdateResult {
    Unchanged,
    Updated(String),
}

#[derive(Clone)]
pub struct PortfolioService {
    store: Arc<dyn Store>,
    prices: Arc<dyn PriceLookup>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn Store>, prices: Arc<dyn PriceLookup>) -> Self {
        PortfolioService { store, prices }
    }

    pub async fn add_holding(
        &self,
        record: &Map<String, Value>,
    ) -> Result<StockHolding, ServiceError> {
        validate(record, ADD_REQUIRED_FIELDS, true, self.store.as_ref()).await?;
        let holding = NewHolding::from_record(record)?;
        let stored = self.store.insert(holding).await?;
        info!("Added stock {} with id {}", stored.symbol, stored.id);
        Ok(stored)
    }

    pub async fn get_holding(&self, id: &str) -> Result<StockHolding, ServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn list_holdings(
        &self,
        query: &HashMap<String, String>,
    ) -> Result<Vec<StockHolding>, ServiceError> {
        let filter = HoldingFilter::from_query(query)?;
        Ok(self.store.find(&filter).await?)
    }

    pub async fn update_holding(
        &self,
        id: &str,
        record: &Map<String, Value>,
    ) -> Result<UpdateResult, ServiceError> {
        validate(record, &[], false, self.store.as_ref()).await?;
        if let Some(payload_id) = record.get("id") {
            let payload_id = match payload_id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if payload_id != id {
                let err = ValidationError::IdMismatch {
                    path: id.to_string(),
                    payload: payload_id,
                };
                error!("Validation failed: {}", err);
                return Err(err.into());
            }
        }

        let update = HoldingUpdate::from_record(record);
        match self.store.update_fields(id, &update).await? {
            UpdateOutcome::NotFound => Err(ServiceError::NotFound(id.to_string())),
            UpdateOutcome::Unchanged => {
                info!("No changes made for stock with id '{}'", id);
                Ok(UpdateResult::Unchanged)
            }
            UpdateOutcome::Modified => {
                info!("Updated stock with id '{}'", id);
                Ok(UpdateResult::Updated(id.to_string()))
            }
        }
    }

    pub async fn delete_holding(&self, id: &str) -> Result<(), ServiceError> {
        if self.store.delete(id).await? {
            info!("Deleted stock with id '{}'", id);
            Ok(())
        } else {
            Err(ServiceError::NotFound(id.to_string()))
        }
    }

    async fn price_of(&self, symbol: &str) -> Result<f64, ServiceError> {
        self.prices
            .fetch_current_price(symbol)
            .await
            .map_err(|source| ServiceError::Price {
                symbol: symbol.to_string(),
                source,
            })
    }

    pub async fn compute_holding_value(&self, id: &str) -> Result<StockValue, ServiceError> {
        let holding = self.get_holding(id).await?;
        let current_price = round2(self.price_of(&holding.symbol).await?);
        Ok(StockValue {
            stock_value: round2(holding.shares as f64 * current_price),
            symbol: holding.symbol,
            current_price,
        })
    }

    /// Prices every holding concurrently; the first lookup failure aborts the
    /// whole computation. Rounds once, on the total.
    pub async fn compute_portfolio_value(&self) -> Result<f64, ServiceError> {
        let holdings = self.store.find(&HoldingFilter::all()).await?;
        let values = try_join_all(holdings.iter().map(|holding| async move {
            let price = self.price_of(&holding.symbol).await?;
            Ok::<_, ServiceError>(holding.shares as f64 * price)
        }))
        .await?;
        Ok(round2(values.iter().sum()))
    }

    pub async fn portfolio_report(&self) -> Result<PortfolioValueReport, ServiceError> {
        let portfolio_value = self.compute_portfolio_value().await?;
        Ok(PortfolioValueReport {
            date: Local::now().format("%d-%m-%Y").to_string(),
            portfolio_value,
        })
    }
}
