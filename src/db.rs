// src/db.rs
use crate::error::StoreError;
use crate::models::{HoldingUpdate, NewHolding, StockHolding, UpdateOutcome};
use crate::store::{new_id, HoldingFilter, Store};
use async_trait::async_trait;
use log::{info, warn};
use scylla::frame::response::result::Row;
use scylla::frame::value::SerializedValues;
use scylla::{query::Query, Session, SessionBuilder};

const SELECT_COLUMNS: &str =
    "SELECT id, symbol, name, purchase_price, purchase_date, shares FROM stock_portfolio.holdings";

/// Holdings stored in a ScyllaDB table, one row per holding.
pub struct ScyllaStore {
    session: Session,
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub async fn init(node: &str) -> Result<Session, StoreError> {
    let session = SessionBuilder::new()
        .known_node(node)
        .build()
        .await
        .map_err(backend)?;

    session.query("CREATE KEYSPACE IF NOT EXISTS stock_portfolio WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await.map_err(backend)?;
    session.query("CREATE TABLE IF NOT EXISTS stock_portfolio.holdings (id TEXT PRIMARY KEY, symbol TEXT, name TEXT, purchase_price DOUBLE, purchase_date TEXT, shares BIGINT)", &[]).await.map_err(backend)?;

    info!("Successfully connected to ScyllaDB at {}.", node);
    Ok(session)
}

fn text_column(row: &Row, index: usize, name: &str) -> Result<String, StoreError> {
    row.columns
        .get(index)
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_text())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::MalformedRow(format!("missing text column '{}'", name)))
}

pub fn holding_from_row(row: &Row) -> Result<StockHolding, StoreError> {
    let purchase_price = row
        .columns
        .get(3)
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_double())
        .ok_or_else(|| StoreError::MalformedRow("missing column 'purchase_price'".into()))?;
    let shares = row
        .columns
        .get(5)
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_bigint())
        .ok_or_else(|| StoreError::MalformedRow("missing column 'shares'".into()))?;

    Ok(StockHolding {
        id: text_column(row, 0, "id")?,
        symbol: text_column(row, 1, "symbol")?,
        name: text_column(row, 2, "name")?,
        purchase_price,
        purchase_date: text_column(row, 4, "purchase_date")?,
        shares,
    })
}

impl ScyllaStore {
    pub fn new(session: Session) -> Self {
        ScyllaStore { session }
    }

    async fn write(&self, holding: &StockHolding) -> Result<(), StoreError> {
        let query = Query::new(
            "INSERT INTO stock_portfolio.holdings (id, symbol, name, purchase_price, purchase_date, shares) VALUES (?, ?, ?, ?, ?, ?)",
        );
        self.session
            .query(
                query,
                (
                    holding.id.clone(),
                    holding.symbol.clone(),
                    holding.name.clone(),
                    holding.purchase_price,
                    holding.purchase_date.clone(),
                    holding.shares,
                ),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn select_all(&self) -> Result<Vec<StockHolding>, StoreError> {
        let result = self
            .session
            .query(Query::new(SELECT_COLUMNS), &[])
            .await
            .map_err(backend)?;
        let holdings = holdings_from_rows(&result.rows.unwrap_or_default())?;
        info!("Fetched {} holdings from ScyllaDB", holdings.len());
        Ok(holdings)
    }
}

/// Decodes every row; one unreadable row fails the whole read.
pub fn holdings_from_rows(rows: &[Row]) -> Result<Vec<StockHolding>, StoreError> {
    rows.iter().map(holding_from_row).collect()
}

/// Builds a conditional `UPDATE` touching only the provided columns, with the
/// id bound last. `None` when the update carries no fields.
pub fn update_statement(
    id: &str,
    update: &HoldingUpdate,
) -> Result<Option<(String, SerializedValues)>, StoreError> {
    let mut columns = Vec::new();
    let mut values = SerializedValues::new();
    if let Some(symbol) = &update.symbol {
        columns.push("symbol");
        values.add_value(symbol).map_err(backend)?;
    }
    if let Some(name) = &update.name {
        columns.push("name");
        values.add_value(name).map_err(backend)?;
    }
    if let Some(price) = &update.purchase_price {
        columns.push("purchase_price");
        values.add_value(price).map_err(backend)?;
    }
    if let Some(date) = &update.purchase_date {
        columns.push("purchase_date");
        values.add_value(date).map_err(backend)?;
    }
    if let Some(shares) = &update.shares {
        columns.push("shares");
        values.add_value(shares).map_err(backend)?;
    }
    if columns.is_empty() {
        return Ok(None);
    }
    values.add_value(&id).map_err(backend)?;

    let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c)).collect();
    let statement = format!(
        "UPDATE stock_portfolio.holdings SET {} WHERE id = ? IF EXISTS",
        assignments.join(", ")
    );
    Ok(Some((statement, values)))
}

/// Reads the `[applied]` flag a lightweight transaction returns first.
pub fn was_applied(rows: &[Row]) -> Result<bool, StoreError> {
    rows.first()
        .and_then(|row| row.columns.first())
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_boolean())
        .ok_or_else(|| StoreError::MalformedRow("missing column '[applied]'".into()))
}

#[async_trait]
impl Store for ScyllaStore {
    async fn insert(&self, holding: NewHolding) -> Result<StockHolding, StoreError> {
        let stored = holding.into_holding(new_id());
        self.write(&stored).await?;
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StockHolding>, StoreError> {
        let query = Query::new(format!("{} WHERE id = ?", SELECT_COLUMNS));
        let result = self
            .session
            .query(query, (id,))
            .await
            .map_err(backend)?;
        match result.rows.unwrap_or_default().first() {
            Some(row) => holding_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    // The table is keyed by id only, so other filters are applied client side.
    async fn find(&self, filter: &HoldingFilter) -> Result<Vec<StockHolding>, StoreError> {
        let holdings = self.select_all().await?;
        Ok(holdings.into_iter().filter(|h| filter.matches(h)).collect())
    }

    async fn update_fields(
        &self,
        id: &str,
        update: &HoldingUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if update.apply_to(&existing) == existing {
            return Ok(UpdateOutcome::Unchanged);
        }
        let Some((statement, values)) = update_statement(id, update)? else {
            return Ok(UpdateOutcome::Unchanged);
        };

        let result = self
            .session
            .query(Query::new(statement), values)
            .await
            .map_err(backend)?;
        if was_applied(&result.rows.unwrap_or_default())? {
            Ok(UpdateOutcome::Modified)
        } else {
            warn!("Holding {} was deleted before the update applied", id);
            Ok(UpdateOutcome::NotFound)
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let query = Query::new("DELETE FROM stock_portfolio.holdings WHERE id = ? IF EXISTS");
        let result = self.session.query(query, (id,)).await.map_err(backend)?;
        was_applied(&result.rows.unwrap_or_default())
    }
}
