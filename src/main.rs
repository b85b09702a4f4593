// src/main.rs
mod api;
mod config;
mod db;
mod error;
mod models;
mod price;
mod service;
mod store;
mod validator;

use crate::config::{Config, StoreBackend};
use crate::price::PriceFetcher;
use crate::service::PortfolioService;
use crate::store::{MemoryStore, Store};
use env_logger::{Builder, Env};
use log::{error, info};
use std::sync::Arc;

async fn build_store(backend: &StoreBackend) -> Result<Arc<dyn Store>, error::StoreError> {
    match backend {
        StoreBackend::Memory => {
            info!("Using in-memory store.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Scylla { node } => {
            let session = db::init(node).await?;
            Ok(Arc::new(db::ScyllaStore::new(session)))
        }
    }
}

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let store = match build_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize store: {}", e);
            return;
        }
    };

    let fetcher = match PriceFetcher::new(config.price_api.clone()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to build price API client: {}", e);
            return;
        }
    };

    info!("Starting the stock portfolio service...");
    let service = PortfolioService::new(store, fetcher);
    let api = api::routes(service);

    info!("Server running on http://{}", config.bind_addr);
    warp::serve(api).run(config.bind_addr).await;
}
