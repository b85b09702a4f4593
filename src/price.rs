// src/price.rs
use crate::error::PriceError;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.api-ninjas.com/v1/stockprice";

#[derive(Clone, Debug)]
pub struct PriceApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl PriceApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        PriceApiConfig {
            base_url: DEFAULT_PRICE_API_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Current market price for `symbol`.
    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, PriceError>;
}

#[derive(Deserialize)]
struct PriceResponse {
    price: Option<f64>,
}

pub struct PriceFetcher {
    client: Client,
    config: PriceApiConfig,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

impl PriceFetcher {
    pub fn new(config: PriceApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(PriceFetcher { client, config })
    }

    async fn request(&self, symbol: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(&self.config.base_url)
            .query(&[("ticker", symbol)])
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
    }

    async fn read_price(
        &self,
        symbol: &str,
        response: reqwest::Response,
    ) -> Result<f64, PriceError> {
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PriceError::UnexpectedStatus {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        // Unknown tickers still come back as 200, just without a price.
        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PriceError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        let parsed = serde_json::from_value::<PriceResponse>(body)
            .ok()
            .and_then(|r| r.price);

        // A zero quote means the API has no market price for the ticker.
        match parsed {
            None => Err(PriceError::UnknownSymbol(symbol.to_string())),
            Some(price) if price == 0.0 => Err(PriceError::UnknownSymbol(symbol.to_string())),
            Some(price) if price < 0.0 || !price.is_finite() => {
                Err(PriceError::InvalidResponse {
                    symbol: symbol.to_string(),
                    reason: format!("price {} is not a valid market price", price),
                })
            }
            Some(price) => Ok(price),
        }
    }
}

#[async_trait]
impl PriceLookup for PriceFetcher {
    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, PriceError> {
        let symbol = normalize_symbol(symbol);
        let mut attempt = 1;
        loop {
            debug!("Fetching price for {} (attempt {})", symbol, attempt);
            match self.request(&symbol).await {
                Ok(response) => {
                    let price = self.read_price(&symbol, response).await?;
                    info!("Fetched price for {}: {}", symbol, price);
                    return Ok(price);
                }
                Err(e) if attempt < self.config.max_attempts => {
                    warn!(
                        "Price request for {} failed (attempt {}/{}): {}",
                        symbol, attempt, self.config.max_attempts, e
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PriceError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use warp::Filter;

    fn test_config(addr: SocketAddr) -> PriceApiConfig {
        PriceApiConfig {
            base_url: format!("http://{}/v1/stockprice", addr),
            api_key: "test-key".to_string(),
            timeout: Duration::from_millis(200),
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    /// Serves `body` for every request and counts the hits.
    fn serve_json(body: serde_json::Value) -> (SocketAddr, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let route = warp::path!("v1" / "stockprice")
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::header::<String>("x-api-key"))
            .map(move |query: HashMap<String, String>, key: String| {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut body = body.clone();
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("ticker".into(), query.get("ticker").cloned().into());
                    obj.insert("key".into(), key.into());
                }
                warp::reply::json(&body)
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, hits)
    }

    #[tokio::test]
    async fn returns_price_for_known_symbol() {
        let (addr, hits) = serve_json(serde_json::json!({"price": 189.5}));
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let price = fetcher.fetch_current_price(" aapl ").await.unwrap();
        assert_eq!(price, 189.5);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_price_is_unknown_symbol_without_retry() {
        let (addr, hits) = serve_json(serde_json::json!({"name": "nothing here"}));
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("zzzz").await.unwrap_err();
        assert!(matches!(err, PriceError::UnknownSymbol(ref s) if s == "ZZZZ"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_array_body_is_unknown_symbol() {
        let (addr, hits) = serve_json(serde_json::json!([]));
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("ZZZZ").await.unwrap_err();
        assert!(matches!(err, PriceError::UnknownSymbol(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let (addr, _) = serve_json(serde_json::json!({"price": -4.0}));
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("AAPL").await.unwrap_err();
        assert!(matches!(err, PriceError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn zero_price_is_unknown_symbol() {
        let (addr, hits) = serve_json(serde_json::json!({"price": 0.0}));
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("DEAD").await.unwrap_err();
        assert!(matches!(err, PriceError::UnknownSymbol(ref s) if s == "DEAD"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_ok_status_fails_without_retry() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let route = warp::path!("v1" / "stockprice").map(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status("down", warp::http::StatusCode::SERVICE_UNAVAILABLE)
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("AAPL").await.unwrap_err();
        assert!(matches!(
            err,
            PriceError::UnexpectedStatus { status: 503, .. }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_retry_three_times_then_give_up() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let route = warp::path!("v1" / "stockprice").and_then(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, warp::Rejection>(warp::reply::json(&serde_json::json!({"price": 1.0})))
            }
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("AAPL").await.unwrap_err();
        assert!(matches!(err, PriceError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn connection_refused_exhausts_retries() {
        // Grab a free port, then close it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let fetcher = PriceFetcher::new(test_config(addr)).unwrap();

        let err = fetcher.fetch_current_price("AAPL").await.unwrap_err();
        assert!(matches!(err, PriceError::RetriesExhausted { attempts: 3, .. }));
    }
}
