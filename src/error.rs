// src/error.rs
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("'{0}' is missing or empty")]
    MissingField(String),
    #[error("'symbol' must be an uppercase string, got {0}")]
    InvalidSymbol(String),
    #[error("'purchase_price' must be a positive number, got {0}")]
    InvalidPrice(String),
    #[error("'shares' must be a positive integer, got {0}")]
    InvalidShares(String),
    #[error("stock with symbol '{0}' already exists")]
    DuplicateSymbol(String),
    #[error("stock id in path '{path}' does not match id in payload '{payload}'")]
    IdMismatch { path: String, payload: String },
    #[error("invalid value for filter '{field}': expected a numeric value")]
    InvalidFilter { field: String },
}

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("invalid stock symbol: {0}")]
    UnknownSymbol(String),
    #[error("unexpected status code {status} for {symbol}")]
    UnexpectedStatus { symbol: String, status: u16 },
    #[error("invalid price response for {symbol}: {reason}")]
    InvalidResponse { symbol: String, reason: String },
    #[error("price request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("stock with id '{0}' not found")]
    NotFound(String),
    #[error("error fetching price for '{symbol}': {source}")]
    Price {
        symbol: String,
        #[source]
        source: PriceError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Price {
                source: PriceError::UnknownSymbol(_),
                ..
            } => StatusCode::NOT_FOUND,
            ServiceError::Price { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Carries a service failure through warp's rejection system.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl Reject for ApiError {}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}
