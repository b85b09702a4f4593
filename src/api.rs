// src/api.rs
use crate::error::{ApiError, PriceError, ServiceError};
use crate::service::{PortfolioService, UpdateResult};
use log::{error, info};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub fn routes(
    service: PortfolioService,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let add = warp::path!("stocks")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body())
        .and_then(add_stock_handler);

    let list = warp::path!("stocks")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_service(service.clone()))
        .and_then(list_stocks_handler);

    let get = warp::path!("stocks" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(get_stock_handler);

    let update = warp::path!("stocks" / String)
        .and(warp::put())
        .and(with_service(service.clone()))
        .and(json_body())
        .and_then(update_stock_handler);

    let delete = warp::path!("stocks" / String)
        .and(warp::delete())
        .and(with_service(service.clone()))
        .and_then(delete_stock_handler);

    let stock_value = warp::path!("stock-value" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(stock_value_handler);

    let portfolio_value = warp::path!("portfolio-value")
        .and(warp::get())
        .and(with_service(service))
        .and_then(portfolio_value_handler);

    add.or(list)
        .or(get)
        .or(update)
        .or(delete)
        .or(stock_value)
        .or(portfolio_value)
        .recover(handle_rejection)
}

fn with_service(
    service: PortfolioService,
) -> impl Filter<Extract = (PortfolioService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

#[derive(Debug)]
struct NotJson;

impl warp::reject::Reject for NotJson {}

/// A JSON object body. The request must declare `application/json`.
fn json_body() -> impl Filter<Extract = (Map<String, Value>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("content-type")
        .and_then(|content_type: Option<String>| async move {
            let is_json = content_type
                .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
                .unwrap_or(false);
            if is_json {
                Ok(())
            } else {
                Err(warp::reject::custom(NotJson))
            }
        })
        .untuple_one()
        .and(warp::body::json())
}

fn reject(context: &str, err: ServiceError) -> Rejection {
    error!("{}: {}", context, err);
    warp::reject::custom(ApiError(err))
}

async fn add_stock_handler(
    service: PortfolioService,
    record: Map<String, Value>,
) -> Result<impl Reply, Rejection> {
    match service.add_holding(&record).await {
        Ok(holding) => Ok(warp::reply::with_status(
            warp::reply::json(&holding),
            StatusCode::CREATED,
        )),
        Err(e) => Err(reject("Failed to add stock", e)),
    }
}

async fn list_stocks_handler(
    query: HashMap<String, String>,
    service: PortfolioService,
) -> Result<impl Reply, Rejection> {
    match service.list_holdings(&query).await {
        Ok(holdings) => {
            info!("Retrieved {} stocks.", holdings.len());
            Ok(warp::reply::json(&holdings))
        }
        Err(e) => Err(reject("Failed to list stocks", e)),
    }
}

async fn get_stock_handler(
    id: String,
    service: PortfolioService,
) -> Result<impl Reply, Rejection> {
    match service.get_holding(&id).await {
        Ok(holding) => Ok(warp::reply::json(&holding)),
        Err(e) => Err(reject("Failed to retrieve stock", e)),
    }
}

async fn update_stock_handler(
    id: String,
    service: PortfolioService,
    record: Map<String, Value>,
) -> Result<impl Reply, Rejection> {
    match service.update_holding(&id, &record).await {
        Ok(UpdateResult::Updated(id)) => Ok(warp::reply::json(&json!({ "id": id }))),
        Ok(UpdateResult::Unchanged) => {
            Ok(warp::reply::json(&json!({ "message": "No changes made" })))
        }
        Err(e) => Err(reject("Failed to update stock", e)),
    }
}

async fn delete_stock_handler(
    id: String,
    service: PortfolioService,
) -> Result<impl Reply, Rejection> {
    match service.delete_holding(&id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(reject("Failed to delete stock", e)),
    }
}

async fn stock_value_handler(
    id: String,
    service: PortfolioService,
) -> Result<impl Reply, Rejection> {
    match service.compute_holding_value(&id).await {
        Ok(value) => Ok(warp::reply::json(&value)),
        Err(e) => Err(reject("Failed to compute stock value", e)),
    }
}

async fn portfolio_value_handler(service: PortfolioService) -> Result<impl Reply, Rejection> {
    match service.portfolio_report().await {
        Ok(report) => Ok(warp::reply::json(&report)),
        Err(e) => Err(reject("Failed to compute portfolio value", e)),
    }
}

fn error_body(err: &ServiceError) -> Value {
    match err {
        ServiceError::Price {
            symbol,
            source: PriceError::UnknownSymbol(_),
        } => json!({
            "error": format!("Stock is not found: {}", symbol),
            "suggestion": format!("Please update the symbol '{}' to a valid ticker.", symbol),
        }),
        ServiceError::NotFound(_) => json!({ "error": "Not found" }),
        ServiceError::Validation(reason) => {
            json!({ "error": format!("Malformed data: {}", reason) })
        }
        other => json!({ "error": other.to_string() }),
    }
}

/// Renders every rejection as a JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(ApiError(e)) = err.find::<ApiError>() {
        (e.status(), error_body(e))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "error": "Not found" }))
    } else if err.find::<NotJson>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "error": "Expected application/json media type" }),
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "error": format!("Malformed data: {}", e) }),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Internal server error" }),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
