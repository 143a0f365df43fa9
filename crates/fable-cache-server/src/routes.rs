//! HTTP routes for the cache API

use crate::store::CacheStore;
use fable_core::cache::protocol::{ApiResponse, PutRequest};
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct CacheQuery {
    key: String,
}

/// Build the full route tree: `GET /api/cache?key=`, `POST /api/cache`,
/// `OPTIONS` (preflight or bare) answered with 204, permissive CORS.
pub fn routes(
    store: Arc<CacheStore>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let store_filter = warp::any().map(move || Arc::clone(&store));

    let get_entry = warp::path!("api" / "cache")
        .and(warp::get())
        .and(warp::query::<CacheQuery>())
        .and(store_filter.clone())
        .and_then(handle_get);

    let put_entry = warp::path!("api" / "cache")
        .and(warp::post())
        .and(warp::body::json())
        .and(store_filter)
        .and_then(handle_put);

    // OPTIONS is answered here, before the cors wrapper, so that real
    // preflights (Origin + Access-Control-Request-Method) get the 204
    // instead of the wrapper's own preflight reply. The wrapper below
    // only decorates GET/POST responses.
    let preflight = warp::options().map(preflight_reply);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    let api = get_entry
        .or(put_entry)
        .recover(handle_rejection)
        .with(cors);

    preflight.or(api)
}

/// 204 with the Access-Control-Allow-* headers attached manually
fn preflight_reply() -> impl Reply {
    let reply = warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT);
    let reply = warp::reply::with_header(reply, "access-control-allow-origin", "*");
    let reply = warp::reply::with_header(reply, "access-control-allow-methods", "GET, POST, OPTIONS");
    warp::reply::with_header(reply, "access-control-allow-headers", "content-type")
}

async fn handle_get(
    query: CacheQuery,
    store: Arc<CacheStore>,
) -> Result<impl Reply, Rejection> {
    match store.get(&query.key).await {
        Some(value) => {
            tracing::debug!(key = %query.key, "cache hit");
            Ok(warp::reply::with_status(
                warp::reply::json(&ApiResponse::hit(value)),
                StatusCode::OK,
            ))
        }
        None => {
            tracing::debug!(key = %query.key, "cache miss");
            Ok(warp::reply::with_status(
                warp::reply::json(&ApiResponse::failure("Not found")),
                StatusCode::NOT_FOUND,
            ))
        }
    }
}

async fn handle_put(
    request: PutRequest,
    store: Arc<CacheStore>,
) -> Result<impl Reply, Rejection> {
    let (key, data) = match (request.key, request.data) {
        (Some(key), Some(data)) => (key, data),
        _ => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&ApiResponse::failure("Missing key or data")),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let evicted = store.insert(key, data).await;
    if evicted > 0 {
        tracing::info!(evicted, "evicted oldest entries after capacity check");
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok()),
        StatusCode::OK,
    ))
}

/// Map body deserialization failures to the protocol's 400 envelope
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "Malformed request body")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Missing key parameter")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::failure(message)),
        status,
    ))
}
