use alsrec::{init_tracing, AppState, Config, RecError, Recommendation};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct RecommendQuery {
    k: Option<usize>,
    exclude_seen: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SimilarQuery {
    k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecommendResponse {
    user_id: u32,
    recommendations: Vec<Recommendation>,
    generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimilarResponse {
    item_id: u32,
    recommendations: Vec<Recommendation>,
    generated_at: DateTime<Utc>,
}

fn error_status(e: &RecError) -> StatusCode {
    match e {
        RecError::UnknownUser(_) | RecError::UnknownItem(_) | RecError::ModelNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RecError::InvalidRecord(_) | RecError::InvalidHyperparameter(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn health_check(
    State(state): State<AppState>,
) -> Json<ApiResponse<HashMap<String, serde_json::Value>>> {
    let service = state.service();
    let model = service.model();

    let mut status = HashMap::new();
    status.insert("status".to_string(), serde_json::json!("healthy"));
    status.insert("service".to_string(), serde_json::json!("alsrec"));
    status.insert("n_users".to_string(), serde_json::json!(model.n_users()));
    status.insert("n_items".to_string(), serde_json::json!(model.n_items()));
    status.insert("factors".to_string(), serde_json::json!(model.factors()));
    status.insert(
        "trained_at".to_string(),
        serde_json::json!(model.trained_at),
    );
    let stats: HashMap<String, u64> = state
        .stats
        .iter()
        .map(|entry| (entry.key().clone(), *entry.value()))
        .collect();
    status.insert("requests".to_string(), serde_json::json!(stats));

    Json(ApiResponse::success(status))
}

async fn recommend_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
    Query(params): Query<RecommendQuery>,
) -> Result<Json<ApiResponse<RecommendResponse>>, StatusCode> {
    state.bump("recommend");

    let k = params.k.unwrap_or(state.config.recommendation.default_k);
    let exclude_seen = params
        .exclude_seen
        .unwrap_or(state.config.recommendation.exclude_seen);

    match state.service().recommend_for_user(user_id, k, exclude_seen) {
        Ok(recommendations) => Ok(Json(ApiResponse::success(RecommendResponse {
            user_id,
            recommendations,
            generated_at: Utc::now(),
        }))),
        Err(e) => {
            error!("recommendation for user {} failed: {}", user_id, e);
            Err(error_status(&e))
        }
    }
}

async fn similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<u32>,
    Query(params): Query<SimilarQuery>,
) -> Result<Json<ApiResponse<SimilarResponse>>, StatusCode> {
    state.bump("similar");

    let k = params.k.unwrap_or(state.config.recommendation.default_k);
    match state.service().similar_items(item_id, k) {
        Ok(recommendations) => Ok(Json(ApiResponse::success(SimilarResponse {
            item_id,
            recommendations,
            generated_at: Utc::now(),
        }))),
        Err(e) => {
            error!("similar items for {} failed: {}", item_id, e);
            Err(error_status(&e))
        }
    }
}

async fn reload_model(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    state.bump("reload");

    match state.reload() {
        Ok(()) => Ok(Json(ApiResponse::success(
            "Model reloaded successfully".to_string(),
        ))),
        Err(e) => {
            error!("model reload failed: {}", e);
            Err(error_status(&e))
        }
    }
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/recommend/:user_id", get(recommend_for_user))
        .route("/similar/:item_id", get(similar_items))
        .route("/reload", post(reload_model))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("config file not found, using default configuration");
        Config::default()
    };

    info!(
        "starting recommendation server, model path {}",
        config.model.path.display()
    );

    let addr = config.server.socket_addr()?;
    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
