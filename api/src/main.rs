// ./api/src/main.rs
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::{get, post},
};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::{ApplicationError, DocumentService};
use domain::{Document, DomainError, SearchRequest, StoreConfig};
use infrastructure::InMemoryDocumentRepository;

#[derive(Clone)]
struct AppState {
    document_service: Arc<DocumentService>,
}

const DEFAULT_PORT: u16 = 3000;

/// Reads `key` from the environment, falling back to `default` when unset or unparsable.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => {
                info!("Using {} = {} from environment.", key, value);
                value
            }
            Err(_) => {
                warn!(
                    "Invalid {} value '{}' in environment. Using default {}.",
                    key, raw, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn store_config_from_env() -> StoreConfig {
    let defaults = StoreConfig::default();
    StoreConfig {
        document_id_prefix: env_or("DOCSTORE_DOCUMENT_PREFIX", defaults.document_id_prefix),
        author_id_prefix: env_or("DOCSTORE_AUTHOR_PREFIX", defaults.author_id_prefix),
        title_length: env_or("DOCSTORE_TITLE_LENGTH", defaults.title_length),
        untitled_title: env_or("DOCSTORE_UNTITLED_TITLE", defaults.untitled_title),
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/documents", post(save_document_handler))
        .route("/documents/search", post(search_documents_handler))
        .route("/documents/:doc_id", get(get_document_handler))
        .with_state(state)
}

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let port = env_or("PORT", DEFAULT_PORT);

    // --- Dependency Injection ---
    let repository = match InMemoryDocumentRepository::with_config(store_config_from_env()) {
        Ok(repository) => Arc::new(repository),
        Err(e) => {
            error!("Invalid store configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("In-memory document store initialized.");

    let document_service = Arc::new(DocumentService::new(repository));
    let app = app(AppState { document_service });
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server starting on {}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

// --- API Handlers ---

async fn health_check(State(state): State<AppState>) -> Response {
    match state.document_service.document_count().await {
        Ok(count) => {
            info!(documents = count, "Health check endpoint called");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for upserting a document (POST /documents).
async fn save_document_handler(
    State(state): State<AppState>,
    Json(payload): Json<Document>,
) -> Response {
    info!(doc_id = ?payload.id, "Received request to save document");
    match state.document_service.save_document(payload).await {
        Ok(saved) => (StatusCode::OK, JsonResponse(saved)).into_response(),
        Err(e) => {
            error!("Failed to save document via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for fetching a document (GET /documents/:doc_id).
async fn get_document_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Response {
    info!(doc_id = %doc_id, "Received request to get document");
    match state.document_service.get_document(&doc_id).await {
        Ok(document) => (StatusCode::OK, JsonResponse(document)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for searching documents (POST /documents/search).
async fn search_documents_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    info!(
        unconstrained = request.is_unconstrained(),
        "Received search request via POST"
    );
    match state.document_service.search_documents(request).await {
        Ok(hits) => {
            info!("Search completed successfully via handler, {} hits", hits.len());
            (StatusCode::OK, JsonResponse(hits)).into_response()
        }
        Err(e) => {
            error!("Failed to search documents via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Helper function to map ApplicationError enum to HTTP status codes and response body.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let (status, body) = match err {
        ApplicationError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        ApplicationError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            format!("Document '{}' not found", id),
        ),
        ApplicationError::DomainError(domain_err @ DomainError::IdSpaceExhausted(_)) => {
            error!("Document store cannot assign ids: {}", domain_err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
        ApplicationError::DomainError(domain_err) => {
            warn!("Domain validation failed: {}", domain_err);
            (StatusCode::BAD_REQUEST, domain_err.to_string())
        }
    };
    (status, body).into_response()
}
