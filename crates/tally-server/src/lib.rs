//! Tally Web Server
//!
//! Axum-based REST API for the Tally personal finance backend.
//!
//! Security features:
//! - Bearer token (JWT) authentication on everything except registration,
//!   login, password reset and the health check
//! - Restrictive CORS policy
//! - Security headers on every response
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::db::Database;
use tally_core::models::UserId;
use tally_core::{Clock, LogMailer, Mailer, SystemClock};

pub mod auth;
mod handlers;

pub use auth::AuthUser;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// HS256 signing secret for bearer tokens
    pub jwt_secret: String,
    /// Token lifetime in days
    pub token_ttl_days: i64,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl_days: auth::DEFAULT_TOKEN_TTL_DAYS,
            allowed_origins: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Source of "now" for budgets and statistics
    pub clock: Arc<dyn Clock>,
    /// Delivers password reset codes
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// State with the system clock and the given mailer
    pub fn new(db: Database, config: ServerConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            config,
            clock: Arc::new(SystemClock),
            mailer,
        }
    }
}

/// Authentication middleware - validates the bearer token and records the caller
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::bearer_token);

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Unauthorized request - no bearer token");
        return AppError::unauthorized("Authentication required").into_response();
    };

    match auth::verify_token(token, &state.config.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser {
                id: UserId::from(claims.sub),
            });
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "Rejected bearer token");
            AppError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

/// Plain message response
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    message: &'static str,
    status: &'static str,
}

/// GET / - Liveness check
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Tally API is running",
        status: "success",
    })
}

/// Create the application router with the system clock and a logging mailer
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_state(AppState::new(db, config, Arc::new(LogMailer)))
}

/// Create the application router from prepared state (custom clock or mailer)
pub fn create_router_with_state(state: AppState) -> Router {
    let state = Arc::new(state);
    let config = state.config.clone();

    let public_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password));

    let protected_routes = Router::new()
        // Account
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/change-password", put(handlers::change_password))
        .route("/auth/account", delete(handlers::delete_account))
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/summary", get(handlers::get_summary))
        .route(
            "/transactions/category-summary",
            get(handlers::get_category_summary),
        )
        .route("/transactions/monthly-trend", get(handlers::get_monthly_trend))
        .route("/transactions/statistics", get(handlers::get_statistics))
        .route(
            "/transactions/recurring/run",
            post(handlers::run_recurring),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        )
        // Budgets
        .route(
            "/budgets",
            get(handlers::list_budgets).post(handlers::create_budget),
        )
        .route("/budgets/active", get(handlers::get_active_budget))
        .route("/budgets/calculate", get(handlers::calculate_budget))
        .route(
            "/budgets/:id",
            put(handlers::update_budget).delete(handlers::delete_budget),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes);

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .route("/", get(health))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    serve_with_mailer(db, host, port, config, Arc::new(LogMailer)).await
}

/// Start the server with a specific mail sender
pub async fn serve_with_mailer(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<()> {
    if config.allowed_origins.is_empty() {
        info!("CORS: same-origin only (set TALLY_ALLOWED_ORIGINS to allow browsers elsewhere)");
    }

    let app = create_router_with_state(AppState::new(db, config, mailer));
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Status and client-facing message for errors caused by the request
fn classify(err: &tally_core::Error) -> Option<(StatusCode, String)> {
    use tally_core::Error;

    match err {
        Error::Validation(msg) => Some((StatusCode::BAD_REQUEST, msg.clone())),
        Error::InvalidPeriod(period) => Some((
            StatusCode::BAD_REQUEST,
            format!("Invalid period: {} (use daily, weekly or monthly)", period),
        )),
        Error::NotFound(what) => Some((StatusCode::NOT_FOUND, format!("{} not found", what))),
        Error::NoActiveBudget => Some((
            StatusCode::NOT_FOUND,
            "No active budget found".to_string(),
        )),
        Error::Conflict(msg) => Some((StatusCode::CONFLICT, msg.clone())),
        Error::Unauthorized(msg) => Some((StatusCode::UNAUTHORIZED, msg.clone())),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        if let Some((status, message)) = err.downcast_ref::<tally_core::Error>().and_then(classify) {
            return Self {
                status,
                message,
                internal: None,
            };
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
