pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{JwtService, MongoStore, PayMongoClient, Reconciler, RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub jwt: JwtService,
    pub paymongo: PayMongoClient,
    pub reconciler: Reconciler,
}

/// Assemble the full route tree over the given state.
pub fn app_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route(
            "/api/webhooks/paymongo-webhook",
            post(handlers::webhooks::paymongo_webhook),
        );

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/users", get(handlers::users::list_users))
        .route(
            "/api/users/:id",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/api/students",
            get(handlers::students::list_students).post(handlers::students::create_student),
        )
        .route(
            "/api/students/:id",
            get(handlers::students::get_student)
                .patch(handlers::students::update_student)
                .delete(handlers::students::delete_student),
        )
        .route(
            "/api/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/api/invoices/:id",
            get(handlers::invoices::get_invoice).delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/api/invoices/:id/status",
            patch(handlers::invoices::update_invoice_status),
        )
        .route(
            "/api/invoices/user/:user_id",
            get(handlers::invoices::list_user_invoices),
        )
        .route(
            "/api/payments",
            get(handlers::payments::list_payments).post(handlers::payments::create_payment),
        )
        .route(
            "/api/payments/payment-link",
            post(handlers::payments::create_payment_link),
        )
        .route(
            "/api/payments/:id",
            get(handlers::payments::get_payment).delete(handlers::payments::delete_payment),
        )
        .route(
            "/api/payments/:id/status",
            patch(handlers::payments::update_payment_status),
        )
        .route(
            "/api/payments/user/:user_id",
            get(handlers::payments::list_user_payments),
        )
        .route("/api/reports/summary", get(handlers::reports::summary))
        .route("/api/reports/data", get(handlers::reports::data))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = cors_layer(&state.config.server.allowed_origins);

    public
        .merge(protected)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub struct Application {
    host: String,
    port: u16,
    router: Router,
}

impl Application {
    /// Connect to MongoDB, prepare indexes, and assemble the router.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let store = MongoStore::connect(&config.database).await?;
        store.init_indexes().await?;
        Self::with_store(config, Arc::new(store))
    }

    /// Assemble the application over an already-constructed record store.
    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> anyhow::Result<Self> {
        let paymongo = PayMongoClient::new(config.paymongo.clone())?;
        if paymongo.is_configured() {
            tracing::info!("PayMongo client initialized");
        } else {
            tracing::warn!(
                "PayMongo credentials not configured - payment links will be unavailable"
            );
        }

        let jwt = JwtService::new(&config.jwt);
        let reconciler = Reconciler::new(store.clone(), paymongo.clone());

        let host = config.server.host.clone();
        let port = config.server.port;
        let state = AppState {
            config,
            store,
            jwt,
            paymongo,
            reconciler,
        };

        Ok(Self {
            host,
            port,
            router: app_router(state),
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
