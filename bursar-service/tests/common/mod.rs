#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bursar_service::config::{Config, DatabaseConfig, JwtConfig, PayMongoConfig, ServerConfig};
use bursar_service::models::{
    compute_total, Invoice, InvoiceStatus, LineItem, Payment, PaymentStatus, User,
};
use bursar_service::services::{JwtService, MemoryStore, PayMongoClient, Reconciler, RecordStore};
use bursar_service::utils::hash_password;
use bursar_service::{app_router, AppState};
use hmac::{Hmac, Mac};
use mongodb::bson::DateTime;
use secrecy::Secret;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_config(gateway_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: Secret::new("mongodb://localhost:27017".to_string()),
            db_name: "bursar_test".to_string(),
        },
        paymongo: PayMongoConfig {
            secret_key: Secret::new("sk_test_123".to_string()),
            webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
            api_base_url: gateway_url.to_string(),
            timeout_seconds: 5,
        },
        jwt: JwtConfig {
            secret: Secret::new("test-jwt-secret".to_string()),
            access_token_expiry_minutes: 60,
        },
        service_name: "bursar-service".to_string(),
    }
}

/// In-process application over the in-memory store, driven through the
/// router with `oneshot` requests.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub jwt: JwtService,
}

impl TestApp {
    /// App with a gateway base URL that is never reachable; tests that
    /// talk to the gateway use [`TestApp::with_gateway`] instead.
    pub fn new() -> Self {
        Self::with_gateway("http://127.0.0.1:9")
    }

    pub fn with_gateway(gateway_url: &str) -> Self {
        let config = test_config(gateway_url);
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(&config.jwt);
        let paymongo = PayMongoClient::new(config.paymongo.clone()).unwrap();
        let reconciler = Reconciler::new(store.clone(), paymongo.clone());

        let state = AppState {
            config,
            store: store.clone(),
            jwt: jwt.clone(),
            paymongo,
            reconciler,
        };

        Self {
            router: app_router(state),
            store,
            jwt,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, Some(token), None).await
    }

    /// Deliver a webhook body with the given signature header.
    pub async fn webhook(&self, body: &str, signature: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/webhooks/paymongo-webhook")
            .header("Content-Type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("Paymongo-Signature", signature);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn seed_user_with_password(&self, email: &str, password: &str) -> User {
        let now = DateTime::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn seed_user(&self, email: &str) -> User {
        self.seed_user_with_password(email, "password123").await
    }

    pub fn token_for(&self, user: &User) -> String {
        self.jwt
            .generate_access_token(&user.id.to_string(), &user.email)
            .unwrap()
    }

    /// Convenience: one seeded user plus a valid bearer token.
    pub async fn authed_user(&self) -> (User, String) {
        let user = self.seed_user("admin@example.com").await;
        let token = self.token_for(&user);
        (user, token)
    }

    pub async fn seed_invoice(&self, invoice: Invoice) -> Invoice {
        self.store.insert_invoice(invoice.clone()).await.unwrap();
        invoice
    }

    pub async fn seed_payment(&self, user_id: Uuid, amount: f64) -> Payment {
        let now = DateTime::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            amount,
            description: Some("Tuition".to_string()),
            payment_method: None,
            status: PaymentStatus::Pending,
            transaction_id: None,
            payment_date: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_payment(payment.clone()).await.unwrap();
        payment
    }
}

pub fn line_item(description: &str, amount: f64, quantity: u32) -> LineItem {
    LineItem {
        description: description.to_string(),
        amount,
        quantity,
    }
}

pub fn invoice_for(user_id: Uuid, items: Vec<LineItem>) -> Invoice {
    let now = DateTime::now();
    Invoice {
        id: Uuid::new_v4(),
        user_id,
        invoice_number: None,
        payment_id: None,
        total_amount: compute_total(&items),
        items,
        status: InvoiceStatus::Draft,
        due_date: None,
        provider_reference_id: None,
        checkout_url: None,
        created_at: now,
        updated_at: now,
    }
}

/// Signature header in the provider's `t=...,te=...` format over
/// `"{timestamp}.{body}"`.
pub fn webhook_signature(body: &str, secret: &str, timestamp: i64) -> String {
    type HmacSha256 = Hmac<sha2::Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    format!(
        "t={},te={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Signature over the body with the configured test secret and a fresh
/// timestamp.
pub fn signed_header(body: &str) -> String {
    webhook_signature(body, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
}
