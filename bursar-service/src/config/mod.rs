use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paymongo: PayMongoConfig,
    pub jwt: JwtConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PayMongoConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("BURSAR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BURSAR_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()?;
        let allowed_origins = env::var("BURSAR_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let db_url = env::var("BURSAR_DATABASE_URL").expect("BURSAR_DATABASE_URL must be set");
        let db_name = env::var("BURSAR_DATABASE_NAME").unwrap_or_else(|_| "bursar_db".to_string());

        let paymongo_secret_key = env::var("PAYMONGO_SECRET_KEY").unwrap_or_default();
        let paymongo_webhook_secret = env::var("PAYMONGO_WEBHOOK_SECRET").unwrap_or_default();
        let paymongo_base_url = env::var("PAYMONGO_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.paymongo.com/v1".to_string());
        let paymongo_timeout_seconds = env::var("PAYMONGO_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let jwt_secret = env::var("BURSAR_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let jwt_expiry_minutes = env::var("BURSAR_JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                allowed_origins,
            },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            paymongo: PayMongoConfig {
                secret_key: Secret::new(paymongo_secret_key),
                webhook_secret: Secret::new(paymongo_webhook_secret),
                api_base_url: paymongo_base_url,
                timeout_seconds: paymongo_timeout_seconds,
            },
            jwt: JwtConfig {
                secret: Secret::new(jwt_secret),
                access_token_expiry_minutes: jwt_expiry_minutes,
            },
            service_name: "bursar-service".to_string(),
        })
    }
}
