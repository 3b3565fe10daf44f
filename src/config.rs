//! Environment-driven configuration, read once at startup.

use std::env;

use tracing::{info, warn};

use crate::payment::BankConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub bank: Option<BankConfig>,
}

impl AppConfig {
    pub fn load() -> Self {
        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => {
                warn!("unknown STORE_BACKEND {other:?}, falling back to postgres");
                StoreBackend::Postgres
            }
        };
        let bank = match (var("BANK_NAME"), var("BANK_ACCOUNT"), var("BANK_ACCOUNT_NAME")) {
            (Some(bank_name), Some(account_number), Some(account_name)) => Some(BankConfig {
                bank_name,
                account_number,
                account_name,
            }),
            _ => {
                info!("bank details not configured, orders will carry no payment instructions");
                None
            }
        };
        Self {
            port: env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8083),
            store_backend,
            database_url: var("DATABASE_URL"),
            nats_url: var("NATS_URL"),
            currency: var("CURRENCY").unwrap_or_else(|| "VND".to_string()),
            bank,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
