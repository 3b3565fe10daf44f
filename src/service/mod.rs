//! The cart/order engine and its shared plumbing.
//!
//! Every operation runs to completion within one request. Mutations of a
//! user's cart - including checkout - serialize on a per-user async lock so
//! two racing requests cannot lose updates or both drain the same cart.

pub mod cart;
pub mod order;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::events::OrderEvent;

pub use cart::{CartLine, CartService, CartView};
pub use order::{DashboardStats, OrderService};

/// An authenticated caller, produced by the HTTP layer's policy check.
/// The engine never sees roles, only an id and an admin capability.
#[derive(Clone, Copy, Debug)]
pub struct Caller {
    pub user_id: Uuid,
    pub admin: bool,
}

/// Per-user mutex registry serializing cart mutations and checkout.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

/// Fire-and-forget order-event publisher. Absent a NATS client this is a
/// no-op; publish failures are logged and never fail the operation.
#[derive(Clone, Default)]
pub struct EventPublisher {
    client: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        Self { client }
    }

    pub async fn publish(&self, events: Vec<OrderEvent>) {
        let Some(client) = &self.client else { return };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(%err, "failed to encode order event");
                    continue;
                }
            };
            if let Err(err) = client.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(%err, subject = event.subject(), "failed to publish order event");
            }
        }
    }
}
