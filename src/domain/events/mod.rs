//! Domain events
//!
//! Raised by the order aggregate and drained with `take_events` after the
//! mutation is persisted. Published to NATS when a client is configured.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::{OrderStatus, PaymentStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        total: Decimal,
    },
    StatusChanged {
        order_id: Uuid,
        status: OrderStatus,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        status: PaymentStatus,
    },
}

impl OrderEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "mealbox.orders.created",
            Self::StatusChanged { .. } => "mealbox.orders.status",
            Self::PaymentStatusChanged { .. } => "mealbox.orders.payment",
        }
    }
}
