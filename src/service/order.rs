//! Order engine: checkout, customer queries and administrator mutations.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    generate_order_number, MealIndex, Order, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingInfo,
};
use crate::error::{Error, Result};
use crate::payment::{self, BankConfig};
use crate::service::{Caller, EventPublisher, UserLocks};
use crate::store::{Store, StoreError};

/// Bound on order-number regeneration when inserts collide. Collisions need
/// a same-millisecond, same-random-suffix clash, so one retry is already
/// rare; five is unreachable in practice.
const ORDER_INSERT_ATTEMPTS: u32 = 5;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub total_meals: i64,
    pub total_revenue: Decimal,
    pub recent_orders: Vec<Order>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    locks: Arc<UserLocks>,
    events: EventPublisher,
    bank: Option<BankConfig>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        locks: Arc<UserLocks>,
        events: EventPublisher,
        bank: Option<BankConfig>,
    ) -> Self {
        Self { store, locks, events, bank }
    }

    /// Convert the caller's cart into an order and reset the cart.
    ///
    /// The order insert commits before the cart is cleared; if the clear
    /// then fails the order stands and the leftover cart is logged as a
    /// recoverable inconsistency. Checkout holds the user's lock, so a
    /// second racing checkout sees the emptied cart and gets `EmptyCart`.
    pub async fn checkout(
        &self,
        user_id: Uuid,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
    ) -> Result<Order> {
        let _guard = self.locks.acquire(user_id).await;
        let mut cart = self.store.find_cart(user_id).await?.ok_or(Error::EmptyCart)?;
        if cart.is_empty() {
            return Err(Error::EmptyCart);
        }
        let meals: MealIndex = self
            .store
            .meals_by_ids(&cart.meal_ids())
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut inserted = None;
        for attempt in 1..=ORDER_INSERT_ATTEMPTS {
            let mut order = Order::from_cart(
                generate_order_number(),
                &cart,
                &meals,
                shipping.clone(),
                payment_method,
            )?;
            if payment_method.needs_payment_instruction() {
                match self.payment_payload(&order) {
                    Ok(payload) => order.attach_payment_instruction(payload),
                    Err(err) => tracing::warn!(
                        order_number = order.order_number(),
                        %err,
                        "order created without payment instructions"
                    ),
                }
            }
            match self.store.insert_order(&order).await {
                Ok(()) => {
                    inserted = Some(order);
                    break;
                }
                Err(StoreError::DuplicateOrderNumber) => {
                    tracing::warn!(attempt, "order number collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        let mut order = inserted.ok_or(Error::Storage(StoreError::DuplicateOrderNumber))?;

        cart.clear();
        if let Err(err) = self.store.upsert_cart(&cart).await {
            tracing::error!(
                order_number = order.order_number(),
                %err,
                "order placed but cart was not cleared"
            );
        }
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    pub async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Fetch one order; customers only see their own, administrators see all.
    pub async fn get_for(&self, caller: Caller, id: Uuid) -> Result<Order> {
        let order = self.store.find_order(id).await?.ok_or(Error::OrderNotFound { id })?;
        if !caller.admin && order.user_id() != caller.user_id {
            return Err(Error::Forbidden { id });
        }
        Ok(order)
    }

    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(status).await?)
    }

    pub async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order = self.store.find_order(id).await?.ok_or(Error::OrderNotFound { id })?;
        order.set_status(status);
        self.store.update_order(&order).await?;
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    pub async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<Order> {
        let mut order = self.store.find_order(id).await?.ok_or(Error::OrderNotFound { id })?;
        order.set_payment_status(status);
        self.store.update_order(&order).await?;
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        Ok(DashboardStats {
            total_orders: self.store.count_orders().await?,
            total_meals: self.store.count_meals().await?,
            total_revenue: self.store.paid_revenue().await?,
            recent_orders: self.store.recent_orders(10).await?,
        })
    }

    /// Best-effort: one retry, then checkout proceeds without a payload.
    fn payment_payload(&self, order: &Order) -> Result<String> {
        payment::instruction(self.bank.as_ref(), order.total_price(), order.order_number())
            .or_else(|err| {
                tracing::debug!(%err, "retrying payment instruction generation");
                payment::instruction(self.bank.as_ref(), order.total_price(), order.order_number())
            })
    }
}
