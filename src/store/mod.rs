//! Persistence boundary.
//!
//! The engine talks to a single `Store` trait; the backend is chosen once at
//! startup (`postgres` in production, `memory` for tests and local runs).
//! Store failures are transient from the engine's point of view and carry no
//! domain meaning beyond the `DuplicateOrderNumber` conflict used by the
//! checkout retry loop.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Cart, Meal, MealCategory, Order, OrderStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order number already exists")]
    DuplicateOrderNumber,

    #[error("store operation timed out")]
    Timeout,

    #[error("{0}")]
    Backend(String),
}

/// Catalog listing filters. Listings only ever return available meals.
#[derive(Clone, Debug, Default)]
pub struct MealFilter {
    pub category: Option<MealCategory>,
    pub best_seller: bool,
    pub search: Option<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_meal(&self, id: Uuid) -> Result<Option<Meal>, StoreError>;
    async fn meals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Meal>, StoreError>;
    async fn list_meals(&self, filter: &MealFilter) -> Result<Vec<Meal>, StoreError>;
    async fn related_meals(
        &self,
        category: MealCategory,
        exclude: Uuid,
        limit: i64,
    ) -> Result<Vec<Meal>, StoreError>;
    async fn insert_meal(&self, meal: &Meal) -> Result<(), StoreError>;
    async fn update_meal(&self, meal: &Meal) -> Result<(), StoreError>;
    /// Returns false when no meal with that id existed.
    async fn delete_meal(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn count_meals(&self) -> Result<i64, StoreError>;

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    async fn upsert_cart(&self, cart: &Cart) -> Result<(), StoreError>;

    /// Fails with `DuplicateOrderNumber` when the order number is taken.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
    /// Persists the mutable order fields: statuses, payment payload,
    /// updated_at. Items and totals are frozen at insert.
    async fn update_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;
    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;
    async fn count_orders(&self) -> Result<i64, StoreError>;
    /// Sum of `total_price` over orders whose payment status is `paid`.
    async fn paid_revenue(&self) -> Result<Decimal, StoreError>;
    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError>;
}
