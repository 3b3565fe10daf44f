//! In-memory store backend, for tests and local runs without Postgres.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Cart, Meal, MealCategory, Order, OrderStatus, PaymentStatus};
use crate::store::{MealFilter, Store, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    meals: HashMap<Uuid, Meal>,
    /// Keyed by user id - carts are 1:1 with users.
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(meal: &Meal, filter: &MealFilter) -> bool {
    if !meal.is_available {
        return false;
    }
    if let Some(category) = filter.category {
        if meal.category != category {
            return false;
        }
    }
    if filter.best_seller && !meal.is_best_seller {
        return false;
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let haystacks = [
            Some(meal.name.as_str()),
            meal.name_vi.as_deref(),
            Some(meal.description.as_str()),
        ];
        if !haystacks
            .into_iter()
            .flatten()
            .any(|h| h.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    true
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_meal(&self, id: Uuid) -> Result<Option<Meal>, StoreError> {
        Ok(self.inner.read().await.meals.get(&id).cloned())
    }

    async fn meals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Meal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.meals.get(id).cloned()).collect())
    }

    async fn list_meals(&self, filter: &MealFilter) -> Result<Vec<Meal>, StoreError> {
        let inner = self.inner.read().await;
        let mut meals: Vec<Meal> = inner
            .meals
            .values()
            .filter(|m| matches_filter(m, filter))
            .cloned()
            .collect();
        meals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(meals)
    }

    async fn related_meals(
        &self,
        category: MealCategory,
        exclude: Uuid,
        limit: i64,
    ) -> Result<Vec<Meal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .meals
            .values()
            .filter(|m| m.is_available && m.category == category && m.id != exclude)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_meal(&self, meal: &Meal) -> Result<(), StoreError> {
        self.inner.write().await.meals.insert(meal.id, meal.clone());
        Ok(())
    }

    async fn update_meal(&self, meal: &Meal) -> Result<(), StoreError> {
        self.inner.write().await.meals.insert(meal.id, meal.clone());
        Ok(())
    }

    async fn delete_meal(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.meals.remove(&id).is_some())
    }

    async fn count_meals(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.meals.len() as i64)
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(self.inner.read().await.carts.get(&user_id).cloned())
    }

    async fn upsert_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        self.inner.write().await.carts.insert(cart.user_id(), cart.clone());
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.order_numbers.insert(order.order_number().to_string()) {
            return Err(StoreError::DuplicateOrderNumber);
        }
        inner.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .orders
            .get_mut(&order.id())
            .ok_or_else(|| StoreError::Backend(format!("order {} not stored", order.id())))?;
        // Mirrors the SQL backend: only the mutable columns are written.
        existing.order_status = order.order_status;
        existing.payment_status = order.payment_status;
        existing.qr_code = order.qr_code.clone();
        existing.updated_at = order.updated_at;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        Ok(newest_first(
            inner.orders.values().filter(|o| o.user_id() == user_id).cloned().collect(),
        ))
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        Ok(newest_first(
            inner
                .orders
                .values()
                .filter(|o| status.map_or(true, |s| o.order_status() == s))
                .cloned()
                .collect(),
        ))
    }

    async fn count_orders(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.orders.len() as i64)
    }

    async fn paid_revenue(&self) -> Result<Decimal, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .values()
            .filter(|o| o.payment_status() == PaymentStatus::Paid)
            .map(|o| o.total_price().amount())
            .sum())
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        let mut orders = newest_first(inner.orders.values().cloned().collect());
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        generate_order_number, MealIndex, Money, NewMeal, Order, PaymentMethod, ShippingInfo,
    };
    use rust_decimal::Decimal;

    fn meal() -> Meal {
        Meal::create(NewMeal {
            name: "Salmon with Sweet Potato".into(),
            name_vi: None,
            description: "test".into(),
            description_vi: None,
            image: "img".into(),
            price: Money::new(Decimal::new(120000, 0), "VND"),
            calories: 520,
            protein: 40,
            carb: 45,
            fat: 18,
            category: MealCategory::MuscleGain,
            ingredients: vec![],
            ingredients_vi: vec![],
            is_available: true,
            rating: 5.0,
            is_best_seller: true,
        })
    }

    fn order_for(user_id: Uuid, number: String) -> Order {
        let m = meal();
        let meals: MealIndex = [(m.id, m.clone())].into_iter().collect();
        let mut cart = Cart::new(user_id, "VND");
        cart.add_item(m.id, 1, &meals);
        Order::from_cart(
            number,
            &cart,
            &meals,
            ShippingInfo {
                name: "N".into(),
                phone: "0".into(),
                email: None,
                address: "a".into(),
                city: "c".into(),
                district: None,
                ward: None,
                note: None,
            },
            PaymentMethod::Cod,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_order_number_rejected() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let first = order_for(user, "EC1700000000000123".into());
        let second = order_for(user, "EC1700000000000123".into());

        store.insert_order(&first).await.unwrap();
        assert!(matches!(
            store.insert_order(&second).await,
            Err(StoreError::DuplicateOrderNumber)
        ));
        assert_eq!(store.count_orders().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_order_only_touches_mutable_fields() {
        let store = MemoryStore::new();
        let mut order = order_for(Uuid::new_v4(), generate_order_number());
        store.insert_order(&order).await.unwrap();

        order.set_payment_status(PaymentStatus::Paid);
        store.update_order(&order).await.unwrap();

        let stored = store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.payment_status(), PaymentStatus::Paid);
        assert_eq!(stored.items(), order.items());
        assert_eq!(store.paid_revenue().await.unwrap(), Decimal::new(120000, 0));
    }

    #[tokio::test]
    async fn test_list_meals_filters() {
        let store = MemoryStore::new();
        let mut hidden = meal();
        hidden.is_available = false;
        let visible = meal();
        store.insert_meal(&hidden).await.unwrap();
        store.insert_meal(&visible).await.unwrap();

        let all = store.list_meals(&MealFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, visible.id);

        let searched = store
            .list_meals(&MealFilter { search: Some("salmon".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);

        let none = store
            .list_meals(&MealFilter {
                category: Some(MealCategory::WeightLoss),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
