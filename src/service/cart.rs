//! Cart engine: the authoritative (user, meal) -> quantity mapping.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Cart, Meal, MealIndex, Money};
use crate::error::{Error, Result};
use crate::service::UserLocks;
use crate::store::Store;

/// A cart with its meal references resolved for display.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_price: Money,
    pub total_calories: u32,
}

#[derive(Debug, Serialize)]
pub struct CartLine {
    pub meal_id: Uuid,
    pub quantity: u32,
    /// None when the meal was removed from the catalog after being added.
    pub meal: Option<Meal>,
}

impl CartView {
    fn assemble(cart: Cart, meals: &MealIndex) -> Self {
        let items = cart
            .items()
            .iter()
            .map(|item| CartLine {
                meal_id: item.meal_id,
                quantity: item.quantity,
                meal: meals.get(&item.meal_id).cloned(),
            })
            .collect();
        Self {
            id: cart.id(),
            user_id: cart.user_id(),
            items,
            total_price: cart.total_price().clone(),
            total_calories: cart.total_calories(),
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    locks: Arc<UserLocks>,
    currency: String,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, locks: Arc<UserLocks>, currency: &str) -> Self {
        Self { store, locks, currency: currency.to_string() }
    }

    /// The user's cart, created empty on first access.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<CartView> {
        let _guard = self.locks.acquire(user_id).await;
        let cart = match self.store.find_cart(user_id).await? {
            Some(cart) => cart,
            None => {
                let cart = Cart::new(user_id, &self.currency);
                self.store.upsert_cart(&cart).await?;
                cart
            }
        };
        let meals = self.resolve(&cart.meal_ids()).await?;
        Ok(CartView::assemble(cart, &meals))
    }

    /// Add `quantity` of a meal (merging with any existing line) and persist.
    pub async fn add_item(&self, user_id: Uuid, meal_id: Uuid, quantity: u32) -> Result<CartView> {
        let _guard = self.locks.acquire(user_id).await;
        let meal = self
            .store
            .find_meal(meal_id)
            .await?
            .ok_or(Error::MealNotFound { id: meal_id })?;
        if !meal.is_available {
            return Err(Error::MealUnavailable { id: meal_id });
        }

        let mut cart = match self.store.find_cart(user_id).await? {
            Some(cart) => cart,
            None => Cart::new(user_id, &self.currency),
        };
        let mut ids = cart.meal_ids();
        ids.push(meal_id);
        let meals = self.resolve(&ids).await?;

        cart.add_item(meal_id, quantity, &meals);
        self.store.upsert_cart(&cart).await?;
        Ok(CartView::assemble(cart, &meals))
    }

    /// Set a line to exactly `quantity`; zero or negative removes it.
    pub async fn update_item(&self, user_id: Uuid, meal_id: Uuid, quantity: i64) -> Result<CartView> {
        let _guard = self.locks.acquire(user_id).await;
        let mut cart = self
            .store
            .find_cart(user_id)
            .await?
            .ok_or(Error::CartItemNotFound { meal_id })?;
        let meals = self.resolve(&cart.meal_ids()).await?;

        let quantity = quantity.clamp(0, u32::MAX as i64) as u32;
        cart.update_quantity(meal_id, quantity, &meals)?;
        self.store.upsert_cart(&cart).await?;
        Ok(CartView::assemble(cart, &meals))
    }

    /// Remove a line if present. Absent lines (or an absent cart) are fine.
    pub async fn remove_item(&self, user_id: Uuid, meal_id: Uuid) -> Result<CartView> {
        let _guard = self.locks.acquire(user_id).await;
        let mut cart = match self.store.find_cart(user_id).await? {
            Some(cart) => cart,
            None => Cart::new(user_id, &self.currency),
        };
        let meals = self.resolve(&cart.meal_ids()).await?;

        cart.remove_item(meal_id, &meals);
        self.store.upsert_cart(&cart).await?;
        Ok(CartView::assemble(cart, &meals))
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<CartView> {
        let _guard = self.locks.acquire(user_id).await;
        let mut cart = match self.store.find_cart(user_id).await? {
            Some(cart) => cart,
            None => Cart::new(user_id, &self.currency),
        };
        cart.clear();
        self.store.upsert_cart(&cart).await?;
        Ok(CartView::assemble(cart, &MealIndex::new()))
    }

    async fn resolve(&self, ids: &[Uuid]) -> Result<MealIndex> {
        let unique: Vec<Uuid> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
        let meals = self.store.meals_by_ids(&unique).await?;
        Ok(meals.into_iter().map(|m| (m.id, m)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::{meal, services};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_get_or_create_returns_empty_cart() {
        let (_, carts, _) = services();
        let user = Uuid::new_v4();

        let view = carts.get_or_create(user).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total_price.amount(), Decimal::ZERO);
        assert_eq!(view.total_calories, 0);

        // Second access returns the same cart.
        let again = carts.get_or_create(user).await.unwrap();
        assert_eq!(again.id, view.id);
    }

    #[tokio::test]
    async fn test_add_unknown_meal_fails() {
        let (_, carts, _) = services();
        let result = carts.add_item(Uuid::new_v4(), Uuid::new_v4(), 1).await;
        assert!(matches!(result, Err(Error::MealNotFound { .. })));
    }

    #[tokio::test]
    async fn test_add_unavailable_meal_fails() {
        let (store, carts, _) = services();
        let mut m = meal(50000, 400);
        m.is_available = false;
        store.insert_meal(&m).await.unwrap();

        let result = carts.add_item(Uuid::new_v4(), m.id, 1).await;
        assert!(matches!(result, Err(Error::MealUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_add_is_not_idempotent() {
        let (store, carts, _) = services();
        let m = meal(85000, 450);
        store.insert_meal(&m).await.unwrap();
        let user = Uuid::new_v4();

        carts.add_item(user, m.id, 2).await.unwrap();
        let view = carts.add_item(user, m.id, 2).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 4);
        assert_eq!(view.total_price.amount(), Decimal::new(340000, 0));
    }

    #[tokio::test]
    async fn test_update_zero_matches_remove() {
        let (store, carts, _) = services();
        let a = meal(85000, 450);
        let b = meal(65000, 380);
        store.insert_meal(&a).await.unwrap();
        store.insert_meal(&b).await.unwrap();

        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        for user in [u1, u2] {
            carts.add_item(user, a.id, 2).await.unwrap();
            carts.add_item(user, b.id, 1).await.unwrap();
        }

        let via_update = carts.update_item(u1, a.id, 0).await.unwrap();
        let via_remove = carts.remove_item(u2, a.id).await.unwrap();

        assert_eq!(via_update.items.len(), 1);
        assert_eq!(via_remove.items.len(), 1);
        assert_eq!(via_update.total_price.amount(), via_remove.total_price.amount());
        assert_eq!(via_update.total_calories, via_remove.total_calories);
    }

    #[tokio::test]
    async fn test_totals_track_random_mutation_sequence() {
        let (store, carts, _) = services();
        let fixtures = [meal(85000, 450), meal(65000, 380), meal(120000, 520)];
        for m in &fixtures {
            store.insert_meal(m).await.unwrap();
        }
        let user = Uuid::new_v4();

        // A scripted pseudo-random walk over add/update/remove (cycling by
        // step index), covering merges, absolute sets, zero/negative
        // removals and no-op removals.
        let script: [(usize, i64); 12] = [
            (0, 3), (0, 2), (1, 0), (1, 5), (1, 0), (0, 0),
            (2, 2), (2, 7), (1, 0), (0, 4), (0, -3), (2, 0),
        ];
        let mut expected: std::collections::HashMap<Uuid, i64> = Default::default();
        let mut view = carts.get_or_create(user).await.unwrap();
        for (step, (idx, qty)) in script.into_iter().enumerate() {
            let m = &fixtures[idx];
            view = match step % 3 {
                0 => {
                    let q = qty.max(1);
                    *expected.entry(m.id).or_default() += q;
                    carts.add_item(user, m.id, q as u32).await.unwrap()
                }
                1 => {
                    if expected.contains_key(&m.id) {
                        if qty <= 0 {
                            expected.remove(&m.id);
                        } else {
                            expected.insert(m.id, qty);
                        }
                        carts.update_item(user, m.id, qty).await.unwrap()
                    } else {
                        view
                    }
                }
                _ => {
                    expected.remove(&m.id);
                    carts.remove_item(user, m.id).await.unwrap()
                }
            };

            let want_price: i64 = fixtures
                .iter()
                .map(|m| expected.get(&m.id).copied().unwrap_or(0) * m.price.amount().mantissa() as i64)
                .sum();
            let want_calories: i64 = fixtures
                .iter()
                .map(|m| expected.get(&m.id).copied().unwrap_or(0) * m.calories as i64)
                .sum();
            assert_eq!(view.total_price.amount(), Decimal::new(want_price, 0));
            assert_eq!(view.total_calories as i64, want_calories);
        }
    }
}
