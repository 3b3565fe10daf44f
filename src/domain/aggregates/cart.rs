//! Cart Aggregate
//!
//! One cart per user. Items are keyed by meal id; adding a meal that is
//! already present merges into the existing line. Totals are derived state,
//! recomputed after every mutation from the current meal records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::meal::Meal;
use crate::domain::value_objects::Money;
use crate::error::Error;

/// Meal records keyed by id, for resolving cart items during recomputation.
pub type MealIndex = HashMap<Uuid, Meal>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub meal_id: Uuid,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) items: Vec<CartItem>,
    pub(crate) total_price: Money,
    pub(crate) total_calories: u32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            items: vec![],
            total_price: Money::zero(currency),
            total_calories: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_price(&self) -> &Money {
        &self.total_price
    }

    pub fn total_calories(&self) -> u32 {
        self.total_calories
    }

    /// Ids of every meal referenced by the cart, for store lookups.
    pub fn meal_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|i| i.meal_id).collect()
    }

    /// Add `quantity` of a meal, merging into an existing line if present.
    /// Quantities below 1 are treated as 1.
    pub fn add_item(&mut self, meal_id: Uuid, quantity: u32, meals: &MealIndex) {
        let quantity = quantity.max(1);
        if let Some(existing) = self.items.iter_mut().find(|i| i.meal_id == meal_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { meal_id, quantity });
        }
        self.recompute_totals(meals);
    }

    /// Set a line to exactly `quantity`. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        meal_id: Uuid,
        quantity: u32,
        meals: &MealIndex,
    ) -> Result<(), Error> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.meal_id == meal_id)
            .ok_or(Error::CartItemNotFound { meal_id })?;
        if quantity == 0 {
            self.items.retain(|i| i.meal_id != meal_id);
        } else {
            item.quantity = quantity;
        }
        self.recompute_totals(meals);
        Ok(())
    }

    /// Remove a line. Removing an absent line is a no-op.
    pub fn remove_item(&mut self, meal_id: Uuid, meals: &MealIndex) {
        self.items.retain(|i| i.meal_id != meal_id);
        self.recompute_totals(meals);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_price = self.total_price.zeroed();
        self.total_calories = 0;
        self.updated_at = Utc::now();
    }

    /// Derive totals from current meal data. Items whose meal no longer
    /// resolves are skipped; the price total is rounded to the minor unit.
    fn recompute_totals(&mut self, meals: &MealIndex) {
        let mut price = self.total_price.zeroed();
        let mut calories: u32 = 0;
        for item in &self.items {
            if let Some(meal) = meals.get(&item.meal_id) {
                price = price.add(&meal.price.multiply(item.quantity)).unwrap_or(price);
                calories = calories.saturating_add(meal.calories.saturating_mul(item.quantity));
            }
        }
        self.total_price = price.round_minor();
        self.total_calories = calories;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::meal::{Meal, MealCategory, NewMeal};
    use rust_decimal::Decimal;

    fn meal(price: i64, calories: u32) -> Meal {
        Meal::create(NewMeal {
            name: format!("Meal {price}"),
            name_vi: None,
            description: "test".into(),
            description_vi: None,
            image: "img".into(),
            price: Money::new(Decimal::new(price, 0), "VND"),
            calories,
            protein: 10,
            carb: 10,
            fat: 10,
            category: MealCategory::Maintain,
            ingredients: vec![],
            ingredients_vi: vec![],
            is_available: true,
            rating: 5.0,
            is_best_seller: false,
        })
    }

    fn index(meals: &[&Meal]) -> MealIndex {
        meals.iter().map(|m| (m.id, (*m).clone())).collect()
    }

    #[test]
    fn test_add_merges_existing_line() {
        let a = meal(85000, 450);
        let meals = index(&[&a]);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");

        cart.add_item(a.id, 2, &meals);
        cart.add_item(a.id, 1, &meals);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.total_price().amount(), Decimal::new(255000, 0));
        assert_eq!(cart.total_calories(), 1350);
    }

    #[test]
    fn test_add_clamps_zero_quantity_to_one() {
        let a = meal(10000, 100);
        let meals = index(&[&a]);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");

        cart.add_item(a.id, 0, &meals);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_update_zero_equals_remove() {
        let a = meal(85000, 450);
        let b = meal(65000, 380);
        let meals = index(&[&a, &b]);

        let mut left = Cart::new(Uuid::new_v4(), "VND");
        left.add_item(a.id, 2, &meals);
        left.add_item(b.id, 1, &meals);
        let mut right = left.clone();

        left.update_quantity(a.id, 0, &meals).unwrap();
        right.remove_item(a.id, &meals);

        assert_eq!(left.items(), right.items());
        assert_eq!(left.total_price(), right.total_price());
        assert_eq!(left.total_calories(), right.total_calories());
    }

    #[test]
    fn test_update_is_absolute_not_incremental() {
        let a = meal(10000, 100);
        let meals = index(&[&a]);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 2, &meals);

        cart.update_quantity(a.id, 5, &meals).unwrap();
        cart.update_quantity(a.id, 5, &meals).unwrap();

        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.total_price().amount(), Decimal::new(50000, 0));
    }

    #[test]
    fn test_update_missing_item_errors() {
        let meals = MealIndex::new();
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        assert!(matches!(
            cart.update_quantity(Uuid::new_v4(), 1, &meals),
            Err(Error::CartItemNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let a = meal(10000, 100);
        let meals = index(&[&a]);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 1, &meals);

        cart.remove_item(a.id, &meals);
        cart.remove_item(a.id, &meals);

        assert!(cart.is_empty());
        assert_eq!(cart.total_price().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_unresolvable_meal_skipped_in_totals() {
        let a = meal(85000, 450);
        let gone = meal(99999, 999);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");

        let all = index(&[&a, &gone]);
        cart.add_item(a.id, 1, &all);
        cart.add_item(gone.id, 1, &all);

        // The second meal disappears from the catalog; only the first counts.
        let remaining = index(&[&a]);
        cart.update_quantity(a.id, 2, &remaining).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.total_price().amount(), Decimal::new(170000, 0));
        assert_eq!(cart.total_calories(), 900);
    }

    #[test]
    fn test_price_total_rounds_to_minor_unit() {
        let a = meal(0, 0);
        let mut priced = a.clone();
        priced.price = Money::new(Decimal::new(3333, 3), "VND"); // 3.333
        let meals = index(&[&priced]);

        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(priced.id, 3, &meals); // 9.999 -> 10.00

        assert_eq!(cart.total_price().amount(), Decimal::new(1000, 2));
    }

    #[test]
    fn test_clear_zeroes_totals() {
        let a = meal(85000, 450);
        let meals = index(&[&a]);
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 2, &meals);

        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.total_price().amount(), Decimal::ZERO);
        assert_eq!(cart.total_calories(), 0);
    }
}
