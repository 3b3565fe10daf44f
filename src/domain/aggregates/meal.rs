//! Meal catalog records.
//!
//! Meals are what the storefront sells. Orders snapshot the fields they need
//! at checkout, so editing or deleting a meal never rewrites order history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub description: String,
    pub description_vi: Option<String>,
    pub image: String,
    pub price: Money,
    pub calories: u32,
    pub protein: u32,
    pub carb: u32,
    pub fat: u32,
    pub category: MealCategory,
    pub ingredients: Vec<String>,
    pub ingredients_vi: Vec<String>,
    pub is_available: bool,
    pub rating: f32,
    pub is_best_seller: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MealCategory {
    WeightLoss,
    Maintain,
    MuscleGain,
}

impl MealCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightLoss => "weight-loss",
            Self::Maintain => "maintain",
            Self::MuscleGain => "muscle-gain",
        }
    }
}

impl std::str::FromStr for MealCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight-loss" => Ok(Self::WeightLoss),
            "maintain" => Ok(Self::Maintain),
            "muscle-gain" => Ok(Self::MuscleGain),
            other => Err(format!("unknown meal category: {other}")),
        }
    }
}

/// Content fields for creating a meal or replacing one wholesale.
#[derive(Clone, Debug)]
pub struct NewMeal {
    pub name: String,
    pub name_vi: Option<String>,
    pub description: String,
    pub description_vi: Option<String>,
    pub image: String,
    pub price: Money,
    pub calories: u32,
    pub protein: u32,
    pub carb: u32,
    pub fat: u32,
    pub category: MealCategory,
    pub ingredients: Vec<String>,
    pub ingredients_vi: Vec<String>,
    pub is_available: bool,
    pub rating: f32,
    pub is_best_seller: bool,
}

impl Meal {
    pub fn create(new: NewMeal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            name_vi: new.name_vi,
            description: new.description,
            description_vi: new.description_vi,
            image: new.image,
            price: new.price,
            calories: new.calories,
            protein: new.protein,
            carb: new.carb,
            fat: new.fat,
            category: new.category,
            ingredients: new.ingredients,
            ingredients_vi: new.ingredients_vi,
            is_available: new.is_available,
            rating: new.rating,
            is_best_seller: new.is_best_seller,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace all content fields, keeping identity and creation time.
    pub fn apply(&mut self, new: NewMeal) {
        self.name = new.name;
        self.name_vi = new.name_vi;
        self.description = new.description;
        self.description_vi = new.description_vi;
        self.image = new.image;
        self.price = new.price;
        self.calories = new.calories;
        self.protein = new.protein;
        self.carb = new.carb;
        self.fat = new.fat;
        self.category = new.category;
        self.ingredients = new.ingredients;
        self.ingredients_vi = new.ingredients_vi;
        self.is_available = new.is_available;
        self.rating = new.rating;
        self.is_best_seller = new.is_best_seller;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn new_meal() -> NewMeal {
        NewMeal {
            name: "Grilled Chicken with Quinoa".into(),
            name_vi: Some("Gà Nướng với Quinoa".into()),
            description: "High protein, low fat.".into(),
            description_vi: None,
            image: "https://example.com/chicken.jpg".into(),
            price: Money::new(Decimal::new(85000, 0), "VND"),
            calories: 450,
            protein: 35,
            carb: 40,
            fat: 12,
            category: MealCategory::WeightLoss,
            ingredients: vec!["Chicken breast".into(), "Quinoa".into()],
            ingredients_vi: vec![],
            is_available: true,
            rating: 5.0,
            is_best_seller: false,
        }
    }

    #[test]
    fn test_create_and_apply() {
        let mut meal = Meal::create(new_meal());
        assert!(meal.is_available);

        let mut updated = new_meal();
        updated.is_available = false;
        updated.price = Money::new(Decimal::new(90000, 0), "VND");
        let id = meal.id;
        meal.apply(updated);
        assert_eq!(meal.id, id);
        assert!(!meal.is_available);
        assert_eq!(meal.price.amount(), Decimal::new(90000, 0));
    }

    #[test]
    fn test_category_round_trip() {
        for c in [MealCategory::WeightLoss, MealCategory::Maintain, MealCategory::MuscleGain] {
            assert_eq!(c.as_str().parse::<MealCategory>().unwrap(), c);
        }
    }
}
