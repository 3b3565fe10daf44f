//! Postgres store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Cart, CartItem, Meal, MealCategory, Money, Order, OrderItem, OrderStatus, ShippingInfo,
};
use crate::store::{MealFilter, Store, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, bounding pool acquisition so a saturated database surfaces
    /// as a retryable timeout instead of a hung request, and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(from_sqlx)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn from_sqlx(e: sqlx::Error) -> StoreError {
    if matches!(e, sqlx::Error::PoolTimedOut) {
        return StoreError::Timeout;
    }
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateOrderNumber;
        }
    }
    StoreError::Backend(e.to_string())
}

fn bad_json(e: serde_json::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(sqlx::FromRow)]
struct MealRow {
    id: Uuid,
    name: String,
    name_vi: Option<String>,
    description: String,
    description_vi: Option<String>,
    image: String,
    price: Decimal,
    currency: String,
    calories: i32,
    protein: i32,
    carb: i32,
    fat: i32,
    category: String,
    ingredients: Vec<String>,
    ingredients_vi: Vec<String>,
    is_available: bool,
    rating: f32,
    is_best_seller: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MealRow> for Meal {
    type Error = StoreError;

    fn try_from(row: MealRow) -> Result<Self, StoreError> {
        Ok(Meal {
            id: row.id,
            name: row.name,
            name_vi: row.name_vi,
            description: row.description,
            description_vi: row.description_vi,
            image: row.image,
            price: Money::new(row.price, &row.currency),
            calories: row.calories as u32,
            protein: row.protein as u32,
            carb: row.carb as u32,
            fat: row.fat as u32,
            category: row.category.parse::<MealCategory>().map_err(StoreError::Backend)?,
            ingredients: row.ingredients,
            ingredients_vi: row.ingredients_vi,
            is_available: row.is_available,
            rating: row.rating,
            is_best_seller: row.is_best_seller,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    items: serde_json::Value,
    total_price: Decimal,
    currency: String,
    total_calories: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = StoreError;

    fn try_from(row: CartRow) -> Result<Self, StoreError> {
        let items: Vec<CartItem> = serde_json::from_value(row.items).map_err(bad_json)?;
        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            items,
            total_price: Money::new(row.total_price, &row.currency),
            total_calories: row.total_calories as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    order_number: String,
    items: serde_json::Value,
    total_price: Decimal,
    currency: String,
    total_calories: i32,
    shipping: serde_json::Value,
    payment_method: String,
    payment_status: String,
    order_status: String,
    qr_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let items: Vec<OrderItem> = serde_json::from_value(row.items).map_err(bad_json)?;
        let shipping: ShippingInfo = serde_json::from_value(row.shipping).map_err(bad_json)?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            order_number: row.order_number,
            items,
            total_price: Money::new(row.total_price, &row.currency),
            total_calories: row.total_calories as u32,
            shipping,
            payment_method: row.payment_method.parse().map_err(StoreError::Backend)?,
            payment_status: row.payment_status.parse().map_err(StoreError::Backend)?,
            order_status: row.order_status.parse().map_err(StoreError::Backend)?,
            qr_code: row.qr_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
            events: vec![],
        })
    }
}

fn meals_from_rows(rows: Vec<MealRow>) -> Result<Vec<Meal>, StoreError> {
    rows.into_iter().map(Meal::try_from).collect()
}

fn orders_from_rows(rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn find_meal(&self, id: Uuid) -> Result<Option<Meal>, StoreError> {
        sqlx::query_as::<_, MealRow>("SELECT * FROM meals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx)?
            .map(Meal::try_from)
            .transpose()
    }

    async fn meals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Meal>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>("SELECT * FROM meals WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(from_sqlx)?;
        meals_from_rows(rows)
    }

    async fn list_meals(&self, filter: &MealFilter) -> Result<Vec<Meal>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>(
            "SELECT * FROM meals WHERE is_available = TRUE \
             AND ($1::text IS NULL OR category = $1) \
             AND (NOT $2 OR is_best_seller) \
             AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                  OR COALESCE(name_vi, '') ILIKE '%' || $3 || '%' \
                  OR description ILIKE '%' || $3 || '%') \
             ORDER BY created_at DESC",
        )
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.best_seller)
        .bind(filter.search.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        meals_from_rows(rows)
    }

    async fn related_meals(
        &self,
        category: MealCategory,
        exclude: Uuid,
        limit: i64,
    ) -> Result<Vec<Meal>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>(
            "SELECT * FROM meals WHERE is_available = TRUE AND category = $1 AND id <> $2 \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(category.as_str())
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        meals_from_rows(rows)
    }

    async fn insert_meal(&self, meal: &Meal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO meals (id, name, name_vi, description, description_vi, image, price, \
             currency, calories, protein, carb, fat, category, ingredients, ingredients_vi, \
             is_available, rating, is_best_seller, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(meal.id)
        .bind(&meal.name)
        .bind(&meal.name_vi)
        .bind(&meal.description)
        .bind(&meal.description_vi)
        .bind(&meal.image)
        .bind(meal.price.amount())
        .bind(meal.price.currency())
        .bind(meal.calories as i32)
        .bind(meal.protein as i32)
        .bind(meal.carb as i32)
        .bind(meal.fat as i32)
        .bind(meal.category.as_str())
        .bind(&meal.ingredients)
        .bind(&meal.ingredients_vi)
        .bind(meal.is_available)
        .bind(meal.rating)
        .bind(meal.is_best_seller)
        .bind(meal.created_at)
        .bind(meal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn update_meal(&self, meal: &Meal) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE meals SET name = $2, name_vi = $3, description = $4, description_vi = $5, \
             image = $6, price = $7, currency = $8, calories = $9, protein = $10, carb = $11, \
             fat = $12, category = $13, ingredients = $14, ingredients_vi = $15, \
             is_available = $16, rating = $17, is_best_seller = $18, updated_at = $19 \
             WHERE id = $1",
        )
        .bind(meal.id)
        .bind(&meal.name)
        .bind(&meal.name_vi)
        .bind(&meal.description)
        .bind(&meal.description_vi)
        .bind(&meal.image)
        .bind(meal.price.amount())
        .bind(meal.price.currency())
        .bind(meal.calories as i32)
        .bind(meal.protein as i32)
        .bind(meal.carb as i32)
        .bind(meal.fat as i32)
        .bind(meal.category.as_str())
        .bind(&meal.ingredients)
        .bind(&meal.ingredients_vi)
        .bind(meal.is_available)
        .bind(meal.rating)
        .bind(meal.is_best_seller)
        .bind(meal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn delete_meal(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_meals(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM meals")
            .fetch_one(&self.pool)
            .await
            .map_err(from_sqlx)
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx)?
            .map(Cart::try_from)
            .transpose()
    }

    async fn upsert_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let items = serde_json::to_value(cart.items()).map_err(bad_json)?;
        sqlx::query(
            "INSERT INTO carts (id, user_id, items, total_price, currency, total_calories, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, \
             total_price = EXCLUDED.total_price, total_calories = EXCLUDED.total_calories, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.id())
        .bind(cart.user_id())
        .bind(items)
        .bind(cart.total_price().amount())
        .bind(cart.total_price().currency())
        .bind(cart.total_calories() as i32)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let items = serde_json::to_value(order.items()).map_err(bad_json)?;
        let shipping = serde_json::to_value(order.shipping()).map_err(bad_json)?;
        sqlx::query(
            "INSERT INTO orders (id, user_id, order_number, items, total_price, currency, \
             total_calories, shipping, payment_method, payment_status, order_status, qr_code, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(order.order_number())
        .bind(items)
        .bind(order.total_price().amount())
        .bind(order.total_price().currency())
        .bind(order.total_calories() as i32)
        .bind(shipping)
        .bind(order.payment_method().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.order_status().as_str())
        .bind(order.qr_code())
        .bind(order.created_at())
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders SET order_status = $2, payment_status = $3, qr_code = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(order.id())
        .bind(order.order_status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.qr_code())
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx)?
            .map(Order::try_from)
            .transpose()
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        orders_from_rows(rows)
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::text IS NULL OR order_status = $1) \
             ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        orders_from_rows(rows)
    }

    async fn count_orders(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(from_sqlx)
    }

    async fn paid_revenue(&self) -> Result<Decimal, StoreError> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE payment_status = 'paid'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(from_sqlx)
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        orders_from_rows(rows)
    }
}
