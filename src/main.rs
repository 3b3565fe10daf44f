//! Mealbox - Food-Delivery Storefront Backend

use anyhow::{Context, Result};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use mealbox::config::{AppConfig, StoreBackend};
use mealbox::domain::{
    Meal, MealCategory, Money, NewMeal, Order, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingInfo,
};
use mealbox::error::Error;
use mealbox::service::{
    Caller, CartService, CartView, DashboardStats, EventPublisher, OrderService, UserLocks,
};
use mealbox::store::{memory::MemoryStore, postgres::PgStore, MealFilter, Store};

#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    carts: CartService,
    orders: OrderService,
    currency: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load();
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            Arc::new(PgStore::connect(url).await?)
        }
        StoreBackend::Memory => {
            tracing::info!("using in-memory store, data will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };
    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(%err, "NATS unavailable, order events disabled");
                None
            }
        },
        None => None,
    };

    let locks = Arc::new(UserLocks::new());
    let state = AppState {
        store: store.clone(),
        carts: CartService::new(store.clone(), locks.clone(), &config.currency),
        orders: OrderService::new(store, locks, EventPublisher::new(nats), config.bank.clone()),
        currency: config.currency.clone(),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "mealbox"})) }))
        .route("/api/v1/meals", get(list_meals))
        .route("/api/v1/meals/:id", get(get_meal))
        .route("/api/v1/meals/:id/related", get(related_meals))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_cart_item))
        .route("/api/v1/cart/items/:meal_id", put(update_cart_item).delete(remove_cart_item))
        .route("/api/v1/orders", get(my_orders).post(create_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/admin/meals", post(create_meal))
        .route("/api/v1/admin/meals/:id", put(update_meal).delete(delete_meal))
        .route("/api/v1/admin/orders", get(admin_list_orders))
        .route("/api/v1/admin/orders/:id/status", put(update_order_status))
        .route("/api/v1/admin/orders/:id/payment", put(update_payment_status))
        .route("/api/v1/admin/stats", get(admin_stats))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state);

    tracing::info!("mealbox listening on 0.0.0.0:{}", config.port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?,
        app,
    )
    .await?;
    Ok(())
}

// =============================================================================
// Caller identity
// =============================================================================

// Identity is established by the gateway in front of this service; it injects
// the authenticated user id and role as headers. This is the single policy
// point - past these extractors the engine only sees a pre-authorized caller.

struct AuthUser(Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid x-user-id".to_string()))?;
        let admin = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .map(|role| role == "admin")
            .unwrap_or(false);
        Ok(AuthUser(Caller { user_id, admin }))
    }
}

struct AdminUser;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(caller) = AuthUser::from_request_parts(parts, state).await?;
        if !caller.admin {
            return Err((StatusCode::FORBIDDEN, "administrator role required".to_string()));
        }
        Ok(AdminUser)
    }
}

// =============================================================================
// Error mapping
// =============================================================================

enum ApiError {
    Core(Error),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Core(e)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Core(e) => {
                let status = match &e {
                    Error::MealNotFound { .. }
                    | Error::CartItemNotFound { .. }
                    | Error::OrderNotFound { .. } => StatusCode::NOT_FOUND,
                    Error::MealUnavailable { .. } | Error::EmptyCart => StatusCode::BAD_REQUEST,
                    Error::Forbidden { .. } => StatusCode::FORBIDDEN,
                    Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                    Error::PaymentInstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::SERVICE_UNAVAILABLE {
                    tracing::error!(%e, "request failed on storage");
                }
                (status, e.to_string())
            }
        };
        (status, message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListMealsParams {
    category: Option<MealCategory>,
    #[serde(default)]
    best_seller: bool,
    search: Option<String>,
}

async fn list_meals(
    State(s): State<AppState>,
    Query(p): Query<ListMealsParams>,
) -> ApiResult<Json<Vec<Meal>>> {
    let filter = MealFilter { category: p.category, best_seller: p.best_seller, search: p.search };
    let meals = s.store.list_meals(&filter).await.map_err(Error::from)?;
    Ok(Json(meals))
}

async fn get_meal(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Meal>> {
    let meal = s
        .store
        .find_meal(id)
        .await
        .map_err(Error::from)?
        .ok_or(Error::MealNotFound { id })?;
    Ok(Json(meal))
}

async fn related_meals(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Meal>>> {
    let meal = s
        .store
        .find_meal(id)
        .await
        .map_err(Error::from)?
        .ok_or(Error::MealNotFound { id })?;
    let related = s.store.related_meals(meal.category, meal.id, 4).await.map_err(Error::from)?;
    Ok(Json(related))
}

#[derive(Debug, Deserialize, Validate)]
struct MealRequest {
    #[validate(length(min = 1))]
    name: String,
    name_vi: Option<String>,
    #[validate(length(min = 1))]
    description: String,
    description_vi: Option<String>,
    #[validate(url)]
    image: String,
    price: Decimal,
    calories: u32,
    protein: u32,
    carb: u32,
    fat: u32,
    category: MealCategory,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    ingredients_vi: Vec<String>,
    #[serde(default = "default_true")]
    is_available: bool,
    #[validate(range(min = 0.0, max = 5.0))]
    #[serde(default = "default_rating")]
    rating: f32,
    #[serde(default)]
    is_best_seller: bool,
}

fn default_true() -> bool {
    true
}

fn default_rating() -> f32 {
    5.0
}

impl MealRequest {
    fn into_new_meal(self, currency: &str) -> Result<NewMeal, ApiError> {
        if self.price < Decimal::ZERO {
            return Err(ApiError::BadRequest("price must not be negative".to_string()));
        }
        Ok(NewMeal {
            name: self.name,
            name_vi: self.name_vi,
            description: self.description,
            description_vi: self.description_vi,
            image: self.image,
            price: Money::new(self.price, currency),
            calories: self.calories,
            protein: self.protein,
            carb: self.carb,
            fat: self.fat,
            category: self.category,
            ingredients: self.ingredients,
            ingredients_vi: self.ingredients_vi,
            is_available: self.is_available,
            rating: self.rating,
            is_best_seller: self.is_best_seller,
        })
    }
}

async fn create_meal(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<MealRequest>,
) -> ApiResult<(StatusCode, Json<Meal>)> {
    r.validate()?;
    let meal = Meal::create(r.into_new_meal(&s.currency)?);
    s.store.insert_meal(&meal).await.map_err(Error::from)?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn update_meal(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<MealRequest>,
) -> ApiResult<Json<Meal>> {
    r.validate()?;
    let mut meal = s
        .store
        .find_meal(id)
        .await
        .map_err(Error::from)?
        .ok_or(Error::MealNotFound { id })?;
    meal.apply(r.into_new_meal(&s.currency)?);
    s.store.update_meal(&meal).await.map_err(Error::from)?;
    Ok(Json(meal))
}

async fn delete_meal(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !s.store.delete_meal(id).await.map_err(Error::from)? {
        return Err(Error::MealNotFound { id }.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Cart
// =============================================================================

async fn get_cart(State(s): State<AppState>, AuthUser(caller): AuthUser) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.get_or_create(caller.user_id).await?))
}

#[derive(Debug, Deserialize)]
struct AddCartItemRequest {
    meal_id: Uuid,
    quantity: Option<i64>,
}

async fn add_cart_item(
    State(s): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(r): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartView>> {
    // Anything below 1 counts as 1; the default is a single portion.
    let quantity = r.quantity.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let view = s.carts.add_item(caller.user_id, r.meal_id, quantity).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct UpdateCartItemRequest {
    quantity: i64,
}

async fn update_cart_item(
    State(s): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meal_id): Path<Uuid>,
    Json(r): Json<UpdateCartItemRequest>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.update_item(caller.user_id, meal_id, r.quantity).await?))
}

async fn remove_cart_item(
    State(s): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meal_id): Path<Uuid>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.remove_item(caller.user_id, meal_id).await?))
}

async fn clear_cart(State(s): State<AppState>, AuthUser(caller): AuthUser) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.clear(caller.user_id).await?))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    shipping_info: ShippingInfo,
    payment_method: PaymentMethod,
}

async fn create_order(
    State(s): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(r): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    r.shipping_info.validate()?;
    let order = s.orders.checkout(caller.user_id, r.shipping_info, r.payment_method).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(State(s): State<AppState>, AuthUser(caller): AuthUser) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.orders.orders_for(caller.user_id).await?))
}

async fn get_order(
    State(s): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.get_for(caller, id).await?))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Deserialize)]
struct AdminOrdersParams {
    status: Option<OrderStatus>,
}

async fn admin_list_orders(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<AdminOrdersParams>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.orders.list(p.status).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateOrderStatusRequest {
    order_status: OrderStatus,
}

async fn update_order_status(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateOrderStatusRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.set_status(id, r.order_status).await?))
}

#[derive(Debug, Deserialize)]
struct UpdatePaymentStatusRequest {
    payment_status: PaymentStatus,
}

async fn update_payment_status(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdatePaymentStatusRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.set_payment_status(id, r.payment_status).await?))
}

async fn admin_stats(State(s): State<AppState>, _admin: AdminUser) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(s.orders.stats().await?))
}
