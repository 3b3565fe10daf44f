//! Order Aggregate
//!
//! An order is the immutable record produced by checking out a cart. Line
//! items snapshot the meal's name, price and calories at creation time and
//! are never re-resolved, so later catalog edits leave history untouched.
//! Only the two status axes and the payment-instruction attachment change
//! after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::cart::{Cart, MealIndex};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::Money;
use crate::error::Error;

const ORDER_NUMBER_PREFIX: &str = "EC";

/// Human-readable order number: prefix, millisecond timestamp and a random
/// three-digit disambiguator. Not trusted to be unique on its own - the
/// store enforces uniqueness and checkout regenerates on conflict.
pub fn generate_order_number() -> String {
    format!(
        "{ORDER_NUMBER_PREFIX}{}{:03}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>() % 1000
    )
}

/// Snapshot of one cart line at checkout time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub meal_id: Uuid,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    pub calories: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Cod,
    BankTransfer,
    QrCode,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::BankTransfer => "bank-transfer",
            Self::QrCode => "qr-code",
        }
    }

    /// Whether the customer pays up front against bank details.
    pub fn needs_payment_instruction(&self) -> bool {
        matches!(self, Self::BankTransfer | Self::QrCode)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "bank-transfer" => Ok(Self::BankTransfer),
            "qr-code" => Ok(Self::QrCode),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Confirmed,
    Preparing,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Delivering => "delivering",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "delivering" => Ok(Self::Delivering),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) order_number: String,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) total_price: Money,
    pub(crate) total_calories: u32,
    pub(crate) shipping: ShippingInfo,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) order_status: OrderStatus,
    pub(crate) qr_code: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<OrderEvent>,
}

impl Order {
    /// Build an order from a cart. Items snapshot the referenced meal at
    /// this instant; totals are copied verbatim from the cart so the order
    /// records exactly what the cart displayed. Cart lines whose meal no
    /// longer resolves are skipped; if nothing remains the cart counts as
    /// empty.
    pub fn from_cart(
        order_number: String,
        cart: &Cart,
        meals: &MealIndex,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
    ) -> Result<Self, Error> {
        let items: Vec<OrderItem> = cart
            .items()
            .iter()
            .filter_map(|item| {
                meals.get(&item.meal_id).map(|meal| OrderItem {
                    meal_id: meal.id,
                    name: meal.name.clone(),
                    price: meal.price.clone(),
                    quantity: item.quantity,
                    calories: meal.calories,
                })
            })
            .collect();
        if items.is_empty() {
            return Err(Error::EmptyCart);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut order = Self {
            id,
            user_id: cart.user_id(),
            order_number,
            items,
            total_price: cart.total_price().clone(),
            total_calories: cart.total_calories(),
            shipping,
            payment_method,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Confirmed,
            qr_code: None,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(OrderEvent::Created {
            order_id: id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            total: order.total_price.amount(),
        });
        Ok(order)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_price(&self) -> &Money {
        &self.total_price
    }

    pub fn total_calories(&self) -> u32 {
        self.total_calories
    }

    pub fn shipping(&self) -> &ShippingInfo {
        &self.shipping
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn order_status(&self) -> OrderStatus {
        self.order_status
    }

    pub fn qr_code(&self) -> Option<&str> {
        self.qr_code.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn attach_payment_instruction(&mut self, payload: String) {
        self.qr_code = Some(payload);
    }

    /// Set the fulfillment status. Any transition is allowed, including out
    /// of `Completed` and `Cancelled`; the administrator is trusted here.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.order_status = status;
        self.touch();
        self.raise_event(OrderEvent::StatusChanged { order_id: self.id, status });
    }

    /// Set the payment status, independently of the fulfillment status.
    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.touch();
        self.raise_event(OrderEvent::PaymentStatusChanged { order_id: self.id, status });
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, e: OrderEvent) {
        self.events.push(e);
    }

    fn touch(&mut self) {
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

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "Nguyen Van A".into(),
            phone: "0901234567".into(),
            email: None,
            address: "12 Ly Thuong Kiet".into(),
            city: "Hanoi".into(),
            district: None,
            ward: None,
            note: None,
        }
    }

    #[test]
    fn test_from_cart_snapshots_items_and_copies_totals() {
        let a = meal(85000, 450);
        let b = meal(65000, 380);
        let meals: MealIndex = [(a.id, a.clone()), (b.id, b.clone())].into_iter().collect();

        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 2, &meals);
        cart.add_item(b.id, 1, &meals);

        let order = Order::from_cart(
            generate_order_number(),
            &cart,
            &meals,
            shipping(),
            PaymentMethod::Cod,
        )
        .unwrap();

        assert_eq!(order.total_price().amount(), Decimal::new(235000, 0));
        assert_eq!(order.total_calories(), 1280);
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[0].name, a.name);
        assert_eq!(order.items()[0].quantity, 2);
        assert_eq!(order.order_status(), OrderStatus::Confirmed);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_from_cart_rejects_empty_cart() {
        let cart = Cart::new(Uuid::new_v4(), "VND");
        let result = Order::from_cart(
            generate_order_number(),
            &cart,
            &MealIndex::new(),
            shipping(),
            PaymentMethod::Cod,
        );
        assert!(matches!(result, Err(Error::EmptyCart)));
    }

    #[test]
    fn test_from_cart_skips_unresolvable_items() {
        let a = meal(85000, 450);
        let gone = meal(99999, 999);
        let all: MealIndex = [(a.id, a.clone()), (gone.id, gone.clone())].into_iter().collect();

        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 1, &all);
        cart.add_item(gone.id, 1, &all);

        let remaining: MealIndex = [(a.id, a.clone())].into_iter().collect();
        let order = Order::from_cart(
            generate_order_number(),
            &cart,
            &remaining,
            shipping(),
            PaymentMethod::Cod,
        )
        .unwrap();

        assert_eq!(order.items().len(), 1);
        assert_eq!(order.items()[0].meal_id, a.id);
    }

    #[test]
    fn test_status_changes_leave_items_and_totals_alone() {
        let a = meal(85000, 450);
        let meals: MealIndex = [(a.id, a.clone())].into_iter().collect();
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 2, &meals);

        let mut order = Order::from_cart(
            generate_order_number(),
            &cart,
            &meals,
            shipping(),
            PaymentMethod::Cod,
        )
        .unwrap();
        let items = order.items().to_vec();
        let total = order.total_price().clone();

        order.set_status(OrderStatus::Completed);
        order.set_status(OrderStatus::Preparing); // terminal states stay editable
        order.set_payment_status(PaymentStatus::Paid);

        assert_eq!(order.order_status(), OrderStatus::Preparing);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.items(), items.as_slice());
        assert_eq!(order.total_price(), &total);
    }

    #[test]
    fn test_snapshot_survives_meal_edits() {
        let mut a = meal(85000, 450);
        let meals: MealIndex = [(a.id, a.clone())].into_iter().collect();
        let mut cart = Cart::new(Uuid::new_v4(), "VND");
        cart.add_item(a.id, 1, &meals);

        let order = Order::from_cart(
            generate_order_number(),
            &cart,
            &meals,
            shipping(),
            PaymentMethod::Cod,
        )
        .unwrap();

        a.price = Money::new(Decimal::new(999999, 0), "VND");
        a.is_available = false;

        assert_eq!(order.items()[0].price.amount(), Decimal::new(85000, 0));
        assert_eq!(order.items()[0].calories, 450);
    }

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert!(n.starts_with("EC"));
        assert!(n.len() > 10);
        assert!(n[2..].chars().all(|c| c.is_ascii_digit()));
    }
}
