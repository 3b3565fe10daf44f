//! Domain model: aggregates, events and value objects.

pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::cart::{Cart, CartItem, MealIndex};
pub use aggregates::meal::{Meal, MealCategory, NewMeal};
pub use aggregates::order::{
    generate_order_number, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingInfo,
};
pub use value_objects::Money;
