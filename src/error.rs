//! Error taxonomy shared by the cart/order engine and its callers.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("meal {id} not found")]
    MealNotFound { id: Uuid },

    #[error("meal {id} is not available")]
    MealUnavailable { id: Uuid },

    #[error("meal {meal_id} is not in the cart")]
    CartItemNotFound { meal_id: Uuid },

    #[error("order {id} not found")]
    OrderNotFound { id: Uuid },

    #[error("order {id} does not belong to the caller")]
    Forbidden { id: Uuid },

    #[error("cart is empty")]
    EmptyCart,

    /// Persistence failure. Transient from the caller's point of view;
    /// safe to retry the whole operation.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Payment-instruction generation failure. Never aborts checkout.
    #[error("payment instruction generation failed: {0}")]
    PaymentInstruction(String),
}

pub type Result<T> = std::result::Result<T, Error>;
