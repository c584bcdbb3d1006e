// storefront/src/models/mod.rs

//! Data structures representing database entities and provider events.

pub mod cart;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartLine, CartStatus};
pub use order::{NewOrder, Order, OrderStatus};
pub use order_item::{OrderItem, OrderItemView};
pub use payment::{InternalState, OrderPaymentSummary, Payment, PaymentEvent, PaymentMetadata, ProviderStatus};
pub use product::Product;
pub use user::{Address, CustomerContact, User, UserRole};
