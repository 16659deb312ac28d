//! Domain services
//!
//! One service struct per bounded context, each owning queries against
//! its own database. Handlers in `api` stay thin and delegate here.

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod returns;
pub mod shipping;
pub mod user;

pub use cart::CartService;
pub use order::OrderService;
pub use payment::PaymentService;
pub use product::ProductService;
pub use returns::ReturnService;
pub use shipping::ShippingService;
pub use user::UserService;
