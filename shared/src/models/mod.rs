//! Domain models
//!
//! Entity structs map 1:1 onto the per-service tables (`sqlx::FromRow`);
//! `*Create` / `*Update` structs are the validated RPC inputs. Wire
//! serialization is camelCase, database columns are snake_case.

pub mod address;
pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod returns;
pub mod shipment;
pub mod user;

pub use address::Address;
pub use cart::{Cart, CartItem, CartItemCreate, CartWithItems, WishlistItem};
pub use order::{Order, OrderCreate, OrderHistory, OrderItem, OrderItemCreate, OrderWithDetails};
pub use payment::{
    Payment, PaymentConfirm, PaymentHistory, PaymentIntentCreate, Refund, RefundCreate,
};
pub use product::{
    Category, CategoryCreate, InventoryLog, Product, ProductCreate, ProductImage, ProductQuery,
    ProductSku, ProductStatus, ProductUpdate, ProductWithDetails, SkuCreate, StockUpdate,
};
pub use returns::{
    RefundQuote, ReturnApprove, ReturnHistory, ReturnPolicy, ReturnReason, ReturnRequest,
    ReturnRequestCreate, ReturnStatusUpdate, calculate_refund_amount,
};
pub use shipment::{
    Shipment, ShipmentCreate, ShipmentHistory, ShipmentStatusUpdate, ShippingMethod,
    ShippingQuote, ShippingZone, calculate_shipping_cost,
};
pub use user::{
    AddressCreate, AddressUpdate, LoginInput, ProfileUpdate, RegisterInput, User, UserAddress,
};
