//! Cart and wishlist service
//!
//! Each user has at most one active cart, created lazily. Cart totals
//! (item count and price) are recomputed from the items after every
//! mutation. Updating an item's quantity to zero removes it.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{Cart, CartItem, CartItemCreate, CartWithItems, WishlistItem};
use shared::{AppError, AppResult, Money};

use crate::db::DbService;

#[derive(Clone)]
pub struct CartService {
    db: DbService,
}

impl CartService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// Fetch the user's active cart, creating one if none exists
    pub async fn get_or_create_cart(&self, user_id: &str) -> AppResult<CartWithItems> {
        let existing = sqlx::query_as::<_, Cart>(
            "SELECT * FROM carts WHERE user_id = ? AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.db.pool)
        .await?;

        let cart = match existing {
            Some(cart) => cart,
            None => {
                let now = Utc::now();
                let cart_id = Uuid::new_v4().to_string();
                sqlx::query(
                    "INSERT INTO carts (id, user_id, status, total_items, total_price, \
                     created_at, updated_at) VALUES (?, ?, 'active', 0, '0', ?, ?)",
                )
                .bind(&cart_id)
                .bind(user_id)
                .bind(now)
                .bind(now)
                .execute(&self.db.pool)
                .await?;
                tracing::debug!(cart_id = %cart_id, user_id = %user_id, "Cart created");
                sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE id = ?")
                    .bind(&cart_id)
                    .fetch_one(&self.db.pool)
                    .await?
            }
        };

        self.with_items(cart).await
    }

    /// Add an item; an existing line for the same SKU gains quantity
    pub async fn add_item(&self, input: CartItemCreate) -> AppResult<CartWithItems> {
        if input.price.is_negative() {
            return Err(AppError::validation("Item price must not be negative"));
        }
        let cart = self.get_cart(&input.cart_id).await?;

        let existing = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE cart_id = ? AND sku_id = ?",
        )
        .bind(&cart.id)
        .bind(&input.sku_id)
        .fetch_optional(&self.db.pool)
        .await?;

        match existing {
            Some(item) => {
                sqlx::query("UPDATE cart_items SET quantity = quantity + ?, price = ? WHERE id = ?")
                    .bind(input.quantity)
                    .bind(input.price.rounded())
                    .bind(&item.id)
                    .execute(&self.db.pool)
                    .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO cart_items (id, cart_id, product_id, sku_id, quantity, price, \
                     attributes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&cart.id)
                .bind(&input.product_id)
                .bind(&input.sku_id)
                .bind(input.quantity)
                .bind(input.price.rounded())
                .bind(input.attributes.as_ref().map(Json))
                .bind(Utc::now())
                .execute(&self.db.pool)
                .await?;
            }
        }

        self.recompute_totals(&cart.id).await?;
        self.with_items(self.get_cart(&cart.id).await?).await
    }

    /// Set an item's quantity; zero or less removes the line
    pub async fn update_item_quantity(
        &self,
        cart_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> AppResult<CartWithItems> {
        let cart = self.get_cart(cart_id).await?;
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE id = ? AND cart_id = ?",
        )
        .bind(item_id)
        .bind(&cart.id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;

        if quantity <= 0 {
            sqlx::query("DELETE FROM cart_items WHERE id = ?")
                .bind(&item.id)
                .execute(&self.db.pool)
                .await?;
        } else {
            sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ?")
                .bind(quantity)
                .bind(&item.id)
                .execute(&self.db.pool)
                .await?;
        }

        self.recompute_totals(&cart.id).await?;
        self.with_items(self.get_cart(&cart.id).await?).await
    }

    /// Remove one line from the cart
    pub async fn remove_item(&self, cart_id: &str, item_id: &str) -> AppResult<CartWithItems> {
        let cart = self.get_cart(cart_id).await?;
        let removed = sqlx::query("DELETE FROM cart_items WHERE id = ? AND cart_id = ?")
            .bind(item_id)
            .bind(&cart.id)
            .execute(&self.db.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(AppError::not_found("Cart item"));
        }

        self.recompute_totals(&cart.id).await?;
        self.with_items(self.get_cart(&cart.id).await?).await
    }

    /// Empty the cart
    pub async fn clear_cart(&self, cart_id: &str) -> AppResult<CartWithItems> {
        let cart = self.get_cart(cart_id).await?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(&cart.id)
            .execute(&self.db.pool)
            .await?;

        self.recompute_totals(&cart.id).await?;
        self.with_items(self.get_cart(&cart.id).await?).await
    }

    // ========== Wishlist ==========

    /// Add a product to the wishlist; duplicates are returned as-is
    pub async fn add_to_wishlist(&self, user_id: &str, product_id: &str) -> AppResult<WishlistItem> {
        let existing = sqlx::query_as::<_, WishlistItem>(
            "SELECT * FROM wishlists WHERE user_id = ? AND product_id = ?",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.db.pool)
        .await?;
        if let Some(item) = existing {
            return Ok(item);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO wishlists (id, user_id, product_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(product_id)
        .bind(Utc::now())
        .execute(&self.db.pool)
        .await?;

        sqlx::query_as::<_, WishlistItem>("SELECT * FROM wishlists WHERE id = ?")
            .bind(id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn remove_from_wishlist(&self, user_id: &str, product_id: &str) -> AppResult<()> {
        let removed = sqlx::query("DELETE FROM wishlists WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.db.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(AppError::not_found("Wishlist item"));
        }
        Ok(())
    }

    pub async fn get_wishlist(&self, user_id: &str) -> AppResult<Vec<WishlistItem>> {
        let items = sqlx::query_as::<_, WishlistItem>(
            "SELECT * FROM wishlists WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(items)
    }

    /// Fetch a cart with its items
    pub async fn get_cart_details(&self, cart_id: &str) -> AppResult<CartWithItems> {
        let cart = self.get_cart(cart_id).await?;
        self.with_items(cart).await
    }

    async fn get_cart(&self, cart_id: &str) -> AppResult<Cart> {
        sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE id = ?")
            .bind(cart_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Cart"))
    }

    async fn with_items(&self, cart: Cart) -> AppResult<CartWithItems> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE cart_id = ? ORDER BY created_at",
        )
        .bind(&cart.id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(CartWithItems { cart, items })
    }

    /// Derive total_items and total_price from the item rows
    async fn recompute_totals(&self, cart_id: &str) -> AppResult<()> {
        let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .fetch_all(&self.db.pool)
            .await?;

        let total_items: i64 = items.iter().map(|i| i.quantity).sum();
        let total_price: Money = items.iter().map(|i| i.price.times(i.quantity)).sum();

        sqlx::query("UPDATE carts SET total_items = ?, total_price = ?, updated_at = ? WHERE id = ?")
            .bind(total_items)
            .bind(total_price.rounded())
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }
}
