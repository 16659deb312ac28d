//! Product catalog service
//!
//! Products are created as drafts and published by status update. SKUs
//! carry price and stock; every stock change appends an inventory log
//! row, and stock never goes below zero.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{
    Category, CategoryCreate, InventoryLog, Product, ProductCreate, ProductImage, ProductQuery,
    ProductSku, ProductStatus, ProductUpdate, ProductWithDetails, SkuCreate, StockUpdate,
};
use shared::{AppError, AppResult};

use crate::db::DbService;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct ProductService {
    db: DbService,
}

impl ProductService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// Create a draft product
    pub async fn create(&self, input: ProductCreate) -> AppResult<Product> {
        if input.base_price.is_negative() {
            return Err(AppError::validation("Base price must not be negative"));
        }

        let product_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO products (id, category_id, name, slug, description, short_description, \
             base_price, cost, weight, dimensions, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product_id)
        .bind(&input.category_id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.short_description)
        .bind(input.base_price.rounded())
        .bind(input.cost.map(|c| c.rounded()))
        .bind(input.weight)
        .bind(&input.dimensions)
        .bind(ProductStatus::Draft)
        .bind(now)
        .bind(now)
        .execute(&self.db.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Product slug is already taken".to_string())
            }
            _ => e.into(),
        })?;

        tracing::info!(product_id = %product_id, slug = %input.slug, "Product created");
        self.get_product_row(&product_id).await
    }

    /// Fetch a product with its category, SKUs and images, counting the view
    pub async fn get_product(&self, product_id: &str) -> AppResult<ProductWithDetails> {
        let product = self.get_product_row(product_id).await?;

        sqlx::query("UPDATE products SET view_count = view_count + 1 WHERE id = ?")
            .bind(product_id)
            .execute(&self.db.pool)
            .await?;

        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(&product.category_id)
            .fetch_optional(&self.db.pool)
            .await?;
        let skus = self.get_skus(product_id).await?;
        let images = sqlx::query_as::<_, ProductImage>(
            "SELECT * FROM product_images WHERE product_id = ? ORDER BY display_order",
        )
        .bind(product_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(ProductWithDetails {
            product,
            category,
            skus,
            images,
        })
    }

    /// List products with filters, newest first
    pub async fn list(&self, query: ProductQuery) -> AppResult<Vec<Product>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut sql = String::from("SELECT * FROM products WHERE 1 = 1");
        if query.category_id.is_some() {
            sql.push_str(" AND category_id = ?");
        }
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if query.search.is_some() {
            sql.push_str(" AND (name LIKE ? OR description LIKE ?)");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, Product>(&sql);
        if let Some(category_id) = &query.category_id {
            q = q.bind(category_id);
        }
        if let Some(status) = query.status {
            q = q.bind(status);
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{search}%");
            q = q.bind(pattern.clone()).bind(pattern);
        }
        let products = q.bind(limit).bind(offset).fetch_all(&self.db.pool).await?;
        Ok(products)
    }

    /// Apply a partial update
    pub async fn update(&self, product_id: &str, input: ProductUpdate) -> AppResult<Product> {
        let product = self.get_product_row(product_id).await?;
        if let Some(price) = input.base_price {
            if price.is_negative() {
                return Err(AppError::validation("Base price must not be negative"));
            }
        }

        sqlx::query(
            "UPDATE products SET name = COALESCE(?, name), \
             description = COALESCE(?, description), \
             short_description = COALESCE(?, short_description), \
             base_price = COALESCE(?, base_price), \
             status = COALESCE(?, status), \
             is_featured = COALESCE(?, is_featured), updated_at = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.short_description)
        .bind(input.base_price.map(|p| p.rounded()))
        .bind(input.status)
        .bind(input.is_featured)
        .bind(Utc::now())
        .bind(&product.id)
        .execute(&self.db.pool)
        .await?;

        self.get_product_row(product_id).await
    }

    /// Soft-delete: mark the product inactive
    pub async fn delete(&self, product_id: &str) -> AppResult<()> {
        let updated = sqlx::query("UPDATE products SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ProductStatus::Inactive)
            .bind(Utc::now())
            .bind(product_id)
            .execute(&self.db.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Product"));
        }
        tracing::info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }

    // ========== SKUs and stock ==========

    pub async fn create_sku(&self, input: SkuCreate) -> AppResult<ProductSku> {
        if input.price.is_negative() {
            return Err(AppError::validation("SKU price must not be negative"));
        }
        self.get_product_row(&input.product_id).await?;

        let sku_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO product_skus (id, product_id, sku, price, stock, attributes, barcode, \
             weight, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sku_id)
        .bind(&input.product_id)
        .bind(&input.sku)
        .bind(input.price.rounded())
        .bind(input.stock)
        .bind(input.attributes.as_ref().map(Json))
        .bind(&input.barcode)
        .bind(input.weight)
        .bind(now)
        .bind(now)
        .execute(&self.db.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("SKU code is already taken".to_string())
            }
            _ => e.into(),
        })?;

        self.get_sku(&sku_id).await
    }

    pub async fn get_skus(&self, product_id: &str) -> AppResult<Vec<ProductSku>> {
        let skus = sqlx::query_as::<_, ProductSku>(
            "SELECT * FROM product_skus WHERE product_id = ? ORDER BY created_at",
        )
        .bind(product_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(skus)
    }

    /// Adjust stock by a signed quantity, logging the movement
    pub async fn update_stock(&self, input: StockUpdate) -> AppResult<ProductSku> {
        let sku = self.get_sku(&input.sku_id).await?;
        let new_stock = sku.stock + input.quantity;
        if new_stock < 0 {
            return Err(AppError::business("Insufficient stock"));
        }
        let movement_type = input.movement_type.unwrap_or_else(|| {
            if input.quantity >= 0 { "in" } else { "out" }.to_string()
        });

        let mut tx = self.db.pool.begin().await?;
        sqlx::query("UPDATE product_skus SET stock = ?, updated_at = ? WHERE id = ?")
            .bind(new_stock)
            .bind(Utc::now())
            .bind(&sku.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO inventory_logs (id, sku_id, movement_type, quantity, reason, \
             reference_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sku.id)
        .bind(&movement_type)
        .bind(input.quantity)
        .bind(&input.reason)
        .bind(&input.reference_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(sku_id = %sku.id, quantity = input.quantity, stock = new_stock, "Stock updated");
        self.get_sku(&input.sku_id).await
    }

    pub async fn get_inventory_logs(&self, sku_id: &str) -> AppResult<Vec<InventoryLog>> {
        let logs = sqlx::query_as::<_, InventoryLog>(
            "SELECT * FROM inventory_logs WHERE sku_id = ? ORDER BY created_at DESC",
        )
        .bind(sku_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(logs)
    }

    // ========== Categories ==========

    pub async fn create_category(&self, input: CategoryCreate) -> AppResult<Category> {
        let category_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO categories (id, name, slug, description, image, parent_id, \
             display_order, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&category_id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image)
        .bind(&input.parent_id)
        .bind(input.display_order.unwrap_or(0))
        .bind(now)
        .bind(now)
        .execute(&self.db.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Category slug is already taken".to_string())
            }
            _ => e.into(),
        })?;

        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn get_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_active = 1 ORDER BY display_order, name",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(categories)
    }

    async fn get_product_row(&self, product_id: &str) -> AppResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))
    }

    async fn get_sku(&self, sku_id: &str) -> AppResult<ProductSku> {
        sqlx::query_as::<_, ProductSku>("SELECT * FROM product_skus WHERE id = ?")
            .bind(sku_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("SKU"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceKind;
    use shared::Money;
    use std::str::FromStr;

    async fn service() -> (ProductService, String) {
        let svc = ProductService::new(DbService::in_memory(ServiceKind::Product).await.unwrap());
        let category = svc
            .create_category(CategoryCreate {
                name: "Electronics".into(),
                slug: "electronics".into(),
                description: None,
                image: None,
                parent_id: None,
                display_order: None,
            })
            .await
            .unwrap();
        (svc, category.id)
    }

    fn product_input(category_id: &str, slug: &str) -> ProductCreate {
        ProductCreate {
            category_id: category_id.into(),
            name: "Widget".into(),
            slug: slug.into(),
            description: None,
            short_description: None,
            base_price: Money::from_str("19.99").unwrap(),
            cost: None,
            weight: None,
            dimensions: None,
        }
    }

    #[tokio::test]
    async fn products_start_as_drafts() {
        let (svc, category_id) = service().await;
        let product = svc.create(product_input(&category_id, "widget")).await.unwrap();
        assert_eq!(product.status, ProductStatus::Draft);

        let published = svc
            .update(
                &product.id,
                ProductUpdate {
                    status: Some(ProductStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(published.status, ProductStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let (svc, category_id) = service().await;
        svc.create(product_input(&category_id, "widget")).await.unwrap();
        let err = svc
            .create(product_input(&category_id, "widget"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn fetch_increments_view_count() {
        let (svc, category_id) = service().await;
        let product = svc.create(product_input(&category_id, "widget")).await.unwrap();

        svc.get_product(&product.id).await.unwrap();
        let details = svc.get_product(&product.id).await.unwrap();
        // the second fetch sees the first fetch's increment
        assert_eq!(details.product.view_count, 1);
        assert_eq!(details.category.as_ref().unwrap().slug, "electronics");
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_search() {
        let (svc, category_id) = service().await;
        let product = svc.create(product_input(&category_id, "widget")).await.unwrap();
        svc.create(ProductCreate {
            name: "Gadget".into(),
            ..product_input(&category_id, "gadget")
        })
        .await
        .unwrap();
        svc.update(
            &product.id,
            ProductUpdate {
                status: Some(ProductStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let active = svc
            .list(ProductQuery {
                status: Some(ProductStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let found = svc
            .list(ProductQuery {
                search: Some("gadg".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "gadget");
    }

    #[tokio::test]
    async fn stock_updates_are_logged_and_floored() {
        let (svc, category_id) = service().await;
        let product = svc.create(product_input(&category_id, "widget")).await.unwrap();
        let sku = svc
            .create_sku(SkuCreate {
                product_id: product.id,
                sku: "WID-1".into(),
                price: Money::from_str("19.99").unwrap(),
                stock: 10,
                attributes: None,
                barcode: None,
                weight: None,
            })
            .await
            .unwrap();

        let sku = svc
            .update_stock(StockUpdate {
                sku_id: sku.id.clone(),
                quantity: -4,
                movement_type: None,
                reason: Some("order".into()),
                reference_id: Some("order-1".into()),
            })
            .await
            .unwrap();
        assert_eq!(sku.stock, 6);

        let err = svc
            .update_stock(StockUpdate {
                sku_id: sku.id.clone(),
                quantity: -10,
                movement_type: None,
                reason: None,
                reference_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        let logs = svc.get_inventory_logs(&sku.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].movement_type, "out");
    }
}
