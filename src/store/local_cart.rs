//! Guest cart persisted in SQLite.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::VariantKey;
use crate::{Result, StorefrontError};

#[derive(Debug, sqlx::FromRow)]
struct StoredLine {
    product_id: String,
    size: String,
    color: String,
    name: String,
    price: String,
    image: Option<String>,
    quantity: i64,
}

impl TryFrom<StoredLine> for CartLine {
    type Error = StorefrontError;
    fn try_from(row: StoredLine) -> Result<Self> {
        let unit_price = Decimal::from_str(&row.price)
            .map_err(|e| StorefrontError::CorruptCart(format!("price {:?} for {}: {}", row.price, row.product_id, e)))?;
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| StorefrontError::CorruptCart(format!("quantity {} for {}", row.quantity, row.product_id)))?;
        Ok(CartLine {
            key: VariantKey::new(row.product_id, Some(row.size), Some(row.color)),
            name: row.name,
            unit_price,
            image: row.image,
            quantity,
        })
    }
}

#[derive(Clone, Debug)]
pub struct LocalCartStore { pool: SqlitePool }

impl LocalCartStore {
    /// Opens (creating if needed) the store at `url` and applies migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> { Self::connect("sqlite::memory:").await }

    pub async fn lines(&self) -> Result<Vec<CartLine>> {
        sqlx::query_as::<_, StoredLine>("SELECT product_id, size, color, name, price, image, quantity FROM local_cart_items ORDER BY added_at, rowid")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    pub async fn load(&self, currency: &str) -> Result<Cart> {
        Ok(Cart::from_lines(currency, self.lines().await?))
    }

    /// Inserts the line or overwrites the quantity and snapshot of the stored one.
    pub async fn save_line(&self, line: &CartLine) -> Result<()> {
        if line.quantity == 0 {
            self.remove(&line.key).await?;
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO local_cart_items (product_id, size, color, name, price, image, quantity, added_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (product_id, size, color) DO UPDATE SET quantity = excluded.quantity, name = excluded.name, price = excluded.price, image = excluded.image",
        )
        .bind(line.key.product_id())
        .bind(line.key.size().unwrap_or(""))
        .bind(line.key.color().unwrap_or(""))
        .bind(&line.name)
        .bind(line.unit_price.to_string())
        .bind(&line.image)
        .bind(i64::from(line.quantity))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns whether a line was removed.
    pub async fn remove(&self, key: &VariantKey) -> Result<bool> {
        let result = sqlx::query("DELETE FROM local_cart_items WHERE product_id = ? AND size = ? AND color = ?")
            .bind(key.product_id())
            .bind(key.size().unwrap_or(""))
            .bind(key.color().unwrap_or(""))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM local_cart_items").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(size: Option<&str>, color: Option<&str>, quantity: u32) -> CartLine {
        CartLine {
            key: VariantKey::new("P1", size.map(String::from), color.map(String::from)),
            name: "Loafer".into(),
            unit_price: Decimal::new(69500, 2),
            image: Some("/img/loafer.jpg".into()),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = LocalCartStore::in_memory().await.unwrap();
        store.save_line(&line(Some("42"), Some("Noir"), 1)).await.unwrap();
        store.save_line(&line(Some("42"), Some("Cognac"), 2)).await.unwrap();
        store.save_line(&line(None, None, 1)).await.unwrap();
        let cart = store.load("USD").await.unwrap();
        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.quantity_of(&VariantKey::new("P1", Some("42".into()), Some("Cognac".into()))), 2);
        assert_eq!(cart.quantity_of(&VariantKey::plain("P1")), 1);
        assert_eq!(cart.lines()[0].unit_price, Decimal::new(69500, 2));
    }

    #[tokio::test]
    async fn test_save_overwrites_quantity() {
        let store = LocalCartStore::in_memory().await.unwrap();
        store.save_line(&line(Some("42"), None, 1)).await.unwrap();
        store.save_line(&line(Some("42"), None, 3)).await.unwrap();
        let lines = store.lines().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_remove_exact_key_only() {
        let store = LocalCartStore::in_memory().await.unwrap();
        store.save_line(&line(Some("42"), Some("Noir"), 1)).await.unwrap();
        store.save_line(&line(Some("42"), Some("Cognac"), 1)).await.unwrap();
        assert!(store.remove(&VariantKey::new("P1", Some("42".into()), Some("Noir".into()))).await.unwrap());
        assert!(!store.remove(&VariantKey::new("P1", Some("42".into()), None)).await.unwrap());
        let lines = store.lines().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].key.color(), Some("Cognac"));
        store.save_line(&line(Some("42"), Some("Cognac"), 0)).await.unwrap();
        assert!(store.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("cart.db").display());
        {
            let store = LocalCartStore::connect(&url).await.unwrap();
            store.save_line(&line(Some("40"), None, 2)).await.unwrap();
        }
        let store = LocalCartStore::connect(&url).await.unwrap();
        assert_eq!(store.lines().await.unwrap()[0].quantity, 2);
        store.clear().await.unwrap();
        assert!(store.lines().await.unwrap().is_empty());
    }
}
