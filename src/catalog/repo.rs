//! Plain SQL over the catalog tables. No invariant checks live here; the
//! schema constraints and `services` do that.

use sqlx::SqliteConnection;

use super::repo_types::{Item, Store, Tag};

impl Store {
    pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Store>> {
        sqlx::query_as::<_, Store>("SELECT id, name FROM stores WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Store>> {
        sqlx::query_as::<_, Store>("SELECT id, name FROM stores ORDER BY id")
            .fetch_all(conn)
            .await
    }

    pub async fn insert(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<Store> {
        sqlx::query_as::<_, Store>("INSERT INTO stores (name) VALUES (?) RETURNING id, name")
            .bind(name)
            .fetch_one(conn)
            .await
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
        let res = sqlx::query("DELETE FROM stores WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(res.rows_affected())
    }

    /// Items plus tags still pointing at the store.
    pub async fn dependents(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT (SELECT COUNT(*) FROM items WHERE store_id = ?)
                 + (SELECT COUNT(*) FROM tags WHERE store_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_one(conn)
        .await
    }
}

impl Item {
    pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Item>> {
        sqlx::query_as::<_, Item>("SELECT id, name, price, store_id FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Item>> {
        sqlx::query_as::<_, Item>("SELECT id, name, price, store_id FROM items ORDER BY id")
            .fetch_all(conn)
            .await
    }

    pub async fn list_by_store(
        conn: &mut SqliteConnection,
        store_id: i64,
    ) -> sqlx::Result<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT id, name, price, store_id FROM items WHERE store_id = ? ORDER BY id",
        )
        .bind(store_id)
        .fetch_all(conn)
        .await
    }

    pub async fn list_by_tag(conn: &mut SqliteConnection, tag_id: i64) -> sqlx::Result<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            r#"
            SELECT i.id, i.name, i.price, i.store_id
              FROM items i
              JOIN items_tags it ON it.item_id = i.id
             WHERE it.tag_id = ?
             ORDER BY i.id
            "#,
        )
        .bind(tag_id)
        .fetch_all(conn)
        .await
    }

    /// `id = None` lets SQLite assign one.
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Option<i64>,
        name: &str,
        price: f64,
        store_id: i64,
    ) -> sqlx::Result<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, name, price, store_id)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, price, store_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(store_id)
        .fetch_one(conn)
        .await
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        name: &str,
        price: f64,
    ) -> sqlx::Result<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET name = ?, price = ?
             WHERE id = ?
            RETURNING id, name, price, store_id
            "#,
        )
        .bind(name)
        .bind(price)
        .bind(id)
        .fetch_one(conn)
        .await
    }

    /// Links go with the item (ON DELETE CASCADE).
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
        let res = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(res.rows_affected())
    }
}

impl Tag {
    pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Tag>> {
        sqlx::query_as::<_, Tag>("SELECT id, name, store_id FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list_by_store(conn: &mut SqliteConnection, store_id: i64) -> sqlx::Result<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, name, store_id FROM tags WHERE store_id = ? ORDER BY id",
        )
        .bind(store_id)
        .fetch_all(conn)
        .await
    }

    pub async fn list_by_item(conn: &mut SqliteConnection, item_id: i64) -> sqlx::Result<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.store_id
              FROM tags t
              JOIN items_tags it ON it.tag_id = t.id
             WHERE it.item_id = ?
             ORDER BY t.id
            "#,
        )
        .bind(item_id)
        .fetch_all(conn)
        .await
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Option<i64>,
        store_id: i64,
        name: &str,
    ) -> sqlx::Result<Tag> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name, store_id)
            VALUES (?, ?, ?)
            RETURNING id, name, store_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(store_id)
        .fetch_one(conn)
        .await
    }

    pub async fn rename(conn: &mut SqliteConnection, id: i64, name: &str) -> sqlx::Result<Tag> {
        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = ? WHERE id = ? RETURNING id, name, store_id",
        )
        .bind(name)
        .bind(id)
        .fetch_one(conn)
        .await
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
        let res = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn link_count(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items_tags WHERE tag_id = ?")
            .bind(id)
            .fetch_one(conn)
            .await
    }
}

pub async fn link_exists(
    conn: &mut SqliteConnection,
    item_id: i64,
    tag_id: i64,
) -> sqlx::Result<bool> {
    let hit = sqlx::query_scalar::<_, i64>(
        "SELECT item_id FROM items_tags WHERE item_id = ? AND tag_id = ?",
    )
    .bind(item_id)
    .bind(tag_id)
    .fetch_optional(conn)
    .await?;
    Ok(hit.is_some())
}

pub async fn link(conn: &mut SqliteConnection, item_id: i64, tag_id: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO items_tags (item_id, tag_id) VALUES (?, ?)")
        .bind(item_id)
        .bind(tag_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns the number of removed links (0 or 1).
pub async fn unlink(conn: &mut SqliteConnection, item_id: i64, tag_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM items_tags WHERE item_id = ? AND tag_id = ?")
        .bind(item_id)
        .bind(tag_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
