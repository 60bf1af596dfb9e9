//! Store/Item/Tag operations and the rules that bind them together.
//!
//! Every function runs on the connection it is handed, normally an open
//! transaction, and leaves committing to the caller. Existence checks give
//! precise errors; the schema constraints behind them catch whatever races
//! past those checks and are mapped to the same errors.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{
    dto::{ItemDetails, StoreDetails, TagDetails},
    repo,
    repo_types::{Item, Store, Tag},
};
use crate::{
    db::{is_foreign_key_violation, is_raised, is_unique_violation},
    error::AppError,
};

async fn store_or_404(conn: &mut SqliteConnection, id: i64) -> Result<Store, AppError> {
    Store::find(conn, id).await?.ok_or(AppError::NotFound("Store"))
}

async fn item_or_404(conn: &mut SqliteConnection, id: i64) -> Result<Item, AppError> {
    Item::find(conn, id).await?.ok_or(AppError::NotFound("Item"))
}

async fn tag_or_404(conn: &mut SqliteConnection, id: i64) -> Result<Tag, AppError> {
    Tag::find(conn, id).await?.ok_or(AppError::NotFound("Tag"))
}

async fn store_details(conn: &mut SqliteConnection, store: Store) -> Result<StoreDetails, AppError> {
    let items = Item::list_by_store(conn, store.id).await?;
    let tags = Tag::list_by_store(conn, store.id).await?;
    Ok(StoreDetails::new(store, items, tags))
}

async fn item_details(conn: &mut SqliteConnection, item: Item) -> Result<ItemDetails, AppError> {
    let tags = Tag::list_by_item(conn, item.id).await?;
    Ok(ItemDetails::new(item, tags))
}

async fn tag_details(conn: &mut SqliteConnection, tag: Tag) -> Result<TagDetails, AppError> {
    let items = Item::list_by_tag(conn, tag.id).await?;
    Ok(TagDetails::new(tag, items))
}

// ---- stores ----

pub async fn create_store(conn: &mut SqliteConnection, name: &str) -> Result<StoreDetails, AppError> {
    let store = Store::insert(conn, name).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateStore
        } else {
            AppError::Storage(e)
        }
    })?;
    info!(store_id = store.id, name = %store.name, "store created");
    Ok(StoreDetails::new(store, Vec::new(), Vec::new()))
}

/// Refuses to delete a store that still owns items or tags.
pub async fn delete_store(conn: &mut SqliteConnection, id: i64) -> Result<(), AppError> {
    store_or_404(conn, id).await?;
    if Store::dependents(conn, id).await? > 0 {
        return Err(AppError::StoreNotEmpty);
    }
    Store::delete(conn, id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::StoreNotEmpty
        } else {
            AppError::Storage(e)
        }
    })?;
    info!(store_id = id, "store deleted");
    Ok(())
}

pub async fn list_stores(conn: &mut SqliteConnection) -> Result<Vec<StoreDetails>, AppError> {
    let stores = Store::list(conn).await?;
    let mut out = Vec::with_capacity(stores.len());
    for store in stores {
        out.push(store_details(conn, store).await?);
    }
    Ok(out)
}

pub async fn get_store(conn: &mut SqliteConnection, id: i64) -> Result<StoreDetails, AppError> {
    let store = store_or_404(conn, id).await?;
    store_details(conn, store).await
}

// ---- items ----

pub async fn create_item(
    conn: &mut SqliteConnection,
    store_id: i64,
    name: &str,
    price: f64,
) -> Result<ItemDetails, AppError> {
    store_or_404(conn, store_id).await?;
    let item = Item::insert(conn, None, name, price, store_id).await?;
    info!(item_id = item.id, store_id, "item created");
    Ok(ItemDetails::new(item, Vec::new()))
}

/// Updates name and price in place. A missing item is created under the
/// caller's id, which then requires `store_id`.
pub async fn update_item(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    price: f64,
    store_id: Option<i64>,
) -> Result<ItemDetails, AppError> {
    let item = match Item::find(conn, id).await? {
        Some(_) => Item::update(conn, id, name, price).await?,
        None => {
            let store_id = store_id.ok_or_else(|| {
                AppError::validation("store_id is required to create an item")
            })?;
            store_or_404(conn, store_id).await?;
            let item = Item::insert(conn, Some(id), name, price, store_id).await?;
            info!(item_id = id, store_id, "item created by update");
            item
        }
    };
    item_details(conn, item).await
}

pub async fn delete_item(conn: &mut SqliteConnection, id: i64) -> Result<(), AppError> {
    if Item::delete(conn, id).await? == 0 {
        return Err(AppError::NotFound("Item"));
    }
    info!(item_id = id, "item deleted");
    Ok(())
}

pub async fn list_items(conn: &mut SqliteConnection) -> Result<Vec<ItemDetails>, AppError> {
    let items = Item::list(conn).await?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item_details(conn, item).await?);
    }
    Ok(out)
}

pub async fn get_item(conn: &mut SqliteConnection, id: i64) -> Result<ItemDetails, AppError> {
    let item = item_or_404(conn, id).await?;
    item_details(conn, item).await
}

// ---- tags ----

/// Tag names are unique per store, not globally.
pub async fn create_tag(
    conn: &mut SqliteConnection,
    store_id: i64,
    name: &str,
) -> Result<TagDetails, AppError> {
    store_or_404(conn, store_id).await?;
    let tag = Tag::insert(conn, None, store_id, name).await.map_err(duplicate_tag)?;
    info!(tag_id = tag.id, store_id, "tag created");
    Ok(TagDetails::new(tag, Vec::new()))
}

/// Same upsert rule as [`update_item`].
pub async fn update_tag(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    store_id: Option<i64>,
) -> Result<TagDetails, AppError> {
    let tag = match Tag::find(conn, id).await? {
        Some(_) => Tag::rename(conn, id, name).await.map_err(duplicate_tag)?,
        None => {
            let store_id = store_id
                .ok_or_else(|| AppError::validation("store_id is required to create a tag"))?;
            store_or_404(conn, store_id).await?;
            let tag = Tag::insert(conn, Some(id), store_id, name)
                .await
                .map_err(duplicate_tag)?;
            info!(tag_id = id, store_id, "tag created by update");
            tag
        }
    };
    tag_details(conn, tag).await
}

/// A tag still linked to an item cannot be deleted.
pub async fn delete_tag(conn: &mut SqliteConnection, id: i64) -> Result<(), AppError> {
    tag_or_404(conn, id).await?;
    if Tag::link_count(conn, id).await? > 0 {
        return Err(AppError::TagLinked);
    }
    Tag::delete(conn, id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::TagLinked
        } else {
            AppError::Storage(e)
        }
    })?;
    info!(tag_id = id, "tag deleted");
    Ok(())
}

pub async fn list_store_tags(
    conn: &mut SqliteConnection,
    store_id: i64,
) -> Result<Vec<TagDetails>, AppError> {
    store_or_404(conn, store_id).await?;
    let tags = Tag::list_by_store(conn, store_id).await?;
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        out.push(tag_details(conn, tag).await?);
    }
    Ok(out)
}

pub async fn get_tag(conn: &mut SqliteConnection, id: i64) -> Result<TagDetails, AppError> {
    let tag = tag_or_404(conn, id).await?;
    tag_details(conn, tag).await
}

fn duplicate_tag(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::DuplicateTag
    } else {
        AppError::Storage(e)
    }
}

// ---- links ----

/// Links an item to a tag of `expected_store_id`. Item and tag must both
/// belong to that store.
pub async fn link_item_tag(
    conn: &mut SqliteConnection,
    item_id: i64,
    tag_id: i64,
    expected_store_id: i64,
) -> Result<ItemDetails, AppError> {
    let item = item_or_404(conn, item_id).await?;
    let tag = tag_or_404(conn, tag_id).await?;

    if tag.store_id != expected_store_id || item.store_id != tag.store_id {
        debug!(item_id, tag_id, item_store = item.store_id, tag_store = tag.store_id, "cross-store link refused");
        return Err(AppError::CrossStoreLink);
    }
    if repo::link_exists(conn, item_id, tag_id).await? {
        return Err(AppError::AlreadyLinked);
    }
    repo::link(conn, item_id, tag_id).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyLinked
        } else if is_raised(&e, "cross_store_link") {
            AppError::CrossStoreLink
        } else {
            AppError::Storage(e)
        }
    })?;
    info!(item_id, tag_id, "tag linked to item");
    item_details(conn, item).await
}

/// Removing a link that does not exist is a no-op.
pub async fn unlink_item_tag(
    conn: &mut SqliteConnection,
    item_id: i64,
    tag_id: i64,
) -> Result<ItemDetails, AppError> {
    let item = item_or_404(conn, item_id).await?;
    tag_or_404(conn, tag_id).await?;

    if repo::unlink(conn, item_id, tag_id).await? == 0 {
        debug!(item_id, tag_id, "no link to remove");
    } else {
        info!(item_id, tag_id, "tag unlinked from item");
    }
    item_details(conn, item).await
}
