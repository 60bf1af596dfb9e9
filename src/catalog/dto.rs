use serde::{Deserialize, Serialize};

use super::repo_types::{Item, Store, Tag};
use crate::error::AppError;

const MAX_NAME_LEN: usize = 80;

/// Trimmed, non-empty, at most 80 characters.
pub fn validate_name(field: &str, raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn validate_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(price)
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub price: f64,
    pub store_id: i64,
}

impl CreateItemRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            name: validate_name("name", &self.name)?,
            price: validate_price(self.price)?,
            store_id: self.store_id,
        })
    }
}

/// Body of `PUT /items/:id`. `store_id` is only read when the item does not
/// exist yet and has to be created.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub store_id: Option<i64>,
}

impl UpdateItemRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            name: validate_name("name", &self.name)?,
            price: validate_price(self.price)?,
            store_id: self.store_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

/// Body of `PUT /tags/:id`; same upsert rule as items.
#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: String,
    #[serde(default)]
    pub store_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkTagRequest {
    pub store_id: i64,
}

#[derive(Debug, Serialize)]
pub struct StoreDetails {
    pub id: i64,
    pub name: String,
    pub items: Vec<Item>,
    pub tags: Vec<Tag>,
}

impl StoreDetails {
    pub fn new(store: Store, items: Vec<Item>, tags: Vec<Tag>) -> Self {
        Self {
            id: store.id,
            name: store.name,
            items,
            tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemDetails {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub store_id: i64,
    pub tags: Vec<Tag>,
}

impl ItemDetails {
    pub fn new(item: Item, tags: Vec<Tag>) -> Self {
        Self {
            id: item.id,
            name: item.name,
            price: item.price,
            store_id: item.store_id,
            tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagDetails {
    pub id: i64,
    pub name: String,
    pub store_id: i64,
    pub items: Vec<Item>,
}

impl TagDetails {
    pub fn new(tag: Tag, items: Vec<Item>) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            store_id: tag.store_id,
            items,
        }
    }
}
