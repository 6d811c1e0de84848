use async_trait::async_trait;
use common_http_errors::ApiError;
use thiserror::Error;

use crate::drink::{Drink, Ingredient};

mod memory;
mod postgres;

pub use memory::InMemoryMenuStore;
pub use postgres::PgMenuStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("drink {0} not found")]
    NotFound(i64),
    #[error("a drink titled '{0}' already exists")]
    Duplicate(String),
    #[error("stored recipe for drink {id} is unreadable: {detail}")]
    Corrupt { id: i64, detail: String },
    #[error("recipe could not be serialized: {0}")]
    Encode(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound { code: "drink_not_found" },
            StoreError::Duplicate(_) => ApiError::unprocessable("duplicate_drink", err),
            other => ApiError::unprocessable("unprocessable", other),
        }
    }
}

/// Persistence for the drinks menu.
///
/// Implementations order `list_all` by title, breaking ties by id, and apply
/// `update` as a partial merge of the supplied fields.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn list_all(&self) -> StoreResult<Vec<Drink>>;

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>>;

    async fn create(&self, title: &str, recipe: &[Ingredient]) -> StoreResult<Drink>;

    async fn update(
        &self,
        id: i64,
        title: Option<&str>,
        recipe: Option<&[Ingredient]>,
    ) -> StoreResult<Drink>;

    async fn delete(&self, id: i64) -> StoreResult<()>;
}

/// Row shape shared by both backends; the recipe is kept as serialized JSON.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DrinkRow {
    pub id: i64,
    pub title: String,
    pub recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = StoreError;

    fn try_from(row: DrinkRow) -> StoreResult<Self> {
        let recipe = serde_json::from_str::<Vec<Ingredient>>(&row.recipe).map_err(|err| {
            StoreError::Corrupt {
                id: row.id,
                detail: err.to_string(),
            }
        })?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

pub(crate) fn encode_recipe(recipe: &[Ingredient]) -> StoreResult<String> {
    serde_json::to_string(recipe).map_err(|err| StoreError::Encode(err.to_string()))
}
