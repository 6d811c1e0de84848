use async_trait::async_trait;
use sqlx::PgPool;

use super::{encode_recipe, DrinkRow, MenuStore, StoreError, StoreResult};
use crate::drink::{Drink, Ingredient};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgMenuStore {
    db: PgPool,
}

impl PgMenuStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(err: sqlx::Error, title: Option<&str>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Duplicate(title.unwrap_or_default().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl MenuStore for PgMenuStore {
    async fn list_all(&self) -> StoreResult<Vec<Drink>> {
        let rows = sqlx::query_as::<_, DrinkRow>(
            r#"SELECT id, title, recipe FROM drinks ORDER BY title COLLATE "C" ASC, id ASC"#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(Drink::try_from).collect()
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>> {
        let row = sqlx::query_as::<_, DrinkRow>(
            "SELECT id, title, recipe FROM drinks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(Drink::try_from).transpose()
    }

    async fn create(&self, title: &str, recipe: &[Ingredient]) -> StoreResult<Drink> {
        let encoded = encode_recipe(recipe)?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(title)
        .bind(encoded)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, Some(title)))?;

        Drink::try_from(row)
    }

    async fn update(
        &self,
        id: i64,
        title: Option<&str>,
        recipe: Option<&[Ingredient]>,
    ) -> StoreResult<Drink> {
        let encoded = recipe.map(encode_recipe).transpose()?;
        // Single statement so the merge needs no explicit transaction.
        let row = sqlx::query_as::<_, DrinkRow>(
            "UPDATE drinks SET title = COALESCE($2, title), recipe = COALESCE($3, recipe)
             WHERE id = $1
             RETURNING id, title, recipe",
        )
        .bind(id)
        .bind(title)
        .bind(encoded)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, title))?;

        match row {
            Some(row) => Drink::try_from(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM drinks WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
