use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{encode_recipe, DrinkRow, MenuStore, StoreError, StoreResult};
use crate::drink::{Drink, Ingredient};

/// Process-local store used for tests and for running without `DATABASE_URL`.
///
/// Mirrors the Postgres schema: ids come from a monotonically increasing
/// sequence, titles are unique, and recipes are kept serialized.
#[derive(Default)]
pub struct InMemoryMenuStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<i64, DrinkRow>,
}

impl MemoryState {
    fn title_taken(&self, title: &str, except: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|row| row.title == title && Some(row.id) != except)
    }
}

impl InMemoryMenuStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MenuStore for InMemoryMenuStore {
    async fn list_all(&self) -> StoreResult<Vec<Drink>> {
        let rows: Vec<DrinkRow> = self.read().rows.values().cloned().collect();
        let mut drinks = rows
            .into_iter()
            .map(Drink::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        // rows come out in id order, so a stable sort keeps insertion order on ties
        drinks.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(drinks)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>> {
        let row = self.read().rows.get(&id).cloned();
        row.map(Drink::try_from).transpose()
    }

    async fn create(&self, title: &str, recipe: &[Ingredient]) -> StoreResult<Drink> {
        let encoded = encode_recipe(recipe)?;
        let row = {
            let mut state = self.write();
            if state.title_taken(title, None) {
                return Err(StoreError::Duplicate(title.to_string()));
            }
            state.last_id += 1;
            let row = DrinkRow {
                id: state.last_id,
                title: title.to_string(),
                recipe: encoded,
            };
            state.rows.insert(row.id, row.clone());
            row
        };
        Drink::try_from(row)
    }

    async fn update(
        &self,
        id: i64,
        title: Option<&str>,
        recipe: Option<&[Ingredient]>,
    ) -> StoreResult<Drink> {
        let encoded = recipe.map(encode_recipe).transpose()?;
        let row = {
            let mut state = self.write();
            if !state.rows.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            if let Some(title) = title {
                if state.title_taken(title, Some(id)) {
                    return Err(StoreError::Duplicate(title.to_string()));
                }
            }
            let row = state.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if let Some(title) = title {
                row.title = title.to_string();
            }
            if let Some(encoded) = encoded {
                row.recipe = encoded;
            }
            row.clone()
        };
        Drink::try_from(row)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        match self.write().rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(color: &str, name: &str, parts: i64) -> Ingredient {
        Ingredient { color: color.into(), name: name.into(), parts }
    }

    #[tokio::test]
    async fn list_all_sorts_by_title_regardless_of_insertion_order() {
        let store = InMemoryMenuStore::new();
        store.create("B", &[]).await.expect("create B");
        store.create("A", &[]).await.expect("create A");
        store.create("Cortado", &[]).await.expect("create Cortado");

        let titles: Vec<String> = store
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|drink| drink.title)
            .collect();
        assert_eq!(titles, vec!["A", "B", "Cortado"]);
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = InMemoryMenuStore::new();
        assert!(store.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn ids_are_assigned_and_not_reused() {
        let store = InMemoryMenuStore::new();
        let first = store.create("Latte", &[]).await.expect("create");
        store.delete(first.id).await.expect("delete");
        let second = store.create("Latte", &[]).await.expect("recreate");
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn update_title_only_keeps_recipe() {
        let store = InMemoryMenuStore::new();
        let recipe = vec![ingredient("brown", "espresso", 1), ingredient("white", "milk", 2)];
        let drink = store.create("Flat White", &recipe).await.expect("create");

        let updated = store
            .update(drink.id, Some("Flat White Deluxe"), None)
            .await
            .expect("update");
        assert_eq!(updated.title, "Flat White Deluxe");
        assert_eq!(updated.recipe, recipe);
        assert_eq!(store.get(drink.id).await.expect("get"), Some(updated));
    }

    #[tokio::test]
    async fn update_recipe_only_keeps_title() {
        let store = InMemoryMenuStore::new();
        let drink = store
            .create("Mocha", &[ingredient("brown", "chocolate", 1)])
            .await
            .expect("create");

        let recipe = vec![ingredient("dark", "cocoa", 2)];
        let updated = store.update(drink.id, None, Some(recipe.as_slice())).await.expect("update");
        assert_eq!(updated.title, "Mocha");
        assert_eq!(updated.recipe, recipe);
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found() {
        let store = InMemoryMenuStore::new();
        let err = store.update(999, Some("Ghost"), None).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(999)));
    }

    #[tokio::test]
    async fn duplicate_titles_are_rejected() {
        let store = InMemoryMenuStore::new();
        store.create("Water", &[]).await.expect("create");
        let err = store.create("Water", &[]).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate(title) if title == "Water"));

        let other = store.create("Tea", &[]).await.expect("create");
        let err = store.update(other.id, Some("Water"), None).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate(_)));

        // renaming a drink to its own title is not a collision
        store.update(other.id, Some("Tea"), None).await.expect("same title");
    }

    #[tokio::test]
    async fn delete_removes_and_reports_missing() {
        let store = InMemoryMenuStore::new();
        let keep = store.create("Americano", &[]).await.expect("create");
        let gone = store.create("Affogato", &[]).await.expect("create");

        store.delete(gone.id).await.expect("delete");
        let ids: Vec<i64> = store.list_all().await.expect("list").iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![keep.id]);

        let err = store.delete(gone.id).await.expect_err("second delete");
        assert!(matches!(err, StoreError::NotFound(id) if id == gone.id));
    }
}
