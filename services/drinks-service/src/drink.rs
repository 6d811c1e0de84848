use serde::{Deserialize, Serialize};

/// One line of a drink recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub color: String,
    pub name: String,
    pub parts: i64,
}

/// A menu item as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

/// Public projection: ingredient names are withheld.
#[derive(Debug, Clone, Serialize)]
pub struct ShortDrink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<ShortIngredient>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortIngredient {
    pub color: String,
    pub parts: i64,
}

/// Detailed projection for callers holding `get:drinks-detail` or a write permission.
#[derive(Debug, Clone, Serialize)]
pub struct LongDrink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl Drink {
    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self
                .recipe
                .iter()
                .map(|ingredient| ShortIngredient {
                    color: ingredient.color.clone(),
                    parts: ingredient.parts,
                })
                .collect(),
        }
    }

    pub fn long(&self) -> LongDrink {
        LongDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcha() -> Drink {
        Drink {
            id: 7,
            title: "Matcha Shake".into(),
            recipe: vec![
                Ingredient { color: "#f7f7f7".into(), name: "milk".into(), parts: 1 },
                Ingredient { color: "#a8b400".into(), name: "matcha".into(), parts: 3 },
            ],
        }
    }

    #[test]
    fn short_form_hides_ingredient_names() {
        let value = serde_json::to_value(matcha().short()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": 7,
                "title": "Matcha Shake",
                "recipe": [
                    {"color": "#f7f7f7", "parts": 1},
                    {"color": "#a8b400", "parts": 3}
                ]
            })
        );
    }

    #[test]
    fn long_form_includes_ingredient_names() {
        let value = serde_json::to_value(matcha().long()).expect("serialize");
        let recipe = value["recipe"].as_array().expect("recipe array");
        assert_eq!(recipe.len(), 2);
        assert!(recipe.iter().all(|item| item.get("name").is_some()));
        assert_eq!(recipe[1]["name"], "matcha");
        assert_eq!(value["title"], "Matcha Shake");
    }
}
