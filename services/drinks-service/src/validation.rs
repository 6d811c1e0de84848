use std::fmt;

use common_http_errors::ApiError;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::drink::Ingredient;

const INGREDIENT_FIELDS: [&str; 3] = ["color", "name", "parts"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

impl FieldError {
    fn new(field: impl Into<String>, message: &'static str) -> Self {
        Self { field: field.into(), message }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bad request: {}", join(.0))]
    Invalid(Vec<FieldError>),
    #[error("bad request: supply a title or a recipe to update")]
    EmptyUpdate,
}

fn join(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ValidationError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ValidationError::Invalid(errors) => errors,
            ValidationError::EmptyUpdate => &[],
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let code = match err {
            ValidationError::Invalid(_) => "invalid_body",
            ValidationError::EmptyUpdate => "empty_update",
        };
        ApiError::bad_request(code, err.to_string())
    }
}

/// Validated payload for `POST /drinks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

/// Validated payload for `PATCH /drinks/{id}`; `None` leaves the field as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrinkPatch {
    pub title: Option<String>,
    pub recipe: Option<Vec<Ingredient>>,
}

fn body_error(message: &'static str) -> ValidationError {
    ValidationError::Invalid(vec![FieldError::new("body", message)])
}

/// Parse a raw request body into a JSON object.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(body_error("must be a JSON object")),
        Err(_) => Err(body_error("must be valid JSON")),
    }
}

pub fn validate_new_drink(body: &Map<String, Value>) -> Result<NewDrink, ValidationError> {
    let mut errors = Vec::new();
    let title = check_title(body.get("title"), true, &mut errors);
    let recipe = check_recipe(body.get("recipe"), true, &mut errors);

    match (title, recipe) {
        (Some(title), Some(recipe)) if errors.is_empty() => Ok(NewDrink { title, recipe }),
        _ => Err(ValidationError::Invalid(errors)),
    }
}

pub fn validate_drink_patch(body: &Map<String, Value>) -> Result<DrinkPatch, ValidationError> {
    let mut errors = Vec::new();
    let title = check_title(body.get("title"), false, &mut errors);
    // an empty recipe counts as "not supplied"
    let recipe = check_recipe(body.get("recipe"), false, &mut errors).filter(|r| !r.is_empty());

    if !errors.is_empty() {
        return Err(ValidationError::Invalid(errors));
    }
    if title.is_none() && recipe.is_none() {
        return Err(ValidationError::EmptyUpdate);
    }
    Ok(DrinkPatch { title, recipe })
}

fn check_title(
    value: Option<&Value>,
    required: bool,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            if required {
                errors.push(FieldError::new("title", "required field"));
            }
            None
        }
        Some(Value::String(title)) if title.trim().is_empty() => {
            errors.push(FieldError::new("title", "must not be empty"));
            None
        }
        Some(Value::String(title)) => Some(title.clone()),
        Some(_) => {
            errors.push(FieldError::new("title", "must be of string type"));
            None
        }
    }
}

fn check_recipe(
    value: Option<&Value>,
    required: bool,
    errors: &mut Vec<FieldError>,
) -> Option<Vec<Ingredient>> {
    let before = errors.len();
    let recipe = match value {
        None | Some(Value::Null) => {
            if required {
                errors.push(FieldError::new("recipe", "required field"));
            }
            return None;
        }
        Some(Value::Object(component)) => check_ingredient("recipe", component, errors)
            .into_iter()
            .collect::<Vec<_>>(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let path = format!("recipe[{index}]");
                match item {
                    Value::Object(component) => check_ingredient(&path, component, errors),
                    _ => {
                        errors.push(FieldError::new(path, "must be of dict type"));
                        None
                    }
                }
            })
            .collect(),
        Some(_) => {
            errors.push(FieldError::new("recipe", "must be of dict type"));
            return None;
        }
    };

    (errors.len() == before).then_some(recipe)
}

fn check_ingredient(
    path: &str,
    component: &Map<String, Value>,
    errors: &mut Vec<FieldError>,
) -> Option<Ingredient> {
    let before = errors.len();

    for key in component.keys() {
        if !INGREDIENT_FIELDS.contains(&key.as_str()) {
            errors.push(FieldError::new(format!("{path}.{key}"), "unknown field"));
        }
    }

    let color = check_text(path, "color", component.get("color"), errors);
    let name = check_text(path, "name", component.get("name"), errors);
    let parts = match component.get("parts") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(format!("{path}.parts"), "required field"));
            None
        }
        Some(value) => match value.as_i64() {
            Some(parts) if parts >= 1 => Some(parts),
            Some(_) => {
                errors.push(FieldError::new(format!("{path}.parts"), "min value is 1"));
                None
            }
            None => {
                errors.push(FieldError::new(format!("{path}.parts"), "must be of integer type"));
                None
            }
        },
    };

    match (color, name, parts) {
        (Some(color), Some(name), Some(parts)) if errors.len() == before => {
            Some(Ingredient { color, name, parts })
        }
        _ => None,
    }
}

fn check_text(
    path: &str,
    field: &str,
    value: Option<&Value>,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(format!("{path}.{field}"), "required field"));
            None
        }
        Some(Value::String(text)) if text.is_empty() => {
            errors.push(FieldError::new(format!("{path}.{field}"), "min length is 1"));
            None
        }
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.push(FieldError::new(format!("{path}.{field}"), "must be of string type"));
            None
        }
    }
}
