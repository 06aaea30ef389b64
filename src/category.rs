//! Categories for grouping transactions, e.g. "Food" or "Salary".
//!
//! Transactions and recurring rules refer to categories by name only, so
//! deleting a category never touches the ledger.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{AppState, CategoryId, Error, transaction::TransactionKind};

// ============================================================================
// MODELS
// ============================================================================

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for income or expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category, unique among categories of the same kind.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    pub kind: TransactionKind,
    /// How clients should draw the category.
    #[serde(flatten)]
    pub appearance: CategoryAppearance,
}

/// How a category is drawn next to its transactions.
///
/// The ledger stores these as given and never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryAppearance {
    /// An icon name from the client's icon set, e.g. "cart-outline".
    pub icon: Option<String>,
    /// A CSS-style colour, e.g. "#FF9500".
    pub color: Option<String>,
}

/// The categories a fresh ledger starts with: name, kind, icon and colour.
const DEFAULT_CATEGORIES: [(&str, TransactionKind, &str, &str); 7] = [
    ("Salary", TransactionKind::Income, "cash-outline", "#34C759"),
    ("Freelance", TransactionKind::Income, "briefcase-outline", "#34C759"),
    ("Food", TransactionKind::Expense, "fast-food-outline", "#FF9500"),
    ("Transport", TransactionKind::Expense, "car-sport-outline", "#5856D6"),
    ("Entertainment", TransactionKind::Expense, "game-controller-outline", "#AF52DE"),
    ("Shopping", TransactionKind::Expense, "cart-outline", "#FF2D55"),
    ("Bills", TransactionKind::Expense, "receipt-outline", "#FF3B30"),
];

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a category and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategory] if a category with the same name and kind exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: CategoryName,
    kind: TransactionKind,
    appearance: CategoryAppearance,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .execute(
            "INSERT INTO category (name, kind, icon, color) VALUES (?1, ?2, ?3, ?4);",
            (name.as_ref(), kind, &appearance.icon, &appearance.color),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateCategory(name.to_string()),
            error => error.into(),
        })?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        name,
        kind,
        appearance,
    })
}

/// Retrieve categories ordered by name, optionally only those of `kind`.
pub fn get_categories(
    kind: Option<TransactionKind>,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, kind, icon, color FROM category
             WHERE (?1 IS NULL OR kind = ?1)
             ORDER BY name ASC;",
        )?
        .query_map((kind,), map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Delete a category by ID. Returns an error if the category doesn't exist.
pub fn delete_category(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

/// Initialize the category table and seed it with the default categories if it is empty.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            icon TEXT,
            color TEXT,
            UNIQUE(name, kind)
        );",
    )?;

    let count: i64 = connection.query_row("SELECT COUNT(id) FROM category;", [], |row| {
        row.get(0)
    })?;

    if count == 0 {
        let mut statement = connection
            .prepare("INSERT INTO category (name, kind, icon, color) VALUES (?1, ?2, ?3, ?4)")?;

        for (name, kind, icon, color) in DEFAULT_CATEGORIES {
            statement.execute((name, kind, icon, color))?;
        }
    }

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let kind = row.get(2)?;
    let icon = row.get(3)?;
    let color = row.get(4)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        kind,
        appearance: CategoryAppearance { icon, color },
    })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

/// The state needed for the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Query parameters for listing categories.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub kind: Option<TransactionKind>,
}

/// The request body for creating a category.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub kind: TransactionKind,
    #[serde(flatten)]
    pub appearance: CategoryAppearance,
}

/// A route handler for listing categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    Query(query): Query<CategoryQuery>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_categories(query.kind, &connection) {
        Ok(categories) => Json(categories).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(form): Json<CategoryForm>,
) -> Response {
    let name = match CategoryName::new(&form.name) {
        Ok(name) => name,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_category(name, form.kind, form.appearance, &connection) {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a category.
pub async fn delete_category_endpoint(
    Path(category_id): Path<CategoryId>,
    State(state): State<CategoryState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_category(category_id, &connection) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(Error::DeleteMissingCategory) => Error::DeleteMissingCategory.into_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting category {category_id}: {error}"
            );
            error.into_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
