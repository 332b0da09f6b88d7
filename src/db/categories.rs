//! Category CRUD and default seed data.

use super::{now_ms, Database};
use crate::error::StoreError;
use crate::types::Category;
use anyhow::Result;
use rusqlite::params;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    /// List all categories, ordered by name.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, color, icon, created_at FROM categories ORDER BY name ASC")?;

            let categories = stmt
                .query_map([], |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        color: row.get(2)?,
                        icon: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(categories)
        })
    }

    /// Create a category. Names are unique.
    pub fn create_category(
        &self,
        name: &str,
        color: &str,
        icon: Option<&str>,
    ) -> Result<Category> {
        self.with_conn(|conn| {
            let now = now_ms();
            let result = conn.execute(
                "INSERT INTO categories (name, color, icon, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, color, icon, now],
            );

            match result {
                Ok(_) => Ok(Category {
                    id: conn.last_insert_rowid(),
                    name: name.to_string(),
                    color: color.to_string(),
                    icon: icon.map(String::from),
                    created_at: now,
                }),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::already_exists("Category", name).into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Delete a category. Tasks pointing at it fall back to uncategorized
    /// via the foreign key's ON DELETE SET NULL.
    pub fn delete_category(&self, category_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let changes =
                conn.execute("DELETE FROM categories WHERE id = ?1", params![category_id])?;
            if changes == 0 {
                return Err(StoreError::category_not_found(category_id).into());
            }
            Ok(())
        })
    }

    /// Insert the default categories, skipping any that already exist.
    /// Returns the number inserted.
    pub fn seed_defaults(&self) -> Result<usize> {
        const DEFAULTS: [(&str, &str, &str); 4] = [
            ("Work", "#5e81ac", "💼"),
            ("Personal", "#b48ead", "🏠"),
            ("Shopping", "#88c0d0", "🛒"),
            ("Health", "#a3be8c", "💪"),
        ];

        self.with_conn(|conn| {
            let now = now_ms();
            let mut inserted = 0;
            for (name, color, icon) in DEFAULTS {
                inserted += conn.execute(
                    "INSERT OR IGNORE INTO categories (name, color, icon, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, color, icon, now],
                )?;
            }
            Ok(inserted)
        })
    }
}
