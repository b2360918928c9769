use super::{Database, DbError};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// A stored user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
}

/// Fields for inserting a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password_hash: String,
}

/// Lookup of user records by id.
///
/// Implementations must read the backing store on every call so a deleted
/// user is observed by the next lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, DbError>;
}

/// User directory backed by the application database
#[derive(Debug, Clone)]
pub struct SqlUserDirectory {
    database: Database,
}

const SELECT_BY_ID: &str =
    "SELECT id, first_name, last_name, username, password_hash FROM users WHERE id = $1";
const INSERT: &str = "INSERT INTO users (first_name, last_name, username, password_hash) \
                      VALUES ($1, $2, $3, $4) RETURNING id";
const DELETE_BY_ID: &str = "DELETE FROM users WHERE id = $1";

impl SqlUserDirectory {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Insert a user and return its id
    pub async fn insert(&self, user: &NewUser) -> Result<i64, DbError> {
        let id = with_pool!(&self.database, |pool| {
            sqlx::query_scalar::<_, i64>(INSERT)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.username)
                .bind(&user.password_hash)
                .fetch_one(pool)
                .await?
        });

        debug!(user_id = id, username = %user.username, "User inserted");
        Ok(id)
    }

    /// Delete a user; returns whether a row was removed
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let affected = with_pool!(&self.database, |pool| {
            sqlx::query(DELETE_BY_ID)
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected()
        });

        Ok(affected > 0)
    }
}

#[async_trait]
impl UserDirectory for SqlUserDirectory {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let user = with_pool!(&self.database, |pool| {
            sqlx::query_as::<_, User>(SELECT_BY_ID)
                .bind(id)
                .fetch_optional(pool)
                .await?
        });

        debug!(user_id = id, found = user.is_some(), "User lookup");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn test_directory() -> SqlUserDirectory {
        let database = Database::connect(&DatabaseConfig::sqlite("sqlite::memory:"))
            .await
            .unwrap();
        database.migrate().await.unwrap();
        SqlUserDirectory::new(database)
    }

    fn alice() -> NewUser {
        NewUser {
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_returns_inserted_user() {
        let directory = test_directory().await;
        let id = directory.insert(&alice()).await.unwrap();

        let user = directory.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.first_name, "Alice");
    }

    #[tokio::test]
    async fn test_get_by_id_unknown_is_none() {
        let directory = test_directory().await;
        assert!(directory.get_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_visible_to_next_lookup() {
        let directory = test_directory().await;
        let id = directory.insert(&alice()).await.unwrap();

        assert!(directory.delete(id).await.unwrap());
        assert!(directory.get_by_id(id).await.unwrap().is_none());
        assert!(!directory.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let directory = test_directory().await;
        directory.insert(&alice()).await.unwrap();
        assert!(directory.insert(&alice()).await.is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: 1,
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            username: "alice".to_string(),
            password_hash: "secret-hash".to_string(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
