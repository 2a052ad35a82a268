use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, Role, User};
use crate::db::{is_unique_violation, StoreError};

/// Durable credential store, addressed by phone number.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_phone_and_national_id(
        &self,
        phone: &str,
        national_id: &str,
    ) -> Result<Option<User>, StoreError>;
    /// Fails with [`StoreError::Duplicate`] when the phone is already taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Returns `false` if no user has that id.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str)
        -> Result<bool, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    phone: String,
    password_hash: String,
    role: String,
    national_id: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r.role.parse::<Role>().map_err(StoreError::Corrupt)?;
        Ok(User {
            id: r.id,
            name: r.name,
            phone: r.phone,
            password_hash: r.password_hash,
            role,
            national_id: r.national_id,
            created_at: r.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, name, phone, password_hash, role, national_id, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for b in binds {
            query = query.bind(*b);
        }
        query
            .fetch_optional(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("phone = $1", &[phone]).await
    }

    async fn find_by_phone_and_national_id(
        &self,
        phone: &str,
        national_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("phone = $1 AND national_id = $2", &[phone, national_id])
            .await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, phone, password_hash, role, national_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.national_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate
            } else {
                StoreError::Backend(e)
            }
        })?;
        User::try_from(row)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.phone == phone).cloned())
    }

    async fn find_by_phone_and_national_id(
        &self,
        phone: &str,
        national_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.phone == phone && u.national_id.as_deref() == Some(national_id))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.phone == user.phone) {
            return Err(StoreError::Duplicate);
        }
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            phone: user.phone,
            password_hash: user.password_hash,
            role: user.role,
            national_id: user.national_id,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(phone: &str, national_id: Option<&str>) -> NewUser {
        NewUser {
            name: "Asha".into(),
            phone: phone.into(),
            password_hash: "hash".into(),
            role: Role::User,
            national_id: national_id.map(Into::into),
        }
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_phone() {
        let store = MemoryUserStore::new();
        store.create(new_user("9999999999", Some("A"))).await.unwrap();
        let err = store
            .create(new_user("9999999999", Some("B")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn memory_store_lookups() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("9999999999", Some("A"))).await.unwrap();

        assert_eq!(store.find_by_id(created.id).await.unwrap().unwrap().phone, "9999999999");
        assert!(store.find_by_phone("9999999999").await.unwrap().is_some());
        assert!(store
            .find_by_phone_and_national_id("9999999999", "A")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_phone_and_national_id("9999999999", "B")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn memory_store_updates_password_hash() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("1", None)).await.unwrap();
        assert!(store.update_password_hash(created.id, "new").await.unwrap());
        assert_eq!(store.find_by_id(created.id).await.unwrap().unwrap().password_hash, "new");
        assert!(!store.update_password_hash(Uuid::new_v4(), "x").await.unwrap());
    }

    #[test]
    fn row_with_unknown_role_is_corrupt() {
        let row = UserRow {
            id: Uuid::new_v4(),
            name: "x".into(),
            phone: "1".into(),
            password_hash: "h".into(),
            role: "ROOT".into(),
            national_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        assert!(matches!(User::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
