//! In-process [`UserStore`] with the same unique and soft-delete rules as the
//! Postgres schema. Backs the handler tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserChanges};
use super::search::UserFilter;

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, soft-deleted ones included.
    pub fn snapshot(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    fn check_unique(
        rows: &[User],
        id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<(), StoreError> {
        let live = rows.iter().filter(|u| u.deleted_at.is_none() && u.id != id);
        for other in live {
            if other.username == username {
                return Err(StoreError::Conflict { field: "username" });
            }
            if other.email == email {
                return Err(StoreError::Conflict { field: "email" });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| u.deleted_at.is_none() && u.id == id)
            .cloned())
    }

    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| {
                u.deleted_at.is_none()
                    && username.map_or(true, |n| u.username == n)
                    && email.map_or(true, |e| u.email == e)
            })
            .cloned())
    }

    async fn find_conflicting(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| {
                u.deleted_at.is_none()
                    && Some(u.id) != exclude
                    && (username == Some(u.username.as_str()) || email == Some(u.email.as_str()))
            })
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_unique(&rows, user.id, &user.username, &user.email)?;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(idx) = rows
            .iter()
            .position(|u| u.deleted_at.is_none() && u.id == id)
        else {
            return Ok(None);
        };

        let mut next = rows[idx].clone();
        if let Some(username) = changes.username {
            next.username = username;
        }
        if let Some(email) = changes.email {
            next.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            next.password_hash = password_hash;
        }
        Self::check_unique(&rows, id, &next.username, &next.email)?;
        next.updated_at = OffsetDateTime::now_utc();
        rows[idx] = next.clone();
        Ok(Some(next))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|u| u.deleted_at.is_none() && u.id == id)
        {
            Some(user) => {
                user.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(rows
            .iter()
            .filter(|u| u.deleted_at.is_none() && filter.matches(&u.username, &u.email))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn unique_fields_are_enforced_on_insert() {
        let store = MemoryUserStore::new();
        store.insert(new_user("ann", "ann@x.io")).await.unwrap();

        let err = store.insert(new_user("ann", "other@x.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));
        let err = store.insert(new_user("bob", "ann@x.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));
    }

    #[tokio::test]
    async fn soft_deleted_rows_free_their_names_but_stay_stored() {
        let store = MemoryUserStore::new();
        let ann = store.insert(new_user("ann", "ann@x.io")).await.unwrap();
        assert!(store.soft_delete(ann.id).await.unwrap());
        assert!(!store.soft_delete(ann.id).await.unwrap());
        assert!(store.find_by_id(ann.id).await.unwrap().is_none());

        store.insert(new_user("ann", "ann@x.io")).await.unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn conflict_lookup_skips_the_excluded_id() {
        let store = MemoryUserStore::new();
        let ann = store.insert(new_user("ann", "ann@x.io")).await.unwrap();
        let found = store
            .find_conflicting(Some("ann"), None, Some(ann.id))
            .await
            .unwrap();
        assert!(found.is_none());
        let found = store.find_conflicting(None, Some("ann@x.io"), None).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(ann.id));
    }
}
