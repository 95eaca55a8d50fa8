use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo::{UniqueViolation, UserStore};
use crate::auth::repo_types::{NewUser, Profile, User, UserChanges, UserId};

#[derive(Default)]
struct Tables {
    next_id: UserId,
    users: BTreeMap<UserId, User>,
    profiles: BTreeMap<UserId, Profile>,
}

/// `UserStore` kept in process memory, with the same uniqueness rules as the
/// `users` table.
pub struct MemoryUserStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are handed out sequentially from `first_id`.
    pub fn starting_at(first_id: UserId) -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_id: first_id,
                ..Default::default()
            }),
        }
    }

    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow::anyhow!("user store lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow::anyhow!("user store lock poisoned"))
    }
}

fn ensure_unique(tables: &Tables, id: Option<UserId>, email: &str, username: &str) -> anyhow::Result<()> {
    for user in tables.users.values() {
        if Some(user.id) == id {
            continue;
        }
        if user.email == email {
            return Err(UniqueViolation { field: "email" }.into());
        }
        if user.username == username {
            return Err(UniqueViolation { field: "username" }.into());
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_profile(&self, user_id: UserId) -> anyhow::Result<Option<Profile>> {
        Ok(self.read()?.profiles.get(&user_id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<(User, Profile)> {
        let mut tables = self.write()?;
        ensure_unique(&tables, None, &new_user.email, &new_user.username)?;

        let now = OffsetDateTime::now_utc();
        let id = tables.next_id;
        tables.next_id += 1;

        let user = User {
            id,
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let profile = Profile {
            user_id: id,
            bio: String::new(),
            image: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        tables.profiles.insert(id, profile.clone());
        Ok((user, profile))
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> anyhow::Result<(User, Profile)> {
        let mut tables = self.write()?;
        let mut user = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        let mut profile = tables
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("profile for user {id} not found"))?;

        let now = OffsetDateTime::now_utc();
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        ensure_unique(&tables, Some(id), &user.email, &user.username)?;
        user.updated_at = now;

        if let Some(bio) = changes.bio {
            profile.bio = bio;
        }
        if let Some(image) = changes.image {
            profile.image = image;
        }
        profile.updated_at = now;

        tables.users.insert(id, user.clone());
        tables.profiles.insert(id, profile.clone());
        Ok((user, profile))
    }

    async fn set_active(&self, id: UserId, active: bool) -> anyhow::Result<bool> {
        let mut tables = self.write()?;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: username.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_also_creates_empty_profile() {
        let store = MemoryUserStore::new();
        let (user, profile) = store.create(new_user("a@b.io", "alice")).await.unwrap();
        assert_eq!(profile.user_id, user.id);
        assert_eq!(profile.bio, "");
        assert_eq!(profile.image, "");
        assert!(user.is_active);
        assert_eq!(store.find_profile(user.id).await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn update_keeps_the_same_profile() {
        let store = MemoryUserStore::new();
        let (user, created) = store.create(new_user("a@b.io", "alice")).await.unwrap();
        let (_, updated) = store
            .update(
                user.id,
                UserChanges {
                    bio: Some("hi".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user_id, created.user_id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.bio, "hi");
    }

    #[tokio::test]
    async fn rejects_duplicates() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@b.io", "alice")).await.unwrap();

        let err = store.create(new_user("a@b.io", "bob")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<UniqueViolation>(), Some(&UniqueViolation { field: "email" }));
        let err = store.create(new_user("c@d.io", "alice")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<UniqueViolation>(), Some(&UniqueViolation { field: "username" }));
    }

    #[tokio::test]
    async fn ids_start_where_asked() {
        let store = MemoryUserStore::starting_at(42);
        let (user, _) = store.create(new_user("a@b.io", "alice")).await.unwrap();
        assert_eq!(user.id, 42);
        assert!(store.set_active(42, false).await.unwrap());
        assert!(!store.set_active(7, false).await.unwrap());
        assert!(!store.find_by_id(42).await.unwrap().unwrap().is_active);
    }
}
