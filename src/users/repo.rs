use mongodb::bson::{doc, Bson, Document};
use tracing::info;

use super::repo_types::User;
use crate::{
    db::{now, to_bson_time, Repo},
    error::{AppError, AppResult},
    store::{DocumentStore, StoreError},
};

pub type UserRepo = Repo<User>;

fn not_deleted() -> Bson {
    Bson::Document(doc! { "$ne": true })
}

impl Repo<User> {
    /// Partial unique indexes on `username` and `email`, scoped to users that
    /// are not soft-deleted.
    pub async fn ensure_indexes(store: &dyn DocumentStore) -> Result<(), StoreError> {
        store.ensure_unique("users", "username").await?;
        store.ensure_unique("users", "email").await?;
        info!("user indexes ready");
        Ok(())
    }

    /// First non-deleted user matching either identifier. `None` when neither
    /// identifier is given.
    pub async fn find_active_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<Option<User>> {
        let mut any_of = Vec::new();
        if let Some(username) = username {
            any_of.push(Bson::Document(doc! { "username": username }));
        }
        if let Some(email) = email {
            any_of.push(Bson::Document(doc! { "email": email }));
        }
        if any_of.is_empty() {
            return Ok(None);
        }
        self.find_one(doc! { "$or": any_of, "isDeleted": not_deleted() })
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.find_one(doc! { "email": email })
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<User> {
        self.find_one(doc! { "username": username })
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    pub async fn get_all_active(&self) -> AppResult<Vec<User>> {
        self.find_many(doc! { "isDeleted": not_deleted() }).await
    }

    pub async fn get_all_deleted(&self) -> AppResult<Vec<User>> {
        self.find_many(doc! { "isDeleted": true }).await
    }

    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        let mut set = Document::new();
        set.insert("isDeleted", true);
        set.insert("deletedAt", to_bson_time(now()));
        self.set_fields(id, set).await
    }

    /// Clears the deleted flag. `deletedAt` keeps the last deletion time.
    pub async fn restore(&self, id: &str) -> AppResult<()> {
        self.set_fields(id, doc! { "isDeleted": false }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ConflictKind, store::memory::MemoryStore, users::NewUser};

    fn ann() -> NewUser {
        NewUser {
            username: "ann".into(),
            name: "Ann".into(),
            email: "ann@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            image_url: String::new(),
        }
    }

    async fn repo() -> UserRepo {
        let store = MemoryStore::new();
        UserRepo::ensure_indexes(&store).await.unwrap();
        UserRepo::new(&store)
    }

    #[tokio::test]
    async fn soft_delete_moves_user_between_listings_and_restore_brings_it_back() {
        let repo = repo().await;
        let id = repo.create(ann()).await.unwrap().id.to_hex();

        repo.soft_delete(&id).await.unwrap();
        assert!(repo.get_all_active().await.unwrap().is_empty());
        let deleted = repo.get_all_deleted().await.unwrap();
        assert_eq!(deleted.len(), 1);
        let deleted_at = deleted[0].meta.deleted_at;
        assert!(deleted_at.is_some());

        repo.restore(&id).await.unwrap();
        let restored = repo.get_by_id(&id).await.unwrap();
        assert!(!restored.meta.is_deleted);
        assert_eq!(restored.meta.deleted_at, deleted_at);
        assert_eq!(repo.get_all_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_ignores_deleted_users_and_needs_an_identifier() {
        let repo = repo().await;
        let id = repo.create(ann()).await.unwrap().id.to_hex();

        let by_email = repo
            .find_active_by_username_or_email(None, Some("ann@example.com"))
            .await
            .unwrap();
        assert!(by_email.is_some());
        assert!(repo
            .find_active_by_username_or_email(None, None)
            .await
            .unwrap()
            .is_none());

        repo.soft_delete(&id).await.unwrap();
        assert!(repo
            .find_active_by_username_or_email(Some("ann"), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn exact_lookups_report_not_found() {
        let repo = repo().await;
        repo.create(ann()).await.unwrap();

        assert_eq!(repo.get_by_username("ann").await.unwrap().email, "ann@example.com");
        assert!(matches!(
            repo.get_by_email("bob@example.com").await.unwrap_err(),
            AppError::NotFound("User")
        ));
    }

    #[tokio::test]
    async fn unique_index_rejects_a_second_active_username() {
        let repo = repo().await;
        repo.create(ann()).await.unwrap();

        let mut twin = ann();
        twin.email = "other@example.com".into();
        assert!(matches!(
            repo.create(twin).await.unwrap_err(),
            AppError::Conflict(ConflictKind::UsernameTaken)
        ));
    }

    #[test]
    fn password_digest_is_stored_but_never_serialized() {
        use crate::db::Entity;

        let user = User::build(mongodb::bson::oid::ObjectId::new(), ann(), now());
        assert_eq!(user.to_document().get_str("password").unwrap(), "$argon2id$stub");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["isVerified"], false);
    }
}
