//! In-memory repositories.
//!
//! Same contracts as the `PostgreSQL` repositories, including the unique SKU,
//! slug, source URL and email constraints. Used by tests and local runs
//! without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use catalog_bridge_core::{CatalogRecordId, MediaId, Sku, UserId, UserRole};

use super::{CatalogStore, MediaLibrary, RepositoryError, UserStore};
use crate::models::{CatalogRecord, MediaItem, NewCatalogRecord, NewMediaItem, Thumbnail, User};

fn poisoned() -> RepositoryError {
    RepositoryError::DataCorruption("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
struct CatalogTable {
    next_id: i64,
    records: BTreeMap<CatalogRecordId, CatalogRecord>,
}

/// In-memory catalog records.
#[derive(Default)]
pub struct MemoryCatalogStore {
    table: Mutex<CatalogTable>,
    sku_lookups: AtomicUsize,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_ids_by_skus` calls made so far.
    #[must_use]
    pub fn sku_lookups(&self) -> usize {
        self.sku_lookups.load(Ordering::SeqCst)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().map_or(0, |t| t.records.len())
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records in ID order.
    #[must_use]
    pub fn records(&self) -> Vec<CatalogRecord> {
        self.table
            .lock()
            .map(|t| t.records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_ids_by_skus(
        &self,
        skus: &[Sku],
    ) -> Result<HashMap<Sku, CatalogRecordId>, RepositoryError> {
        self.sku_lookups.fetch_add(1, Ordering::SeqCst);
        let table = self.table.lock().map_err(|_| poisoned())?;

        Ok(table
            .records
            .values()
            .filter(|r| skus.contains(&r.sku))
            .map(|r| (r.sku.clone(), r.id))
            .collect())
    }

    async fn get(&self, id: CatalogRecordId) -> Result<Option<CatalogRecord>, RepositoryError> {
        let table = self.table.lock().map_err(|_| poisoned())?;
        Ok(table.records.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<CatalogRecord>, RepositoryError> {
        let table = self.table.lock().map_err(|_| poisoned())?;
        Ok(table.records.values().find(|r| r.slug == slug).cloned())
    }

    async fn create(&self, record: &NewCatalogRecord) -> Result<CatalogRecord, RepositoryError> {
        let mut table = self.table.lock().map_err(|_| poisoned())?;

        if table
            .records
            .values()
            .any(|r| r.sku == record.sku || r.slug == record.slug)
        {
            return Err(RepositoryError::Conflict(
                "catalog record already exists".to_string(),
            ));
        }

        table.next_id += 1;
        let now = Utc::now();
        let created = CatalogRecord {
            id: CatalogRecordId::new(table.next_id),
            sku: record.sku.clone(),
            slug: record.slug.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            price: record.price(),
            thumbnail: None,
            created_at: now,
            updated_at: now,
        };
        table.records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: CatalogRecordId,
        record: &NewCatalogRecord,
    ) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().map_err(|_| poisoned())?;
        let existing = table
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        existing.title.clone_from(&record.title);
        existing.description.clone_from(&record.description);
        existing.price = record.price();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn set_thumbnail(
        &self,
        id: CatalogRecordId,
        media: &MediaItem,
    ) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().map_err(|_| poisoned())?;
        let existing = table
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        existing.thumbnail = Some(Thumbnail {
            media_id: media.id,
            url: media.public_url.clone(),
        });
        existing.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory media library.
#[derive(Default)]
pub struct MemoryMediaLibrary {
    items: Mutex<Vec<MediaItem>>,
}

impl MemoryMediaLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all media items in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<MediaItem> {
        self.items.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaLibrary for MemoryMediaLibrary {
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<MediaItem>, RepositoryError> {
        let items = self.items.lock().map_err(|_| poisoned())?;
        Ok(items.iter().find(|m| m.source_url == source_url).cloned())
    }

    async fn insert(&self, item: &NewMediaItem) -> Result<MediaItem, RepositoryError> {
        let mut items = self.items.lock().map_err(|_| poisoned())?;

        if items.iter().any(|m| m.source_url == item.source_url) {
            return Err(RepositoryError::Conflict(
                "media source url already exists".to_string(),
            ));
        }

        let next_id = i64::try_from(items.len())
            .map_err(|_| RepositoryError::DataCorruption("media table overflow".to_string()))?
            + 1;
        let created = MediaItem {
            id: MediaId::new(next_id),
            source_url: item.source_url.clone(),
            public_url: item.public_url.clone(),
            file_path: item.file_path.clone(),
            mime_type: item.mime_type.clone(),
            byte_size: item.byte_size,
            created_at: Utc::now(),
        };
        items.push(created.clone());
        Ok(created)
    }
}

/// In-memory user accounts.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn set_role(&self, id: UserId, role: UserRole) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        Ok(())
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;

        if users.iter().any(|u| u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_string()));
        }

        let next_id = i64::try_from(users.len())
            .map_err(|_| RepositoryError::DataCorruption("user table overflow".to_string()))?
            + 1;
        let user = User {
            id: UserId::new(next_id),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            role,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn new_record(id: u64, title: &str) -> NewCatalogRecord {
        NewCatalogRecord {
            sku: Sku::from_external_id(id),
            slug: format!("item-{id}"),
            title: title.to_string(),
            description: String::new(),
            price: Decimal::TEN,
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let store = MemoryCatalogStore::new();
        store.create(&new_record(1, "first")).await.unwrap();

        let err = store.create(&new_record(1, "again")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_returns_only_known_skus() {
        let store = MemoryCatalogStore::new();
        let created = store.create(&new_record(1, "first")).await.unwrap();

        let found = store
            .find_ids_by_skus(&[Sku::from_external_id(1), Sku::from_external_id(2)])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found.get(&Sku::from_external_id(1)), Some(&created.id));
        assert_eq!(store.sku_lookups(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryCatalogStore::new();
        let err = store
            .update(CatalogRecordId::new(99), &new_record(1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_media_source_url_is_unique() {
        let media = MemoryMediaLibrary::new();
        let item = NewMediaItem {
            source_url: "https://img.test/a.jpg".to_string(),
            public_url: "/media/a.jpg".to_string(),
            file_path: "media/a.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            byte_size: 3,
        };
        media.insert(&item).await.unwrap();
        assert!(matches!(
            media.insert(&item).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(
            media
                .find_by_source_url("https://img.test/a.jpg")
                .await
                .unwrap()
                .is_some()
        );
    }
}
