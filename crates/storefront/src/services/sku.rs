//! Batch SKU resolution.

use std::collections::{BTreeSet, HashMap};

use tracing::instrument;

use catalog_bridge_core::{CatalogRecordId, Sku};

use crate::db::{CatalogStore, RepositoryError};

/// Map external product IDs to local record IDs in a single lookup.
///
/// IDs are turned into SKUs and de-duplicated first. An empty input returns an
/// empty map without touching storage; SKUs with no record are absent from the
/// result.
///
/// # Errors
///
/// Returns `RepositoryError` if the lookup fails.
#[instrument(skip(store, external_ids), fields(requested = external_ids.len()))]
pub async fn resolve_skus(
    store: &dyn CatalogStore,
    external_ids: &[u64],
) -> Result<HashMap<Sku, CatalogRecordId>, RepositoryError> {
    let skus: Vec<Sku> = external_ids
        .iter()
        .copied()
        .map(Sku::from_external_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if skus.is_empty() {
        return Ok(HashMap::new());
    }

    store.find_ids_by_skus(&skus).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::memory::MemoryCatalogStore;
    use crate::models::NewCatalogRecord;

    #[tokio::test]
    async fn test_empty_input_skips_storage() {
        let store = MemoryCatalogStore::new();
        let resolved = resolve_skus(&store, &[]).await.unwrap();

        assert!(resolved.is_empty());
        assert_eq!(store.sku_lookups(), 0);
    }

    #[tokio::test]
    async fn test_resolves_known_and_dedups() {
        let store = MemoryCatalogStore::new();
        let record = store
            .create(&NewCatalogRecord {
                sku: Sku::from_external_id(5),
                slug: "five-5".to_string(),
                title: "Five".to_string(),
                description: String::new(),
                price: Decimal::ONE,
            })
            .await
            .unwrap();

        let resolved = resolve_skus(&store, &[5, 5, 6]).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(&Sku::from_external_id(5)), Some(&record.id));
        assert_eq!(store.sku_lookups(), 1);
    }
}
