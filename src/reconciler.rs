use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{AppData, Asset, Category, NewAsset};
use crate::store::StateStore;

/// Assets first seen during one cycle, grouped by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAssets {
    by_category: BTreeMap<Category, Vec<Asset>>,
}

impl NewAssets {
    pub fn push(&mut self, asset: Asset) {
        self.by_category.entry(asset.category).or_default().push(asset);
    }

    pub fn get(&self, category: Category) -> &[Asset] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-empty groups, FREE before LATEST.
    pub fn groups(&self) -> impl Iterator<Item = (Category, &[Asset])> {
        self.by_category
            .iter()
            .filter(|(_, assets)| !assets.is_empty())
            .map(|(category, assets)| (*category, assets.as_slice()))
    }
}

/// Merge candidates into `data`. The first record of a URL wins: known URLs
/// are dropped without touching any field.
pub fn merge_candidates<I>(data: &mut AppData, candidates: I) -> NewAssets
where
    I: IntoIterator<Item = NewAsset>,
{
    let mut new_assets = NewAssets::default();
    for candidate in candidates {
        if data.contains(&candidate.url) {
            continue;
        }
        let asset = Asset::new(candidate, Utc::now());
        data.seen_assets.insert(asset.url.clone(), asset.clone());
        new_assets.push(asset);
    }
    new_assets
}

/// Applies a cycle's candidates to the persisted history.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn StateStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Merge, stamp `last_check` and persist. A failed write is logged and
    /// retried on the next cycle.
    pub async fn reconcile<I>(&self, data: &mut AppData, candidates: I) -> NewAssets
    where
        I: IntoIterator<Item = NewAsset>,
    {
        let new_assets = merge_candidates(data, candidates);
        data.last_check = Some(Utc::now());
        self.persist(data).await;
        new_assets
    }

    pub async fn persist(&self, data: &AppData) -> bool {
        match self.store.save(data).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to save state: {}", e);
                false
            }
        }
    }
}
