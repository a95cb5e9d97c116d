//! In-memory map from strategy id to `StrategyParams`, with a lazy-loader
//! fallback (spec §2 "Strategy Cache").

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use backsim_db::StrategyLoader;
use backsim_models::StrategyParams;

/// A row as it arrives from a bulk, "active strategies" load — grounded in
/// `original_source/strategy_cache.py::load_from_rows`: the bulk loader only
/// varies the five percentage fields per strategy, the behavior flags are
/// fixed (`max_partials = 1`, every `enable_*` flag `true`). This is a
/// convenience constructor alongside the spec-required lazy `get_or_load`;
/// the lazy loader, by contrast, reads flags from its source since
/// `StrategyParams` has independent flag fields.
#[derive(Clone, Copy, Debug)]
pub struct StrategyRow {
    pub id: i64,
    pub min_advance_pct: f64,
    pub protection_retrace_pct: f64,
    pub partial_retrace_pct: f64,
    pub partial_liquidation_pct: f64,
    pub no_advance_retrace_pct: f64,
    pub active: bool,
}

#[derive(Default)]
pub struct StrategyCache {
    cache: Mutex<HashMap<i64, StrategyParams>>,
}

impl StrategyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads `rows`, keeping only `active` ones, with uniform behavior
    /// flags (see [`StrategyRow`]).
    pub fn load_from_rows(&self, rows: impl IntoIterator<Item = StrategyRow>) {
        let mut cache = self.cache.lock().unwrap();
        for row in rows {
            if !row.active {
                continue;
            }
            cache.insert(
                row.id,
                StrategyParams::new(
                    row.min_advance_pct,
                    row.protection_retrace_pct,
                    row.partial_retrace_pct,
                    row.partial_liquidation_pct,
                    row.no_advance_retrace_pct,
                ),
            );
        }
    }

    pub fn set(&self, id: i64, params: StrategyParams) {
        self.cache.lock().unwrap().insert(id, params);
    }

    pub fn exists(&self, id: i64) -> bool {
        self.cache.lock().unwrap().contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<StrategyParams> {
        self.cache.lock().unwrap().get(&id).copied()
    }

    /// Returns the cached params for `id`, lazily loading (and caching) from
    /// `loader` on a miss.
    pub async fn get_or_load(&self, id: i64, loader: &dyn StrategyLoader) -> Result<StrategyParams> {
        if let Some(sp) = self.get(id) {
            return Ok(sp);
        }
        let sp = loader.load(id).await?;
        self.set(id, sp);
        Ok(sp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backsim_db::memory::InMemoryStrategyLoader;

    #[test]
    fn bulk_load_skips_inactive_rows() {
        let cache = StrategyCache::new();
        cache.load_from_rows([
            StrategyRow {
                id: 1,
                min_advance_pct: 2.0,
                protection_retrace_pct: 50.0,
                partial_retrace_pct: 50.0,
                partial_liquidation_pct: 50.0,
                no_advance_retrace_pct: 1.0,
                active: true,
            },
            StrategyRow {
                id: 2,
                min_advance_pct: 1.0,
                protection_retrace_pct: 1.0,
                partial_retrace_pct: 1.0,
                partial_liquidation_pct: 1.0,
                no_advance_retrace_pct: 1.0,
                active: false,
            },
        ]);
        assert!(cache.exists(1));
        assert!(!cache.exists(2));
        let sp = cache.get(1).unwrap();
        assert_eq!(sp.max_partials, 1);
        assert!(sp.enable_partial);
    }

    #[tokio::test]
    async fn get_or_load_caches_after_miss() {
        let cache = StrategyCache::new();
        let loader = InMemoryStrategyLoader::new();
        loader.insert(7, StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0));

        assert!(!cache.exists(7));
        let sp = cache.get_or_load(7, &loader).await.unwrap();
        assert_eq!(sp.min_advance_pct, 2.0);
        assert!(cache.exists(7));
    }

    #[tokio::test]
    async fn get_or_load_propagates_loader_error_on_unknown_id() {
        let cache = StrategyCache::new();
        let loader = InMemoryStrategyLoader::new();
        assert!(cache.get_or_load(99, &loader).await.is_err());
    }
}
