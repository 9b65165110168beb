use chrono::NaiveDate;
use indexmap::IndexSet;
use tokio::sync::Mutex;

use super::JsonStore;
use crate::forecast::models::RainNotice;

const RECORD_KEY: &str = "notified_keys";

/// Record of (location, day) pairs that already produced a rain notification
pub struct NotifiedLedger {
    keys: Mutex<IndexSet<String>>,
    store: JsonStore,
}

/// Date embedded at the end of a `{location_id}_{YYYY-MM-DD}` key
fn key_date(key: &str) -> Option<NaiveDate> {
    let (_, date) = key.rsplit_once('_')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Drop keys older than the retention window or without a readable date.
/// Returns how many keys were removed.
pub fn prune_keys(keys: &mut IndexSet<String>, today: NaiveDate, retention_days: u32) -> usize {
    let before = keys.len();
    keys.retain(|key| {
        key_date(key).is_some_and(|date| (today - date).num_days() <= i64::from(retention_days))
    });
    before - keys.len()
}

impl NotifiedLedger {
    /// Load recorded keys and prune expired ones
    pub async fn open(store: JsonStore, today: NaiveDate, retention_days: u32) -> Self {
        let saved: Vec<String> = store.load(RECORD_KEY).await;
        let mut keys: IndexSet<String> = saved.into_iter().collect();

        let removed = prune_keys(&mut keys, today, retention_days);
        tracing::info!(count = keys.len(), pruned = removed, "Loaded notified keys");

        let ledger = Self {
            keys: Mutex::new(keys),
            store,
        };

        if removed > 0 {
            let keys = ledger.keys.lock().await;
            if let Err(e) = ledger.store.save(RECORD_KEY, &*keys).await {
                tracing::warn!(error = %e, "Failed to persist pruned notified keys");
            }
        }

        ledger
    }

    /// Run `evaluate` against the recorded keys and, if it yields a notice,
    /// record and persist its key before returning. The lock is held
    /// throughout so concurrent checks cannot both claim the same key.
    pub async fn claim<F>(&self, evaluate: F) -> Option<RainNotice>
    where
        F: FnOnce(&IndexSet<String>) -> Option<RainNotice>,
    {
        let mut keys = self.keys.lock().await;
        let notice = evaluate(&keys)?;

        keys.insert(notice.key.clone());
        if let Err(e) = self.store.save(RECORD_KEY, &*keys).await {
            // Still recorded in memory, so this process will not repeat it
            tracing::error!(key = %notice.key, error = %e, "Failed to persist notified key");
        }

        Some(notice)
    }

    #[cfg(test)]
    pub async fn contains(&self, key: &str) -> bool {
        self.keys.lock().await.contains(key)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }
}
