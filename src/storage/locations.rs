use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::{JsonStore, StorageError};
use crate::locations::Location;

const RECORD_KEY: &str = "saved_locations";

/// Saved places, kept in the order the user added them
pub struct LocationStore {
    locations: RwLock<IndexMap<String, Location>>,
    store: JsonStore,
}

impl LocationStore {
    /// Load saved locations; invalid entries are skipped
    pub async fn open(store: JsonStore) -> Self {
        let saved: Vec<Location> = store.load(RECORD_KEY).await;

        let mut locations = IndexMap::with_capacity(saved.len());
        for location in saved {
            if let Err(reason) = location.validate() {
                tracing::warn!(id = %location.id, reason = %reason, "Skipping invalid saved location");
                continue;
            }
            locations.insert(location.id.clone(), location);
        }

        tracing::info!(count = locations.len(), "Loaded saved locations");

        Self {
            locations: RwLock::new(locations),
            store,
        }
    }

    async fn save(&self) -> Result<(), StorageError> {
        let locations = self.locations.read().await;
        let list: Vec<&Location> = locations.values().collect();
        self.store.save(RECORD_KEY, &list).await
    }

    /// Add or update a location
    pub async fn add(&self, location: Location) -> Result<(), StorageError> {
        {
            let mut locations = self.locations.write().await;
            locations.insert(location.id.clone(), location);
        }
        self.save().await
    }

    /// Remove a location by ID
    pub async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let existed = {
            let mut locations = self.locations.write().await;
            locations.shift_remove(id).is_some()
        };

        if existed {
            self.save().await?;
        }

        Ok(existed)
    }

    pub async fn get(&self, id: &str) -> Option<Location> {
        let locations = self.locations.read().await;
        locations.get(id).cloned()
    }

    pub async fn first(&self) -> Option<Location> {
        let locations = self.locations.read().await;
        locations.values().next().cloned()
    }

    pub async fn list(&self) -> Vec<Location> {
        let locations = self.locations.read().await;
        locations.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str, name: &str) -> Location {
        Location {
            id: id.to_string(),
            name: name.to_string(),
            latitude: 48.85,
            longitude: 2.35,
            is_live: false,
        }
    }

    #[tokio::test]
    async fn test_add_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocationStore::open(JsonStore::new(dir.path())).await;

        store.add(place("2", "Paris")).await.unwrap();
        store.add(place("1", "Lyon")).await.unwrap();

        let reopened = LocationStore::open(JsonStore::new(dir.path())).await;
        let names: Vec<String> = reopened.list().await.into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Paris", "Lyon"]);
        assert_eq!(reopened.first().await.unwrap().id, "2");
    }

    #[tokio::test]
    async fn test_add_existing_id_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocationStore::open(JsonStore::new(dir.path())).await;

        store.add(place("1", "Paris")).await.unwrap();
        store.add(place("1", "Paris, France")).await.unwrap();

        let all = store.list().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Paris, France");
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocationStore::open(JsonStore::new(dir.path())).await;
        store.add(place("1", "Paris")).await.unwrap();

        assert!(store.remove("1").await.unwrap());
        assert!(!store.remove("1").await.unwrap());
        assert!(store.get("1").await.is_none());

        let reopened = LocationStore::open(JsonStore::new(dir.path())).await;
        assert!(reopened.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_open_skips_invalid_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("saved_locations.json"),
            r#"[{"id":"1","name":"Ok","latitude":10.0,"longitude":10.0},
                {"id":"2","name":"Bad","latitude":123.0,"longitude":10.0}]"#,
        )
        .unwrap();

        let store = LocationStore::open(JsonStore::new(dir.path())).await;
        let all = store.list().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "1");
    }
}
