//! Cached user profile, kept in the key-value store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::kv_store::KeyValueStore;
use crate::error::StoreError;

pub const USER_PROFILE_KEY: &str = "user-profile";

/// The profile blob. Fields this crate does not know about are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Cumulative XP.
    #[serde(default)]
    pub xp: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, StoreError> {
        match store.get(USER_PROFILE_KEY)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: USER_PROFILE_KEY.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let value = serde_json::to_value(self).map_err(|source| StoreError::Corrupt {
            key: USER_PROFILE_KEY.to_string(),
            source,
        })?;
        store.set(USER_PROFILE_KEY, &value)
    }

    /// Rewrite only the `xp` field of the stored profile, creating a bare
    /// profile if none is cached yet.
    pub fn store_xp(store: &dyn KeyValueStore, xp: u64) -> Result<(), StoreError> {
        let mut blob = match store.get(USER_PROFILE_KEY)? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        blob.insert("xp".to_string(), Value::from(xp));
        store.set(USER_PROFILE_KEY, &Value::Object(blob))
    }

    pub fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(USER_PROFILE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_a_rewrite() {
        let store = MemoryKeyValueStore::new();
        store
            .set(
                USER_PROFILE_KEY,
                &json!({"id": "u1", "name": "Ana", "xp": 3, "pets": ["Toby"]}),
            )
            .unwrap();

        let mut profile = UserProfile::load(&store).unwrap().unwrap();
        assert_eq!(profile.xp, 3);
        profile.xp = 40;
        profile.save(&store).unwrap();

        let raw = store.get(USER_PROFILE_KEY).unwrap().unwrap();
        assert_eq!(raw["pets"], json!(["Toby"]));
        assert_eq!(raw["xp"], json!(40));
    }

    #[test]
    fn store_xp_merges_into_existing_blob() {
        let store = MemoryKeyValueStore::new();
        store
            .set(USER_PROFILE_KEY, &json!({"id": "u1", "xp": 1}))
            .unwrap();
        UserProfile::store_xp(&store, 24).unwrap();
        assert_eq!(
            store.get(USER_PROFILE_KEY).unwrap(),
            Some(json!({"id": "u1", "xp": 24}))
        );
    }

    #[test]
    fn store_xp_without_cached_profile() {
        let store = MemoryKeyValueStore::new();
        UserProfile::store_xp(&store, 7).unwrap();
        let profile = UserProfile::load(&store).unwrap().unwrap();
        assert_eq!(profile.xp, 7);
        assert!(profile.id.is_empty());
    }
}
