//! Stations/sensors tracked by the sync pipeline and their stored state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::ObservationTime;

/// A station or sensor known to an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Upstream identifier, unique within one source
    pub external_uid: String,
    /// Identifier assigned by the internal store on first creation
    pub internal_key: Option<String>,
}

impl Entity {
    pub fn new(external_uid: impl Into<String>) -> Self {
        Self {
            external_uid: external_uid.into(),
            internal_key: None,
        }
    }

    pub fn with_key(external_uid: impl Into<String>, internal_key: impl Into<String>) -> Self {
        Self {
            external_uid: external_uid.into(),
            internal_key: Some(internal_key.into()),
        }
    }

    /// Key used to address this entity's records in the store.
    ///
    /// Falls back to the upstream uid until the store has assigned a key.
    pub fn store_key(&self) -> &str {
        self.internal_key.as_deref().unwrap_or(&self.external_uid)
    }
}

/// Predicate applied to an entity's stored metadata properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityFilter {
    /// The property is present, whatever its value
    HasProperty { property: String },
    /// The property is present and renders to `value`
    PropertyEquals { property: String, value: String },
}

impl EntityFilter {
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            EntityFilter::HasProperty { property } => properties.contains_key(property),
            EntityFilter::PropertyEquals { property, value } => match properties.get(property) {
                Some(Value::String(s)) => s == value,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *value,
            },
        }
    }
}

/// How to select and identify entities in the store's metadata listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Property holding the upstream uid (e.g. "uid", "stationId")
    pub uid_property: String,
    /// Additional predicate; entities without the uid property never match
    #[serde(default)]
    pub filter: Option<EntityFilter>,
}

impl EntityQuery {
    pub fn new(uid_property: impl Into<String>) -> Self {
        Self {
            uid_property: uid_property.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: EntityFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Extract the entity uid if these properties satisfy the query.
    pub fn select(&self, properties: &Map<String, Value>) -> Option<String> {
        if let Some(filter) = &self.filter {
            if !filter.matches(properties) {
                return None;
            }
        }

        match properties.get(&self.uid_property)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The most recent observation record already held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorRecord {
    pub record_id: String,
    pub last_updated: ObservationTime,
}

/// Snapshot of what the store holds for an entity.
///
/// The record id and the last-updated timestamp are present together or
/// not at all; an empty state is the first-sync case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObservationState {
    prior: Option<PriorRecord>,
}

impl StoredObservationState {
    pub fn first_sync() -> Self {
        Self { prior: None }
    }

    pub fn from_prior(record_id: impl Into<String>, last_updated: ObservationTime) -> Self {
        Self {
            prior: Some(PriorRecord {
                record_id: record_id.into(),
                last_updated,
            }),
        }
    }

    pub fn last_updated_timestamp(&self) -> Option<&ObservationTime> {
        self.prior.as_ref().map(|p| &p.last_updated)
    }

    pub fn prior_record_id(&self) -> Option<&str> {
        self.prior.as_ref().map(|p| p.record_id.as_str())
    }

    pub fn is_first_sync(&self) -> bool {
        self.prior.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_store_key_falls_back_to_uid() {
        assert_eq!(Entity::new("02292900").store_key(), "02292900");
        assert_eq!(Entity::with_key("02292900", "17").store_key(), "17");
    }

    #[test]
    fn test_filter_property_equals() {
        let filter = EntityFilter::PropertyEquals {
            property: "class".into(),
            value: "00065".into(),
        };
        assert!(filter.matches(&props(json!({"class": "00065"}))));
        assert!(!filter.matches(&props(json!({"class": "00060"}))));
        assert!(!filter.matches(&props(json!({"uid": "x"}))));

        let numeric = EntityFilter::PropertyEquals {
            property: "county".into(),
            value: "12011".into(),
        };
        assert!(numeric.matches(&props(json!({"county": 12011}))));
    }

    #[test]
    fn test_query_select() {
        let query = EntityQuery::new("uid").with_filter(EntityFilter::PropertyEquals {
            property: "class".into(),
            value: "sensorCode".into(),
        });

        assert_eq!(
            query.select(&props(json!({"uid": "uniqueId1", "class": "sensorCode"}))),
            Some("uniqueId1".to_string())
        );
        assert_eq!(query.select(&props(json!({"uid": "uniqueId3", "class": "other"}))), None);
        assert_eq!(query.select(&props(json!({"noUid": "foo", "class": "sensorCode"}))), None);
        assert_eq!(query.select(&props(json!({"uid": "", "class": "sensorCode"}))), None);
    }

    #[test]
    fn test_state_invariant() {
        let first = StoredObservationState::first_sync();
        assert!(first.is_first_sync());
        assert!(first.last_updated_timestamp().is_none());
        assert!(first.prior_record_id().is_none());

        let ts = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        let state = StoredObservationState::from_prior("rec-1", ts);
        assert_eq!(state.prior_record_id(), Some("rec-1"));
        assert_eq!(state.last_updated_timestamp(), Some(&ts));
    }
}
