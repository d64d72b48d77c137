//! Update records and the single merged commit payload.
//!
//! DESIGN
//! ======
//! An update record is a flat map of dotted field path to new value, scoped
//! either to the scene or to one embedded document. Records are additive:
//! merging two records for the same target keeps every field, later values
//! winning. The payload collects the scene record plus per-kind entity
//! records and renders them as one nested document for a single write.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::scene::EmbeddedKind;

/// Flat path → value map. Alias to reduce noise in signatures.
pub type Data = Map<String, Value>;

/// Key carrying the embedded document id inside a collection update.
pub const ID_FIELD: &str = "_id";

// =============================================================================
// UPDATE RECORD
// =============================================================================

/// Field updates for one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRecord {
    fields: Data,
}

impl UpdateRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a dotted field path, e.g. `"shape.width"`.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(path.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Convenience for numeric fields.
    #[must_use]
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    pub fn merge(&mut self, other: UpdateRecord) {
        self.fields.extend(other.fields);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &Data {
        &self.fields
    }
}

/// Update for one embedded document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub id: String,
    pub record: UpdateRecord,
}

// =============================================================================
// PAYLOAD
// =============================================================================

/// Everything a rotation writes, committed in one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    pub scene: UpdateRecord,
    pub embedded: BTreeMap<EmbeddedKind, Vec<EntityUpdate>>,
}

impl UpdatePayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_scene(&mut self, record: UpdateRecord) {
        self.scene.merge(record);
    }

    /// Append updates for a kind. Empty lists add nothing.
    pub fn push_entities(&mut self, kind: EmbeddedKind, updates: Vec<EntityUpdate>) {
        if updates.is_empty() {
            return;
        }
        self.embedded.entry(kind).or_default().extend(updates);
    }

    #[must_use]
    pub fn entity_updates(&self, kind: EmbeddedKind) -> &[EntityUpdate] {
        self.embedded.get(&kind).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scene.is_empty() && self.embedded.is_empty()
    }

    /// Render as the host's nested update document: scene-level dotted keys
    /// plus one array of `{ "_id": ..., <fields> }` per touched collection.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = self.scene.fields.clone();
        for (kind, updates) in &self.embedded {
            let items = updates
                .iter()
                .map(|u| {
                    let mut item = Data::new();
                    item.insert(ID_FIELD.into(), Value::String(u.id.clone()));
                    item.extend(u.record.fields.clone());
                    Value::Object(item)
                })
                .collect();
            doc.insert(kind.collection().into(), Value::Array(items));
        }
        Value::Object(doc)
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Set a dotted path inside a JSON object, creating intermediate objects.
///
/// Returns `false` if an intermediate segment exists but is not an object.
pub fn set_path(target: &mut Value, path: &str, value: Value) -> bool {
    let mut cursor = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Value::Object(map) = cursor else {
            return false;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return true;
        }
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Data::new()));
    }
    false
}

/// Apply a record's fields to one JSON document.
pub fn apply_record(target: &mut Value, record: &UpdateRecord) -> bool {
    record
        .fields
        .iter()
        .all(|(path, value)| set_path(target, path, value.clone()))
}

#[cfg(test)]
#[path = "update_test.rs"]
mod tests;
