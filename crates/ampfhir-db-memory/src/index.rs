//! Reference index backing `search_by_reference`.

use std::collections::{BTreeSet, HashMap};

use ampfhir_core::{FhirReference, Record, ResourceType};

/// (record type, search parameter, referenced `Type/id`)
type IndexKey = (ResourceType, &'static str, String);

/// Maps each reference value of each indexed element to the ids holding it.
#[derive(Debug, Default)]
pub(crate) struct ReferenceIndex {
    entries: HashMap<IndexKey, BTreeSet<String>>,
}

impl ReferenceIndex {
    pub(crate) fn insert(&mut self, record: &Record) {
        let Some(id) = record.id() else { return };
        for key in index_keys(record) {
            self.entries.entry(key).or_default().insert(id.to_string());
        }
    }

    pub(crate) fn remove(&mut self, record: &Record) {
        let Some(id) = record.id() else { return };
        for key in index_keys(record) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    pub(crate) fn lookup(
        &self,
        resource_type: ResourceType,
        search_param: &'static str,
        references: &[FhirReference],
    ) -> BTreeSet<String> {
        references
            .iter()
            .filter_map(|r| {
                self.entries
                    .get(&(resource_type, search_param, r.to_relative()))
            })
            .flatten()
            .cloned()
            .collect()
    }
}

fn index_keys(record: &Record) -> Vec<IndexKey> {
    let resource_type = record.resource_type();
    resource_type
        .reference_fields()
        .iter()
        .flat_map(|field| {
            record
                .references(field.element)
                .into_iter()
                .map(move |r| (resource_type, field.search_param, r.to_relative()))
        })
        .collect()
}
