//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ampfhir_auth::config::NarrowingConfig;
use ampfhir_auth::policy::{DecisionEngine, OrgSet, ReachabilityResolver, SearchNarrowingFilter};
use ampfhir_core::{OrgRef, ResourceType};
use ampfhir_db_memory::InMemoryStorage;
use ampfhir_storage::RecordRepository;
use serde_json::{Value, json};

/// In-memory repository plus the components built on it.
pub struct Fixture {
    pub storage: Arc<InMemoryStorage>,
    pub engine: DecisionEngine,
    pub filter: SearchNarrowingFilter,
    pub records: Vec<(ResourceType, String)>,
}

impl Fixture {
    pub async fn new(resources: Vec<Value>) -> Self {
        init_tracing();
        let storage = Arc::new(InMemoryStorage::new());
        let mut records = Vec::new();
        for resource in resources {
            let stored = storage.update(&resource).await.expect("fixture record");
            let resource_type = stored.resource_type.parse().expect("fixture type");
            records.push((resource_type, stored.id));
        }

        let resolver = ReachabilityResolver::new(storage.clone());
        Self {
            engine: DecisionEngine::new(resolver.clone()),
            filter: SearchNarrowingFilter::new(resolver, &NarrowingConfig::default()),
            storage,
            records,
        }
    }

    pub async fn put(&self, resource: Value) {
        self.storage.update(&resource).await.expect("fixture record");
    }

    pub fn records_of(&self, resource_type: ResourceType) -> Vec<&str> {
        self.records
            .iter()
            .filter(|(t, _)| *t == resource_type)
            .map(|(_, id)| id.as_str())
            .collect()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn orgs(ids: &[&str]) -> OrgSet {
    ids.iter()
        .map(|id| OrgRef::new(*id).expect("valid org id"))
        .collect()
}

pub fn reference(target: &str) -> Value {
    json!({"reference": target})
}

pub fn references(targets: &[&str]) -> Value {
    Value::Array(targets.iter().map(|t| reference(t)).collect())
}

pub fn organization(id: &str, endpoints: &[&str]) -> Value {
    let endpoints: Vec<String> = endpoints.iter().map(|e| format!("Endpoint/{e}")).collect();
    let endpoints: Vec<&str> = endpoints.iter().map(String::as_str).collect();
    json!({"resourceType": "Organization", "id": id, "endpoint": references(&endpoints)})
}

pub fn patient(id: &str, managing: Option<&str>) -> Value {
    let mut patient = json!({"resourceType": "Patient", "id": id});
    if let Some(org) = managing {
        patient["managingOrganization"] = reference(&format!("Organization/{org}"));
    }
    patient
}

pub fn service_request(
    id: &str,
    status: &str,
    requester: Option<&str>,
    performers: &[&str],
    subject: Option<&str>,
) -> Value {
    let performers: Vec<String> = performers
        .iter()
        .map(|p| format!("Organization/{p}"))
        .collect();
    let performers: Vec<&str> = performers.iter().map(String::as_str).collect();
    let mut sr = json!({
        "resourceType": "ServiceRequest",
        "id": id,
        "status": status,
        "performer": references(&performers)
    });
    if let Some(org) = requester {
        sr["requester"] = reference(&format!("Organization/{org}"));
    }
    if let Some(patient) = subject {
        sr["subject"] = reference(&format!("Patient/{patient}"));
    }
    sr
}

pub fn communication(
    id: &str,
    status: &str,
    sender: Option<&str>,
    recipients: &[&str],
    subject: Option<&str>,
    based_on: &[&str],
) -> Value {
    let recipients: Vec<String> = recipients
        .iter()
        .map(|r| format!("Organization/{r}"))
        .collect();
    let recipients: Vec<&str> = recipients.iter().map(String::as_str).collect();
    let based_on: Vec<String> = based_on
        .iter()
        .map(|s| format!("ServiceRequest/{s}"))
        .collect();
    let based_on: Vec<&str> = based_on.iter().map(String::as_str).collect();
    let mut communication = json!({
        "resourceType": "Communication",
        "id": id,
        "status": status,
        "recipient": references(&recipients),
        "basedOn": references(&based_on)
    });
    if let Some(org) = sender {
        communication["sender"] = reference(&format!("Organization/{org}"));
    }
    if let Some(patient) = subject {
        communication["subject"] = reference(&format!("Patient/{patient}"));
    }
    communication
}

/// A record of a ServiceRequest-locked type based on `service_requests`.
pub fn based_on(resource_type: &str, id: Option<&str>, service_requests: &[&str]) -> Value {
    let service_requests: Vec<String> = service_requests
        .iter()
        .map(|s| format!("ServiceRequest/{s}"))
        .collect();
    let service_requests: Vec<&str> = service_requests.iter().map(String::as_str).collect();
    let mut record = json!({
        "resourceType": resource_type,
        "basedOn": references(&service_requests)
    });
    if let Some(id) = id {
        record["id"] = json!(id);
    }
    record
}

pub fn media(id: &str, part_of: &[&str], based_on: &[&str]) -> Value {
    let part_of: Vec<String> = part_of.iter().map(|c| format!("Communication/{c}")).collect();
    let part_of: Vec<&str> = part_of.iter().map(String::as_str).collect();
    let mut media = self::based_on("Media", Some(id), based_on);
    media["partOf"] = references(&part_of);
    media
}

pub fn observation(id: &str, subject: &str) -> Value {
    json!({"resourceType": "Observation", "id": id,
           "subject": reference(&format!("Patient/{subject}"))})
}

pub fn coverage(id: &str, policy_holder: &str) -> Value {
    json!({"resourceType": "Coverage", "id": id,
           "policyHolder": reference(&format!("Patient/{policy_holder}"))})
}
