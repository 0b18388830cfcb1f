//! In-memory domain service
//!
//! A `DashMap`-backed reference implementation standing in for the external
//! reservation service. It enforces enough validation (required names, name
//! uniqueness) to exercise the gateway's domain-error branch end to end, and
//! is what the binary and the integration tests wire in.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{AuthContext, DomainService, ServiceError, ServiceResult};
use crate::error::DomainError;

/// In-memory lease/host store
#[derive(Default)]
pub struct InMemoryService {
    leases: DashMap<String, Value>,
    hosts: DashMap<String, Value>,
}

impl InMemoryService {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn name_of(data: &Map<String, Value>) -> Option<&str> {
        data.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())
    }

    fn has_name(store: &DashMap<String, Value>, name: &str, skip_id: Option<&str>) -> bool {
        store.iter().any(|entry| {
            if skip_id == Some(entry.key().as_str()) {
                return false;
            }
            entry.value().get("name").and_then(Value::as_str) == Some(name)
        })
    }

    fn insert(
        store: &DashMap<String, Value>,
        resource: &'static str,
        ctx: &AuthContext,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        let Some(name) = Self::name_of(&data) else {
            return Err(DomainError::new("name is a required property").into());
        };
        if Self::has_name(store, name, None) {
            return Err(DomainError::with_code(409, format!("{resource} name already exists")).into());
        }

        let id = Uuid::new_v4().to_string();
        let mut record = data;
        record.insert("id".into(), json!(id));
        record.insert("project_id".into(), json!(ctx.project_id));
        record.insert("user_id".into(), json!(ctx.user_id));
        record.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
        record.insert("updated_at".into(), Value::Null);

        let record = Value::Object(record);
        store.insert(id, record.clone());
        Ok(record)
    }

    fn fetch(
        store: &DashMap<String, Value>,
        resource: &'static str,
        id: &str,
    ) -> ServiceResult<Value> {
        store
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound {
                resource,
                id: id.to_string(),
            })
    }

    fn modify(
        store: &DashMap<String, Value>,
        resource: &'static str,
        id: &str,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        if let Some(name) = Self::name_of(&data) {
            if Self::has_name(store, name, Some(id)) {
                return Err(
                    DomainError::with_code(409, format!("{resource} name already exists")).into(),
                );
            }
        }

        let mut entry = store.get_mut(id).ok_or_else(|| ServiceError::NotFound {
            resource,
            id: id.to_string(),
        })?;

        if let Value::Object(record) = entry.value_mut() {
            for (key, value) in data {
                // identity and timestamps are service-owned
                if key == "id" || key == "created_at" {
                    continue;
                }
                record.insert(key, value);
            }
            record.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        }
        Ok(entry.value().clone())
    }

    fn remove(
        store: &DashMap<String, Value>,
        resource: &'static str,
        id: &str,
    ) -> ServiceResult<()> {
        store
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound {
                resource,
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl DomainService for InMemoryService {
    async fn list_leases(&self, _ctx: &AuthContext) -> ServiceResult<Vec<Value>> {
        Ok(self.leases.iter().map(|e| e.value().clone()).collect())
    }

    async fn get_lease(&self, _ctx: &AuthContext, id: &str) -> ServiceResult<Value> {
        Self::fetch(&self.leases, "lease", id)
    }

    async fn create_lease(
        &self,
        ctx: &AuthContext,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        Self::insert(&self.leases, "lease", ctx, data)
    }

    async fn update_lease(
        &self,
        _ctx: &AuthContext,
        id: &str,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        Self::modify(&self.leases, "lease", id, data)
    }

    async fn delete_lease(&self, _ctx: &AuthContext, id: &str) -> ServiceResult<()> {
        Self::remove(&self.leases, "lease", id)
    }

    async fn list_hosts(&self, _ctx: &AuthContext) -> ServiceResult<Vec<Value>> {
        Ok(self.hosts.iter().map(|e| e.value().clone()).collect())
    }

    async fn get_host(&self, _ctx: &AuthContext, id: &str) -> ServiceResult<Value> {
        Self::fetch(&self.hosts, "host", id)
    }

    async fn create_host(
        &self,
        ctx: &AuthContext,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        Self::insert(&self.hosts, "host", ctx, data)
    }

    async fn update_host(
        &self,
        _ctx: &AuthContext,
        id: &str,
        data: Map<String, Value>,
    ) -> ServiceResult<Value> {
        Self::modify(&self.hosts, "host", id, data)
    }

    async fn delete_host(&self, _ctx: &AuthContext, id: &str) -> ServiceResult<()> {
        Self::remove(&self.hosts, "host", id)
    }
}
