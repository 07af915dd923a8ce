//! Host-facing resources.
//!
//! Every resource follows the same lifecycle:
//!
//! - **create**: issue the creation call, take the id from the reply, then read.
//! - **read**: GET and map fields onto [`ResourceData`]; a 404 clears the id
//!   so the host plans a re-create.
//! - **update**: PATCH only the fields that changed, then read.
//! - **delete**: issue the deletion call; a 404 counts as success. Settings-like
//!   resources that cannot be reverted make delete a no-op with a warning.
//!
//! The audit reason is forwarded on write calls only. It is never read back
//! and never counts as a change.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::http::RestClient;
use crate::json;
use crate::permissions::{format_permissions, native_int_field, parse_permissions};

pub mod api_request;
pub mod ban;
pub mod channel;
pub mod channel_permission;
pub mod member_roles;
pub mod message;
pub mod orders;
pub mod passthrough;
pub mod permission;
pub mod role;
pub mod server;
pub mod sticker;
pub mod webhook;

/// Attribute holding the optional audit-log reason.
pub const AUDIT_REASON: &str = "audit_reason";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Handed to every resource callback. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Context {
    pub client: RestClient,
    pub config: Arc<ProviderConfig>,
    /// Cancellation for the current callback.
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(&config)?,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    /// Same client and config, different cancellation.
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            cancel,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource data
// ---------------------------------------------------------------------------

/// The host's view of one resource instance.
///
/// `values` is the planned (or freshly read) attribute map; `prior` is the
/// last-applied snapshot used to compute changes on update.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    prior: Map<String, Value>,
    values: Map<String, Value>,
    warnings: Vec<String>,
}

impl ResourceData {
    /// Planned attributes for a create.
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Existing resource (read, delete, import).
    pub fn with_id(id: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            prior: values.clone(),
            values,
            warnings: Vec::new(),
        }
    }

    /// Update: `prior` is the last-applied state, `values` the plan.
    pub fn for_update(
        id: impl Into<String>,
        prior: Map<String, Value>,
        values: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            prior,
            values,
            warnings: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the remote object as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// `null` reads as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }

    /// Deserialize an attribute into a typed value; absent or null is `None`.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior.get(key).filter(|v| !v.is_null())
    }

    pub fn prior_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.prior(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn has_change(&self, key: &str) -> bool {
        key != AUDIT_REASON && self.prior(key) != self.get(key)
    }

    /// Changed attribute names, sorted. Never includes the audit reason.
    pub fn changed_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .keys()
            .chain(self.prior.keys())
            .filter(|k| self.has_change(k))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn audit_reason(&self) -> Option<&str> {
        self.get_str(AUDIT_REASON).filter(|r| !r.is_empty())
    }

    /// Surface a non-fatal warning to the host.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(id = %self.id, "{message}");
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

// ---------------------------------------------------------------------------
// Resource trait + registry
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Resource: Send + Sync {
    /// Name the host uses for this resource type, e.g. `discord_role`.
    fn type_name(&self) -> &'static str;

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;
}

/// Type name → resource lookup used by the host bridge.
pub struct Registry {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }

    /// Every resource this crate ships.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(server::ServerResource);
        registry.register(role::RoleResource);
        registry.register(channel::ChannelResource);
        registry.register(channel_permission::ChannelPermissionResource);
        registry.register(channel_permission::ChannelPermissionsResource);
        registry.register(orders::ChannelOrderResource);
        registry.register(orders::RoleOrderResource);
        registry.register(member_roles::MemberRolesResource);
        registry.register(ban::BanResource);
        registry.register(webhook::WebhookResource);
        registry.register(message::MessageResource);
        registry.register(sticker::StickerResource);
        registry.register(api_request::ApiRequestResource);
        registry.register(permission::PermissionDataSource);
        for resource in passthrough::standard() {
            registry.register(resource);
        }
        registry
    }

    pub fn register(&mut self, resource: impl Resource + 'static) {
        self.resources.insert(resource.type_name(), Box::new(resource));
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn Resource> {
        self.resources.get(type_name).map(|r| r.as_ref())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Read-side 404 handling: clear the id and report "nothing to map".
pub(crate) fn absent_on_not_found<T>(
    data: &mut ResourceData,
    result: Result<Option<T>>,
) -> Result<Option<T>> {
    match result {
        Err(err) if err.is_not_found() => {
            warn!(id = %data.id(), "remote object gone, removing from state");
            data.clear_id();
            Ok(None)
        }
        Ok(None) => {
            data.clear_id();
            Ok(None)
        }
        other => other,
    }
}

/// Delete-side 404 handling: already gone is success.
pub(crate) fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

/// Delete for resources whose remote state cannot be reverted.
pub(crate) fn noop_delete(type_name: &str, data: &mut ResourceData) {
    data.warn(format!(
        "{type_name} cannot be deleted through the API; it was removed from state only"
    ));
    data.clear_id();
}

/// Attribute name on the host side paired with the API field name.
pub(crate) type FieldMap = &'static [(&'static str, &'static str)];

/// Request body with every present attribute in `fields`.
pub(crate) fn body_from(data: &ResourceData, fields: FieldMap) -> Map<String, Value> {
    let mut body = Map::new();
    for (attr, api) in fields {
        if let Some(value) = data.get(attr) {
            body.insert((*api).to_string(), value.clone());
        }
    }
    body
}

/// PATCH body with only the changed attributes; a cleared attribute is sent
/// as `null`.
pub(crate) fn changed_body(data: &ResourceData, fields: FieldMap) -> Map<String, Value> {
    let mut body = Map::new();
    for (attr, api) in fields {
        if data.has_change(attr) {
            body.insert(
                (*api).to_string(),
                data.get(attr).cloned().unwrap_or(Value::Null),
            );
        }
    }
    body
}

/// Copy API fields from `remote` onto the matching attributes.
pub(crate) fn map_fields(data: &mut ResourceData, remote: &Value, fields: FieldMap) {
    for (attr, api) in fields {
        if let Some(value) = remote.get(*api) {
            data.set(attr, value.clone());
        }
    }
}

/// Diff suppression for stored JSON payloads.
pub fn suppress_json_diff(old: &str, new: &str) -> bool {
    json::equivalent(old, new)
}

/// The audit reason never produces a diff.
pub fn suppress_audit_reason_diff(_old: &str, _new: &str) -> bool {
    true
}

/// Desired bits from either `{key}64` (string) or the legacy `{key}` int.
///
/// The string wins unless only the int changed since the last apply, in
/// which case the string still holds the previous bits.
pub(crate) fn permission_bits(data: &ResourceData, key: &str) -> Result<Option<u64>> {
    let wide = format!("{key}64");
    let int_only_change = data.has_change(key) && !data.has_change(&wide);
    if !int_only_change {
        if let Some(text) = data.get_str(&wide).filter(|s| !s.is_empty()) {
            return parse_permissions(text).map(Some);
        }
    }
    match data.get(key) {
        Some(Value::String(text)) => parse_permissions(text).map(Some),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::InvalidPermission(value.to_string())),
        None => Ok(None),
    }
}

/// Populate both the legacy int field and the canonical 64-bit string.
pub(crate) fn set_permission_fields(data: &mut ResourceData, key: &str, bits: u64) {
    data.set(key, native_int_field(bits));
    data.set(&format!("{key}64"), format_permissions(bits));
}
