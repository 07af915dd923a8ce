//! One template for every resource whose body is caller-supplied JSON.
//!
//! Automod rules, onboarding, the welcome screen, guild settings and member
//! verification differ only in their paths, the verb used to write, and where
//! the id comes from. The caller's JSON lives in `payload_json`; the canonical
//! read-back, projected onto the payload's top-level keys, lives in
//! `state_json` so that drift shows up as a diff and formatting does not.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::json::{canonicalize_value, stable_hash_id};
use crate::resources::{
    absent_on_not_found, ignore_not_found, noop_delete, Context, Resource, ResourceData,
};

pub const PAYLOAD_JSON: &str = "payload_json";
pub const STATE_JSON: &str = "state_json";

pub type CollectionPath = fn(&ResourceData) -> Result<String>;
pub type ItemPath = fn(&ResourceData, &str) -> Result<String>;

#[derive(Debug, Clone)]
pub enum CreateMode {
    /// Issue the create call with this verb.
    Call(Method),
    /// No remote call; the id must come from [`IdSource::DataField`].
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub enum IdSource {
    /// Field of the create reply. If it is missing the id is a hash of the
    /// path and the canonical reply.
    ResponseField(&'static str),
    /// Attribute supplied by the caller (e.g. the guild id of a singleton).
    DataField(&'static str),
}

pub struct JsonResource {
    pub type_name: &'static str,
    pub create: CreateMode,
    pub collection_path: CollectionPath,
    pub item_path: ItemPath,
    pub update_method: Method,
    pub id_source: IdSource,
    pub deletable: bool,
}

/// Parsed `payload_json`, if set.
pub fn payload(data: &ResourceData) -> Result<Option<Value>> {
    match data.get_str(PAYLOAD_JSON).map(str::trim) {
        Some(text) if !text.is_empty() => Ok(Some(serde_json::from_str(text)?)),
        _ => Ok(None),
    }
}

/// Id for a freshly created object.
pub fn resolve_id(
    source: IdSource,
    data: &ResourceData,
    path: &str,
    response: Option<&Value>,
) -> Result<String> {
    match source {
        IdSource::DataField(key) => Ok(data.require_str(key)?.to_string()),
        IdSource::ResponseField(field) => Ok(id_from_reply(field, path, response)),
    }
}

/// `field` of the reply, or a hash of the path and the canonical reply.
pub fn id_from_reply(field: &str, path: &str, response: Option<&Value>) -> String {
    let from_reply = response.and_then(|r| r.get(field)).and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    from_reply.unwrap_or_else(|| {
        let body = response.map(Value::to_string).unwrap_or_default();
        stable_hash_id(path, &body)
    })
}

/// Keep only the keys the caller declared, so extra server-side fields do not
/// register as drift.
pub fn project(remote: Value, declared: Option<&Value>) -> Value {
    match (remote, declared) {
        (Value::Object(remote), Some(Value::Object(declared))) => Value::Object(
            remote
                .into_iter()
                .filter(|(k, _)| declared.contains_key(k))
                .collect(),
        ),
        (remote, _) => remote,
    }
}

/// Store the canonical read-back.
pub fn store_state(data: &mut ResourceData, remote: Value) -> Result<()> {
    let declared = payload(data)?;
    let projected = project(remote, declared.as_ref());
    let canonical = serde_json::to_string(&canonicalize_value(projected))?;
    data.set(STATE_JSON, canonical);
    Ok(())
}

impl JsonResource {
    fn create_method(&self) -> Option<Method> {
        match &self.create {
            CreateMode::Call(method) => Some(method.clone()),
            CreateMode::Skip => None,
        }
    }
}

#[async_trait]
impl Resource for JsonResource {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let path = (self.collection_path)(data)?;
        let response: Option<Value> = match self.create_method() {
            Some(method) => {
                let body = payload(data)?;
                ctx.client
                    .do_json(
                        &ctx.cancel,
                        method,
                        &path,
                        None,
                        body.as_ref(),
                        data.audit_reason(),
                    )
                    .await?
            }
            None => {
                if let IdSource::ResponseField(_) = self.id_source {
                    return Err(Error::MissingField("id".into()));
                }
                None
            }
        };

        let id = resolve_id(self.id_source, data, &path, response.as_ref())?;
        debug!(resource = self.type_name, id = %id, "created");
        data.set_id(id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let path = (self.item_path)(data, data.id())?;
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &path, None, None, None)
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            store_state(data, remote)?;
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        if data.has_change(PAYLOAD_JSON) {
            let path = (self.item_path)(data, data.id())?;
            let body = payload(data)?;
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    self.update_method.clone(),
                    &path,
                    None,
                    body.as_ref(),
                    data.audit_reason(),
                )
                .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        if !self.deletable {
            noop_delete(self.type_name, data);
            return Ok(());
        }
        let path = (self.item_path)(data, data.id())?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &path,
                    None,
                    None,
                    data.audit_reason(),
                )
                .await,
        )?;
        data.clear_id();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Concrete instances
// ---------------------------------------------------------------------------

fn guild_id(data: &ResourceData) -> Result<&str> {
    data.require_str("guild_id")
}

/// Singletons are addressed by the guild id, which is also their resource id.
fn singleton_id<'a>(data: &'a ResourceData, id: &'a str) -> Result<&'a str> {
    if id.is_empty() {
        guild_id(data)
    } else {
        Ok(id)
    }
}

pub fn automod_rule() -> JsonResource {
    JsonResource {
        type_name: "discord_automod_rule",
        create: CreateMode::Call(Method::POST),
        collection_path: |d| Ok(format!("/guilds/{}/auto-moderation/rules", guild_id(d)?)),
        item_path: |d, id| Ok(format!("/guilds/{}/auto-moderation/rules/{id}", guild_id(d)?)),
        update_method: Method::PATCH,
        id_source: IdSource::ResponseField("id"),
        deletable: true,
    }
}

pub fn onboarding() -> JsonResource {
    JsonResource {
        type_name: "discord_onboarding",
        create: CreateMode::Call(Method::PUT),
        collection_path: |d| Ok(format!("/guilds/{}/onboarding", guild_id(d)?)),
        item_path: |d, id| Ok(format!("/guilds/{}/onboarding", singleton_id(d, id)?)),
        update_method: Method::PUT,
        id_source: IdSource::DataField("guild_id"),
        deletable: false,
    }
}

pub fn welcome_screen() -> JsonResource {
    JsonResource {
        type_name: "discord_welcome_screen",
        create: CreateMode::Call(Method::PATCH),
        collection_path: |d| Ok(format!("/guilds/{}/welcome-screen", guild_id(d)?)),
        item_path: |d, id| Ok(format!("/guilds/{}/welcome-screen", singleton_id(d, id)?)),
        update_method: Method::PATCH,
        id_source: IdSource::DataField("guild_id"),
        deletable: false,
    }
}

pub fn guild_settings() -> JsonResource {
    JsonResource {
        type_name: "discord_guild_settings",
        create: CreateMode::Call(Method::PATCH),
        collection_path: |d| Ok(format!("/guilds/{}", guild_id(d)?)),
        item_path: |d, id| Ok(format!("/guilds/{}", singleton_id(d, id)?)),
        update_method: Method::PATCH,
        id_source: IdSource::DataField("guild_id"),
        deletable: false,
    }
}

pub fn member_verification() -> JsonResource {
    JsonResource {
        type_name: "discord_member_verification",
        create: CreateMode::Call(Method::PATCH),
        collection_path: |d| Ok(format!("/guilds/{}/member-verification", guild_id(d)?)),
        item_path: |d, id| Ok(format!("/guilds/{}/member-verification", singleton_id(d, id)?)),
        update_method: Method::PATCH,
        id_source: IdSource::DataField("guild_id"),
        deletable: false,
    }
}

pub fn standard() -> Vec<JsonResource> {
    vec![
        automod_rule(),
        onboarding(),
        welcome_screen(),
        guild_settings(),
        member_verification(),
    ]
}
