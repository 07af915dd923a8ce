//! Guild channels of every kind.
//!
//! The host speaks channel kinds by name (`text`, `category`, …); the API
//! speaks integer codes. `category` maps to the API's `parent_id`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::reconcile::{apply_channel_order, ChannelPosition};
use crate::resources::{
    absent_on_not_found, body_from, changed_body, ignore_not_found, map_fields, Context,
    FieldMap, Resource, ResourceData,
};
use crate::types::ChannelType;

const FIELDS: FieldMap = &[
    ("name", "name"),
    ("topic", "topic"),
    ("nsfw", "nsfw"),
    ("position", "position"),
    ("category", "parent_id"),
    ("bitrate", "bitrate"),
    ("user_limit", "user_limit"),
    ("rate_limit_per_user", "rate_limit_per_user"),
];

pub const SYNC_PERMS: &str = "sync_perms_with_category";

pub struct ChannelResource;

fn channel_path(id: &str) -> String {
    format!("/channels/{id}")
}

fn create_body(data: &ResourceData) -> Result<Map<String, Value>> {
    let kind = ChannelType::from_name(data.get_str("type").unwrap_or("text"))?;
    let mut body = body_from(data, FIELDS);
    body.insert("type".into(), json!(kind.code()));
    Ok(body)
}

/// Whether an update should re-lock the channel to its category.
///
/// Only ever locks; turning the flag off leaves the current overwrites alone.
pub fn needs_permission_lock(data: &ResourceData) -> bool {
    let touched = data.has_change(SYNC_PERMS) || data.has_change("category");
    touched && data.get_bool(SYNC_PERMS).unwrap_or(false)
}

fn apply_channel(data: &mut ResourceData, remote: &Value) {
    map_fields(data, remote, FIELDS);
    if remote.get("parent_id").is_some_and(Value::is_null) {
        data.set("category", Value::Null);
    }
    if let Some(code) = remote.get("type").and_then(Value::as_u64) {
        data.set("type", ChannelType::name_for_code(code));
    }
    if let Some(guild_id) = remote.get("guild_id").and_then(Value::as_str) {
        data.set("server_id", guild_id);
    }
}

#[async_trait]
impl Resource for ChannelResource {
    fn type_name(&self) -> &'static str {
        "discord_channel"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = data.require_str("server_id")?.to_string();
        let body = Value::Object(create_body(data)?);
        let channel: Option<Value> = ctx
            .client
            .do_json(
                &ctx.cancel,
                Method::POST,
                &format!("/guilds/{guild_id}/channels"),
                None,
                Some(&body),
                data.audit_reason(),
            )
            .await?;
        let id = channel
            .as_ref()
            .and_then(|c| c.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("id".into()))?;
        info!(guild_id = %guild_id, channel_id = id, "created channel");
        data.set_id(id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let path = channel_path(data.id());
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &path, None, None, None)
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            apply_channel(data, &remote);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id().to_string();
        let mut body = changed_body(data, FIELDS);
        if data.has_change("type") {
            let kind = ChannelType::from_name(data.get_str("type").unwrap_or("text"))?;
            body.insert("type".into(), json!(kind.code()));
        }
        if !body.is_empty() {
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &channel_path(&id),
                    None,
                    Some(&Value::Object(body)),
                    data.audit_reason(),
                )
                .await?;
        }

        if needs_permission_lock(data) {
            let guild_id = data.require_str("server_id")?.to_string();
            let lock = ChannelPosition {
                id: id.clone(),
                position: data.get_i64("position").unwrap_or_default(),
                parent_id: data.get_str("category").map(str::to_string),
                lock_permissions: Some(true),
            };
            debug!(channel_id = %id, "locking permissions to category");
            apply_channel_order(
                &ctx.client,
                &ctx.cancel,
                &guild_id,
                std::slice::from_ref(&lock),
                data.audit_reason(),
            )
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &channel_path(data.id()),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object")
        };
        map
    }

    #[test]
    fn create_translates_kind_and_category() {
        let d = ResourceData::new(map(json!({
            "server_id": "g",
            "name": "general",
            "type": "voice",
            "category": "c1",
        })));
        assert_eq!(
            Value::Object(create_body(&d).unwrap()),
            json!({ "name": "general", "type": 2, "parent_id": "c1" })
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let d = ResourceData::new(map(json!({ "type": "hologram" })));
        assert!(matches!(create_body(&d), Err(Error::InvalidChannelType(_))));
    }

    #[test]
    fn read_maps_unknown_codes_to_decimal() {
        let mut d = ResourceData::default();
        apply_channel(
            &mut d,
            &json!({ "id": "1", "type": 99, "guild_id": "g", "parent_id": null, "name": "x" }),
        );
        assert_eq!(d.get_str("type"), Some("99"));
        assert_eq!(d.get_str("server_id"), Some("g"));
        assert!(d.get("category").is_none());
    }

    #[test]
    fn lock_only_when_sync_is_on() {
        let on = ResourceData::for_update(
            "1",
            map(json!({ "category": "a", SYNC_PERMS: true })),
            map(json!({ "category": "b", SYNC_PERMS: true })),
        );
        assert!(needs_permission_lock(&on));

        let off = ResourceData::for_update(
            "1",
            map(json!({ SYNC_PERMS: true })),
            map(json!({ SYNC_PERMS: false })),
        );
        assert!(!needs_permission_lock(&off));

        let untouched = ResourceData::for_update(
            "1",
            map(json!({ "name": "a", SYNC_PERMS: true })),
            map(json!({ "name": "b", SYNC_PERMS: true })),
        );
        assert!(!needs_permission_lock(&untouched));
    }
}
