use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::permissions::parse_permissions;
use crate::resources::{
    absent_on_not_found, body_from, changed_body, map_fields, noop_delete, set_permission_fields,
    Context, FieldMap, Resource, ResourceData,
};

/// Guild-level settings written on create and diffed on update.
const FIELDS: FieldMap = &[
    ("name", "name"),
    ("region", "region"),
    ("icon_data_uri", "icon"),
    ("verification_level", "verification_level"),
    ("default_message_notifications", "default_message_notifications"),
    ("explicit_content_filter", "explicit_content_filter"),
    ("afk_channel_id", "afk_channel_id"),
    ("afk_timeout", "afk_timeout"),
    ("system_channel_id", "system_channel_id"),
    ("owner_id", "owner_id"),
];

/// What a GET maps back. `region` is write-only and the icon comes back as a
/// hash rather than the uploaded data URI.
const READ_FIELDS: FieldMap = &[
    ("name", "name"),
    ("icon_hash", "icon"),
    ("verification_level", "verification_level"),
    ("default_message_notifications", "default_message_notifications"),
    ("explicit_content_filter", "explicit_content_filter"),
    ("afk_channel_id", "afk_channel_id"),
    ("afk_timeout", "afk_timeout"),
    ("system_channel_id", "system_channel_id"),
    ("owner_id", "owner_id"),
];

/// A guild. Deleting one through a bot is not supported, so delete only
/// forgets it.
pub struct ServerResource;

/// The `@everyone` role shares its id with the guild.
fn everyone_permissions(guild: &Value, guild_id: &str) -> Result<Option<u64>> {
    let Some(roles) = guild.get("roles").and_then(Value::as_array) else {
        return Ok(None);
    };
    roles
        .iter()
        .find(|r| r.get("id").and_then(Value::as_str) == Some(guild_id))
        .and_then(|r| r.get("permissions").and_then(Value::as_str))
        .map(parse_permissions)
        .transpose()
}

#[async_trait]
impl Resource for ServerResource {
    fn type_name(&self) -> &'static str {
        "discord_server"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let body = Value::Object(body_from(data, FIELDS));
        let guild: Option<Value> = ctx
            .client
            .do_json(
                &ctx.cancel,
                Method::POST,
                "/guilds",
                None,
                Some(&body),
                data.audit_reason(),
            )
            .await?;
        let id = guild
            .as_ref()
            .and_then(|g| g.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("id".into()))?;
        info!(guild_id = id, "created server");
        data.set_id(id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id().to_string();
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &format!("/guilds/{id}"), None, None, None)
            .await;
        let Some(guild) = absent_on_not_found(data, result)? else {
            return Ok(());
        };

        map_fields(data, &guild, READ_FIELDS);
        if let Some(bits) = everyone_permissions(&guild, &id)? {
            set_permission_fields(data, "permissions", bits);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let body = changed_body(data, FIELDS);
        if !body.is_empty() {
            let id = data.id().to_string();
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &format!("/guilds/{id}"),
                    None,
                    Some(&Value::Object(body)),
                    data.audit_reason(),
                )
                .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        noop_delete(self.type_name(), data);
        Ok(())
    }
}
