use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resources::{
    absent_on_not_found, body_from, changed_body, ignore_not_found, map_fields, Context,
    FieldMap, Resource, ResourceData,
};

const CREATE_FIELDS: FieldMap = &[
    ("content", "content"),
    ("tts", "tts"),
    ("embed", "embeds"),
];

/// Only content and embeds can be edited after posting.
const EDIT_FIELDS: FieldMap = &[("content", "content"), ("embed", "embeds")];

const READ_FIELDS: FieldMap = &[
    ("content", "content"),
    ("tts", "tts"),
    ("embed", "embeds"),
    ("pinned", "pinned"),
    ("type", "type"),
    ("timestamp", "timestamp"),
    ("edited_timestamp", "edited_timestamp"),
];

/// A message posted by the bot, optionally pinned.
pub struct MessageResource;

fn channel_id(data: &ResourceData) -> Result<String> {
    data.require_str("channel_id").map(str::to_string)
}

fn message_path(channel_id: &str, message_id: &str) -> String {
    format!("/channels/{channel_id}/messages/{message_id}")
}

fn pin_path(channel_id: &str, message_id: &str) -> String {
    format!("/channels/{channel_id}/pins/{message_id}")
}

async fn set_pinned(ctx: &Context, data: &ResourceData, channel_id: &str, pinned: bool) -> Result<()> {
    let method = if pinned { Method::PUT } else { Method::DELETE };
    debug!(channel_id, message_id = data.id(), pinned, "updating pin");
    ctx.client
        .do_json_discard(
            &ctx.cancel,
            method,
            &pin_path(channel_id, data.id()),
            None,
            None,
            data.audit_reason(),
        )
        .await
}

#[async_trait]
impl Resource for MessageResource {
    fn type_name(&self) -> &'static str {
        "discord_message"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = channel_id(data)?;
        let body = Value::Object(body_from(data, CREATE_FIELDS));
        let message: Option<Value> = ctx
            .client
            .do_json(
                &ctx.cancel,
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                None,
                Some(&body),
                data.audit_reason(),
            )
            .await?;
        let id = message
            .as_ref()
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("id".into()))?;
        data.set_id(id);

        if data.get_bool("pinned").unwrap_or(false) {
            set_pinned(ctx, data, &channel_id, true).await?;
        }
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = channel_id(data)?;
        let path = message_path(&channel_id, data.id());
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &path, None, None, None)
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            map_fields(data, &remote, READ_FIELDS);
            if let Some(author) = remote.pointer("/author/id").and_then(Value::as_str) {
                data.set("author", author);
            }
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = channel_id(data)?;
        let body = changed_body(data, EDIT_FIELDS);
        if !body.is_empty() {
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &message_path(&channel_id, data.id()),
                    None,
                    Some(&Value::Object(body)),
                    data.audit_reason(),
                )
                .await?;
        }
        if data.has_change("pinned") {
            let pinned = data.get_bool("pinned").unwrap_or(false);
            set_pinned(ctx, data, &channel_id, pinned).await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = channel_id(data)?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &message_path(&channel_id, data.id()),
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
