//! Channel webhooks.
//!
//! The webhook token is a credential: it is stored for the host (marked
//! sensitive there) but never logged, and the derived `url` that embeds it is
//! treated the same way.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::resources::{
    absent_on_not_found, body_from, changed_body, ignore_not_found, map_fields, Context,
    FieldMap, Resource, ResourceData,
};

const FIELDS: FieldMap = &[
    ("name", "name"),
    ("avatar_data_uri", "avatar"),
    ("channel_id", "channel_id"),
];

const READ_FIELDS: FieldMap = &[
    ("name", "name"),
    ("channel_id", "channel_id"),
    ("avatar_hash", "avatar"),
    ("server_id", "guild_id"),
];

pub const WEBHOOK_BASE_URL: &str = "https://discord.com/api/webhooks";

pub struct WebhookResource;

fn webhook_path(id: &str) -> String {
    format!("/webhooks/{id}")
}

/// Store token and execute URL without ever emitting them.
fn apply_credentials(data: &mut ResourceData, remote: &Value) {
    let id = data.id().to_string();
    if let Some(token) = remote.get("token").and_then(Value::as_str) {
        data.set("token", token);
        data.set("url", format!("{WEBHOOK_BASE_URL}/{id}/{token}"));
    }
}

#[async_trait]
impl Resource for WebhookResource {
    fn type_name(&self) -> &'static str {
        "discord_webhook"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = data.require_str("channel_id")?.to_string();
        let mut body = body_from(data, FIELDS);
        body.remove("channel_id");
        let hook: Option<Value> = ctx
            .client
            .do_json(
                &ctx.cancel,
                Method::POST,
                &format!("/channels/{channel_id}/webhooks"),
                None,
                Some(&Value::Object(body)),
                data.audit_reason(),
            )
            .await?;
        let hook = hook.ok_or_else(|| Error::MissingField("id".into()))?;
        let id = hook
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("id".into()))?;
        info!(channel_id = %channel_id, webhook_id = id, "created webhook");
        data.set_id(id);
        apply_credentials(data, &hook);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let path = webhook_path(data.id());
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &path, None, None, None)
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            map_fields(data, &remote, READ_FIELDS);
            apply_credentials(data, &remote);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let body = changed_body(data, FIELDS);
        if !body.is_empty() {
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &webhook_path(data.id()),
                    None,
                    Some(&Value::Object(body)),
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
                    &webhook_path(data.id()),
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
    use serde_json::json;

    #[test]
    fn url_embeds_id_and_token() {
        let mut data = ResourceData::with_id("42", Default::default());
        apply_credentials(&mut data, &json!({ "token": "s3cr3t" }));
        assert_eq!(data.get_str("token"), Some("s3cr3t"));
        assert_eq!(
            data.get_str("url"),
            Some("https://discord.com/api/webhooks/42/s3cr3t")
        );
    }

    #[test]
    fn missing_token_leaves_state_alone() {
        let mut data = ResourceData::with_id("42", Default::default());
        apply_credentials(&mut data, &json!({ "name": "hook" }));
        assert!(data.get("token").is_none());
        assert!(data.get("url").is_none());
    }
}
