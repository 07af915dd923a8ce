use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::ids::{pack_id, parse_id};
use crate::resources::{
    absent_on_not_found, ignore_not_found, Context, Resource, ResourceData,
};

/// A guild ban, id `server_id:user_id`.
pub struct BanResource;

fn ban_path(guild_id: &str, user_id: &str) -> String {
    format!("/guilds/{guild_id}/bans/{user_id}")
}

fn ids(data: &ResourceData) -> Result<(String, String)> {
    if data.is_absent() {
        Ok((
            data.require_str("server_id")?.to_string(),
            data.require_str("user_id")?.to_string(),
        ))
    } else {
        parse_id(data.id())
    }
}

fn ban_body(data: &ResourceData) -> Value {
    json!({
        "delete_message_seconds": data.get_u64("delete_message_seconds").unwrap_or(0),
    })
}

#[async_trait]
impl Resource for BanResource {
    fn type_name(&self) -> &'static str {
        "discord_ban"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        ctx.client
            .do_json_discard(
                &ctx.cancel,
                Method::PUT,
                &ban_path(&guild_id, &user_id),
                None,
                Some(&ban_body(data)),
                data.audit_reason(),
            )
            .await?;
        info!(guild_id = %guild_id, user_id = %user_id, "banned member");
        data.set_id(pack_id(&guild_id, &user_id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        let result = ctx
            .client
            .do_json::<Value>(
                &ctx.cancel,
                Method::GET,
                &ban_path(&guild_id, &user_id),
                None,
                None,
                None,
            )
            .await;
        if let Some(ban) = absent_on_not_found(data, result)? {
            data.set("server_id", guild_id);
            data.set("user_id", user_id);
            data.set(
                "reason",
                ban.get("reason").cloned().unwrap_or(Value::Null),
            );
        }
        Ok(())
    }

    /// A ban has no mutable fields; PUT again so a changed message-purge
    /// window still reaches the API.
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.create(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &ban_path(&guild_id, &user_id),
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
