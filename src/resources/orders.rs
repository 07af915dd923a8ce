//! Whole-guild channel and role ordering.
//!
//! Both resources are keyed by the guild id. Neither order can be "deleted",
//! so delete only forgets the resource.

use async_trait::async_trait;

use crate::error::Result;
use crate::reconcile::{
    apply_channel_order, apply_role_order, read_channel_order, read_role_order, ChannelPosition,
    RolePosition,
};
use crate::resources::{noop_delete, Context, Resource, ResourceData};

const CHANNELS: &str = "channel";
const ROLES: &str = "role";

fn guild_id(data: &ResourceData) -> Result<String> {
    if data.is_absent() {
        data.require_str("server_id").map(str::to_string)
    } else {
        Ok(data.id().to_string())
    }
}

/// Result of a read that may have to clear the id on a vanished guild.
fn gone_on_not_found<T>(data: &mut ResourceData, result: Result<T>) -> Result<Option<T>> {
    match result {
        Err(err) if err.is_not_found() => {
            data.clear_id();
            Ok(None)
        }
        other => other.map(Some),
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

pub struct ChannelOrderResource;

impl ChannelOrderResource {
    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = guild_id(data)?;
        let order: Vec<ChannelPosition> = data.get_as(CHANNELS)?.unwrap_or_default();
        apply_channel_order(&ctx.client, &ctx.cancel, &guild_id, &order, data.audit_reason())
            .await?;
        data.set_id(guild_id);
        Ok(())
    }
}

#[async_trait]
impl Resource for ChannelOrderResource {
    fn type_name(&self) -> &'static str {
        "discord_channel_order"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = guild_id(data)?;
        let declared: Vec<ChannelPosition> = data.get_as(CHANNELS)?.unwrap_or_default();
        let result = read_channel_order(&ctx.client, &ctx.cancel, &guild_id, &declared).await;
        if let Some(observed) = gone_on_not_found(data, result)? {
            data.set("server_id", guild_id);
            data.set(CHANNELS, serde_json::to_value(observed)?);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        noop_delete(self.type_name(), data);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

pub struct RoleOrderResource;

impl RoleOrderResource {
    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = guild_id(data)?;
        let order: Vec<RolePosition> = data.get_as(ROLES)?.unwrap_or_default();
        apply_role_order(&ctx.client, &ctx.cancel, &guild_id, &order, data.audit_reason())
            .await?;
        data.set_id(guild_id);
        Ok(())
    }
}

#[async_trait]
impl Resource for RoleOrderResource {
    fn type_name(&self) -> &'static str {
        "discord_role_order"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = guild_id(data)?;
        let declared: Vec<String> = data
            .get_as::<Vec<RolePosition>>(ROLES)?
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let result = read_role_order(&ctx.client, &ctx.cancel, &guild_id, &declared).await;
        if let Some(observed) = gone_on_not_found(data, result)? {
            data.set("server_id", guild_id);
            data.set(ROLES, serde_json::to_value(observed)?);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        noop_delete(self.type_name(), data);
        Ok(())
    }
}
