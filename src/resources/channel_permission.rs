//! Channel permission overwrites, one at a time or owned as a set.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::ids::{pack_id, parse_id};
use crate::permissions::parse_permissions;
use crate::reconcile::overwrites::{fetch_overwrites, overwrite_path};
use crate::reconcile::{reconcile_overwrites, DesiredOverwrite};
use crate::resources::{
    absent_on_not_found, ignore_not_found, permission_bits, set_permission_fields, Context,
    Resource, ResourceData,
};
use crate::types::{OverwriteType, PermissionOverwrite};

fn bits(text: &str) -> Result<u64> {
    if text.is_empty() {
        Ok(0)
    } else {
        parse_permissions(text)
    }
}

// ---------------------------------------------------------------------------
// Single overwrite
// ---------------------------------------------------------------------------

/// One overwrite, id `channel_id:overwrite_id`.
pub struct ChannelPermissionResource;

fn desired_single(data: &ResourceData) -> Result<DesiredOverwrite> {
    let kind = OverwriteType::from_name(data.get_str("type").unwrap_or("role"))?;
    Ok(DesiredOverwrite::new(
        kind,
        data.require_str("overwrite_id")?,
        permission_bits(data, "allow")?.unwrap_or_default(),
        permission_bits(data, "deny")?.unwrap_or_default(),
    ))
}

fn apply_single(data: &mut ResourceData, channel_id: &str, remote: &PermissionOverwrite) -> Result<()> {
    data.set("channel_id", channel_id);
    data.set("overwrite_id", remote.id.clone());
    data.set("type", remote.kind.name());
    set_permission_fields(data, "allow", bits(&remote.allow)?);
    set_permission_fields(data, "deny", bits(&remote.deny)?);
    Ok(())
}

impl ChannelPermissionResource {
    async fn put(&self, ctx: &Context, data: &ResourceData) -> Result<String> {
        let channel_id = data.require_str("channel_id")?;
        let overwrite = desired_single(data)?;
        ctx.client
            .do_json_discard(
                &ctx.cancel,
                Method::PUT,
                &overwrite_path(channel_id, &overwrite.target_id),
                None,
                Some(&overwrite.body()),
                data.audit_reason(),
            )
            .await?;
        Ok(pack_id(channel_id, &overwrite.target_id))
    }
}

#[async_trait]
impl Resource for ChannelPermissionResource {
    fn type_name(&self) -> &'static str {
        "discord_channel_permission"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = self.put(ctx, data).await?;
        data.set_id(id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (channel_id, overwrite_id) = parse_id(data.id())?;
        let result = fetch_overwrites(&ctx.client, &ctx.cancel, &channel_id)
            .await
            .map(Some);
        let Some(overwrites) = absent_on_not_found(data, result)? else {
            return Ok(());
        };
        match overwrites.iter().find(|o| o.id == overwrite_id) {
            Some(remote) => apply_single(data, &channel_id, remote),
            None => {
                data.clear_id();
                Ok(())
            }
        }
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.put(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (channel_id, overwrite_id) = parse_id(data.id())?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &overwrite_path(&channel_id, &overwrite_id),
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
// Authoritative set
// ---------------------------------------------------------------------------

/// Every overwrite on a channel. Undeclared overwrites are removed.
pub struct ChannelPermissionsResource;

const OVERWRITES: &str = "permission_overwrite";

/// Accepts the bitset as a decimal/hex string or an integer.
fn entry_bits(entry: &Value, key: &str) -> Result<u64> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(text)) => bits(text),
        Some(other) => other
            .as_u64()
            .ok_or_else(|| Error::InvalidPermission(other.to_string())),
    }
}

fn desired_set(data: &ResourceData) -> Result<Vec<DesiredOverwrite>> {
    let Some(entries) = data.get(OVERWRITES).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| {
            let kind = OverwriteType::from_name(
                entry.get("type").and_then(Value::as_str).unwrap_or("role"),
            )?;
            let target = entry
                .get("overwrite_id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::MissingField("overwrite_id".into()))?;
            Ok(DesiredOverwrite::new(
                kind,
                target,
                entry_bits(entry, "allow")?,
                entry_bits(entry, "deny")?,
            ))
        })
        .collect()
}

/// Remote overwrites in a stable order: type, then id.
fn observed_set(remote: &[PermissionOverwrite]) -> Result<Value> {
    let mut sorted: Vec<&PermissionOverwrite> = remote.iter().collect();
    sorted.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));
    let entries = sorted
        .into_iter()
        .map(|o| {
            Ok(json!({
                "type": o.kind.name(),
                "overwrite_id": o.id,
                "allow": bits(&o.allow)?.to_string(),
                "deny": bits(&o.deny)?.to_string(),
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(entries))
}

impl ChannelPermissionsResource {
    async fn reconcile(&self, ctx: &Context, data: &ResourceData) -> Result<String> {
        let channel_id = data.require_str("channel_id")?;
        let desired = desired_set(data)?;
        let ops = reconcile_overwrites(
            &ctx.client,
            &ctx.cancel,
            channel_id,
            &desired,
            data.audit_reason(),
        )
        .await?;
        info!(channel_id, ops = ops.len(), "channel overwrites reconciled");
        Ok(channel_id.to_string())
    }
}

#[async_trait]
impl Resource for ChannelPermissionsResource {
    fn type_name(&self) -> &'static str {
        "discord_channel_permissions"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = self.reconcile(ctx, data).await?;
        data.set_id(id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = data.id().to_string();
        let result = fetch_overwrites(&ctx.client, &ctx.cancel, &channel_id)
            .await
            .map(Some);
        if let Some(remote) = absent_on_not_found(data, result)? {
            data.set("channel_id", channel_id);
            data.set(OVERWRITES, observed_set(&remote)?);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.reconcile(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let channel_id = data.id().to_string();
        ignore_not_found(
            reconcile_overwrites(
                &ctx.client,
                &ctx.cancel,
                &channel_id,
                &[],
                data.audit_reason(),
            )
            .await
            .map(drop),
        )?;
        data.clear_id();
        Ok(())
    }
}
