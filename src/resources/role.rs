use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::permissions::{format_permissions, parse_permissions};
use crate::reconcile::ordering::fetch_roles;
use crate::reconcile::swap_role_position;
use crate::resources::{
    changed_body, ignore_not_found, permission_bits, set_permission_fields, Context, FieldMap,
    Resource, ResourceData,
};
use crate::types::Role;

const FIELDS: FieldMap = &[
    ("name", "name"),
    ("color", "color"),
    ("hoist", "hoist"),
    ("mentionable", "mentionable"),
];

/// A guild role. `position` is applied by swapping with the role that
/// currently holds it.
pub struct RoleResource;

fn server_id(data: &ResourceData) -> Result<String> {
    data.require_str("server_id").map(str::to_string)
}

fn role_path(guild_id: &str, role_id: &str) -> String {
    format!("/guilds/{guild_id}/roles/{role_id}")
}

/// Create body: declared fields plus the bitset as a decimal string.
fn create_body(data: &ResourceData) -> Result<Map<String, Value>> {
    let mut body = crate::resources::body_from(data, FIELDS);
    let bits = permission_bits(data, "permissions")?.unwrap_or_default();
    body.insert("permissions".into(), json!(format_permissions(bits)));
    Ok(body)
}

fn apply_role(data: &mut ResourceData, role: &Role) -> Result<()> {
    data.set("name", role.name.clone());
    data.set("color", role.color);
    data.set("hoist", role.hoist);
    data.set("mentionable", role.mentionable);
    data.set("managed", role.managed);
    data.set("position", role.position);
    let bits = if role.permissions.is_empty() {
        0
    } else {
        parse_permissions(&role.permissions)?
    };
    set_permission_fields(data, "permissions", bits);
    Ok(())
}

fn permissions_changed(data: &ResourceData) -> bool {
    data.has_change("permissions") || data.has_change("permissions64")
}

#[async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &'static str {
        "discord_role"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = server_id(data)?;
        let body = Value::Object(create_body(data)?);
        let role: Role = ctx
            .client
            .do_json(
                &ctx.cancel,
                Method::POST,
                &format!("/guilds/{guild_id}/roles"),
                None,
                Some(&body),
                data.audit_reason(),
            )
            .await?
            .ok_or_else(|| Error::MissingField("id".into()))?;
        info!(guild_id = %guild_id, role_id = %role.id, "created role");
        data.set_id(role.id.clone());

        if let Some(position) = data.get_i64("position") {
            swap_role_position(
                &ctx.client,
                &ctx.cancel,
                &guild_id,
                &role.id,
                position,
                data.audit_reason(),
            )
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = server_id(data)?;
        let roles = match fetch_roles(&ctx.client, &ctx.cancel, &guild_id).await {
            Err(err) if err.is_not_found() => Vec::new(),
            other => other?,
        };
        match roles.iter().find(|r| r.id == data.id()) {
            Some(role) => apply_role(data, role),
            None => {
                data.clear_id();
                Ok(())
            }
        }
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = server_id(data)?;
        let role_id = data.id().to_string();

        let mut body = changed_body(data, FIELDS);
        if permissions_changed(data) {
            let bits = permission_bits(data, "permissions")?.unwrap_or_default();
            body.insert("permissions".into(), json!(format_permissions(bits)));
        }
        if !body.is_empty() {
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &role_path(&guild_id, &role_id),
                    None,
                    Some(&Value::Object(body)),
                    data.audit_reason(),
                )
                .await?;
        }

        if data.has_change("position") {
            if let Some(position) = data.get_i64("position") {
                swap_role_position(
                    &ctx.client,
                    &ctx.cancel,
                    &guild_id,
                    &role_id,
                    position,
                    data.audit_reason(),
                )
                .await?;
            }
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = server_id(data)?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &role_path(&guild_id, data.id()),
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
