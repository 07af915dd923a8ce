use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use crate::error::Result;
use crate::ids::{pack_id, parse_id};
use crate::reconcile::member_roles::{fetch_member, member_path};
use crate::reconcile::{reconcile_member_roles, RoleMembership};
use crate::resources::{ignore_not_found, Context, Resource, ResourceData};

const ROLES: &str = "role";

/// Declared role memberships of one member, id `server_id:user_id`.
pub struct MemberRolesResource;

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

/// Declared entries with `has_role` refreshed from what the member holds.
fn observe(declared: &[RoleMembership], held: &[String]) -> Vec<RoleMembership> {
    declared
        .iter()
        .map(|entry| RoleMembership {
            role_id: entry.role_id.clone(),
            has_role: held.contains(&entry.role_id),
        })
        .collect()
}

impl MemberRolesResource {
    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        let desired: Vec<RoleMembership> = data.get_as(ROLES)?.unwrap_or_default();
        let previous: Vec<RoleMembership> = data.prior_as(ROLES)?.unwrap_or_default();
        reconcile_member_roles(
            &ctx.client,
            &ctx.cancel,
            &guild_id,
            &user_id,
            &desired,
            &previous,
            data.audit_reason(),
        )
        .await?;
        data.set_id(pack_id(&guild_id, &user_id));
        Ok(())
    }
}

#[async_trait]
impl Resource for MemberRolesResource {
    fn type_name(&self) -> &'static str {
        "discord_member_roles"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        let member = match fetch_member(&ctx.client, &ctx.cancel, &guild_id, &user_id).await {
            Err(err) if err.is_not_found() => None,
            other => other?,
        };
        let Some(member) = member else {
            data.clear_id();
            return Ok(());
        };
        let declared: Vec<RoleMembership> = data.get_as(ROLES)?.unwrap_or_default();
        data.set("server_id", guild_id);
        data.set("user_id", user_id);
        data.set(ROLES, serde_json::to_value(observe(&declared, &member.roles))?);
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await?;
        self.read(ctx, data).await
    }

    /// Strips every role this resource granted. Roles it only declared as
    /// absent, and roles it never declared, are left alone.
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, user_id) = ids(data)?;
        let declared: Vec<RoleMembership> = data.get_as(ROLES)?.unwrap_or_default();
        let member = match fetch_member(&ctx.client, &ctx.cancel, &guild_id, &user_id).await {
            Err(err) if err.is_not_found() => None,
            other => other?,
        };
        if let Some(member) = member {
            let roles: Vec<String> = member
                .roles
                .into_iter()
                .filter(|r| !declared.iter().any(|d| d.has_role && d.role_id == *r))
                .collect();
            ignore_not_found(
                ctx.client
                    .do_json_discard(
                        &ctx.cancel,
                        Method::PATCH,
                        &member_path(&guild_id, &user_id),
                        None,
                        Some(&json!({ "roles": roles })),
                        data.audit_reason(),
                    )
                    .await,
            )?;
        }
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_reflects_remote_membership() {
        let declared = vec![
            RoleMembership { role_id: "a".into(), has_role: true },
            RoleMembership { role_id: "b".into(), has_role: false },
        ];
        let held = vec!["b".to_string(), "z".to_string()];
        assert_eq!(
            observe(&declared, &held),
            vec![
                RoleMembership { role_id: "a".into(), has_role: false },
                RoleMembership { role_id: "b".into(), has_role: true },
            ]
        );
    }

    #[test]
    fn ids_come_from_fields_before_create() {
        let serde_json::Value::Object(values) =
            json!({ "server_id": "g", "user_id": "u" })
        else {
            unreachable!()
        };
        assert_eq!(
            ids(&ResourceData::new(values.clone())).unwrap(),
            ("g".to_string(), "u".to_string())
        );
        assert_eq!(
            ids(&ResourceData::with_id("g2:u2", values)).unwrap(),
            ("g2".to_string(), "u2".to_string())
        );
    }
}
