//! Role membership for one guild member.
//!
//! Declared entries are `(role_id, has_role)` pairs. Roles the member holds
//! but that were never declared are left alone, with one exception: a role
//! that was declared in the previous state and is no longer declared is
//! removed. That also removes it when someone re-granted it out-of-band.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;
use crate::http::RestClient;
use crate::types::GuildMember;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMembership {
    pub role_id: String,
    #[serde(default = "default_has_role")]
    pub has_role: bool,
}

fn default_has_role() -> bool {
    true
}

/// Full role list to PATCH onto the member. Keeps the member's existing order.
pub fn plan_member_roles(
    current: &[String],
    desired: &[RoleMembership],
    previous: &[RoleMembership],
) -> Vec<String> {
    let mut roles: Vec<String> = current.to_vec();

    for entry in desired {
        let held = roles.iter().any(|r| *r == entry.role_id);
        if entry.has_role && !held {
            roles.push(entry.role_id.clone());
        } else if !entry.has_role && held {
            roles.retain(|r| *r != entry.role_id);
        }
    }

    for dropped in previous
        .iter()
        .filter(|p| !desired.iter().any(|d| d.role_id == p.role_id))
    {
        roles.retain(|r| *r != dropped.role_id);
    }

    roles
}

pub fn member_path(guild_id: &str, user_id: &str) -> String {
    format!("/guilds/{guild_id}/members/{user_id}")
}

pub async fn fetch_member(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    user_id: &str,
) -> Result<Option<GuildMember>> {
    client
        .do_json(
            cancel,
            Method::GET,
            &member_path(guild_id, user_id),
            None,
            None,
            None,
        )
        .await
}

/// Fetch, plan, PATCH. Returns the role list that was sent.
#[allow(clippy::too_many_arguments)]
pub async fn reconcile_member_roles(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    user_id: &str,
    desired: &[RoleMembership],
    previous: &[RoleMembership],
    audit_reason: Option<&str>,
) -> Result<Vec<String>> {
    let current = fetch_member(client, cancel, guild_id, user_id)
        .await?
        .map(|m| m.roles)
        .unwrap_or_default();
    let roles = plan_member_roles(&current, desired, previous);

    info!(
        guild_id,
        user_id,
        before = current.len(),
        after = roles.len(),
        "updating member roles"
    );
    client
        .do_json_discard(
            cancel,
            Method::PATCH,
            &member_path(guild_id, user_id),
            None,
            Some(&json!({ "roles": roles })),
            audit_reason,
        )
        .await?;
    Ok(roles)
}
