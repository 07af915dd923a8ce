//! Bulk channel and role ordering.
//!
//! Discord accepts a single PATCH carrying the whole declared order, so the
//! write side just forwards it. The read side fetches the guild's collection
//! and reports the remote position of each declared id, in declared order, so
//! drift shows up as a diff.

use std::collections::HashMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::http::RestClient;
use crate::types::{Channel, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPosition {
    pub id: String,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_permissions: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePosition {
    pub id: String,
    pub position: i64,
}

pub async fn apply_channel_order(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    order: &[ChannelPosition],
    audit_reason: Option<&str>,
) -> Result<()> {
    info!(guild_id, channels = order.len(), "applying channel order");
    let body = serde_json::to_value(order)?;
    client
        .do_json_discard(
            cancel,
            Method::PATCH,
            &format!("/guilds/{guild_id}/channels"),
            None,
            Some(&body),
            audit_reason,
        )
        .await
}

/// Remote `position` and `parent_id` for every declared channel.
///
/// `lock_permissions` is write-only and is carried over from `declared`.
pub async fn read_channel_order(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    declared: &[ChannelPosition],
) -> Result<Vec<ChannelPosition>> {
    let channels: Vec<Channel> = client
        .do_json(
            cancel,
            Method::GET,
            &format!("/guilds/{guild_id}/channels"),
            None,
            None,
            None,
        )
        .await?
        .unwrap_or_default();
    let by_id: HashMap<&str, &Channel> = channels.iter().map(|c| (c.id.as_str(), c)).collect();

    declared
        .iter()
        .map(|want| {
            let remote = by_id.get(want.id.as_str()).ok_or_else(|| Error::MissingRemote {
                kind: "channel",
                id: want.id.clone(),
                guild_id: guild_id.to_string(),
            })?;
            Ok(ChannelPosition {
                id: want.id.clone(),
                position: remote.position.unwrap_or_default(),
                parent_id: remote.parent_id.clone(),
                lock_permissions: want.lock_permissions,
            })
        })
        .collect()
}

pub async fn apply_role_order(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    order: &[RolePosition],
    audit_reason: Option<&str>,
) -> Result<()> {
    info!(guild_id, roles = order.len(), "applying role order");
    let body = serde_json::to_value(order)?;
    client
        .do_json_discard(
            cancel,
            Method::PATCH,
            &format!("/guilds/{guild_id}/roles"),
            None,
            Some(&body),
            audit_reason,
        )
        .await
}

pub async fn fetch_roles(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
) -> Result<Vec<Role>> {
    Ok(client
        .do_json(
            cancel,
            Method::GET,
            &format!("/guilds/{guild_id}/roles"),
            None,
            None,
            None,
        )
        .await?
        .unwrap_or_default())
}

/// Remote positions for the declared role ids, in declared order.
pub async fn read_role_order(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    declared: &[String],
) -> Result<Vec<RolePosition>> {
    let roles = fetch_roles(client, cancel, guild_id).await?;
    order_roles(guild_id, &roles, declared)
}

fn order_roles(guild_id: &str, roles: &[Role], declared: &[String]) -> Result<Vec<RolePosition>> {
    let by_id: HashMap<&str, &Role> = roles.iter().map(|r| (r.id.as_str(), r)).collect();
    declared
        .iter()
        .map(|id| {
            let role = by_id.get(id.as_str()).ok_or_else(|| Error::MissingRemote {
                kind: "role",
                id: id.clone(),
                guild_id: guild_id.to_string(),
            })?;
            Ok(RolePosition {
                id: id.clone(),
                position: role.position,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, position: i64) -> Role {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": id,
            "position": position,
        }))
        .unwrap()
    }

    #[test]
    fn channel_position_omits_unset_optionals() {
        let p = ChannelPosition {
            id: "1".into(),
            position: 3,
            parent_id: None,
            lock_permissions: None,
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({ "id": "1", "position": 3 })
        );
    }

    #[test]
    fn role_order_follows_declared_ids() {
        let roles = vec![role("a", 1), role("b", 2), role("c", 3)];
        let declared = vec!["c".to_string(), "a".to_string()];
        let ordered = order_roles("g", &roles, &declared).unwrap();
        assert_eq!(
            ordered,
            vec![
                RolePosition { id: "c".into(), position: 3 },
                RolePosition { id: "a".into(), position: 1 },
            ]
        );
    }

    #[test]
    fn missing_role_is_an_error() {
        let roles = vec![role("a", 1)];
        let err = order_roles("g", &roles, &["zzz".to_string()]).unwrap_err();
        assert!(matches!(err, Error::MissingRemote { kind: "role", .. }));
    }
}
