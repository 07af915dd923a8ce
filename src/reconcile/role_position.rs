//! Move a single role by swapping places with the role that currently holds
//! the target position.

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::http::RestClient;
use crate::reconcile::ordering::{fetch_roles, RolePosition};
use crate::types::Role;

/// The two-entry PATCH body for moving `role_id` to `new_position`, or `None`
/// if it is already there.
pub fn plan_role_swap(
    guild_id: &str,
    roles: &[Role],
    role_id: &str,
    new_position: i64,
) -> Result<Option<[RolePosition; 2]>> {
    let requester = roles
        .iter()
        .find(|r| r.id == role_id)
        .ok_or_else(|| Error::MissingRemote {
            kind: "role",
            id: role_id.to_string(),
            guild_id: guild_id.to_string(),
        })?;

    if requester.position == new_position {
        return Ok(None);
    }

    let holder = roles
        .iter()
        .find(|r| r.position == new_position && r.id != role_id)
        .ok_or_else(|| Error::PositionOutOfBounds {
            guild_id: guild_id.to_string(),
            position: new_position,
        })?;

    Ok(Some([
        RolePosition {
            id: holder.id.clone(),
            position: requester.position,
        },
        RolePosition {
            id: role_id.to_string(),
            position: new_position,
        },
    ]))
}

/// Returns `true` if a PATCH was sent.
pub async fn swap_role_position(
    client: &RestClient,
    cancel: &CancellationToken,
    guild_id: &str,
    role_id: &str,
    new_position: i64,
    audit_reason: Option<&str>,
) -> Result<bool> {
    let roles = fetch_roles(client, cancel, guild_id).await?;
    let Some(swap) = plan_role_swap(guild_id, &roles, role_id, new_position)? else {
        return Ok(false);
    };

    info!(
        guild_id,
        role_id,
        new_position,
        displaced = %swap[0].id,
        "swapping role positions"
    );
    let body = serde_json::to_value(swap)?;
    client
        .do_json_discard(
            cancel,
            Method::PATCH,
            &format!("/guilds/{guild_id}/roles"),
            None,
            Some(&body),
            audit_reason,
        )
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> Vec<Role> {
        serde_json::from_value(serde_json::json!([
            { "id": "everyone", "name": "@everyone", "position": 0 },
            { "id": "mod", "name": "mod", "position": 1 },
            { "id": "admin", "name": "admin", "position": 2 },
        ]))
        .unwrap()
    }

    #[test]
    fn swaps_with_current_holder() {
        let swap = plan_role_swap("g", &roles(), "mod", 2).unwrap().unwrap();
        assert_eq!(
            swap,
            [
                RolePosition { id: "admin".into(), position: 1 },
                RolePosition { id: "mod".into(), position: 2 },
            ]
        );
    }

    #[test]
    fn same_position_is_a_no_op() {
        assert!(plan_role_swap("g", &roles(), "admin", 2).unwrap().is_none());
    }

    #[test]
    fn unoccupied_position_is_out_of_bounds() {
        let err = plan_role_swap("g", &roles(), "mod", 9).unwrap_err();
        assert!(matches!(err, Error::PositionOutOfBounds { position: 9, .. }));
    }

    #[test]
    fn unknown_role_is_missing() {
        let err = plan_role_swap("g", &roles(), "ghost", 1).unwrap_err();
        assert!(matches!(err, Error::MissingRemote { .. }));
    }
}
