//! Channel permission overwrites, owned as a whole.
//!
//! Any overwrite on the channel that is not declared is deleted; every
//! declared overwrite is PUT unconditionally (Discord treats PUT as upsert).
//! Deletions are issued before upserts.

use std::collections::HashSet;

use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::RestClient;
use crate::permissions::format_permissions;
use crate::types::{Channel, OverwriteType, PermissionOverwrite};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredOverwrite {
    pub kind: OverwriteType,
    pub target_id: String,
    pub allow: u64,
    pub deny: u64,
}

impl DesiredOverwrite {
    pub fn new(kind: OverwriteType, target_id: impl Into<String>, allow: u64, deny: u64) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
            allow,
            deny,
        }
    }

    /// Request body for `PUT /channels/{c}/permissions/{target}`.
    pub fn body(&self) -> serde_json::Value {
        json!({
            "type": self.kind,
            "allow": format_permissions(self.allow),
            "deny": format_permissions(self.deny),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverwriteOp {
    Delete { target_id: String },
    Upsert(DesiredOverwrite),
}

pub fn overwrite_path(channel_id: &str, target_id: &str) -> String {
    format!("/channels/{channel_id}/permissions/{target_id}")
}

/// Deletions for undeclared remote keys, then one upsert per declared entry.
pub fn plan_overwrites(
    desired: &[DesiredOverwrite],
    current: &[PermissionOverwrite],
) -> Vec<OverwriteOp> {
    let declared: HashSet<(OverwriteType, &str)> = desired
        .iter()
        .map(|d| (d.kind, d.target_id.as_str()))
        .collect();

    let deletions = current
        .iter()
        .filter(|c| !declared.contains(&(c.kind, c.id.as_str())))
        .map(|c| OverwriteOp::Delete {
            target_id: c.id.clone(),
        });

    let upserts = desired.iter().cloned().map(OverwriteOp::Upsert);

    deletions.chain(upserts).collect()
}

pub async fn fetch_overwrites(
    client: &RestClient,
    cancel: &CancellationToken,
    channel_id: &str,
) -> Result<Vec<PermissionOverwrite>> {
    let channel: Option<Channel> = client
        .do_json(
            cancel,
            Method::GET,
            &format!("/channels/{channel_id}"),
            None,
            None,
            None,
        )
        .await?;
    Ok(channel.map(|c| c.permission_overwrites).unwrap_or_default())
}

pub async fn apply_overwrites(
    client: &RestClient,
    cancel: &CancellationToken,
    channel_id: &str,
    ops: &[OverwriteOp],
    audit_reason: Option<&str>,
) -> Result<()> {
    for op in ops {
        match op {
            OverwriteOp::Delete { target_id } => {
                debug!(channel_id, target_id = %target_id, "deleting undeclared overwrite");
                client
                    .do_json_discard(
                        cancel,
                        Method::DELETE,
                        &overwrite_path(channel_id, target_id),
                        None,
                        None,
                        audit_reason,
                    )
                    .await?;
            }
            OverwriteOp::Upsert(overwrite) => {
                debug!(
                    channel_id,
                    target_id = %overwrite.target_id,
                    kind = overwrite.kind.name(),
                    "upserting overwrite"
                );
                client
                    .do_json_discard(
                        cancel,
                        Method::PUT,
                        &overwrite_path(channel_id, &overwrite.target_id),
                        None,
                        Some(&overwrite.body()),
                        audit_reason,
                    )
                    .await?;
            }
        }
    }
    Ok(())
}

/// Make the channel's overwrites equal `desired`. Returns the applied ops.
pub async fn reconcile_overwrites(
    client: &RestClient,
    cancel: &CancellationToken,
    channel_id: &str,
    desired: &[DesiredOverwrite],
    audit_reason: Option<&str>,
) -> Result<Vec<OverwriteOp>> {
    let current = fetch_overwrites(client, cancel, channel_id).await?;
    let ops = plan_overwrites(desired, &current);
    info!(
        channel_id,
        current = current.len(),
        desired = desired.len(),
        ops = ops.len(),
        "reconciling channel overwrites"
    );
    apply_overwrites(client, cancel, channel_id, &ops, audit_reason).await?;
    Ok(ops)
}
