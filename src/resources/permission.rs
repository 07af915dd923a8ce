//! `discord_permission`: compute allow/deny bitsets from permission names.
//!
//! A data source, so nothing is sent to the API. Create and read compute,
//! update recomputes, delete forgets.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::json::stable_hash_id;
use crate::permissions::{format_permissions, parse_permissions, Permissions};
use crate::resources::{Context, Resource, ResourceData};

pub struct PermissionDataSource;

/// Union of `extends` (a bitset string, or an integer) and the named flags.
pub fn compute_bits(names: &[String], extends: Option<&Value>) -> Result<u64> {
    let base = match extends {
        None => 0,
        Some(Value::String(text)) if text.is_empty() => 0,
        Some(Value::String(text)) => parse_permissions(text)?,
        Some(other) => other
            .as_u64()
            .ok_or_else(|| Error::InvalidPermission(other.to_string()))?,
    };
    names.iter().try_fold(base, |bits, name| {
        Ok(bits | Permissions::from_permission_name(name)?.bits())
    })
}

fn compute(data: &mut ResourceData) -> Result<()> {
    let allow_names: Vec<String> = data.get_as("allow")?.unwrap_or_default();
    let deny_names: Vec<String> = data.get_as("deny")?.unwrap_or_default();
    let allow = compute_bits(&allow_names, data.get("allow_extends"))?;
    let deny = compute_bits(&deny_names, data.get("deny_extends"))?;

    let allow_bits = format_permissions(allow);
    let deny_bits = format_permissions(deny);
    data.set_id(stable_hash_id("permission", &format!("{allow_bits}:{deny_bits}")));
    data.set("allow_bits", allow_bits);
    data.set("deny_bits", deny_bits);
    Ok(())
}

#[async_trait]
impl Resource for PermissionDataSource {
    fn type_name(&self) -> &'static str {
        "discord_permission"
    }

    async fn create(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        compute(data)
    }

    async fn read(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        compute(data)
    }

    async fn update(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        compute(data)
    }

    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        data.clear_id();
        Ok(())
    }
}
