//! Escape hatch: an arbitrary call against the API, tracked as a resource.
//!
//! `method` and `path` drive the create call. Reads go to `read_path` when it
//! is set; without it the create reply is the only state there is. Delete is a
//! remote call only when `delete_path` is set.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::http::parse_method;
use crate::resources::passthrough::{id_from_reply, payload, store_state, PAYLOAD_JSON};
use crate::resources::{absent_on_not_found, ignore_not_found, Context, Resource, ResourceData};

pub struct ApiRequestResource;

fn optional_path<'a>(data: &'a ResourceData, key: &str) -> Option<&'a str> {
    data.get_str(key).filter(|p| !p.is_empty())
}

/// Updates go to `read_path`; `path` is only needed when that is unset.
fn update_path(data: &ResourceData) -> Result<&str> {
    match optional_path(data, "read_path") {
        Some(path) => Ok(path),
        None => data.require_str("path"),
    }
}

fn update_method(data: &ResourceData) -> Result<Method> {
    match data.get_str("update_method").filter(|m| !m.is_empty()) {
        Some(verb) => parse_method(verb),
        None => Ok(Method::PATCH),
    }
}

#[async_trait]
impl Resource for ApiRequestResource {
    fn type_name(&self) -> &'static str {
        "discord_api_request"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let method = parse_method(data.require_str("method")?)?;
        let path = data.require_str("path")?.to_string();
        let body = payload(data)?;

        let response: Option<Value> = ctx
            .client
            .do_json(
                &ctx.cancel,
                method.clone(),
                &path,
                None,
                body.as_ref(),
                data.audit_reason(),
            )
            .await?;

        let id_field = data.get_str("id_field").filter(|f| !f.is_empty()).unwrap_or("id");
        let id = id_from_reply(id_field, &path, response.as_ref());
        debug!(method = %method, path = %path, id = %id, "api request created");
        data.set_id(id);

        if optional_path(data, "read_path").is_some() {
            return self.read(ctx, data).await;
        }
        store_state(data, response.unwrap_or(Value::Null))
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(path) = optional_path(data, "read_path").map(str::to_string) else {
            return Ok(());
        };
        let result = ctx
            .client
            .do_json::<Value>(&ctx.cancel, Method::GET, &path, None, None, None)
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            store_state(data, remote)?;
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        if data.has_change(PAYLOAD_JSON) {
            let path = update_path(data)?.to_string();
            let body = payload(data)?;
            let response: Option<Value> = ctx
                .client
                .do_json(
                    &ctx.cancel,
                    update_method(data)?,
                    &path,
                    None,
                    body.as_ref(),
                    data.audit_reason(),
                )
                .await?;
            if optional_path(data, "read_path").is_none() {
                return store_state(data, response.unwrap_or(Value::Null));
            }
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        if let Some(path) = optional_path(data, "delete_path").map(str::to_string) {
            ignore_not_found(
                ctx.client
                    .do_json_discard(
                        &ctx.cancel,
                        Method::DELETE,
                        &path,
                        None,
                        None,
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
    use serde_json::{json, Map};

    fn data(values: Value) -> ResourceData {
        let Value::Object(map) = values else {
            panic!("expected object")
        };
        ResourceData::new(map)
    }

    #[test]
    fn update_method_defaults_to_patch() {
        assert_eq!(update_method(&data(json!({}))).unwrap(), Method::PATCH);
        assert_eq!(
            update_method(&data(json!({ "update_method": "put" }))).unwrap(),
            Method::PUT
        );
        assert!(update_method(&data(json!({ "update_method": "TRACE" }))).is_err());
    }

    #[test]
    fn update_path_only_needs_path_without_read_path() {
        let d = data(json!({ "read_path": "/guilds/1/widget" }));
        assert_eq!(update_path(&d).unwrap(), "/guilds/1/widget");
        let d = data(json!({ "path": "/guilds/1/widget" }));
        assert_eq!(update_path(&d).unwrap(), "/guilds/1/widget");
        assert!(update_path(&data(json!({}))).is_err());
    }

    #[test]
    fn empty_paths_are_unset() {
        let d = data(json!({ "read_path": "", "delete_path": "/x" }));
        assert!(optional_path(&d, "read_path").is_none());
        assert_eq!(optional_path(&d, "delete_path"), Some("/x"));
        assert!(optional_path(&ResourceData::new(Map::new()), "delete_path").is_none());
    }
}
