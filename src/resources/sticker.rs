//! Guild stickers. Creation is a multipart upload; everything after that is
//! plain JSON.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::http::FilePart;
use crate::ids::{pack_id, parse_id};
use crate::resources::{
    absent_on_not_found, changed_body, ignore_not_found, map_fields, Context, FieldMap, Resource,
    ResourceData,
};

const FIELDS: FieldMap = &[
    ("name", "name"),
    ("description", "description"),
    ("tags", "tags"),
];

const READ_ONLY: FieldMap = &[("format_type", "format_type"), ("available", "available")];

/// A guild sticker, id `server_id:sticker_id`.
pub struct StickerResource;

fn sticker_path(guild_id: &str, sticker_id: &str) -> String {
    format!("/guilds/{guild_id}/stickers/{sticker_id}")
}

/// Text parts in declaration order. Absent fields are sent empty, as the
/// upload endpoint requires all three.
fn form_fields(data: &ResourceData) -> Vec<(String, String)> {
    FIELDS
        .iter()
        .map(|(attr, api)| {
            (
                (*api).to_string(),
                data.get_str(attr).unwrap_or_default().to_string(),
            )
        })
        .collect()
}

async fn load_file(path: &str) -> Result<FilePart> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| Error::File(path.to_string(), err))?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sticker.png");
    Ok(FilePart::new("file", file_name, bytes))
}

#[async_trait]
impl Resource for StickerResource {
    fn type_name(&self) -> &'static str {
        "discord_sticker"
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let guild_id = data.require_str("server_id")?.to_string();
        let file = load_file(data.require_str("file")?).await?;
        let sticker: Option<Value> = ctx
            .client
            .do_multipart(
                &ctx.cancel,
                Method::POST,
                &format!("/guilds/{guild_id}/stickers"),
                None,
                &form_fields(data),
                Some(&file),
                data.audit_reason(),
            )
            .await?;
        let sticker_id = sticker
            .as_ref()
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("id".into()))?;
        info!(guild_id = %guild_id, sticker_id, bytes = file.bytes.len(), "uploaded sticker");
        data.set_id(pack_id(&guild_id, sticker_id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, sticker_id) = parse_id(data.id())?;
        let result = ctx
            .client
            .do_json::<Value>(
                &ctx.cancel,
                Method::GET,
                &sticker_path(&guild_id, &sticker_id),
                None,
                None,
                None,
            )
            .await;
        if let Some(remote) = absent_on_not_found(data, result)? {
            data.set("server_id", guild_id);
            map_fields(data, &remote, FIELDS);
            map_fields(data, &remote, READ_ONLY);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, sticker_id) = parse_id(data.id())?;
        let body: Map<String, Value> = changed_body(data, FIELDS);
        if !body.is_empty() {
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::PATCH,
                    &sticker_path(&guild_id, &sticker_id),
                    None,
                    Some(&Value::Object(body)),
                    data.audit_reason(),
                )
                .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (guild_id, sticker_id) = parse_id(data.id())?;
        ignore_not_found(
            ctx.client
                .do_json_discard(
                    &ctx.cancel,
                    Method::DELETE,
                    &sticker_path(&guild_id, &sticker_id),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_fields_keep_order_and_fill_blanks() {
        let Value::Object(values) = json!({ "name": "wave", "tags": "wave,hi" }) else {
            unreachable!()
        };
        assert_eq!(
            form_fields(&ResourceData::new(values)),
            vec![
                ("name".to_string(), "wave".to_string()),
                ("description".to_string(), String::new()),
                ("tags".to_string(), "wave,hi".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_file("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, Error::File(path, _) if path == "/definitely/not/here.png"));
    }

    #[tokio::test]
    async fn file_part_uses_base_name() {
        let dir = std::env::temp_dir().join("discord-provider-sticker-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("wave.png");
        tokio::fs::write(&path, b"abc123").await.unwrap();
        let part = load_file(path.to_str().unwrap()).await.unwrap();
        assert_eq!(part.field_name, "file");
        assert_eq!(part.file_name, "wave.png");
        assert_eq!(part.bytes, b"abc123");
    }
}
