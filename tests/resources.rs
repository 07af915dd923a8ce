use serde_json::{json, Map, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use discord_provider::resources::passthrough::STATE_JSON;
use discord_provider::{Context, ProviderConfig, Registry, ResourceData};

fn context(server: &MockServer) -> Context {
    Context::new(ProviderConfig::new("t").with_api_url(server.uri())).unwrap()
}

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

#[tokio::test]
async fn read_of_missing_channel_clears_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "message": "Unknown Channel", "code": 10003 })),
        )
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let channel = registry.get("discord_channel").unwrap();
    let mut data = ResourceData::with_id("404", map(json!({ "name": "gone" })));
    channel.read(&context(&server), &mut data).await.unwrap();
    assert!(data.is_absent());
}

#[tokio::test]
async fn channel_create_sends_type_code_and_reads_back_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/guilds/G/channels"))
        .and(body_json(json!({ "name": "lobby", "type": 2, "parent_id": "CAT" })))
        .and(header("x-audit-log-reason", "setup"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "C1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C1",
            "type": 2,
            "guild_id": "G",
            "name": "lobby",
            "parent_id": "CAT",
            "position": 3,
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let channel = registry.get("discord_channel").unwrap();
    let mut data = ResourceData::new(map(json!({
        "server_id": "G",
        "name": "lobby",
        "type": "voice",
        "category": "CAT",
        "audit_reason": "setup",
    })));
    channel.create(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "C1");
    assert_eq!(data.get_str("type"), Some("voice"));
    assert_eq!(data.get_i64("position"), Some(3));
}

#[tokio::test]
async fn channel_update_locks_permissions_when_category_changes() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/channels/C1"))
        .and(body_json(json!({ "parent_id": "CAT2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "C1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/G/channels"))
        .and(body_json(json!([
            { "id": "C1", "position": 2, "parent_id": "CAT2", "lock_permissions": true },
        ])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C1",
            "type": 0,
            "guild_id": "G",
            "name": "general",
            "parent_id": "CAT2",
            "position": 2,
        })))
        .mount(&server)
        .await;

    let channel = Registry::standard();
    let channel = channel.get("discord_channel").unwrap();
    let mut data = ResourceData::for_update(
        "C1",
        map(json!({
            "server_id": "G",
            "name": "general",
            "position": 2,
            "category": "CAT1",
            "sync_perms_with_category": true,
        })),
        map(json!({
            "server_id": "G",
            "name": "general",
            "position": 2,
            "category": "CAT2",
            "sync_perms_with_category": true,
        })),
    );
    channel.update(&context(&server), &mut data).await.unwrap();
    assert_eq!(data.get_str("category"), Some("CAT2"));
}

#[tokio::test]
async fn role_create_swaps_into_requested_position() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/guilds/G/roles"))
        .and(body_json(json!({ "name": "mod", "permissions": "8", "hoist": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "NEW",
            "name": "mod",
            "position": 1,
            "permissions": "8",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/G/roles"))
        .and(body_json(json!([
            { "id": "OLD", "position": 1 },
            { "id": "NEW", "position": 2 },
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    // Before the swap the new role sits at 1; the read after it sees 2.
    Mock::given(method("GET"))
        .and(path("/guilds/G/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "NEW", "name": "mod", "position": 1, "permissions": "8", "hoist": true },
            { "id": "OLD", "name": "old", "position": 2, "permissions": "0" },
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "NEW", "name": "mod", "position": 2, "permissions": "8", "hoist": true },
            { "id": "OLD", "name": "old", "position": 1, "permissions": "0" },
        ])))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let role = registry.get("discord_role").unwrap();
    let mut data = ResourceData::new(map(json!({
        "server_id": "G",
        "name": "mod",
        "permissions": 8,
        "hoist": true,
        "position": 2,
    })));
    role.create(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "NEW");
    assert_eq!(data.get_i64("position"), Some(2));
    assert_eq!(data.get_str("permissions64"), Some("8"));
    assert_eq!(data.get_i64("permissions"), Some(8));
}

#[tokio::test]
async fn server_delete_only_warns() {
    let server = MockServer::start().await;
    let registry = Registry::standard();
    let guild = registry.get("discord_server").unwrap();
    let mut data = ResourceData::with_id("G", Map::new());
    guild.delete(&context(&server), &mut data).await.unwrap();

    assert!(data.is_absent());
    assert_eq!(data.warnings().len(), 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn channel_permissions_delete_clears_every_overwrite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C",
            "type": 0,
            "permission_overwrites": [
                { "id": "R1", "type": 0, "allow": "1", "deny": "0" },
                { "id": "U1", "type": 1, "allow": "0", "deny": "1" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let overwrites = registry.get("discord_channel_permissions").unwrap();
    let mut data = ResourceData::with_id("C", map(json!({ "channel_id": "C" })));
    overwrites.delete(&context(&server), &mut data).await.unwrap();
    assert!(data.is_absent());
}

#[tokio::test]
async fn member_roles_use_composite_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/members/U"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "roles": ["x"] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/G/members/U"))
        .and(body_json(json!({ "roles": ["x", "a"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/members/U"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "roles": ["x", "a"] })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let members = registry.get("discord_member_roles").unwrap();
    let mut data = ResourceData::new(map(json!({
        "server_id": "G",
        "user_id": "U",
        "role": [{ "role_id": "a", "has_role": true }],
    })));
    members.create(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "G:U");
    assert_eq!(
        data.get("role"),
        Some(&json!([{ "role_id": "a", "has_role": true }]))
    );
}

#[tokio::test]
async fn api_request_without_id_gets_stable_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/C/typing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "b": 1, "a": 2 })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let request = registry.get("discord_api_request").unwrap();
    let values = map(json!({
        "method": "post",
        "path": "/channels/C/typing",
        "payload_json": "{}",
    }));

    let mut first = ResourceData::new(values.clone());
    request.create(&context(&server), &mut first).await.unwrap();
    let mut second = ResourceData::new(values);
    request.create(&context(&server), &mut second).await.unwrap();

    assert_eq!(first.id().len(), 64);
    assert_eq!(first.id(), second.id());
    assert_eq!(first.get_str(STATE_JSON), Some("{}"));
}

#[tokio::test]
async fn automod_rule_stores_canonical_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/guilds/G/auto-moderation/rules"))
        .and(body_json(json!({ "name": "no spam", "enabled": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "R" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/auto-moderation/rules/R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "R",
            "guild_id": "G",
            "enabled": true,
            "name": "no spam",
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let rule = registry.get("discord_automod_rule").unwrap();
    let mut data = ResourceData::new(map(json!({
        "guild_id": "G",
        "payload_json": "{\n  \"name\": \"no spam\",\n  \"enabled\": true\n}",
    })));
    rule.create(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "R");
    assert_eq!(
        data.get_str(STATE_JSON),
        Some(r#"{"enabled":true,"name":"no spam"}"#)
    );
}

#[tokio::test]
async fn onboarding_delete_is_a_warning() {
    let server = MockServer::start().await;
    let registry = Registry::standard();
    let onboarding = registry.get("discord_onboarding").unwrap();
    let mut data = ResourceData::with_id("G", map(json!({ "guild_id": "G" })));
    onboarding.delete(&context(&server), &mut data).await.unwrap();
    assert!(data.is_absent());
    assert!(!data.warnings().is_empty());
}

#[tokio::test]
async fn role_update_sends_a_changed_legacy_int() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/G/roles/R"))
        .and(body_json(json!({ "permissions": "16" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "R" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "R", "name": "mod", "position": 1, "permissions": "16" },
        ])))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let role = registry.get("discord_role").unwrap();
    let mut data = ResourceData::for_update(
        "R",
        map(json!({ "server_id": "G", "name": "mod", "permissions": 8, "permissions64": "8" })),
        map(json!({ "server_id": "G", "name": "mod", "permissions": 16, "permissions64": "8" })),
    );
    role.update(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.get_i64("permissions"), Some(16));
    assert_eq!(data.get_str("permissions64"), Some("16"));
}

#[tokio::test]
async fn channel_permission_update_sends_a_changed_legacy_int() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/channels/C/permissions/O"))
        .and(body_json(json!({ "type": 0, "allow": "16", "deny": "0" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C",
            "type": 0,
            "permission_overwrites": [{ "id": "O", "type": 0, "allow": "16", "deny": "0" }],
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let overwrite = registry.get("discord_channel_permission").unwrap();
    let prior = json!({
        "channel_id": "C",
        "overwrite_id": "O",
        "type": "role",
        "allow": 8,
        "allow64": "8",
        "deny": 0,
        "deny64": "0",
    });
    let mut planned = prior.clone();
    planned["allow"] = json!(16);
    let mut data = ResourceData::for_update("C:O", map(prior), map(planned));
    overwrite.update(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.get_str("allow64"), Some("16"));
}

#[tokio::test]
async fn message_pin_follows_the_pinned_flag() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/channels/C/pins/M"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/channels/C/pins/M"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/C/messages/M"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "M",
            "content": "hi",
            "pinned": false,
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let message = registry.get("discord_message").unwrap();
    let unpinned = json!({ "channel_id": "C", "content": "hi", "pinned": false });
    let pinned = json!({ "channel_id": "C", "content": "hi", "pinned": true });

    let mut pin = ResourceData::for_update("M", map(unpinned.clone()), map(pinned.clone()));
    message.update(&context(&server), &mut pin).await.unwrap();
    let mut unpin = ResourceData::for_update("M", map(pinned), map(unpinned));
    message.update(&context(&server), &mut unpin).await.unwrap();

    // Content did not change, so no edit was sent.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() != "PATCH"));
}

#[tokio::test]
async fn webhook_create_keeps_token_and_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/C/webhooks"))
        .and(body_json(json!({ "name": "hook" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "W",
            "token": "tok",
            "name": "hook",
            "channel_id": "C",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webhooks/W"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "W",
            "name": "hook",
            "channel_id": "C",
            "guild_id": "G",
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let webhook = registry.get("discord_webhook").unwrap();
    let mut data = ResourceData::new(map(json!({ "channel_id": "C", "name": "hook" })));
    webhook.create(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "W");
    assert_eq!(data.get_str("token"), Some("tok"));
    assert_eq!(
        data.get_str("url"),
        Some("https://discord.com/api/webhooks/W/tok")
    );
    assert_eq!(data.get_str("server_id"), Some("G"));
}

#[tokio::test]
async fn ban_update_puts_again() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/guilds/G/bans/U"))
        .and(body_json(json!({ "delete_message_seconds": 3600 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/bans/U"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reason": "spam",
            "user": { "id": "U", "username": "someone" },
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let ban = registry.get("discord_ban").unwrap();
    let mut data = ResourceData::for_update(
        "G:U",
        map(json!({ "server_id": "G", "user_id": "U", "delete_message_seconds": 0 })),
        map(json!({ "server_id": "G", "user_id": "U", "delete_message_seconds": 3600 })),
    );
    ban.update(&context(&server), &mut data).await.unwrap();

    assert_eq!(data.id(), "G:U");
    assert_eq!(data.get_str("reason"), Some("spam"));
}

#[tokio::test]
async fn delete_of_already_gone_object_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/guilds/G/bans/U"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "message": "Unknown Ban", "code": 10026 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let ban = registry.get("discord_ban").unwrap();
    let mut data = ResourceData::with_id("G:U", map(json!({ "server_id": "G", "user_id": "U" })));
    ban.delete(&context(&server), &mut data).await.unwrap();
    assert!(data.is_absent());
}

#[tokio::test]
async fn sticker_create_uploads_fields_and_file() {
    let dir = std::env::temp_dir().join("discord-provider-sticker-upload");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let file = dir.join("wave.png");
    tokio::fs::write(&file, b"\x89PNGdata").await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/guilds/G/stickers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "S" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/stickers/S"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "S",
            "name": "wave",
            "description": "hello",
            "tags": "wave",
            "format_type": 1,
            "available": true,
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let sticker = registry.get("discord_sticker").unwrap();
    let mut data = ResourceData::new(map(json!({
        "server_id": "G",
        "name": "wave",
        "description": "hello",
        "tags": "wave",
        "file": file.to_str().unwrap(),
    })));
    sticker.create(&context(&server), &mut data).await.unwrap();
    assert_eq!(data.id(), "G:S");
    assert_eq!(data.get_i64("format_type"), Some(1));

    let requests = server.received_requests().await.unwrap();
    let upload = &requests[0];
    let content_type = upload.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("name=\"name\"\r\n\r\nwave\r\n"));
    assert!(body.contains("name=\"description\"\r\n\r\nhello\r\n"));
    assert!(body.contains("name=\"tags\"\r\n\r\nwave\r\n"));
    assert!(body.contains("name=\"file\"; filename=\"wave.png\""));
    assert!(body.contains("PNGdata"));
}

#[tokio::test]
async fn api_request_update_can_target_read_path_alone() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/G/widget"))
        .and(body_json(json!({ "enabled": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "enabled": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/G/widget"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enabled": true,
            "channel_id": null,
        })))
        .mount(&server)
        .await;

    let registry = Registry::standard();
    let request = registry.get("discord_api_request").unwrap();
    let mut data = ResourceData::for_update(
        "G",
        map(json!({ "method": "get", "read_path": "/guilds/G/widget", "payload_json": "{}" })),
        map(json!({
            "method": "get",
            "read_path": "/guilds/G/widget",
            "payload_json": "{\"enabled\":true}",
        })),
    );
    request.update(&context(&server), &mut data).await.unwrap();
    assert_eq!(data.get_str(STATE_JSON), Some(r#"{"enabled":true}"#));
}
