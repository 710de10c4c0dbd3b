#![allow(clippy::unwrap_used, clippy::expect_used)]

use mockito::Matcher;

use cloud189_checkin::config::PushConfig;
use cloud189_checkin::push::channels::{PushPlus, ServerChan, Telegram, WeComBot};
use cloud189_checkin::push::{MultiNotifier, Notifier};

fn http() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn serverchan_posts_form_with_title_and_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/SCT123.send")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("title".into(), "daily".into()),
            Matcher::UrlEncoded("desp".into(), "all good".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"code":0,"message":""}"#)
        .create_async()
        .await;

    ServerChan::new(http(), "SCT123")
        .with_base_url(&server.url())
        .send("daily", "all good")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn serverchan_nonzero_code_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/bad.send")
        .with_status(200)
        .with_body(r#"{"code":40001,"message":"bad sendkey"}"#)
        .create_async()
        .await;

    let err = ServerChan::new(http(), "bad")
        .with_base_url(&server.url())
        .send("t", "b")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad sendkey"), "got: {err}");
}

#[tokio::test]
async fn telegram_sends_chat_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot42:abc/sendMessage")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "chat_id": "1001",
            "text": "daily\n\nall good",
        })))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    Telegram::new(http(), "42:abc", "1001")
        .with_base_url(&server.url())
        .send("daily", "all good")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn telegram_http_failure_keeps_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/bot42:abc/sendMessage")
        .with_status(403)
        .with_body(r#"{"ok":false,"description":"Forbidden"}"#)
        .create_async()
        .await;

    let err = Telegram::new(http(), "42:abc", "1001")
        .with_base_url(&server.url())
        .send("t", "b")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("403"), "got: {err}");
}

#[tokio::test]
async fn wecom_sends_text_message_with_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/cgi-bin/webhook/send")
        .match_query(Matcher::UrlEncoded("key".into(), "wk".into()))
        .match_body(Matcher::PartialJson(serde_json::json!({
            "msgtype": "text",
            "text": { "content": "daily\n\nall good" },
        })))
        .with_status(200)
        .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
        .create_async()
        .await;

    WeComBot::new(http(), "wk")
        .with_base_url(&server.url())
        .send("daily", "all good")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn pushplus_uses_markdown_template() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/send")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "token": "pp",
            "title": "daily",
            "content": "all good",
            "template": "markdown",
        })))
        .with_status(200)
        .with_body(r#"{"code":200,"msg":"ok"}"#)
        .create_async()
        .await;

    PushPlus::new(http(), "pp")
        .with_base_url(&server.url())
        .send("daily", "all good")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn pushplus_garbage_reply_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/send")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let err = PushPlus::new(http(), "pp")
        .with_base_url(&server.url())
        .send("t", "b")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unexpected response"), "got: {err}");
}

#[tokio::test]
async fn multi_notifier_survives_one_broken_channel() {
    let mut server = mockito::Server::new_async().await;
    let _broken = server
        .mock("POST", "/k.send")
        .with_status(500)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/send")
        .with_status(200)
        .with_body(r#"{"code":200}"#)
        .expect(1)
        .create_async()
        .await;

    let channels: Vec<Box<dyn Notifier>> = vec![
        Box::new(ServerChan::new(http(), "k").with_base_url(&server.url())),
        Box::new(PushPlus::new(http(), "pp").with_base_url(&server.url())),
    ];
    MultiNotifier::new(channels).send("t", "b").await.unwrap();
    ok.assert_async().await;
}

#[test]
fn channels_follow_configured_secrets() {
    let cfg = PushConfig {
        serverchan_sendkey: Some("k".to_string()),
        telegram_bot_token: Some("t".to_string()),
        telegram_chat_id: None,
        wecom_bot_key: None,
        pushplus_token: Some("p".to_string()),
    };
    let multi = MultiNotifier::from_config(&cfg).unwrap();
    assert_eq!(multi.channel_names(), vec!["serverchan", "pushplus"]);
}
