use folio_common::CommonRequestError;
use folio_relay::{ChatMessage, ChatSession, FolioRelay, Message, RelayError, Role};
use futures_util::StreamExt;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

fn data_line(content: &str) -> String {
    format!("data: {}\n", json!({"choices": [{"delta": {"content": content}}]}))
}

fn reply_body(parts: &[&str]) -> String {
    let mut body = String::from(": connected\n\n");
    for part in parts {
        body.push_str(&data_line(part));
    }
    body.push_str("data: [DONE]\n");
    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn test_stream_chat_posts_history_and_yields_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(body_json(json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hey"},
            {"role": "user", "content": "what's new?"}
        ])))
        .respond_with(event_stream(reply_body(&["Hel", "lo"])))
        .expect(1)
        .mount(&server)
        .await;

    let relay = FolioRelay::new(server.uri(), "anon-key");
    let history = vec![
        ChatMessage::user("hi"),
        ChatMessage::assistant("hey"),
        ChatMessage::user("what's new?"),
    ];

    let deltas: Vec<String> = relay
        .stream_chat(&history)
        .map(|delta| delta.unwrap())
        .collect()
        .await;

    assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
}

#[tokio::test]
async fn test_access_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(event_stream(reply_body(&["ok"])))
        .expect(1)
        .mount(&server)
        .await;

    let relay = FolioRelay::new(server.uri(), "anon-key").with_access_token("user-jwt");
    let reply = relay.collect_reply(&[ChatMessage::user("ping")]).await.unwrap();
    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn test_custom_chat_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/portfolio-chat"))
        .respond_with(event_stream(reply_body(&["custom"])))
        .expect(1)
        .mount(&server)
        .await;

    let relay = FolioRelay::builder()
        .base_url(format!("{}/functions/v1", server.uri()))
        .api_key("anon-key")
        .chat_path("portfolio-chat")
        .build();

    let reply = relay.collect_reply(&[ChatMessage::user("hi")]).await.unwrap();
    assert_eq!(reply, "custom");
}

#[tokio::test]
async fn test_error_status_surfaces_error_field_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": "Rate limits exceeded, please try again later."})),
        )
        .mount(&server)
        .await;

    let relay = FolioRelay::new(server.uri(), "anon-key");
    let items: Vec<Result<String, RelayError>> =
        relay.stream_chat(&[ChatMessage::user("hi")]).collect().await;

    assert_eq!(items.len(), 1);
    let err = items.into_iter().next().unwrap().unwrap_err();
    assert_eq!(
        err.api_message(),
        Some("Rate limits exceeded, please try again later.")
    );
    assert!(matches!(
        err,
        RelayError::Request(CommonRequestError::Api { status: 429, .. })
    ));
}

#[tokio::test]
async fn test_session_folds_reply_into_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(event_stream(reply_body(&["Hel", "lo"])))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(FolioRelay::new(server.uri(), "anon-key"));
    let mut snapshots = Vec::new();
    session
        .send("  hi  ", |messages| {
            snapshots.push(messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>());
        })
        .await
        .unwrap();

    assert_eq!(
        snapshots,
        vec![
            vec!["hi".to_string()],
            vec!["hi".to_string(), "Hel".to_string()],
            vec!["hi".to_string(), "Hello".to_string()],
        ]
    );

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello");
}

#[tokio::test]
async fn test_session_sends_whole_transcript_on_second_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!([{"role": "user", "content": "one"}])))
        .respond_with(event_stream(reply_body(&["first"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!([
            {"role": "user", "content": "one"},
            {"role": "assistant", "content": "first"},
            {"role": "user", "content": "two"}
        ])))
        .respond_with(event_stream(reply_body(&["second"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ChatSession::new(FolioRelay::new(server.uri(), "anon-key"));
    session.send("one", |_| {}).await.unwrap();
    session.send("two", |_| {}).await.unwrap();

    let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "first", "two", "second"]);
}

#[tokio::test]
async fn test_resumed_session_continues_saved_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!([
            {"role": "user", "content": "one"},
            {"role": "assistant", "content": "first"},
            {"role": "user", "content": "two"}
        ])))
        .respond_with(event_stream(reply_body(&["second"])))
        .expect(1)
        .mount(&server)
        .await;

    let saved = vec![Message::user("one"), Message::assistant("first")];
    let saved_ids: Vec<String> = saved.iter().map(|m| m.id.clone()).collect();

    let relay = FolioRelay::new(server.uri(), "anon-key");
    let mut session = ChatSession::with_messages(relay, saved);
    session.send("two", |_| {}).await.unwrap();

    let messages = session.into_messages();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "first", "two", "second"]);
    assert_eq!(messages[0].id, saved_ids[0]);
    assert_eq!(messages[1].id, saved_ids[1]);
}

#[tokio::test]
async fn test_session_rolls_back_user_message_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "AI gateway error"})))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(FolioRelay::new(server.uri(), "anon-key"));
    let mut lengths = Vec::new();
    let err = session
        .send("hi", |messages| lengths.push(messages.len()))
        .await
        .unwrap_err();

    assert_eq!(err.api_message(), Some("AI gateway error"));
    assert_eq!(lengths, vec![1, 0]);
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_session_keeps_received_text_when_stream_fails_later() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {{broken\n{}{}",
        data_line("partial"),
        data_line("blocked"),
        data_line("blocked")
    );
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let relay = FolioRelay::builder()
        .base_url(server.uri())
        .api_key("anon-key")
        .pending_limit(64)
        .build();
    let mut session = ChatSession::new(relay);

    let err = session.send("hi", |_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Request(CommonRequestError::PendingOverflow { limit: 64, .. })
    ));

    let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "partial"]);
}

#[tokio::test]
async fn test_empty_input_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream(reply_body(&["never"])))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = ChatSession::new(FolioRelay::new(server.uri(), "anon-key"));
    let err = session.send("   ", |_| {}).await.unwrap_err();

    assert!(matches!(err, RelayError::Validation { field: "message", .. }));
    assert!(session.messages().is_empty());
}
