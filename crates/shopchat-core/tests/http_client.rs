use mockito::Matcher;
use serde_json::json;
use shopchat_core::controller::CONNECTION_FAILURE_TEXT;
use shopchat_core::{
    BackendClient, ChatController, ClientError, ClientErrorKind, CycleOutcome, HttpBackendClient,
    MessageStore,
};
use std::time::Duration;

#[tokio::test]
async fn posts_message_and_decodes_products() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "message": "Show me road bikes" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "response": "Here are some options",
                "products": [{
                    "_id": "1",
                    "name": "Speedster",
                    "type": "road",
                    "description": "Carbon frame",
                    "image_url": "https://img.example/speedster.jpg",
                    "price": 499.99
                }]
            }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = HttpBackendClient::new(&server.url());
    let reply = client.send("Show me road bikes").await.unwrap();

    assert_eq!(reply.text, "Here are some options");
    assert_eq!(reply.products.len(), 1);
    let speedster = &reply.products[0];
    assert_eq!(speedster.id, "1");
    assert_eq!(speedster.product_type, "road");
    assert_eq!(
        speedster.image_url.as_deref(),
        Some("https://img.example/speedster.jpg")
    );
    assert_eq!(speedster.formatted_price().as_deref(), Some("$499.99"));
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_products_field_is_empty() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": "Hi there!"}"#)
        .create_async()
        .await;

    let reply = HttpBackendClient::new(&server.url())
        .send("hello")
        .await
        .unwrap();

    assert_eq!(reply.text, "Hi there!");
    assert!(reply.products.is_empty());
}

#[tokio::test]
async fn error_status_is_an_http_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(500)
        .with_body("Traceback: database unavailable")
        .create_async()
        .await;

    let err = HttpBackendClient::new(&server.url())
        .send("hello")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ClientErrorKind::Http);
    match err {
        ClientError::Http { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "Traceback: database unavailable");
        }
        other => panic!("expected http failure, got {:?}", other),
    }
}

#[tokio::test]
async fn body_without_response_is_a_decode_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"products": []}"#)
        .create_async()
        .await;

    let err = HttpBackendClient::new(&server.url())
        .send("hello")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ClientErrorKind::Decode);
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_failure() {
    // Bind then release a port so nothing is listening on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = HttpBackendClient::new(&format!("http://127.0.0.1:{}", port))
        .send("hello")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ClientErrorKind::Connection);
}

#[tokio::test]
async fn timeout_is_a_connection_failure() {
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let client = HttpBackendClient::with_timeout(
        &format!("http://{}", addr),
        Some(Duration::from_millis(200)),
    )
    .unwrap();
    let err = client.send("hello").await.unwrap_err();

    assert_eq!(err.kind(), ClientErrorKind::Connection);
}

#[tokio::test]
async fn controller_reports_unreachable_backend_in_chat() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = HttpBackendClient::new(&format!("http://127.0.0.1:{}", port));
    let controller = ChatController::new(MessageStore::new(), client);

    let outcome = controller.send("hello").await;

    assert_eq!(outcome, Some(CycleOutcome::Failed(ClientErrorKind::Connection)));
    let state = controller.store().snapshot();
    assert_eq!(state.log().len(), 2);
    assert_eq!(state.last().unwrap().text(), CONNECTION_FAILURE_TEXT);
    assert!(!state.busy());
}

#[tokio::test]
async fn reply_with_incomplete_product_keeps_its_text() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"response": "Here are some options",
                "products": [{"name": "Speedster", "type": "road", "price": 499.99}]}"#,
        )
        .create_async()
        .await;

    let controller =
        ChatController::new(MessageStore::new(), HttpBackendClient::new(&server.url()));
    let outcome = controller.send("Show me road bikes").await;

    assert_eq!(outcome, Some(CycleOutcome::Replied { products: 1 }));
    let state = controller.store().snapshot();
    let last = state.last().unwrap();
    assert_eq!(last.text(), "Here are some options");
    assert_eq!(last.products()[0].name, "Speedster");
    assert_eq!(last.products()[0].formatted_price().as_deref(), Some("$499.99"));
}
