use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use followcall_voice::{CredentialProvider, HttpCredentialProvider, VoiceError};
use serde_json::json;

async fn spawn_mock() -> String {
    let app = Router::new()
        .route(
            "/ok",
            get(|| async { Json(json!({ "apiKey": "sekrit" })) }),
        )
        .route(
            "/unconfigured",
            get(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "ELEVENLABS_API_KEY no configurada" })),
                )
            }),
        )
        .route(
            "/blank",
            get(|| async { Json(json!({ "apiKey": "  " })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn fetches_api_key() {
    let base = spawn_mock().await;
    let provider = HttpCredentialProvider::new(format!("{}/ok", base)).unwrap();

    let credentials = provider.fetch().await.unwrap();
    assert_eq!(credentials.api_key(), "sekrit");
}

#[tokio::test]
async fn error_body_becomes_api_error() {
    let base = spawn_mock().await;
    let provider = HttpCredentialProvider::new(format!("{}/unconfigured", base)).unwrap();

    match provider.fetch().await {
        Err(VoiceError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "ELEVENLABS_API_KEY no configurada");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn blank_key_is_a_configuration_error() {
    let base = spawn_mock().await;
    let provider = HttpCredentialProvider::new(format!("{}/blank", base)).unwrap();

    let err = provider.fetch().await.unwrap_err();
    assert!(matches!(err, VoiceError::Configuration(_)));
    assert!(!err.is_retryable());
}
