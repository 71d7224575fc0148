use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use followcall_ai::{
    generate_prompt_and_schema, AiError, OpenAiClient, OpenAiConfig, StructuredGenerator,
};
use serde_json::{json, Value};

async fn spawn_mock(reply: Value, status: StatusCode) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let reply = reply.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth != "Bearer sk-test" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "bad key" } })));
                }
                assert_eq!(body["response_format"]["type"], "json_schema");
                assert!(body["response_format"]["json_schema"]["schema"].is_object());
                (status, Json(reply))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String, key: &str) -> OpenAiClient {
    OpenAiClient::new(&OpenAiConfig {
        api_key: key.to_string(),
        base_url,
        ..OpenAiConfig::default()
    })
    .unwrap()
}

fn completion(content: &Value) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content.to_string() } }]
    })
}

#[tokio::test]
async fn returns_parsed_object() {
    let base = spawn_mock(completion(&json!({ "ok": true })), StatusCode::OK).await;

    let object = client(base, "sk-test")
        .generate_object("probe", &json!({ "type": "object" }), "hola")
        .await
        .unwrap();
    assert_eq!(object, json!({ "ok": true }));
}

#[tokio::test]
async fn maps_error_status_and_message() {
    let base = spawn_mock(json!({}), StatusCode::OK).await;

    let err = client(base, "sk-wrong")
        .generate_object("probe", &json!({ "type": "object" }), "hola")
        .await
        .unwrap_err();
    match err {
        AiError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn prompt_generation_end_to_end() {
    let generated = json!({
        "systemPrompt": "Llama al paciente tras su cirugía.",
        "dataSchema": { "fields": [
            { "name": "nivelDolor", "type": "number", "description": "Nivel de dolor del 1 al 10", "required": true },
            { "name": "tomaMedicacion", "type": "boolean", "description": "Si toma la medicación.", "required": false }
        ]}
    });
    let base = spawn_mock(completion(&generated), StatusCode::OK).await;

    let result = generate_prompt_and_schema(&client(base, "sk-test"), "Seguimiento post-operatorio")
        .await
        .unwrap();

    assert_eq!(result.data_schema.fields.len(), 2);
    assert_eq!(
        result.system_prompt,
        "Llama al paciente tras su cirugía. Asegúrate de obtener información sobre: \
         nivel de dolor del 1 al 10 y si toma la medicación."
    );
}
