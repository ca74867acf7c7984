//! In-process JSON-RPC endpoint for prober tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

type ResponseMap = Arc<HashMap<String, serde_json::Value>>;

async fn dispatch(State(map): State<ResponseMap>, Json(req): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let method = req
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    let id = req.get("id").cloned().unwrap_or(serde_json::Value::Null);

    let mut response = map.get(method).cloned().unwrap_or_else(|| {
        serde_json::json!({
            "result": null,
            "error": {"code": -32601, "message": "Method not found"},
        })
    });
    if let Some(obj) = response.as_object_mut() {
        obj.insert("id".to_string(), id);
    }
    Json(response)
}

/// Serve canned responses keyed by RPC method on an ephemeral port;
/// returns the endpoint URL. The server lives until the test runtime
/// shuts down.
pub async fn spawn_rpc_server(responses: Vec<(&'static str, serde_json::Value)>) -> String {
    let map: ResponseMap = Arc::new(
        responses
            .into_iter()
            .map(|(method, body)| (method.to_string(), body))
            .collect(),
    );

    let app = Router::new().route("/", post(dispatch)).with_state(map);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock rpc listener");
    let addr = listener.local_addr().expect("mock rpc local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{}", addr)
}
