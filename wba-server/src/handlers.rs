//! HTTP route handlers and agent-description generation, grounded on
//! `anda_engine_server::handler`'s `AppState`/`State`/`Path`-extractor
//! style and structured-logging calls.

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::Value;

use crate::error::RoutingError;
use crate::middleware::VerifiedCaller;
use crate::router::RequestKind;
use crate::state::AppState;

fn body_to_json(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

pub async fn serve_did_document(State(state): State<AppState>, Path(hex16): Path<String>) -> Result<Response, RoutingError> {
    let agent = state.agents.by_local_id(&hex16, false).ok_or_else(|| RoutingError::NotFound(hex16))?;
    Ok(Json(agent.document.clone()).into_response())
}

pub async fn serve_hosted_did_document(State(state): State<AppState>, Path(hex16): Path<String>) -> Result<Response, RoutingError> {
    let agent = state.agents.by_local_id(&hex16, true).ok_or_else(|| RoutingError::NotFound(hex16))?;
    Ok(Json(agent.document.clone()).into_response())
}

fn interface_entry(protocol: &str, name: &str, url: String, description: &str) -> Value {
    serde_json::json!({
        "@type": "ad:StructuredInterface",
        "protocol": protocol,
        "name": name,
        "url": url,
        "description": description,
    })
}

/// Builds the `ad.json` agent description: the fixed nlp/yaml/json
/// interface trio always present, plus one entry per optional capability
/// the agent actually implements.
pub async fn serve_ad_json(State(state): State<AppState>, Path(hex16): Path<String>) -> Result<Response, RoutingError> {
    let agent = state.agents.by_local_id(&hex16, false).ok_or_else(|| RoutingError::NotFound(hex16.clone()))?;

    let mut interfaces = vec![
        interface_entry(
            "nlp",
            "nlp_interface",
            format!("/wba/user/{hex16}/nlp_interface.yaml"),
            "Natural-language interface description",
        ),
        interface_entry(
            "api-yaml",
            "api_interface",
            format!("/wba/user/{hex16}/api_interface.yaml"),
            "Structured interface description (YAML)",
        ),
        interface_entry(
            "api-json",
            "api_interface",
            format!("/wba/user/{hex16}/api_interface.json"),
            "Structured interface description (JSON)",
        ),
    ];

    if agent.has_messager() {
        interfaces.push(interface_entry(
            "message",
            "message",
            format!("/agent/message/{}/post", agent.did),
            "Direct message delivery",
        ));
    }
    if agent.has_group_handler() {
        interfaces.push(interface_entry(
            "group",
            "group",
            format!("/agent/group/{}/{{group_id}}", agent.did),
            "Group membership and messaging",
        ));
    }

    let document = serde_json::json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "@type": "ad:AgentDescription",
        "did": agent.did,
        "name": agent.name,
        "ad:interfaces": interfaces,
    });
    Ok(Json(document).into_response())
}

/// Serves a pre-generated interface description file from disk
/// (`{interfaces_root}/user_{hex16}/{file}`); `ad.json`/`did.json` are
/// matched by their own literal routes and never reach this handler.
pub async fn serve_interface_file(State(state): State<AppState>, Path((hex16, file)): Path<(String, String)>) -> Result<Response, RoutingError> {
    if !(file.ends_with(".yaml") || file.ends_with(".json")) {
        return Err(RoutingError::NotFound(file));
    }
    let path = state.interfaces_root.join(format!("user_{hex16}")).join(&file);
    let bytes = tokio::fs::read(&path).await.map_err(|_| RoutingError::NotFound(file.clone()))?;
    let content_type = if file.ends_with(".yaml") { "application/yaml" } else { "application/json" };
    Ok(([(axum::http::header::CONTENT_TYPE, content_type)], bytes).into_response())
}

pub async fn publisher_agents(State(state): State<AppState>) -> impl IntoResponse {
    let agents: Vec<Value> = state
        .agents
        .local_agents()
        .iter()
        .map(|a| serde_json::json!({"did": a.did, "name": a.name}))
        .collect();
    Json(serde_json::json!({"count": agents.len(), "agents": agents}))
}

pub async fn agent_api(
    State(state): State<AppState>,
    Path((_did, subpath)): Path<(String, String)>,
    method: Method,
    Extension(caller): Extension<VerifiedCaller>,
    body: Bytes,
) -> Result<Response, RoutingError> {
    let data = body_to_json(&body);
    let kind = RequestKind::ApiCall { path: subpath, method: method.to_string() };
    log::info!(target_did = caller.target_did.as_str(), caller = caller.caller_did.as_str(); "dispatching api_call");
    let result = state.agents.route(&caller.target_did, kind, data).await?;
    Ok(Json(result).into_response())
}

pub async fn agent_message(
    State(state): State<AppState>,
    Path(_did): Path<String>,
    Extension(caller): Extension<VerifiedCaller>,
    body: Bytes,
) -> Result<Response, RoutingError> {
    let mut data = body_to_json(&body);
    let message_type = data
        .get("message_type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "*".to_string());
    if let Some(inner) = data.get_mut("data").map(Value::take) {
        data = inner;
    }
    log::info!(target_did = caller.target_did.as_str(), caller = caller.caller_did.as_str(), message_type = message_type.as_str(); "dispatching message");
    let result = state.agents.route(&caller.target_did, RequestKind::Message { message_type }, data).await?;
    // Handler results are wrapped uniformly as `{"anp_result": <output>}`,
    // unless the handler already returned that shape itself.
    let wrapped = match &result {
        Value::Object(map) if map.contains_key("anp_result") => result,
        _ => serde_json::json!({"anp_result": result}),
    };
    Ok(Json(wrapped).into_response())
}

pub async fn agent_group_action(
    State(state): State<AppState>,
    Path((_did, group_id, action)): Path<(String, String, String)>,
    Extension(caller): Extension<VerifiedCaller>,
    body: Bytes,
) -> Result<Response, RoutingError> {
    let data = body_to_json(&body);
    let kind = match action.as_str() {
        "join" => RequestKind::GroupJoin { group_id },
        "leave" => RequestKind::GroupLeave { group_id },
        "message" => RequestKind::GroupMessage { group_id },
        "members" => RequestKind::GroupMembers { group_id },
        other => return Err(RoutingError::NotFound(other.to_string())),
    };
    let result = state.agents.route(&caller.target_did, kind, data).await?;
    Ok(Json(result).into_response())
}

/// `GET /agent/group/{did}/{group_id}/connect` — group chat runner
/// internals are out of scope; axum's `sse` feature isn't enabled in this
/// workspace either, so this simply reports the endpoint as recognized
/// but unimplemented rather than half-emulating a stream.
pub async fn agent_group_connect(Path((_did, _group_id)): Path<(String, String)>) -> Response {
    RoutingError::NotImplemented.into_response()
}
