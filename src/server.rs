//! HTTP query router.
//!
//! A thin layer over the orchestrator and store: decode the request,
//! dispatch, encode the response. No generation or fallback logic lives
//! here. Every response carries a permissive CORS header because the
//! companion SPA is served from another origin.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::generator::Orchestrator;
use crate::graphrag::{GraphEdge, GraphIndex, GraphNode};
use crate::intent;
use crate::metrics;
use crate::model::{GroundingContext, Hook, HookStyle, QuizItem};
use crate::store::StoreBackend;

/// How many hooks a search returns at most.
const SEARCH_LIMIT: usize = 10;

pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub graph: Arc<GraphIndex>,
    pub store: Arc<StoreBackend>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct HookRequest {
    topic: Option<String>,
    style: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QuizRequest {
    topic: Option<String>,
    level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AskRequest {
    q: Option<String>,
}

/// Grounding summary attached to generation responses. The `weaviate_*`
/// wire names predate the Qdrant backend and are kept for the SPA client.
#[derive(Debug, Serialize)]
struct ContextInfo {
    graphrag_used: bool,
    #[serde(rename = "weaviate_used")]
    vector_used: bool,
    graph_snippets: Vec<String>,
    #[serde(rename = "weaviate_snippets")]
    vector_snippets: Vec<String>,
}

impl From<&GroundingContext> for ContextInfo {
    fn from(context: &GroundingContext) -> Self {
        Self {
            graphrag_used: !context.graph_snippets.is_empty(),
            vector_used: !context.vector_snippets.is_empty(),
            graph_snippets: context.graph_snippets.clone(),
            vector_snippets: context.vector_snippets.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HookResponse {
    id: Option<String>,
    hook: String,
    context: ContextInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuizResponse {
    items: Vec<QuizItem>,
    ids: Vec<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    intent: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    id: Option<String>,
    hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ContextInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchHit {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    topic: String,
    style: HookStyle,
    text: String,
    tags: Vec<String>,
}

impl From<Hook> for SearchHit {
    fn from(hook: Hook) -> Self {
        Self {
            id: hook.id,
            topic: hook.topic,
            style: hook.style,
            text: hook.text,
            tags: hook.tags,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    hooks: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
struct CommunityResponse {
    summaries: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SubgraphResponse {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

#[derive(Debug, Serialize)]
struct DebugGraphResponse {
    dir: String,
    nodes: usize,
    edges: usize,
    communities: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

/// Bind and serve until the task is dropped.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "hookgen API listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(route(state, req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Connection error: {}", err);
            }
        });
    }
}

async fn route(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() == Method::OPTIONS {
        return preflight_response();
    }

    let endpoint = endpoint_label(req.method(), req.uri().path());
    metrics::record_request_start(endpoint);
    let start = Instant::now();

    let response = dispatch(state, req).await;

    metrics::record_request_result(endpoint, start.elapsed(), !response.status().is_server_error());
    response
}

/// Bounded label set for metrics; unmatched paths collapse to one label.
fn endpoint_label(method: &Method, path: &str) -> &'static str {
    match (method, path) {
        (&Method::POST, "/hook") => "hook",
        (&Method::POST, "/quiz") => "quiz",
        (&Method::POST, "/ask") => "ask",
        (&Method::GET, "/search") => "search",
        (&Method::GET, "/graphrag/community") => "graphrag_community",
        (&Method::GET, "/graphrag/graph") => "graphrag_graph",
        (&Method::GET, "/debug/graphrag") => "debug_graphrag",
        (&Method::GET, "/health") => "health",
        (&Method::GET, "/metrics") => "metrics",
        _ => "unmatched",
    }
}

async fn dispatch(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    match (method, path.as_str()) {
        (Method::POST, "/hook") => {
            let body: HookRequest = read_json_body(req).await;
            hook_handler(&state, body).await
        }
        (Method::POST, "/quiz") => {
            let body: QuizRequest = read_json_body(req).await;
            quiz_handler(&state, body).await
        }
        (Method::POST, "/ask") => {
            let body: AskRequest = read_json_body(req).await;
            ask_handler(&state, body).await
        }
        (Method::GET, "/search") => {
            let q = query_param(query.as_deref(), "q");
            search_handler(&state, &q).await
        }
        (Method::GET, "/graphrag/community") => {
            let q = query_param(query.as_deref(), "q");
            community_handler(&state, &q)
        }
        (Method::GET, "/graphrag/graph") => {
            let q = query_param(query.as_deref(), "q");
            subgraph_handler(&state, &q)
        }
        (Method::GET, "/debug/graphrag") => debug_graph_handler(&state),
        (Method::GET, "/health") => json_response(StatusCode::OK, &serde_json::json!({"ok": true})),
        (Method::GET, "/metrics") => metrics_handler(),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "not found".to_string(),
            },
        ),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn hook_handler(state: &AppState, body: HookRequest) -> Response<Full<Bytes>> {
    let topic = body.topic.unwrap_or_default();
    if topic.trim().is_empty() {
        return bad_request("topic is required");
    }
    let style = HookStyle::parse(body.style.as_deref().unwrap_or("meme"));

    let outcome = state.orchestrator.generate(&topic, style).await;

    let hook = Hook::new(&topic, style, outcome.text.clone()).with_signals(
        outcome.context.graph_snippets.clone(),
        outcome.context.vector_snippets.clone(),
    );
    let saved = state.store.save_hook(hook).await;

    json_response(
        StatusCode::OK,
        &HookResponse {
            id: saved.id,
            hook: outcome.text,
            context: ContextInfo::from(&outcome.context),
            warning: outcome.warning,
        },
    )
}

async fn quiz_handler(state: &AppState, body: QuizRequest) -> Response<Full<Bytes>> {
    let topic = body.topic.unwrap_or_default();
    if topic.trim().is_empty() {
        return bad_request("topic is required");
    }
    let level = body.level.unwrap_or_else(|| "easy".to_string());

    let outcome = state.orchestrator.generate_quiz(&topic, &level).await;
    let saved = state.store.save_quiz_batch(outcome.items.clone()).await;
    let ids = saved.into_iter().map(|item| item.id).collect();

    json_response(
        StatusCode::OK,
        &QuizResponse {
            items: outcome.items,
            ids,
            warning: outcome.warning,
        },
    )
}

async fn ask_handler(state: &AppState, body: AskRequest) -> Response<Full<Bytes>> {
    let q = body.q.unwrap_or_default();
    if q.trim().is_empty() {
        return bad_request("q is required");
    }

    let parsed = intent::parse(&q);
    if parsed.topic.trim().is_empty() {
        return json_response(
            StatusCode::OK,
            &AskResponse {
                intent: "unknown",
                topic: None,
                style: None,
                id: None,
                hook: None,
                context: None,
                warning: None,
            },
        );
    }

    let outcome = state.orchestrator.generate(&parsed.topic, parsed.style).await;

    let id = if state.config.persist_ask {
        let hook = Hook::new(&parsed.topic, parsed.style, outcome.text.clone()).with_signals(
            outcome.context.graph_snippets.clone(),
            outcome.context.vector_snippets.clone(),
        );
        state.store.save_hook(hook).await.id
    } else {
        None
    };

    json_response(
        StatusCode::OK,
        &AskResponse {
            intent: "generate",
            topic: Some(parsed.topic),
            style: Some(parsed.style.as_str().to_string()),
            id,
            hook: Some(outcome.text),
            context: Some(ContextInfo::from(&outcome.context)),
            warning: outcome.warning,
        },
    )
}

async fn search_handler(state: &AppState, q: &str) -> Response<Full<Bytes>> {
    if q.trim().is_empty() {
        return json_response(StatusCode::OK, &SearchResponse { hooks: Vec::new() });
    }

    let hooks = match tokio::time::timeout(
        state.config.request_timeout,
        state.store.search_hooks(q, SEARCH_LIMIT),
    )
    .await
    {
        Ok(hooks) => hooks,
        Err(_) => {
            warn!("Hook search timed out");
            Vec::new()
        }
    };

    json_response(
        StatusCode::OK,
        &SearchResponse {
            hooks: hooks.into_iter().map(SearchHit::from).collect(),
        },
    )
}

fn community_handler(state: &AppState, q: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &CommunityResponse {
            summaries: state.graph.community_summaries(q),
        },
    )
}

fn subgraph_handler(state: &AppState, q: &str) -> Response<Full<Bytes>> {
    let (nodes, edges) = state.graph.subgraph(q);
    json_response(StatusCode::OK, &SubgraphResponse { nodes, edges })
}

fn debug_graph_handler(state: &AppState) -> Response<Full<Bytes>> {
    let stats = state.graph.stats();
    json_response(
        StatusCode::OK,
        &DebugGraphResponse {
            dir: state.graph.dir().display().to_string(),
            nodes: stats.nodes,
            edges: stats.edges,
            communities: stats.communities,
        },
    )
}

fn metrics_handler() -> Response<Full<Bytes>> {
    match metrics::render() {
        Ok((content_type, body)) => Response::builder()
            .status(StatusCode::OK)
            .header(hyper::header::CONTENT_TYPE, content_type)
            .header(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(Full::from(body))
            .unwrap_or_else(|_| fallback_error_response()),
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::from("encode error"))
                .unwrap_or_else(|_| fallback_error_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

/// Read and parse a JSON body; malformed or absent bodies become the
/// default value so the per-field validation produces the 400.
async fn read_json_body<T: DeserializeOwned + Default>(req: Request<Incoming>) -> T {
    let Ok(collected) = req.into_body().collect().await else {
        return T::default();
    };
    serde_json::from_slice(&collected.to_bytes()).unwrap_or_default()
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to encode response: {}", err);
            return fallback_error_response();
        }
    };

    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .header(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Full::from(bytes))
        .unwrap_or_else(|_| fallback_error_response())
}

fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &ErrorResponse {
            error: message.to_string(),
        },
    )
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(hyper::header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
        .header(hyper::header::ACCESS_CONTROL_ALLOW_HEADERS, "content-type")
        .body(Full::from(Bytes::new()))
        .unwrap_or_else(|_| fallback_error_response())
}

fn fallback_error_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from("internal error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn query_param(query: Option<&str>, key: &str) -> String {
    let Some(query) = query else {
        return String::new();
    };
    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k == key {
            return percent_decode(v);
        }
    }
    String::new()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let high = (bytes[i + 1] as char).to_digit(16);
                let low = (bytes[i + 2] as char).to_digit(16);
                if let (Some(high), Some(low)) = (high, low) {
                    out.push((high * 16 + low) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmBackend;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            port: 0,
            use_vector_store: false,
            qdrant_url: crate::config::DEFAULT_QDRANT_URL.to_string(),
            allow_destructive_reindex: false,
            embedding_provider: "local".to_string(),
            use_language_model: false,
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.8,
            llm_max_tokens: 300,
            persist_ask: false,
            graph_index_dir: std::path::PathBuf::from("graphrag_export"),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn test_state(persist_ask: bool) -> AppState {
        let mut config = test_config();
        config.persist_ask = persist_ask;

        let graph = Arc::new(GraphIndex::empty());
        let store = Arc::new(StoreBackend::in_memory());
        let orchestrator = Orchestrator::new(
            LlmBackend::Disabled,
            Arc::clone(&graph),
            Arc::clone(&store),
            Duration::from_secs(5),
        );

        AppState {
            config,
            orchestrator,
            graph,
            store,
        }
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn hook_requires_topic() {
        let state = test_state(false);
        let response = hook_handler(&state, HookRequest::default()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "topic is required");
    }

    #[tokio::test]
    async fn hook_returns_template_text_and_memory_id() {
        let state = test_state(false);
        let response = hook_handler(
            &state,
            HookRequest {
                topic: Some("algebra fractions".to_string()),
                style: Some("analogy".to_string()),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["hook"],
            "algebra fractions is like a factory: inputs in, energy out, waste managed."
        );
        assert!(json["id"].as_str().unwrap().starts_with("mem-"));
        assert_eq!(json["context"]["graphrag_used"], false);
        assert_eq!(json["context"]["weaviate_used"], false);
        assert!(json["context"]["graph_snippets"].as_array().unwrap().is_empty());
        assert!(json.get("warning").is_none());
    }

    #[tokio::test]
    async fn hook_survives_store_write_failure() {
        let mut state = test_state(false);
        let embedder = crate::embeddings::EmbedBackend::from_provider("local");
        let store = Arc::new(StoreBackend::Vector(
            crate::store::VectorStore::new("http://127.0.0.1:9", embedder).unwrap(),
        ));
        state.orchestrator = Orchestrator::new(
            LlmBackend::Disabled,
            Arc::clone(&state.graph),
            Arc::clone(&store),
            Duration::from_secs(5),
        );
        state.store = store;

        let response = hook_handler(
            &state,
            HookRequest {
                topic: Some("gravity".to_string()),
                style: Some("story".to_string()),
            },
        )
        .await;

        // The write failure is absorbed: 200, text intact, id null.
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["id"].is_null());
        assert!(json["hook"].as_str().unwrap().contains("gravity"));
    }

    #[tokio::test]
    async fn quiz_requires_topic() {
        let state = test_state(false);
        let response = quiz_handler(&state, QuizRequest::default()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn quiz_returns_three_items_with_ids() {
        let state = test_state(false);
        let response = quiz_handler(
            &state,
            QuizRequest {
                topic: Some("gravity".to_string()),
                level: None,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["items"].as_array().unwrap().len(), 3);
        assert_eq!(json["ids"].as_array().unwrap().len(), 3);
        for id in json["ids"].as_array().unwrap() {
            assert!(id.as_str().unwrap().starts_with("mem-"));
        }
    }

    #[tokio::test]
    async fn ask_requires_q() {
        let state = test_state(false);
        let response = ask_handler(&state, AskRequest::default()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ask_generates_from_natural_language() {
        let state = test_state(false);
        let response = ask_handler(
            &state,
            AskRequest {
                q: Some("make a funny meme about photosynthesis please".to_string()),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["intent"], "generate");
        assert_eq!(json["topic"], "photosynthesis");
        assert_eq!(json["style"], "meme");
        assert!(json["hook"].as_str().unwrap().contains("photosynthesis"));
        // persist_ask is off: nothing stored, no id assigned.
        assert!(json["id"].is_null());
    }

    #[tokio::test]
    async fn ask_persists_when_configured() {
        let state = test_state(true);
        let response = ask_handler(
            &state,
            AskRequest {
                q: Some("story for gravity".to_string()),
            },
        )
        .await;

        let json = body_json(response).await;
        assert!(json["id"].as_str().unwrap().starts_with("mem-"));

        let hits = state.store.search_hooks("gravity", 10).await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn search_empty_query_returns_empty_array() {
        let state = test_state(false);
        let response = search_handler(&state, "").await;
        let json = body_json(response).await;
        assert!(json["hooks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_finds_previously_generated_hooks() {
        let state = test_state(false);
        hook_handler(
            &state,
            HookRequest {
                topic: Some("photosynthesis".to_string()),
                style: None,
            },
        )
        .await;

        let response = search_handler(&state, "photosynthesis").await;
        let json = body_json(response).await;
        let hooks = json["hooks"].as_array().unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0]["topic"], "photosynthesis");
        assert_eq!(hooks[0]["style"], "meme");
    }

    #[tokio::test]
    async fn graphrag_endpoints_empty_without_export() {
        let state = test_state(false);

        let community = body_json(community_handler(&state, "anything")).await;
        assert!(community["summaries"].as_array().unwrap().is_empty());

        let graph = body_json(subgraph_handler(&state, "anything")).await;
        assert!(graph["nodes"].as_array().unwrap().is_empty());
        assert!(graph["edges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn debug_endpoint_reports_counts() {
        let state = test_state(false);
        let json = body_json(debug_graph_handler(&state)).await;
        assert_eq!(json["nodes"], 0);
        assert_eq!(json["communities"], 0);
    }

    #[test]
    fn query_param_extracts_and_decodes() {
        assert_eq!(query_param(Some("q=algebra+fractions"), "q"), "algebra fractions");
        assert_eq!(query_param(Some("q=photo%20synthesis"), "q"), "photo synthesis");
        assert_eq!(query_param(Some("a=1&q=x"), "q"), "x");
        assert_eq!(query_param(Some("a=1"), "q"), "");
        assert_eq!(query_param(None, "q"), "");
    }

    #[test]
    fn percent_decode_tolerates_malformed_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("a%41b"), "aAb");
    }

    #[test]
    fn context_info_uses_legacy_wire_names() {
        let context = GroundingContext {
            graph_snippets: vec!["g".to_string()],
            vector_snippets: Vec::new(),
        };
        let json = serde_json::to_value(ContextInfo::from(&context)).unwrap();

        assert_eq!(json["graphrag_used"], true);
        assert_eq!(json["weaviate_used"], false);
        assert!(json.get("vector_used").is_none());
        assert!(json["weaviate_snippets"].as_array().unwrap().is_empty());
    }

    #[test]
    fn endpoint_labels_are_bounded() {
        assert_eq!(endpoint_label(&Method::POST, "/hook"), "hook");
        assert_eq!(endpoint_label(&Method::GET, "/health"), "health");
        assert_eq!(endpoint_label(&Method::GET, "/anything/else"), "unmatched");
        assert_eq!(endpoint_label(&Method::GET, "/hook"), "unmatched");
    }
}
