//! Session-management op handlers: `create_session`, `engine_types`,
//! `link_engine`, `use_engine`, `close_session`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use relay_core::ids::SessionId;
use relay_core::ops;
use relay_core::tools::RoutingContext;

use crate::confirm::ConnectionGateway;
use crate::rpc::context::OpContext;
use crate::rpc::error::OpError;
use crate::rpc::registry::{OpHandler, OpRegistry};

/// Register all session-management handlers.
pub fn register(registry: &mut OpRegistry) {
    registry.register(ops::CREATE_SESSION, CreateSessionHandler);
    registry.register(ops::ENGINE_TYPES, EngineTypesHandler);
    registry.register(ops::LINK_ENGINE, LinkEngineHandler);
    registry.register(ops::USE_ENGINE, UseEngineHandler);
    registry.register(ops::CLOSE_SESSION, CloseSessionHandler);
}

fn parse_params<T: DeserializeOwned>(payload: Option<Value>) -> Result<T, OpError> {
    let payload = payload.ok_or_else(|| OpError::invalid_params("Missing payload"))?;
    serde_json::from_value(payload).map_err(|e| OpError::invalid_params(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// create_session
// ─────────────────────────────────────────────────────────────────────────────

struct CreateSessionHandler;

#[async_trait]
impl OpHandler for CreateSessionHandler {
    async fn handle(&self, _payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError> {
        let session = ctx.state.sessions.create_session(ctx.connection.id());
        Ok(json!({ "session_id": session.id() }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// engine_types
// ─────────────────────────────────────────────────────────────────────────────

struct EngineTypesHandler;

#[async_trait]
impl OpHandler for EngineTypesHandler {
    async fn handle(&self, _payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError> {
        let types = ctx.state.sessions.links().catalog().types();
        Ok(json!({ "engine_types": types }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// link_engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LinkEngineParams {
    session_id: String,
    engine_type: String,
}

struct LinkEngineHandler;

#[async_trait]
impl OpHandler for LinkEngineHandler {
    #[instrument(skip_all, name = "link_engine")]
    async fn handle(&self, payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError> {
        let params: LinkEngineParams = parse_params(payload)?;
        let session_id = SessionId::from(params.session_id);
        let engine_id = ctx
            .state
            .sessions
            .bind_engine(&session_id, &params.engine_type)
            .await?;
        Ok(json!({ "engine_id": engine_id, "session_id": session_id }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// use_engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UseEngineParams {
    session_id: String,
    prompt: String,
    #[serde(default)]
    routing_context: RoutingContext,
}

struct UseEngineHandler;

#[async_trait]
impl OpHandler for UseEngineHandler {
    #[instrument(skip_all, name = "use_engine")]
    async fn handle(&self, payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError> {
        let params: UseEngineParams = parse_params(payload)?;
        let session_id = SessionId::from(params.session_id);

        // Confirmation round trips go back out over the calling connection.
        let gateway = ConnectionGateway::new(ctx.connection.clone());
        let options = ctx.state.config.turn_options();

        let outcome = ctx
            .state
            .sessions
            .run_turn(
                &session_id,
                &params.prompt,
                &params.routing_context,
                &gateway,
                &options,
            )
            .await?;
        Ok(json!({
            "result": outcome.text,
            "iterations": outcome.iterations,
            "session_id": session_id,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// close_session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CloseSessionParams {
    session_id: String,
}

struct CloseSessionHandler;

#[async_trait]
impl OpHandler for CloseSessionHandler {
    #[instrument(skip_all, name = "close_session")]
    async fn handle(&self, payload: Option<Value>, ctx: &OpContext) -> Result<Value, OpError> {
        let params: CloseSessionParams = parse_params(payload)?;
        let session_id = SessionId::from(params.session_id);
        let closed = ctx.state.sessions.close_session(&session_id);
        Ok(json!({ "closed": closed, "session_id": session_id }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::errors::ErrorCode;
    use relay_core::frames::Frame;

    use crate::rpc::handlers::test_helpers::make_test_context;

    async fn create_session(ctx: &OpContext) -> String {
        let value = CreateSessionHandler.handle(None, ctx).await.unwrap();
        value["session_id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn create_session_returns_id() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;
        assert!(!session_id.is_empty());
        assert_eq!(ctx.state.sessions.session_count(), 1);
    }

    #[tokio::test]
    async fn engine_types_lists_catalog() {
        let (ctx, _rx) = make_test_context();
        let value = EngineTypesHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(value["engine_types"], json!(["tasks"]));
    }

    #[tokio::test]
    async fn link_engine_happy_path() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;

        let value = LinkEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "engine_type": "tasks"})),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!value["engine_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn link_engine_unknown_type() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;

        let err = LinkEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "engine_type": "ghost"})),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EngineLinkError);
    }

    #[tokio::test]
    async fn link_engine_missing_params() {
        let (ctx, _rx) = make_test_context();
        let err = LinkEngineHandler
            .handle(Some(json!({"session_id": "s1"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);

        let err = LinkEngineHandler.handle(None, &ctx).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn use_engine_without_link() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;

        let err = UseEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "prompt": "hi"})),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EngineNotLinked);
    }

    #[tokio::test]
    async fn use_engine_unknown_session() {
        let (ctx, _rx) = make_test_context();
        let err = UseEngineHandler
            .handle(Some(json!({"session_id": "ghost", "prompt": "hi"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
    }

    #[tokio::test]
    async fn use_engine_plain_turn() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;
        let _ = LinkEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "engine_type": "tasks"})),
                &ctx,
            )
            .await
            .unwrap();

        let value = UseEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "prompt": "hello"})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(value["result"], "done");
        assert_eq!(value["iterations"], 1);
    }

    #[tokio::test]
    async fn close_session_idempotent() {
        let (ctx, _rx) = make_test_context();
        let session_id = create_session(&ctx).await;

        let value = CloseSessionHandler
            .handle(Some(json!({"session_id": session_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(value["closed"], true);

        let value = CloseSessionHandler
            .handle(Some(json!({"session_id": session_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(value["closed"], false);
    }

    #[tokio::test]
    async fn register_all_covers_wire_ops() {
        let mut registry = OpRegistry::new();
        register(&mut registry);
        for op in [
            ops::CREATE_SESSION,
            ops::ENGINE_TYPES,
            ops::LINK_ENGINE,
            ops::USE_ENGINE,
            ops::CLOSE_SESSION,
        ] {
            assert!(registry.has_op(op), "missing handler for {op}");
        }
    }

    #[tokio::test]
    async fn use_engine_confirmation_round_trip() {
        use relay_runtime::provider::Completion;
        use relay_runtime::testutil::{RecordingTool, ScriptedProvider, StaticFactory};
        use std::sync::Arc;

        // Build a context whose engine asks for one confirmed tool call.
        let tool = Arc::new(RecordingTool::new("create_task").confirmed());
        let provider = Arc::new(ScriptedProvider::with_completions(vec![
            Completion::with_tool_calls(
                "",
                vec![relay_core::tools::ToolCall {
                    id: "tc-1".into(),
                    name: "create_task".into(),
                    arguments: json!({"title": "X"}),
                }],
            ),
            Completion::text("task created"),
        ]));
        let mut catalog = relay_runtime::engine::EngineCatalog::new();
        catalog.register(Arc::new(
            StaticFactory::new("tasks", provider).with_tool(tool.clone()),
        ));
        let links = Arc::new(relay_runtime::engine::EngineLinkManager::new(Arc::new(
            catalog,
        )));
        let sessions = Arc::new(relay_runtime::session::SessionManager::new(
            links,
            std::time::Duration::ZERO,
        ));
        let state = Arc::new(crate::rpc::context::ServerState {
            sessions,
            config: crate::config::ServerConfig::default(),
        });
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let connection = Arc::new(crate::connection::Connection::new(
            relay_core::ids::ConnectionId::new(),
            tx,
        ));
        let ctx = OpContext { state, connection };

        let session_id = create_session(&ctx).await;
        let _ = LinkEngineHandler
            .handle(
                Some(json!({"session_id": session_id, "engine_type": "tasks"})),
                &ctx,
            )
            .await
            .unwrap();

        // Run the turn on a task; answer the confirmation from "the client".
        let turn_ctx = ctx.clone();
        let sid = session_id.clone();
        let handle = tokio::spawn(async move {
            UseEngineHandler
                .handle(
                    Some(json!({"session_id": sid, "prompt": "create task X"})),
                    &turn_ctx,
                )
                .await
        });

        let frame = rx.recv().await.unwrap();
        let Frame::ServerRequest { id, op, .. } = frame else {
            panic!("expected confirmation server_request");
        };
        assert_eq!(op, ops::CONFIRMATION);
        ctx.connection
            .correlator()
            .resolve_response(&id, json!({"confirmed": true}));

        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["result"], "task created");
        assert_eq!(tool.call_count(), 1);
    }
}
