//! Session manager — create, bind engines, run turns, close, orphan sweep.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use relay_core::ids::{ConnectionId, EngineId, SessionId};
use relay_core::tools::RoutingContext;

use crate::agent::{self, TurnOptions, TurnOutcome};
use crate::confirm::ConfirmationGateway;
use crate::engine::EngineLinkManager;
use crate::errors::RuntimeError;
use crate::events::{EventEmitter, RelayEvent};

use super::{Session, SessionState};

/// Session lifecycle manager.
///
/// Owns every live session and the engine link manager. All mutation goes
/// through here; individual sessions are exclusively driven by their own
/// turn task once retrieved.
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    links: Arc<EngineLinkManager>,
    emitter: Arc<EventEmitter>,
    grace: Duration,
}

impl SessionManager {
    /// Create a new manager.
    ///
    /// `grace` is how long an orphaned session may linger in `Terminating`
    /// before the sweeper closes it (zero = closed on the next sweep).
    pub fn new(links: Arc<EngineLinkManager>, grace: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            links,
            emitter: Arc::new(EventEmitter::new()),
            grace,
        }
    }

    /// The engine link manager.
    pub fn links(&self) -> &Arc<EngineLinkManager> {
        &self.links
    }

    /// The lifecycle event emitter.
    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// Create a new session bound to a connection.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub fn create_session(&self, connection_id: &ConnectionId) -> Arc<Session> {
        let session = Arc::new(Session::new(connection_id.clone()));
        let _ = self
            .sessions
            .insert(session.id().clone(), session.clone());
        let _ = self.emitter.emit(RelayEvent::SessionCreated {
            session_id: session.id().clone(),
            connection_id: connection_id.clone(),
        });
        debug!(session_id = %session.id(), "session created");
        session
    }

    /// Look up a session.
    pub fn get(&self, session_id: &SessionId) -> Result<Arc<Session>, RuntimeError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Link an engine of `engine_type` to the session.
    ///
    /// Valid from `Created` and `Idle`. A request while a turn is in flight
    /// is rejected with `EngineLink` — never preempted.
    #[instrument(skip(self), fields(session_id = %session_id, engine_type))]
    pub async fn bind_engine(
        &self,
        session_id: &SessionId,
        engine_type: &str,
    ) -> Result<EngineId, RuntimeError> {
        let session = self.get(session_id)?;

        let prior = session.state();
        match prior {
            SessionState::Created | SessionState::Idle => {
                let _ = session.transition(SessionState::EngineLinking)?;
            }
            SessionState::Running | SessionState::AwaitingConfirmation => {
                return Err(RuntimeError::EngineLink(format!(
                    "Session {session_id} has a turn in flight"
                )));
            }
            other => {
                return Err(RuntimeError::EngineLink(format!(
                    "Session {session_id} cannot link an engine while {other}"
                )));
            }
        }

        match self.links.link(session_id, engine_type).await {
            Ok(engine) => {
                let _ = session.transition(SessionState::Idle)?;
                session.touch();
                let _ = self.emitter.emit(RelayEvent::EngineLinked {
                    session_id: session_id.clone(),
                    engine_id: engine.id().clone(),
                    engine_type: engine_type.to_owned(),
                });
                info!(engine_id = %engine.id(), "engine linked");
                Ok(engine.id().clone())
            }
            Err(e) => {
                // Restore the state the session was in before the attempt.
                let _ = session.transition(prior);
                warn!(error = %e, "engine link failed");
                Err(match e {
                    RuntimeError::EngineLink(_) => e,
                    other => RuntimeError::EngineLink(other.to_string()),
                })
            }
        }
    }

    /// Run one user turn on the session's linked engine.
    ///
    /// Rejects with `SessionBusy` when a turn is already in flight and with
    /// `EngineNotLinked` when no engine is linked. The session returns to
    /// `Idle` when the turn finishes, however it finishes — unless it was
    /// closed or orphaned mid-turn.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn run_turn(
        &self,
        session_id: &SessionId,
        prompt: &str,
        routing: &RoutingContext,
        gateway: &dyn ConfirmationGateway,
        options: &TurnOptions,
    ) -> Result<TurnOutcome, RuntimeError> {
        let session = self.get(session_id)?;
        let engine = self.links.get(session_id)?;

        match session.state() {
            SessionState::Idle => {
                let _ = session.transition(SessionState::Running)?;
            }
            SessionState::Running | SessionState::AwaitingConfirmation => {
                return Err(RuntimeError::SessionBusy(session_id.to_string()));
            }
            other => {
                return Err(RuntimeError::InvalidTransition {
                    from: other,
                    to: SessionState::Running,
                });
            }
        }
        session.touch();

        let result = agent::run_turn(
            &session,
            &engine,
            prompt,
            routing,
            gateway,
            options,
            &self.emitter,
        )
        .await;

        session.touch();
        match &result {
            Err(RuntimeError::Cancelled | RuntimeError::ConnectionLost) => {
                // The session is closing or orphaned; leave its state to the
                // close/orphan path.
            }
            _ => {
                let _ = session.transition(SessionState::Idle);
            }
        }
        result
    }

    /// Close a session: tear down the linked engine, cancel anything pending,
    /// remove it. Idempotent — closing an unknown or already-closed session
    /// returns `false`.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return false;
        };
        session.cancel_and_close();
        let _ = self.links.unlink(session_id);
        let _ = self.emitter.emit(RelayEvent::SessionClosed {
            session_id: session_id.clone(),
        });
        info!("session closed");
        true
    }

    /// Mark every session owned by `connection_id` as orphaned
    /// (`Terminating`). The sweeper closes them once the grace period has
    /// elapsed.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub fn orphan_connection(&self, connection_id: &ConnectionId) -> usize {
        let orphans: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| entry.connection_id() == connection_id)
            .map(|entry| entry.clone())
            .collect();

        for session in &orphans {
            let _ = session.transition(SessionState::Terminating);
            session.mark_orphaned();
            debug!(session_id = %session.id(), "session orphaned");
        }
        if !orphans.is_empty() {
            info!(count = orphans.len(), "sessions orphaned");
        }
        orphans.len()
    }

    /// Close every orphaned session whose grace period has elapsed.
    /// Returns the number of sessions closed.
    pub fn sweep(&self) -> usize {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry.state() == SessionState::Terminating
                    && entry.orphaned_for().is_some_and(|d| d >= self.grace)
            })
            .map(|entry| entry.id().clone())
            .collect();

        let mut closed = 0;
        for session_id in expired {
            if self.close_session(&session_id) {
                closed += 1;
            }
        }
        if closed > 0 {
            info!(closed, "orphaned sessions swept");
        }
        closed
    }

    /// Sessions currently owned by a connection.
    pub fn sessions_for_connection(&self, connection_id: &ConnectionId) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| entry.connection_id() == connection_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Session {
    /// Cancel the session token and force the state to `Closed`.
    pub(crate) fn cancel_and_close(&self) {
        self.cancellation().cancel();
        let _ = self.transition(SessionState::Closed);
    }
}

/// Spawn the periodic orphan sweeper. Runs until `shutdown` fires.
pub fn spawn_sweeper(
    manager: Arc<SessionManager>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let _ = manager.sweep();
                }
                () = shutdown.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCatalog;
    use crate::provider::Completion;
    use crate::testutil::{ScriptedProvider, StaticFactory, StaticGateway};

    fn make_manager() -> SessionManager {
        make_manager_with_grace(Duration::ZERO)
    }

    fn make_manager_with_grace(grace: Duration) -> SessionManager {
        let mut catalog = EngineCatalog::new();
        let provider = Arc::new(ScriptedProvider::looping(Completion::text("ok")));
        catalog.register(Arc::new(StaticFactory::new("tasks", provider.clone())));
        catalog.register(Arc::new(StaticFactory::new("broken", provider).failing()));
        SessionManager::new(
            Arc::new(EngineLinkManager::new(Arc::new(catalog))),
            grace,
        )
    }

    #[tokio::test]
    async fn create_session_starts_created() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(mgr.session_count(), 1);
        assert!(mgr.get(session.id()).is_ok());
    }

    #[tokio::test]
    async fn get_unknown_session() {
        let mgr = make_manager();
        let err = mgr.get(&SessionId::from("nope")).unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn bind_engine_moves_to_idle() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let engine_id = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        assert!(!engine_id.as_str().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(mgr.links().is_linked(session.id()));
    }

    #[tokio::test]
    async fn bind_engine_failure_restores_state() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let err = mgr.bind_engine(session.id(), "broken").await.unwrap_err();
        assert!(matches!(err, RuntimeError::EngineLink(_)));
        assert_eq!(session.state(), SessionState::Created);

        // And from Idle, failure restores Idle.
        let _ = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        let err = mgr.bind_engine(session.id(), "broken").await.unwrap_err();
        assert!(matches!(err, RuntimeError::EngineLink(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn bind_engine_unknown_type() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let err = mgr.bind_engine(session.id(), "ghost").await.unwrap_err();
        assert!(matches!(err, RuntimeError::EngineLink(_)));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn relink_from_idle_replaces_engine() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let first = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        let second = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn run_turn_requires_engine() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let gateway = StaticGateway::approving();
        let err = mgr
            .run_turn(
                session.id(),
                "hi",
                &RoutingContext::default(),
                gateway.as_ref(),
                &TurnOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::EngineNotLinked(_)));
    }

    #[tokio::test]
    async fn run_turn_completes_and_returns_to_idle() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let _ = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        let gateway = StaticGateway::approving();

        let outcome = mgr
            .run_turn(
                session.id(),
                "hello",
                &RoutingContext::default(),
                gateway.as_ref(),
                &TurnOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.text, "ok");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn run_turn_on_unknown_session() {
        let mgr = make_manager();
        let gateway = StaticGateway::approving();
        let err = mgr
            .run_turn(
                &SessionId::from("ghost"),
                "hi",
                &RoutingContext::default(),
                gateway.as_ref(),
                &TurnOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn close_session_is_idempotent() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        let _ = mgr.bind_engine(session.id(), "tasks").await.unwrap();
        let engine = mgr.links().get(session.id()).unwrap();

        assert!(mgr.close_session(session.id()));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.cancellation().is_cancelled());
        assert!(engine.is_shut_down());
        assert!(!mgr.links().is_linked(session.id()));
        assert_eq!(mgr.session_count(), 0);

        // Second close is a no-op.
        assert!(!mgr.close_session(session.id()));
    }

    #[tokio::test]
    async fn close_from_created_state() {
        let mgr = make_manager();
        let session = mgr.create_session(&ConnectionId::from("c1"));
        assert!(mgr.close_session(session.id()));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn orphan_connection_marks_terminating() {
        let mgr = make_manager();
        let c1 = ConnectionId::from("c1");
        let c2 = ConnectionId::from("c2");
        let s1 = mgr.create_session(&c1);
        let s2 = mgr.create_session(&c1);
        let other = mgr.create_session(&c2);

        assert_eq!(mgr.orphan_connection(&c1), 2);
        assert_eq!(s1.state(), SessionState::Terminating);
        assert_eq!(s2.state(), SessionState::Terminating);
        assert_eq!(other.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn sweep_closes_expired_orphans_eagerly() {
        let mgr = make_manager();
        let c1 = ConnectionId::from("c1");
        let s1 = mgr.create_session(&c1);
        let _ = mgr.orphan_connection(&c1);

        // Grace is zero: first sweep closes it.
        assert_eq!(mgr.sweep(), 1);
        assert_eq!(s1.state(), SessionState::Closed);
        assert_eq!(mgr.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_honors_grace_period() {
        let mgr = make_manager_with_grace(Duration::from_secs(60));
        let c1 = ConnectionId::from("c1");
        let s1 = mgr.create_session(&c1);
        let _ = mgr.orphan_connection(&c1);

        assert_eq!(mgr.sweep(), 0);
        assert_eq!(s1.state(), SessionState::Terminating);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(mgr.sweep(), 1);
        assert_eq!(s1.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn sweep_ignores_live_sessions() {
        let mgr = make_manager();
        let _ = mgr.create_session(&ConnectionId::from("c1"));
        assert_eq!(mgr.sweep(), 0);
        assert_eq!(mgr.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_closes_orphans() {
        let mgr = Arc::new(make_manager());
        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(mgr.clone(), Duration::from_secs(1), shutdown.clone());

        let c1 = ConnectionId::from("c1");
        let _ = mgr.create_session(&c1);
        let _ = mgr.orphan_connection(&c1);

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.session_count(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sessions_for_connection() {
        let mgr = make_manager();
        let c1 = ConnectionId::from("c1");
        let _ = mgr.create_session(&c1);
        let _ = mgr.create_session(&c1);
        let _ = mgr.create_session(&ConnectionId::from("c2"));
        assert_eq!(mgr.sessions_for_connection(&c1).len(), 2);
    }
}
