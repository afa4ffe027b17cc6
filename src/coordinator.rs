//! Transport-independent half of the real-time gateway
//!
//! The coordinator owns the table of live connections and the binding of
//! each connection to a session and a role. It routes parsed requests to the
//! right [`Session`](crate::session::Session), reports rejections to the
//! issuing connection only, delivers question timers and hands finished
//! sessions to the results sink.
//!
//! Connections are plain unbounded channels of [`Outbound`] frames; the
//! WebSocket plumbing lives in [`server`](crate::server).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use enum_map::{Enum, EnumMap};
use serde::Serialize;
use tokio::sync::mpsc;

use super::{
    UpdateMessage,
    participant::Id,
    protocol::IncomingMessage,
    quiz::Quiz,
    registry::{SessionRegistry, SharedSession, WeakSession},
    scoring,
    session::{self, AlarmMessage, Error, Outcome, SessionInfo},
    session_code::SessionCode,
    store::{QuizStore, ResultsSink},
    tunnel::Tunnel,
};

/// A frame queued for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized update message
    Text(String),
    /// The connection should be closed
    Close,
}

/// Sending half of a live connection
#[derive(Debug, Clone)]
pub struct Connection {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Tunnel for Connection {
    fn send_message(&self, message: &UpdateMessage) {
        // A closed receiver means the socket is already going away.
        let _ = self.sender.send(Outbound::Text(message.to_message()));
    }

    fn close(self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

/// Role a connection plays in the session it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Controls the session
    Host,
    /// Joined the session to answer questions
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    code: SessionCode,
    role: Role,
}

/// Load figures reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Hosted sessions
    pub sessions: usize,
    /// Open connections
    pub connections: usize,
    /// Bound connections per role
    pub roles: EnumMap<Role, usize>,
}

/// Routes requests from live connections to hosted sessions
pub struct Coordinator {
    registry: SessionRegistry,
    connections: RwLock<HashMap<Id, Connection>>,
    bindings: Mutex<HashMap<Id, Binding>>,
    quiz_store: Arc<dyn QuizStore>,
    results: Arc<dyn ResultsSink>,
    options: session::Options,
}

impl Coordinator {
    /// Creates a coordinator with an empty session registry
    pub fn new(
        quiz_store: Arc<dyn QuizStore>,
        results: Arc<dyn ResultsSink>,
        options: session::Options,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: SessionRegistry::default(),
            connections: RwLock::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            quiz_store,
            results,
            options,
        })
    }

    /// Registers a new connection
    ///
    /// # Returns
    ///
    /// The connection id and the receiver its outbound frames arrive on
    pub fn connect(&self) -> (Id, mpsc::UnboundedReceiver<Outbound>) {
        let id = Id::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Connection { sender });
        tracing::debug!(connection = %id, "connection opened");
        (id, receiver)
    }

    /// Handles a request from a connection
    ///
    /// Failures are reported to the issuer only. Join failures become
    /// `join-error`, stale answers are dropped silently and everything else
    /// becomes `rejected`.
    pub async fn dispatch(self: &Arc<Self>, issuer: Id, message: IncomingMessage) {
        let event = message.event_name();
        let target = message.code();
        let is_join = matches!(message, IncomingMessage::JoinQuiz { .. });

        match self.handle(issuer, message).await {
            Ok(()) => {}
            Err(Error::StaleQuestion) => {
                tracing::debug!(connection = %issuer, event, "discarded stale answer");
            }
            Err(error) if is_join => {
                tracing::info!(connection = %issuer, %error, "join rejected");
                self.send(
                    issuer,
                    &session::UpdateMessage::JoinError {
                        message: error.to_string(),
                    }
                    .into(),
                );
            }
            Err(error) => {
                tracing::warn!(connection = %issuer, event, code = ?target, %error, "request rejected");
                self.send(
                    issuer,
                    &session::UpdateMessage::Rejected {
                        event,
                        message: error.to_string(),
                        error,
                    }
                    .into(),
                );
            }
        }
    }

    /// Tells a connection its frame could not be parsed
    pub fn report_malformed(&self, issuer: Id, error: &serde_json::Error) {
        tracing::warn!(connection = %issuer, %error, "malformed message");
        self.send(
            issuer,
            &session::UpdateMessage::Rejected {
                event: "unknown",
                error: Error::MalformedMessage,
                message: error.to_string(),
            }
            .into(),
        );
    }

    /// Forgets a connection and cleans up the session it was bound to
    ///
    /// A departing host terminates its session; a departing participant is
    /// removed from it.
    pub async fn disconnect(&self, id: Id) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let binding = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        tracing::debug!(connection = %id, "connection closed");

        let Some(Binding { code, role }) = binding else {
            return;
        };

        match role {
            Role::Host => {
                let Some(session) = self.registry.destroy(code).await else {
                    return;
                };
                let session = session.lock().await;
                session.host_disconnected(self.tunnel_finder());

                let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
                for participant in session.participants().ids() {
                    bindings.remove(&participant);
                }
            }
            Role::Participant => {
                if let Some(session) = self.registry.get(code).await {
                    session.lock().await.leave(id, self.tunnel_finder());
                }
            }
        }
    }

    /// Operator-facing snapshot of a session
    pub async fn session_info(&self, code: SessionCode) -> Option<SessionInfo> {
        let session = self.registry.get(code).await?;
        let info = session.lock().await.info();
        Some(info)
    }

    /// Current load figures
    pub async fn stats(&self) -> Stats {
        let mut roles = EnumMap::default();
        for binding in self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            roles[binding.role] += 1;
        }
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        Stats {
            sessions: self.registry.len().await,
            connections,
            roles,
        }
    }
}

// Request handling
impl Coordinator {
    async fn handle(self: &Arc<Self>, issuer: Id, message: IncomingMessage) -> Result<(), Error> {
        match message {
            IncomingMessage::HostQuiz {
                quiz_id,
                host_id,
                quiz,
            } => self.host_quiz(issuer, &quiz_id, host_id, quiz).await,
            IncomingMessage::JoinQuiz { code, display_name } => {
                self.join(issuer, code, &display_name).await
            }
            IncomingMessage::StartQuiz { code } => {
                let shared = self.session(code).await?;
                let mut session = shared.lock().await;
                session.start(issuer, self.scheduler(code, &shared), self.tunnel_finder())
            }
            IncomingMessage::NextQuestion { code } => {
                let shared = self.session(code).await?;
                let mut session = shared.lock().await;
                let outcome = session.next_question(
                    issuer,
                    self.scheduler(code, &shared),
                    self.tunnel_finder(),
                )?;
                self.conclude(outcome);
                Ok(())
            }
            IncomingMessage::EndQuiz { code } => {
                let session = self.session(code).await?;
                let mut session = session.lock().await;
                let outcome = session.end_quiz(issuer, self.tunnel_finder())?;
                self.conclude(outcome);
                Ok(())
            }
            IncomingMessage::ShowQuestionResults {
                code,
                question_index,
            } => {
                let session = self.session(code).await?;
                let session = session.lock().await;
                session.show_question_results(issuer, question_index, self.tunnel_finder())
            }
            IncomingMessage::StartPoll { code, poll } => {
                let session = self.session(code).await?;
                let mut session = session.lock().await;
                session.start_poll(issuer, poll, self.tunnel_finder())
            }
            IncomingMessage::EndPoll { code } => {
                let session = self.session(code).await?;
                let mut session = session.lock().await;
                session.end_poll(issuer, self.tunnel_finder())
            }
            IncomingMessage::SubmitAnswer {
                code,
                question_id,
                answer,
                time_spent_seconds,
            } => {
                let session = self.session(code).await?;
                let mut session = session.lock().await;
                session.submit_answer(
                    issuer,
                    &question_id,
                    answer,
                    scoring::time_spent_from_secs(time_spent_seconds),
                    self.tunnel_finder(),
                )
            }
            IncomingMessage::PollResponse { code, option } => {
                let session = self.session(code).await?;
                let mut session = session.lock().await;
                session.poll_response(issuer, &option, self.tunnel_finder())
            }
        }
    }

    async fn host_quiz(
        &self,
        issuer: Id,
        quiz_id: &str,
        host_identity: String,
        quiz: Option<Quiz>,
    ) -> Result<(), Error> {
        if self.binding(issuer).is_some() {
            return Err(Error::AlreadyBound);
        }

        let quiz = match quiz {
            Some(quiz) => quiz,
            None => self
                .quiz_store
                .snapshot(quiz_id)
                .await
                .ok_or(Error::QuizUnavailable)?,
        };

        let (code, session) = self
            .registry
            .create(quiz, issuer, host_identity, self.options)
            .await?;
        self.bind(issuer, code, Role::Host);
        session.lock().await.announce_hosted(self.tunnel_finder());
        Ok(())
    }

    async fn join(&self, issuer: Id, code: SessionCode, name: &str) -> Result<(), Error> {
        let rejoin = Binding {
            code,
            role: Role::Participant,
        };
        if self.binding(issuer).is_some_and(|binding| binding != rejoin) {
            return Err(Error::AlreadyBound);
        }

        let shared = self.session(code).await?;
        self.join_session(issuer, code, &shared, name).await
    }

    /// Joins a session found in the registry
    ///
    /// The host may have left between the lookup and taking the lock. The
    /// session is checked again under its lock, since a departing host's
    /// cleanup needs that lock to unbind the participants.
    async fn join_session(
        &self,
        issuer: Id,
        code: SessionCode,
        shared: &SharedSession,
        name: &str,
    ) -> Result<(), Error> {
        let mut session = shared.lock().await;
        if !self.registry.is_current(code, &Arc::downgrade(shared)).await {
            return Err(Error::NotFound);
        }
        session.join(issuer, name, self.tunnel_finder())?;
        self.bind(issuer, code, Role::Participant);
        Ok(())
    }

    /// Hands the results of a finished session to the sink without waiting
    fn conclude(&self, outcome: Outcome) {
        let Outcome::Finished(results) = outcome else {
            return;
        };
        let sink = Arc::clone(&self.results);
        tokio::spawn(async move {
            let code = results.code;
            if let Err(error) = sink.record(*results).await {
                tracing::error!(%code, %error, "failed to record session results");
            }
        });
    }

    /// Delivers an alarm to the session that scheduled it
    ///
    /// Alarms of a destroyed session are dropped even if a newer session
    /// drew the same code.
    async fn receive_alarm(&self, code: SessionCode, target: &WeakSession, alarm: AlarmMessage) {
        if !self.registry.is_current(code, target).await {
            tracing::debug!(%code, ?alarm, "dropped alarm of a finished session");
            return;
        }
        let Some(session) = target.upgrade() else {
            return;
        };
        session
            .lock()
            .await
            .receive_alarm(alarm, self.tunnel_finder());
    }
}

// Plumbing
impl Coordinator {
    async fn session(&self, code: SessionCode) -> Result<SharedSession, Error> {
        self.registry.get(code).await.ok_or(Error::NotFound)
    }

    fn binding(&self, id: Id) -> Option<Binding> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    fn bind(&self, id: Id, code: SessionCode, role: Role) {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Binding { code, role });
    }

    fn send(&self, id: Id, message: &UpdateMessage) {
        if let Some(connection) = self.tunnel_finder()(id) {
            connection.send_message(message);
        }
    }

    fn tunnel_finder(&self) -> impl Fn(Id) -> Option<Connection> + '_ {
        |id| {
            self.connections
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .cloned()
        }
    }

    /// Delivers session alarms after their delay on the runtime
    fn scheduler(
        self: &Arc<Self>,
        code: SessionCode,
        session: &SharedSession,
    ) -> impl FnMut(AlarmMessage, Duration) + use<> {
        let coordinator = Arc::clone(self);
        let target = Arc::downgrade(session);
        move |alarm, delay| {
            let coordinator = Arc::clone(&coordinator);
            let target = target.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                coordinator.receive_alarm(code, &target, alarm).await;
            });
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        quiz::tests::two_question_quiz,
        scoring::Answer,
        session::{Phase, Session},
        store::{MockQuizStore, MockResultsSink},
    };

    fn coordinator_with(store: MockQuizStore, sink: MockResultsSink) -> Arc<Coordinator> {
        Coordinator::new(Arc::new(store), Arc::new(sink), session::Options::default())
    }

    fn coordinator() -> Arc<Coordinator> {
        coordinator_with(MockQuizStore::new(), MockResultsSink::new())
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<serde_json::Value> {
        std::iter::from_fn(|| receiver.try_recv().ok())
            .filter_map(|frame| match frame {
                Outbound::Text(text) => serde_json::from_str(&text).ok(),
                Outbound::Close => None,
            })
            .collect()
    }

    fn find<'a>(messages: &'a [serde_json::Value], event: &str) -> Option<&'a serde_json::Value> {
        messages.iter().find(|message| message["event"] == event)
    }

    fn host_quiz_message() -> IncomingMessage {
        IncomingMessage::HostQuiz {
            quiz_id: "capitals".to_string(),
            host_id: "owner".to_string(),
            quiz: Some(two_question_quiz()),
        }
    }

    async fn hosted(
        coordinator: &Arc<Coordinator>,
    ) -> (Id, mpsc::UnboundedReceiver<Outbound>, SessionCode) {
        let (host, mut host_rx) = coordinator.connect();
        coordinator.dispatch(host, host_quiz_message()).await;
        let messages = drain(&mut host_rx);
        let hosted = find(&messages, "quiz-hosted").unwrap();
        let code = hosted["data"]["code"].as_str().unwrap().parse().unwrap();
        (host, host_rx, code)
    }

    async fn joined(
        coordinator: &Arc<Coordinator>,
        code: SessionCode,
        name: &str,
    ) -> (Id, mpsc::UnboundedReceiver<Outbound>) {
        let (id, mut rx) = coordinator.connect();
        coordinator
            .dispatch(
                id,
                IncomingMessage::JoinQuiz {
                    code,
                    display_name: name.to_string(),
                },
            )
            .await;
        assert!(find(&drain(&mut rx), "joined-quiz").is_some());
        (id, rx)
    }

    #[tokio::test]
    async fn test_host_quiz_with_snapshot() {
        let coordinator = coordinator();
        let (_, _, code) = hosted(&coordinator).await;

        let info = coordinator.session_info(code).await.unwrap();
        assert_eq!(info.phase, Phase::Lobby);
        assert_eq!(info.current_question_index, -1);

        let stats = coordinator.stats().await;
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.roles[Role::Host], 1);
    }

    #[tokio::test]
    async fn test_host_quiz_from_store() {
        let mut store = MockQuizStore::new();
        store
            .expect_snapshot()
            .returning(|quiz_id| (quiz_id == "capitals").then(two_question_quiz));
        let coordinator = coordinator_with(store, MockResultsSink::new());

        let (host, mut host_rx) = coordinator.connect();
        coordinator
            .dispatch(
                host,
                IncomingMessage::HostQuiz {
                    quiz_id: "capitals".to_string(),
                    host_id: "owner".to_string(),
                    quiz: None,
                },
            )
            .await;
        assert!(find(&drain(&mut host_rx), "quiz-hosted").is_some());

        let (other, mut other_rx) = coordinator.connect();
        coordinator
            .dispatch(
                other,
                IncomingMessage::HostQuiz {
                    quiz_id: "missing".to_string(),
                    host_id: "owner".to_string(),
                    quiz: None,
                },
            )
            .await;
        let messages = drain(&mut other_rx);
        let rejected = find(&messages, "rejected").unwrap();
        assert_eq!(rejected["data"]["error"], "QuizUnavailable");
        assert_eq!(rejected["data"]["event"], "host-quiz");
    }

    #[tokio::test]
    async fn test_invalid_snapshot_rejected() {
        let coordinator = coordinator();
        let (host, mut host_rx) = coordinator.connect();
        let mut quiz = two_question_quiz();
        quiz.title.clear();
        coordinator
            .dispatch(
                host,
                IncomingMessage::HostQuiz {
                    quiz_id: "broken".to_string(),
                    host_id: "owner".to_string(),
                    quiz: Some(quiz),
                },
            )
            .await;

        let messages = drain(&mut host_rx);
        assert!(find(&messages, "rejected").unwrap()["data"]["error"]["InvalidQuiz"].is_string());
        assert_eq!(coordinator.stats().await.sessions, 0);
    }

    #[tokio::test]
    async fn test_join_errors_go_to_issuer() {
        let coordinator = coordinator();
        let (host, mut host_rx, code) = hosted(&coordinator).await;

        let unknown = if code == SessionCode::try_from(999_999).unwrap() {
            SessionCode::try_from(100_000).unwrap()
        } else {
            SessionCode::try_from(999_999).unwrap()
        };
        let (stranger, mut stranger_rx) = coordinator.connect();
        coordinator
            .dispatch(
                stranger,
                IncomingMessage::JoinQuiz {
                    code: unknown,
                    display_name: "Bob".to_string(),
                },
            )
            .await;
        let messages = drain(&mut stranger_rx);
        assert_eq!(
            find(&messages, "join-error").unwrap()["data"]["message"],
            Error::NotFound.to_string()
        );

        coordinator
            .dispatch(
                stranger,
                IncomingMessage::JoinQuiz {
                    code,
                    display_name: "   ".to_string(),
                },
            )
            .await;
        assert!(find(&drain(&mut stranger_rx), "join-error").is_some());
        assert_eq!(coordinator.stats().await.roles[Role::Participant], 0);

        coordinator
            .dispatch(
                host,
                IncomingMessage::JoinQuiz {
                    code,
                    display_name: "Me".to_string(),
                },
            )
            .await;
        let messages = drain(&mut host_rx);
        assert_eq!(
            find(&messages, "join-error").unwrap()["data"]["message"],
            Error::AlreadyBound.to_string()
        );
    }

    #[tokio::test]
    async fn test_participant_cannot_host_or_control() {
        let coordinator = coordinator();
        let (_, _, code) = hosted(&coordinator).await;
        let (alice, mut alice_rx) = joined(&coordinator, code, "Alice").await;

        coordinator
            .dispatch(alice, IncomingMessage::StartQuiz { code })
            .await;
        let messages = drain(&mut alice_rx);
        assert_eq!(
            find(&messages, "rejected").unwrap()["data"]["error"],
            "Unauthorized"
        );

        coordinator.dispatch(alice, host_quiz_message()).await;
        let messages = drain(&mut alice_rx);
        assert_eq!(
            find(&messages, "rejected").unwrap()["data"]["error"],
            "AlreadyBound"
        );
        assert_eq!(
            coordinator.session_info(code).await.unwrap().phase,
            Phase::Lobby
        );
    }

    #[tokio::test]
    async fn test_full_round_records_results() {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let mut sink = MockResultsSink::new();
        sink.expect_record().times(1).returning(move |results| {
            let _ = results_tx.send(results);
            Ok(())
        });
        let coordinator = coordinator_with(MockQuizStore::new(), sink);

        let (host, mut host_rx, code) = hosted(&coordinator).await;
        let (alice, mut alice_rx) = joined(&coordinator, code, "Alice").await;
        assert!(find(&drain(&mut host_rx), "participant-joined").is_some());

        coordinator
            .dispatch(host, IncomingMessage::StartQuiz { code })
            .await;
        assert!(find(&drain(&mut alice_rx), "quiz-started").is_some());

        coordinator
            .dispatch(
                alice,
                IncomingMessage::SubmitAnswer {
                    code,
                    question_id: "q1".to_string(),
                    answer: Answer::Index(0),
                    time_spent_seconds: 0.,
                },
            )
            .await;
        let messages = drain(&mut alice_rx);
        assert_eq!(
            find(&messages, "answer-submitted").unwrap()["data"]["totalScore"],
            1500
        );
        let host_messages = drain(&mut host_rx);
        assert!(find(&host_messages, "participant-answered").is_some());
        assert!(find(&host_messages, "all-answered").is_some());

        coordinator
            .dispatch(host, IncomingMessage::NextQuestion { code })
            .await;
        coordinator
            .dispatch(
                alice,
                IncomingMessage::SubmitAnswer {
                    code,
                    question_id: "q1".to_string(),
                    answer: Answer::Index(0),
                    time_spent_seconds: 0.,
                },
            )
            .await;
        let messages = drain(&mut alice_rx);
        assert!(find(&messages, "next-question").is_some());
        assert!(find(&messages, "rejected").is_none());

        coordinator
            .dispatch(host, IncomingMessage::EndQuiz { code })
            .await;
        let messages = drain(&mut alice_rx);
        let finished = find(&messages, "quiz-finished").unwrap();
        assert_eq!(finished["data"]["leaderboard"][0]["score"], 1500);
        assert!(find(&drain(&mut host_rx), "summary").is_some());

        let results = results_rx.recv().await.unwrap();
        assert_eq!(results.code, code);
        assert_eq!(results.participants[0].standing.score, 1500);
    }

    #[tokio::test]
    async fn test_host_disconnect_terminates_session() {
        let coordinator = coordinator();
        let (host, _host_rx, code) = hosted(&coordinator).await;
        let (alice, mut alice_rx) = joined(&coordinator, code, "Alice").await;

        coordinator.disconnect(host).await;

        let mut frames = Vec::new();
        while let Ok(frame) = alice_rx.try_recv() {
            frames.push(frame);
        }
        assert!(
            frames
                .iter()
                .any(|frame| matches!(frame, Outbound::Text(text) if text.contains("host-disconnected")))
        );
        assert_eq!(frames.last(), Some(&Outbound::Close));
        assert!(coordinator.session_info(code).await.is_none());

        coordinator.disconnect(alice).await;
        let stats = coordinator.stats().await;
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.roles[Role::Participant], 0);
    }

    #[tokio::test]
    async fn test_participant_disconnect_notifies_host() {
        let coordinator = coordinator();
        let (_, mut host_rx, code) = hosted(&coordinator).await;
        let (alice, _alice_rx) = joined(&coordinator, code, "Alice").await;
        drain(&mut host_rx);

        coordinator.disconnect(alice).await;
        let messages = drain(&mut host_rx);
        assert_eq!(
            find(&messages, "participant-left").unwrap()["data"]["participantId"],
            alice.to_string()
        );
        assert_eq!(
            coordinator.session_info(code).await.unwrap().participant_count,
            0
        );
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let coordinator = coordinator();
        let (id, mut rx) = coordinator.connect();
        coordinator
            .dispatch(
                id,
                IncomingMessage::EndPoll {
                    code: SessionCode::try_from(100_000).unwrap(),
                },
            )
            .await;
        let messages = drain(&mut rx);
        assert_eq!(
            find(&messages, "rejected").unwrap()["data"]["error"],
            "NotFound"
        );
    }

    #[tokio::test]
    async fn test_report_malformed() {
        let coordinator = coordinator();
        let (id, mut rx) = coordinator.connect();
        let error = IncomingMessage::parse("{").unwrap_err();
        coordinator.report_malformed(id, &error);
        let messages = drain(&mut rx);
        assert_eq!(
            find(&messages, "rejected").unwrap()["data"]["error"],
            "MalformedMessage"
        );
    }

    #[tokio::test]
    async fn test_alarm_of_replaced_session_dropped() {
        let coordinator = coordinator();
        let (host, _host_rx, code) = hosted(&coordinator).await;
        let (_alice, mut alice_rx) = joined(&coordinator, code, "Alice").await;
        coordinator
            .dispatch(host, IncomingMessage::StartQuiz { code })
            .await;
        drain(&mut alice_rx);

        let previous: SharedSession = Arc::new(tokio::sync::Mutex::new(
            Session::new(
                code,
                two_question_quiz(),
                Id::new(),
                String::new(),
                session::Options::default(),
            )
            .unwrap(),
        ));
        let timeout = AlarmMessage::QuestionTimeout { index: 0 };
        coordinator
            .receive_alarm(code, &Arc::downgrade(&previous), timeout)
            .await;
        assert!(find(&drain(&mut alice_rx), "answering-closed").is_none());

        let live = coordinator.registry.get(code).await.unwrap();
        coordinator
            .receive_alarm(code, &Arc::downgrade(&live), timeout)
            .await;
        assert!(find(&drain(&mut alice_rx), "answering-closed").is_some());
    }

    #[tokio::test]
    async fn test_join_after_host_left_not_bound() {
        let coordinator = coordinator();
        let (host, _host_rx, code) = hosted(&coordinator).await;
        let shared = coordinator.registry.get(code).await.unwrap();
        coordinator.disconnect(host).await;

        let (alice, mut alice_rx) = coordinator.connect();
        let result = coordinator
            .join_session(alice, code, &shared, "Alice")
            .await;
        assert_eq!(result, Err(Error::NotFound));
        assert!(coordinator.binding(alice).is_none());

        let (_, _, other) = hosted(&coordinator).await;
        coordinator
            .dispatch(
                alice,
                IncomingMessage::JoinQuiz {
                    code: other,
                    display_name: "Alice".to_string(),
                },
            )
            .await;
        assert!(find(&drain(&mut alice_rx), "joined-quiz").is_some());
    }
}
