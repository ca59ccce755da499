use crate::events::{Channel, ModelKind, Turn};
use crate::llm::{ChatBackend, LlmError};
use crate::streaming::split_with;
use std::sync::Arc;

/// Ordered, append-only sequence of turns for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History seeded with a system prompt
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self { turns: vec![Turn::system(prompt)] }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Copy of this history with one more turn at the end
    fn extended(&self, turn: Turn) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(turn);
        Self { turns }
    }
}

/// Assistant output for one successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Thought process, empty when the model or mode has none. Never stored in history.
    pub reasoning: String,
    pub content: String,
}

/// Result of one `submit` call: the history the caller must adopt, and the reply
#[derive(Debug)]
pub struct TurnOutcome {
    pub history: ConversationHistory,
    pub reply: Result<Reply, LlmError>,
}

/// Runs exchanges against a chat backend without holding any history itself
#[derive(Clone)]
pub struct ConversationManager {
    backend: Arc<dyn ChatBackend>,
    model: ModelKind,
    streaming: bool,
}

impl ConversationManager {
    pub fn new(backend: Arc<dyn ChatBackend>, model: ModelKind) -> Self {
        Self {
            backend,
            model,
            streaming: true,
        }
    }

    /// Use the non-streaming completion call instead of splitting a stream
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Send `user_text` with the full history and return the extended history.
    ///
    /// On any failure the returned history is `history` unchanged, so a user
    /// turn is never left without its answer.
    pub async fn submit<F>(&self, history: &ConversationHistory, user_text: &str, on_fragment: F) -> TurnOutcome
    where
        F: FnMut(Channel, &str),
    {
        let working = history.extended(Turn::user(user_text));

        match self.exchange(&working, on_fragment).await {
            Ok(reply) => TurnOutcome {
                history: working.extended(Turn::assistant(reply.content.clone())),
                reply: Ok(reply),
            },
            Err(e) => {
                tracing::debug!(error = %e, turns = history.len(), "exchange failed, rolling back user turn");
                TurnOutcome {
                    history: history.clone(),
                    reply: Err(e),
                }
            }
        }
    }

    async fn exchange<F>(&self, working: &ConversationHistory, on_fragment: F) -> Result<Reply, LlmError>
    where
        F: FnMut(Channel, &str),
    {
        let reply = if self.streaming {
            let stream = self.backend.stream_chat(working.turns(), self.model).await?;
            let result = split_with(stream, on_fragment).await;
            if let Some(error) = result.error {
                return Err(error);
            }
            Reply {
                reasoning: result.reasoning_text,
                content: result.final_text,
            }
        } else {
            let content = self.backend.complete(working.turns(), self.model).await?;
            Reply {
                reasoning: String::new(),
                content,
            }
        };

        if reply.content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(reply)
    }
}

/// A conversation that owns its history and adopts each successful exchange
#[derive(Clone)]
pub struct Session {
    manager: ConversationManager,
    history: ConversationHistory,
}

impl Session {
    pub fn new(manager: ConversationManager) -> Self {
        Self::with_history(manager, ConversationHistory::new())
    }

    pub fn with_history(manager: ConversationManager, history: ConversationHistory) -> Self {
        Self { manager, history }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    /// Run one exchange. History is only replaced after the exchange resolves,
    /// so dropping this future mid-stream leaves it untouched.
    pub async fn send<F>(&mut self, user_text: &str, on_fragment: F) -> Result<Reply, LlmError>
    where
        F: FnMut(Channel, &str),
    {
        let outcome = self.manager.submit(&self.history, user_text, on_fragment).await;
        self.history = outcome.history;
        outcome.reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConversationRole, ResponseFragment};
    use crate::llm::FragmentStream;
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Script = Result<Vec<Result<ResponseFragment, LlmError>>, LlmError>;

    /// Plays back one scripted stream per call and records what it was sent
    #[derive(Default)]
    struct FakeBackend {
        streams: Mutex<VecDeque<Script>>,
        completions: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Mutex<Vec<Vec<Turn>>>,
    }

    impl FakeBackend {
        fn streaming(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                streams: Mutex::new(scripts.into()),
                ..Default::default()
            })
        }

        fn requests(&self) -> Vec<Vec<Turn>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn stream_chat(&self, turns: &[Turn], _model: ModelKind) -> Result<FragmentStream, LlmError> {
            self.requests.lock().unwrap().push(turns.to_vec());
            let script = self.streams.lock().unwrap().pop_front().expect("unexpected stream call");
            Ok(stream::iter(script?).boxed())
        }

        async fn complete(&self, turns: &[Turn], _model: ModelKind) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(turns.to_vec());
            self.completions.lock().unwrap().pop_front().expect("unexpected completion call")
        }
    }

    fn answer(text: &str) -> Script {
        Ok(vec![Ok(ResponseFragment::Final(text.to_string()))])
    }

    #[tokio::test]
    async fn successful_turns_alternate_roles() {
        let backend = FakeBackend::streaming(vec![answer("one"), answer("two"), answer("three")]);
        let manager = ConversationManager::new(backend.clone(), ModelKind::Reasoner);

        let mut history = ConversationHistory::new();
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            let outcome = manager.submit(&history, text, |_, _| {}).await;
            assert!(outcome.reply.is_ok());
            history = outcome.history;
            assert_eq!(history.len(), 2 * (i + 1));
        }

        let roles: Vec<_> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                ConversationRole::User,
                ConversationRole::Assistant,
                ConversationRole::User,
                ConversationRole::Assistant,
                ConversationRole::User,
                ConversationRole::Assistant,
            ]
        );

        // every call replays the full history plus the new user turn
        let requests = backend.requests();
        assert_eq!(requests[2].len(), 5);
        assert_eq!(requests[2][4], Turn::user("c"));
    }

    #[tokio::test]
    async fn reasoning_is_returned_but_not_stored() {
        let backend = FakeBackend::streaming(vec![Ok(vec![
            Ok(ResponseFragment::Reasoning("Let me think.".into())),
            Ok(ResponseFragment::Final("42".into())),
        ])]);
        let manager = ConversationManager::new(backend, ModelKind::Reasoner);

        let outcome = manager.submit(&ConversationHistory::new(), "meaning?", |_, _| {}).await;
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.reasoning, "Let me think.");
        assert_eq!(reply.content, "42");
        assert_eq!(outcome.history.turns()[1], Turn::assistant("42"));
    }

    #[tokio::test]
    async fn mid_stream_failure_rolls_back() {
        let backend = FakeBackend::streaming(vec![
            answer("first"),
            Ok(vec![
                Ok(ResponseFragment::Reasoning("partial".into())),
                Err(LlmError::Network("connection reset".into())),
            ]),
        ]);
        let manager = ConversationManager::new(backend, ModelKind::Reasoner);

        let history = manager.submit(&ConversationHistory::new(), "hi", |_, _| {}).await.history;
        let before = history.clone();

        let outcome = manager.submit(&history, "again", |_, _| {}).await;
        assert_eq!(outcome.reply, Err(LlmError::Network("connection reset".into())));
        assert_eq!(outcome.history, before);
        assert_eq!(history, before);
    }

    #[tokio::test]
    async fn failure_to_open_stream_rolls_back() {
        let backend = FakeBackend::streaming(vec![Err(LlmError::Api("Authentication Fails".into()))]);
        let manager = ConversationManager::new(backend, ModelKind::Chat);

        let history = ConversationHistory::with_system("be brief");
        let outcome = manager.submit(&history, "hi", |_, _| {}).await;
        assert!(matches!(outcome.reply, Err(LlmError::Api(_))));
        assert_eq!(outcome.history, history);
    }

    #[tokio::test]
    async fn empty_answer_is_a_failure() {
        let backend = FakeBackend::streaming(vec![Ok(vec![
            Ok(ResponseFragment::Reasoning("thinking only".into())),
            Ok(ResponseFragment::Untagged),
        ])]);
        let manager = ConversationManager::new(backend, ModelKind::Reasoner);

        let outcome = manager.submit(&ConversationHistory::new(), "hi", |_, _| {}).await;
        assert_eq!(outcome.reply, Err(LlmError::EmptyResponse));
        assert!(outcome.history.is_empty());
    }

    #[tokio::test]
    async fn non_streaming_mode_uses_completion() {
        let backend = Arc::new(FakeBackend {
            completions: Mutex::new(vec![Ok("plain answer".to_string())].into()),
            ..Default::default()
        });
        let manager = ConversationManager::new(backend, ModelKind::Chat).with_streaming(false);

        let mut observed = 0;
        let outcome = manager.submit(&ConversationHistory::new(), "hi", |_, _| observed += 1).await;
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.reasoning, "");
        assert_eq!(reply.content, "plain answer");
        assert_eq!(observed, 0);
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn session_adopts_history_only_on_success() {
        let backend = FakeBackend::streaming(vec![answer("hello"), Err(LlmError::Timeout), answer("back")]);
        let mut session = Session::new(ConversationManager::new(backend, ModelKind::Reasoner));

        session.send("hi", |_, _| {}).await.unwrap();
        assert_eq!(session.history().len(), 2);

        assert_eq!(session.send("still there?", |_, _| {}).await, Err(LlmError::Timeout));
        assert_eq!(session.history().len(), 2);

        session.send("ping", |_, _| {}).await.unwrap();
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history().turns()[2], Turn::user("ping"));
    }

    #[tokio::test]
    async fn dropped_send_leaves_history_untouched() {
        let backend = FakeBackend::streaming(vec![answer("hello")]);
        let mut session = Session::new(ConversationManager::new(backend, ModelKind::Reasoner));

        {
            let pending = session.send("hi", |_, _| {});
            drop(pending);
        }
        assert!(session.history().is_empty());
    }
}
