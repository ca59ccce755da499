use crate::events::{Channel, ResponseFragment};
use crate::llm::LlmError;
use futures::{Stream, StreamExt};

/// Where the splitter is within one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitState {
    Start,
    InReasoning,
    InFinal,
    Done,
    Failed,
}

impl SplitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SplitState::Done | SplitState::Failed)
    }
}

/// Outcome of consuming one fragment stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub reasoning_text: String,
    pub final_text: String,
    pub succeeded: bool,
    pub error: Option<LlmError>,
}

/// Routes fragments into a reasoning buffer and a final-answer buffer
#[derive(Debug)]
pub struct ResponseSplitter {
    state: SplitState,
    reasoning_text: String,
    final_text: String,
}

impl Default for ResponseSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSplitter {
    pub fn new() -> Self {
        Self {
            state: SplitState::Start,
            reasoning_text: String::new(),
            final_text: String::new(),
        }
    }

    pub fn state(&self) -> SplitState {
        self.state
    }

    pub fn reasoning_text(&self) -> &str {
        &self.reasoning_text
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    /// Accept one fragment, notifying `on_fragment` when it lands in a buffer.
    /// Returns whether the fragment was accepted.
    pub fn push<F>(&mut self, fragment: ResponseFragment, on_fragment: &mut F) -> bool
    where
        F: FnMut(Channel, &str),
    {
        if self.state.is_terminal() {
            return false;
        }

        match fragment {
            ResponseFragment::Reasoning(delta) => {
                self.reasoning_text.push_str(&delta);
                // a late reasoning fragment never pulls the state back out of IN_FINAL
                if self.state == SplitState::Start {
                    self.state = SplitState::InReasoning;
                }
                on_fragment(Channel::Reasoning, &delta);
                true
            }
            ResponseFragment::Final(delta) => {
                self.final_text.push_str(&delta);
                self.state = SplitState::InFinal;
                on_fragment(Channel::Final, &delta);
                true
            }
            ResponseFragment::Untagged => false,
        }
    }

    /// The stream ended cleanly; hands over both buffers
    pub fn finish(&mut self) -> SplitResult {
        self.state = SplitState::Done;
        SplitResult {
            reasoning_text: std::mem::take(&mut self.reasoning_text),
            final_text: std::mem::take(&mut self.final_text),
            succeeded: true,
            error: None,
        }
    }

    /// The stream failed; partial buffers are discarded
    pub fn fail(&mut self, error: LlmError) -> SplitResult {
        self.state = SplitState::Failed;
        self.reasoning_text.clear();
        self.final_text.clear();
        SplitResult {
            reasoning_text: String::new(),
            final_text: String::new(),
            succeeded: false,
            error: Some(error),
        }
    }
}

/// Consume a fragment stream to its end without observing fragments
pub async fn split<S>(stream: S) -> SplitResult
where
    S: Stream<Item = Result<ResponseFragment, LlmError>>,
{
    split_with(stream, |_, _| {}).await
}

/// Consume a fragment stream to its end, invoking `on_fragment` for every
/// accepted fragment as it arrives
pub async fn split_with<S, F>(stream: S, mut on_fragment: F) -> SplitResult
where
    S: Stream<Item = Result<ResponseFragment, LlmError>>,
    F: FnMut(Channel, &str),
{
    let mut stream = std::pin::pin!(stream);
    let mut splitter = ResponseSplitter::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                splitter.push(fragment, &mut on_fragment);
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    reasoning_len = splitter.reasoning_text().len(),
                    final_len = splitter.final_text().len(),
                    "response stream failed, discarding partial output"
                );
                return splitter.fail(e);
            }
        }
    }

    splitter.finish()
}
