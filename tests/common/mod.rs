#![allow(dead_code)]

use async_trait::async_trait;
use futures::{StreamExt, stream};
use seekr::{ChatBackend, FragmentStream, LlmError, ModelKind, ResponseFragment, Turn};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct StreamScript {
    items: Result<Vec<Result<ResponseFragment, LlmError>>, LlmError>,
    stalls: bool,
}

/// Chat backend that replays scripted responses in order and records every request
#[derive(Default)]
pub struct ScriptedBackend {
    streams: Mutex<VecDeque<StreamScript>>,
    completions: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<(ModelKind, Vec<Turn>)>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream that yields `items` in order
    pub fn with_stream(self, items: Vec<Result<ResponseFragment, LlmError>>) -> Self {
        self.streams.lock().unwrap().push_back(StreamScript { items: Ok(items), stalls: false });
        self
    }

    /// Queue a stream that yields `items` and then never ends
    pub fn with_stalled_stream(self, items: Vec<Result<ResponseFragment, LlmError>>) -> Self {
        self.streams.lock().unwrap().push_back(StreamScript { items: Ok(items), stalls: true });
        self
    }

    /// Queue a stream that fails before yielding anything
    pub fn with_stream_error(self, error: LlmError) -> Self {
        self.streams.lock().unwrap().push_back(StreamScript { items: Err(error), stalls: false });
        self
    }

    pub fn with_completion(self, result: Result<String, LlmError>) -> Self {
        self.completions.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(ModelKind, Vec<Turn>)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, turns: &[Turn], model: ModelKind) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((model, turns.to_vec()));
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_chat(&self, turns: &[Turn], model: ModelKind) -> Result<FragmentStream, LlmError> {
        self.record(turns, model);
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamScript {
                items: Err(LlmError::Api("no scripted stream left".into())),
                stalls: false,
            });

        let items = stream::iter(script.items?);
        if script.stalls {
            Ok(items.chain(stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }

    async fn complete(&self, turns: &[Turn], model: ModelKind) -> Result<String, LlmError> {
        self.record(turns, model);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("no scripted completion left".into())))
    }
}

pub fn reasoning(text: &str) -> Result<ResponseFragment, LlmError> {
    Ok(ResponseFragment::Reasoning(text.to_string()))
}

pub fn answer(text: &str) -> Result<ResponseFragment, LlmError> {
    Ok(ResponseFragment::Final(text.to_string()))
}
