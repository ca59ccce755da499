use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Upstream models the client knows how to talk to
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelKind {
    /// Fast chat model, answers only
    #[default]
    Chat,
    /// Reasoning model, streams its thought process before the answer
    Reasoner,
}

impl ModelKind {
    /// Model identifier sent to the upstream API
    pub fn api_id(&self) -> &'static str {
        match self {
            ModelKind::Chat => "deepseek-chat",
            ModelKind::Reasoner => "deepseek-reasoner",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Chat => "DeepSeek Chat",
            ModelKind::Reasoner => "DeepSeek Reasoner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelKind::Chat => "快速聊天模型",
            ModelKind::Reasoner => "推理模型，提供思考过程",
        }
    }

    /// Lenient parse used by the HTTP API: anything but `reasoner` means chat.
    pub fn from_request(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One role-tagged message, serialized exactly as the chat API expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: ConversationRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ConversationRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ConversationRole::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ConversationRole::System, content: content.into() }
    }
}

/// The two output streams a response may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Reasoning,
    Final,
}

/// One incremental piece of a streamed model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFragment {
    Reasoning(String),
    Final(String),
    /// A chunk that carried neither channel (role header, finish marker, ...)
    Untagged,
}
