// Chat request assembly
// Streaming the completion is left to the chat service client

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::retriever::QueryResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Instructions, then the knowledge base, then the question
#[inline]
pub fn build_chat_request(chat: &ChatConfig, knowledge_base: &str, question: &str) -> ChatRequest {
    ChatRequest {
        model: chat.model.clone(),
        messages: vec![
            ChatMessage::system(chat.system_instructions.as_str()),
            ChatMessage::system(knowledge_base),
            ChatMessage::user(question),
        ],
        temperature: chat.temperature,
    }
}

/// [`build_chat_request`] with the knowledge base of a query result
#[inline]
pub fn request_for_result(chat: &ChatConfig, result: &QueryResult, question: &str) -> ChatRequest {
    build_chat_request(chat, &result.knowledge_base(), question)
}
