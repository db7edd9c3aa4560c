use super::*;
use crate::database::store::Neighbor;

fn chat_config() -> ChatConfig {
    ChatConfig {
        model: "ai/qwen2.5:latest".to_string(),
        temperature: 0.5,
        system_instructions: "Answer from the knowledge base.".to_string(),
    }
}

#[test]
fn messages_are_instructions_knowledge_then_question() {
    let request = build_chat_request(
        &chat_config(),
        "Pineapple was added in Canada.",
        "Is Hawaiian pizza from Hawaii?",
    );

    assert_eq!(request.model, "ai/qwen2.5:latest");
    assert_eq!(
        request.messages,
        vec![
            ChatMessage::system("Answer from the knowledge base."),
            ChatMessage::system("Pineapple was added in Canada."),
            ChatMessage::user("Is Hawaiian pizza from Hawaii?"),
        ]
    );
}

#[test]
fn knowledge_base_concatenates_matches_in_order() {
    let result = QueryResult {
        matches: vec![
            Neighbor {
                text: "first chunk. ".to_string(),
                distance: 0.1,
            },
            Neighbor {
                text: "second chunk.".to_string(),
                distance: 0.4,
            },
        ],
    };

    let request = request_for_result(&chat_config(), &result, "question");
    assert_eq!(request.messages[1].content, "first chunk. second chunk.");
}

#[test]
fn request_serializes_to_chat_completion_json() {
    let request = build_chat_request(&chat_config(), "kb", "q");
    let json = serde_json::to_value(&request).expect("should serialize request");

    assert_eq!(
        json,
        serde_json::json!({
            "model": "ai/qwen2.5:latest",
            "messages": [
                {"role": "system", "content": "Answer from the knowledge base."},
                {"role": "system", "content": "kb"},
                {"role": "user", "content": "q"}
            ],
            "temperature": 0.5
        })
    );
}
