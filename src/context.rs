//! Context assembly and grounded answering.
//!
//! Retrieved chunks become a source-attributed context string, which is
//! combined with recent conversation turns and the user's question into a
//! single prompt. The system instruction confines the model to that
//! context and fixes the wording of the "not found" fallback, so callers
//! can rely on it.

use tracing::{error, warn};

use crate::generate::{GenerationError, Generator};
use crate::retrieve::RetrievedChunk;

/// Default system instruction for grounded answering. Overridable via
/// `generation.system_instruction` in the config file.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a customer support assistant for TechShop. Answer questions using \
only the information in the provided documentation context. Do not use \
outside knowledge and do not invent details. If the context does not \
contain the information needed to answer, reply exactly: \"I'm sorry, I \
couldn't find that information in the documentation.\" When the source \
text contains numbered steps, reproduce them as a numbered list in the \
same order.";

/// Answer returned when retrieval produced nothing to ground on.
pub const NOT_FOUND_ANSWER: &str =
    "I'm sorry, I couldn't find that information in the documentation.";

/// Answer returned when the generation backend is rate limited or timing
/// out.
pub const UNAVAILABLE_ANSWER: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

const BLOCK_DELIMITER: &str = "\n\n---\n\n";

/// One prior exchange in the conversation, included in the prompt so
/// follow-up questions resolve correctly.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    fn label(self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

/// Join retrieved chunks into a context string, each block prefixed with
/// its source filename.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("[Source: {}]\n{}", chunk.filename, chunk.text))
        .collect::<Vec<_>>()
        .join(BLOCK_DELIMITER)
}

/// Assemble the full user prompt: context, recent turns, question.
pub fn build_prompt(context: &str, recent_turns: &[ChatTurn], question: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("Documentation context:\n\n");
    prompt.push_str(context);
    prompt.push_str("\n\n");

    if !recent_turns.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for turn in recent_turns {
            prompt.push_str(&format!("{}: {}\n", turn.role.label(), turn.text));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("Question: {}", question));
    prompt
}

/// Produce a grounded answer for `question` from the retrieved chunks.
///
/// Infallible by design of the error mapping: empty retrieval yields the
/// fixed not-found answer without calling the model; quota and timeout
/// failures yield the "temporarily unavailable" answer; anything else
/// falls back to the not-found answer.
pub async fn respond(
    generator: &dyn Generator,
    system_instruction: &str,
    chunks: &[RetrievedChunk],
    recent_turns: &[ChatTurn],
    question: &str,
) -> String {
    if chunks.is_empty() {
        return NOT_FOUND_ANSWER.to_string();
    }

    let context = build_context(chunks);
    let prompt = build_prompt(&context, recent_turns, question);

    match generator.generate(system_instruction, &prompt).await {
        Ok(answer) => answer,
        Err(GenerationError::Quota) | Err(GenerationError::Timeout) => {
            warn!("generation backend unavailable");
            UNAVAILABLE_ANSWER.to_string()
        }
        Err(e) => {
            error!("generation failed: {}", e);
            NOT_FOUND_ANSWER.to_string()
        }
    }
}
