//! Final synthesis: assemble everything the engine has learned into one
//! LLM call that produces the user-facing deliverable.

use orchestrator_llm::{LlmProvider, LlmRequest};
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You are finishing a research task. You are given the original mandate, \
the execution history, any notes, partial deliverables, and retrieved context. \
Produce a JSON object with exactly two keys: \"deliverable\" (the final answer, grounded in the \
evidence gathered, roughly 50 words per tick consumed) and \"summary\" (one sentence describing what \
was done). Respond with JSON only.";

#[derive(Deserialize)]
struct FinalOutputJson {
    deliverable: String,
    summary: String,
}

pub struct FinalOutputBuilder<'a> {
    pub mandate: &'a str,
    pub history: &'a [String],
    pub notes: &'a str,
    pub deliverables: &'a [serde_json::Value],
    pub retrieved_context: &'a [String],
    pub ticks_consumed: u32,
}

impl<'a> FinalOutputBuilder<'a> {
    fn section(title: &str, body: String) -> Option<String> {
        if body.is_empty() {
            None
        } else {
            Some(format!("{title}\n{}\n\n{body}", "=".repeat(title.len())))
        }
    }

    fn numbered(items: &[String]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn bracketed(items: &[String]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn user_message(&self) -> String {
        let mut sections = Vec::new();
        sections.push(Self::section("MANDATE", self.mandate.to_string()));
        sections.push(Self::section("EXECUTION HISTORY", Self::numbered(self.history)));
        sections.push(Self::section("NOTES", self.notes.to_string()));
        if !self.deliverables.is_empty() {
            let pretty = serde_json::to_string_pretty(self.deliverables).unwrap_or_default();
            sections.push(Self::section("DELIVERABLES", pretty));
        }
        sections.push(Self::section("RETRIEVED CONTEXT", Self::bracketed(self.retrieved_context)));
        sections.into_iter().flatten().collect::<Vec<_>>().join("\n\n")
    }

    /// Run the synthesis LLM call and return `(deliverable, summary)`.
    pub async fn build(&self, llm: &dyn LlmProvider, model: &str) -> orchestrator_core::Result<(String, String)> {
        let mut request = LlmRequest::single_user_turn(SYSTEM_PROMPT, self.user_message());
        request.model = model.to_string();
        request.max_tokens = Some((self.ticks_consumed.max(1) * 80).clamp(256, 4096));

        let response = llm
            .complete(request)
            .await
            .map_err(|e| orchestrator_core::Error::internal(e.to_string()))?;

        match serde_json::from_str::<FinalOutputJson>(response.text.trim()) {
            Ok(parsed) => Ok((parsed.deliverable, parsed.summary)),
            Err(_) => Ok((response.text.clone(), "synthesis response was not well-formed JSON".to_string())),
        }
    }
}
