//! Answer generation over retrieved context.
//!
//! Purely downstream of retrieval: formats the grounded-answer prompt
//! and calls the Ollama generate endpoint. Holds no chat history; the
//! calling layer owns any session state.

use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::retrieval::{RetrievalParams, Retriever};

const RAG_PROMPT: &str = "You are a careful assistant. Answer the user's question using ONLY the context.\n\
Always answer in English.\n\
If the context does not contain the answer, say: \"I couldn't find that in the provided documents.\"\n\n\
Question: {question}\n\nContext:\n{context}\n\nAnswer:";

pub struct ChatEngine<'a> {
    config: &'a LlmConfig,
    retriever: Retriever<'a>,
}

impl<'a> ChatEngine<'a> {
    pub fn new(config: &'a LlmConfig, retriever: Retriever<'a>) -> Self {
        Self { config, retriever }
    }

    /// Retrieve context for the question and generate an answer.
    ///
    /// An empty question or an empty/missing index produces a fixed
    /// message (with no sources) that is distinguishable from a model
    /// answer, never an empty string.
    pub async fn answer(
        &self,
        question: &str,
        params: &RetrievalParams,
    ) -> Result<(String, Vec<String>)> {
        if question.trim().is_empty() {
            return Ok(("Question cannot be empty.".to_string(), Vec::new()));
        }

        let retrieval = self.retriever.retrieve(question, params).await?;
        if retrieval.context.trim().is_empty() {
            return Ok((
                "No index found or no relevant context. Index documents first.".to_string(),
                Vec::new(),
            ));
        }

        let prompt = RAG_PROMPT
            .replace("{question}", question)
            .replace("{context}", &retrieval.context);

        let answer = self.generate(&prompt).await?;
        Ok((answer, retrieval.sources))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        let response = client
            .post(format!("{}/api/generate", self.config.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::BackendUnavailable(format!(
                    "LLM connection error (is Ollama running at {}?): {}",
                    self.config.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::BackendUnavailable(format!(
                "LLM API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::BackendUnavailable("invalid LLM response: missing response field".into())
            })
    }
}
