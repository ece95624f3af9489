//! Google Gemini provider over the Generative Language REST API.

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, SecretString},
    tracing::debug,
};

use crate::model::{CompletionResponse, LlmProvider, ToolCall, Usage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiProvider {
    model: String,
    base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different API root (useful for testing).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').into();
        self
    }

    /// Convert the runner's neutral message list into Gemini `contents`,
    /// splitting out system messages into a `systemInstruction`.
    fn convert_messages(
        messages: &[serde_json::Value],
    ) -> (Option<serde_json::Value>, Vec<serde_json::Value>) {
        let mut system_text = String::new();
        let mut contents = Vec::new();

        for msg in messages {
            let role = msg["role"].as_str().unwrap_or("user");
            match role {
                "system" => {
                    if !system_text.is_empty() {
                        system_text.push('\n');
                    }
                    system_text.push_str(msg["content"].as_str().unwrap_or(""));
                },
                "assistant" => {
                    let mut parts = Vec::new();
                    if let Some(text) = msg["content"].as_str()
                        && !text.is_empty()
                    {
                        parts.push(serde_json::json!({"text": text}));
                    }
                    if let Some(calls) = msg["tool_calls"].as_array() {
                        for call in calls {
                            parts.push(serde_json::json!({
                                "functionCall": {
                                    "name": call["name"],
                                    "args": call["arguments"],
                                }
                            }));
                        }
                    }
                    contents.push(serde_json::json!({"role": "model", "parts": parts}));
                },
                "tool" => {
                    // Function responses ride in a user turn; Gemini wants an
                    // object-valued `response`.
                    let response = if msg["content"].is_object() {
                        msg["content"].clone()
                    } else {
                        serde_json::json!({"content": msg["content"]})
                    };
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": msg["name"],
                                "response": response,
                            }
                        }]
                    }));
                },
                _ => {
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{"text": msg["content"].as_str().unwrap_or("")}]
                    }));
                },
            }
        }

        let system = (!system_text.is_empty())
            .then(|| serde_json::json!({"parts": [{"text": system_text}]}));
        (system, contents)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse> {
        let (system, contents) = Self::convert_messages(messages);

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {"temperature": 0.0},
        });
        if let Some(system) = system {
            body["systemInstruction"] = system;
        }
        if !tools.is_empty() {
            let declarations: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t["name"],
                        "description": t["description"],
                        "parameters": t["parameters"],
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret().as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned HTTP {status}: {body_text}");
        }
        let resp = response.json::<serde_json::Value>().await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        if let Some(parts) = resp["candidates"][0]["content"]["parts"].as_array() {
            for part in parts {
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
                if let Some(call) = part.get("functionCall") {
                    // Gemini carries no call ids; synthesize stable ones.
                    tool_calls.push(ToolCall {
                        id: format!("call_{}", tool_calls.len() + 1),
                        name: call["name"].as_str().unwrap_or("").to_string(),
                        arguments: call.get("args").cloned().unwrap_or(serde_json::json!({})),
                    });
                }
            }
        }

        debug!(
            model = %self.model,
            tool_calls = tool_calls.len(),
            "Gemini completion received"
        );

        let usage = Usage {
            input_tokens: resp["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        };

        Ok(CompletionResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;

    fn provider(base_url: &str) -> GeminiProvider {
        GeminiProvider::new(SecretString::new("test-key".into())).with_base_url(base_url)
    }

    #[tokio::test]
    async fn parses_text_and_function_calls() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [{"content": {"role": "model", "parts": [
                        {"text": "Searching now."},
                        {"functionCall": {"name": "search_leads", "args": {"query": "acme"}}}
                    ]}}],
                    "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
                }"#,
            )
            .create_async()
            .await;

        let provider = provider(&server.url());
        let messages = vec![serde_json::json!({"role": "user", "content": "find acme leads"})];
        let response = provider.complete(&messages, &[]).await.unwrap();

        assert_eq!(response.text.as_deref(), Some("Searching now."));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "search_leads");
        assert_eq!(response.tool_calls[0].arguments, serde_json::json!({"query": "acme"}));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 7);
    }

    #[tokio::test]
    async fn http_failure_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(403)
            .with_body(r#"{"error": {"message": "API key not valid"}}"#)
            .create_async()
            .await;

        let provider = provider(&server.url());
        let messages = vec![serde_json::json!({"role": "user", "content": "hi"})];
        let err = provider.complete(&messages, &[]).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn system_messages_become_system_instruction() {
        let messages = vec![
            serde_json::json!({"role": "system", "content": "Be terse."}),
            serde_json::json!({"role": "user", "content": "hello"}),
            serde_json::json!({"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_1", "name": "get_contact", "arguments": {"id": 7}}
            ]}),
            serde_json::json!({"role": "tool", "tool_call_id": "call_1", "name": "get_contact", "content": "Jane Doe"}),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);
        assert_eq!(system.unwrap()["parts"][0]["text"], "Be terse.");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_contact");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["content"],
            "Jane Doe"
        );
    }
}
