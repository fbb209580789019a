//! OpenAI-compatible chat completions client

use crate::*;
use reqwest::Client;
use serde_json::json;
use tether_config::ProviderConfig;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.api_key, &config.api_base, &config.model)
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| json!({ "role": &m.role, "content": &m.content }))
            .collect();

        json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        })
    }

    /// Map an HTTP status and raw body to the response JSON or an error
    fn decode_body(status: reqwest::StatusCode, body: &str) -> Result<serde_json::Value> {
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let error = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ProviderError::Api(error));
        }
        Ok(serde_json::from_str(body)?)
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let content = choice["message"]["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        Ok(ChatResponse {
            content,
            finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("posting completion request to {}", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let json = Self::decode_body(status, &body)?;

        debug!(
            "completion finished: {}",
            json["choices"][0]["finish_reason"].as_str().unwrap_or("?")
        );

        self.parse_response(json)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== Construction Tests ==========

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com/v1/", "m");
        assert_eq!(provider.api_base, "https://api.example.com/v1");
        assert_eq!(provider.default_model(), "m");
    }

    #[test]
    fn test_from_config() {
        let config = ProviderConfig {
            api_key: "sk-conf".to_string(),
            ..Default::default()
        };

        let provider = OpenAiProvider::from_config(&config);
        assert_eq!(provider.api_base, "https://api.moonshot.cn/v1");
        assert_eq!(provider.default_model(), "kimi-k2-turbo-preview");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_is_configured_false() {
        let provider = OpenAiProvider::new("", "https://api.example.com", "m");
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenAiProvider::new("", "http://127.0.0.1:9", "m");
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }

    // ========== build_request Tests ==========

    #[test]
    fn test_build_request_basic() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com", "default-m");
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::system("sys"), Message::user("Hello")],
            max_tokens: 1024,
            temperature: 0.5,
        };

        let request = provider.build_request(&params);

        assert_eq!(request["model"], "gpt-4");
        assert_eq!(request["max_tokens"], 1024);
        assert_eq!(request["temperature"], 0.5);

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(messages[1], json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com", "default-m");
        let request = provider.build_request(&ChatParams::default());
        assert_eq!(request["model"], "default-m");
    }

    // ========== parse_response Tests ==========

    #[test]
    fn test_parse_response_content() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com", "m");
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "{\"type\":\"final\"}"},
                    "finish_reason": "stop"
                }]
            }))
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("{\"type\":\"final\"}"));
        assert_eq!(response.finish_reason, "stop");
    }

    #[test]
    fn test_parse_response_null_content() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com", "m");
        let response = provider
            .parse_response(json!({"choices": [{"message": {"content": null}}]}))
            .unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.finish_reason, "stop");
    }

    #[test]
    fn test_parse_response_no_choices() {
        let provider = OpenAiProvider::new("sk-test", "https://api.example.com", "m");
        let result = provider.parse_response(json!({"choices": []}));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    // ========== decode_body Tests ==========

    #[test]
    fn test_decode_body_malformed_success_is_json_error() {
        let result = OpenAiProvider::decode_body(reqwest::StatusCode::OK, "<html>gateway</html>");
        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::Json(_)));
        assert!(err.to_string().starts_with("malformed response body:"));
    }

    #[test]
    fn test_decode_body_error_statuses() {
        let result = OpenAiProvider::decode_body(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "bad key"}}"#,
        );
        assert!(matches!(result, Err(ProviderError::Api(ref m)) if m == "bad key"));

        let result = OpenAiProvider::decode_body(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(result, Err(ProviderError::Api(ref m)) if m == "unknown error"));

        let result = OpenAiProvider::decode_body(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(result, Err(ProviderError::RateLimited)));
    }

    #[test]
    fn test_decode_body_success() {
        let json = OpenAiProvider::decode_body(reqwest::StatusCode::OK, r#"{"choices": []}"#).unwrap();
        assert_eq!(json, json!({"choices": []}));
    }
}
