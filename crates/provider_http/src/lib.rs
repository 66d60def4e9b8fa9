use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use core_types::{
    GenerateRequest, ProviderAdapter, ProviderConfig, ProviderId, Turn, TurnRole, UnifiedEvent,
    UnifiedEventStream,
};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

pub struct HttpProviderAdapter {
    client: reqwest::Client,
}

impl Default for HttpProviderAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProviderAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn stream_generate(
        &self,
        provider: &ProviderConfig,
        api_key: &str,
        request: GenerateRequest,
    ) -> Result<UnifiedEventStream> {
        debug!(
            provider = ?provider.id,
            model = %request.model,
            turns = request.turns.len(),
            "opening provider stream"
        );
        let response = match provider.id {
            ProviderId::Gemini => self.call_gemini(provider, api_key, &request).await?,
            ProviderId::OpenAi => self.call_openai_chat(provider, api_key, &request).await?,
        };
        Ok(decode_event_stream(provider.id, response.bytes_stream()))
    }
}

impl HttpProviderAdapter {
    async fn call_gemini(
        &self,
        provider: &ProviderConfig,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<reqwest::Response> {
        let model = request.model.trim();
        if model.is_empty() {
            bail!("gemini model is required");
        }
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            provider.base_url.trim_end_matches('/'),
            model,
            api_key.trim()
        );
        self.post_json_sse(&url, None, &provider.extra_headers, gemini_body(request))
            .await
    }

    async fn call_openai_chat(
        &self,
        provider: &ProviderConfig,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<reqwest::Response> {
        let url = format!(
            "{}/chat/completions",
            provider.base_url.trim_end_matches('/')
        );
        self.post_json_sse(
            &url,
            Some(api_key),
            &provider.extra_headers,
            openai_chat_body(request),
        )
        .await
    }

    async fn post_json_sse(
        &self,
        url: &str,
        bearer: Option<&str>,
        extra_headers: &[(String, String)],
        body: Value,
    ) -> Result<reqwest::Response> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = bearer {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                    .context("invalid authorization header")?,
            );
        }
        apply_extra_headers(&mut headers, extra_headers)?;
        let response = self
            .client
            .post(url)
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .context("failed to reach provider")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "provider rejected request");
            bail!("provider request failed: {status} {text}");
        }
        Ok(response)
    }
}

fn apply_extra_headers(headers: &mut HeaderMap, extra_headers: &[(String, String)]) -> Result<()> {
    for (key, value) in extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| anyhow!("invalid header name: {key}"))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| anyhow!("invalid header value for {key}"))?;
        headers.insert(name, value);
    }
    Ok(())
}

/// Decodes an SSE byte stream into events as frames arrive.
///
/// Frames may be split across chunks arbitrarily. A trailing
/// [`UnifiedEvent::Completed`] is appended once the body ends.
pub fn decode_event_stream<S, B, E>(provider: ProviderId, bytes: S) -> UnifiedEventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
    E: std::fmt::Display + 'static,
{
    let events = bytes
        .eventsource()
        .map(move |item| match item {
            Ok(event) => decode_sse_data(provider, &event.data),
            Err(err) => vec![Err(anyhow!("provider stream interrupted: {err}"))],
        })
        .flat_map(futures::stream::iter)
        .chain(futures::stream::once(async { Ok(UnifiedEvent::Completed) }));
    Box::pin(events)
}

fn decode_sse_data(provider: ProviderId, data: &str) -> Vec<Result<UnifiedEvent>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(data) {
        Ok(payload) => map_payload_to_events(provider, &payload)
            .into_iter()
            .map(Ok)
            .collect(),
        Err(err) => vec![Err(anyhow!(err).context("malformed provider payload"))],
    }
}

fn map_payload_to_events(provider: ProviderId, payload: &Value) -> Vec<UnifiedEvent> {
    let mut events = Vec::new();
    if let Some(error) = payload.get("error") {
        let code = error
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| error.get("code").map(|code| code.to_string()))
            .unwrap_or_else(|| "provider_error".to_string());
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("provider reported an error")
            .to_string();
        events.push(UnifiedEvent::Failed { code, message });
        return events;
    }

    match provider {
        ProviderId::Gemini => {
            if let Some(candidates) = payload.get("candidates").and_then(Value::as_array) {
                for candidate in candidates {
                    let Some(parts) = candidate
                        .get("content")
                        .and_then(|c| c.get("parts"))
                        .and_then(Value::as_array)
                    else {
                        continue;
                    };
                    for part in parts {
                        if part.get("thought").and_then(Value::as_bool) == Some(true) {
                            continue;
                        }
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            events.push(UnifiedEvent::TextDelta {
                                text: text.to_string(),
                            });
                        }
                    }
                }
            }
            if let Some(usage) = payload.get("usageMetadata") {
                events.push(UnifiedEvent::Usage {
                    input_tokens: usage
                        .get("promptTokenCount")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    output_tokens: usage
                        .get("candidatesTokenCount")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    total_tokens: usage.get("totalTokenCount").and_then(Value::as_u64),
                });
            }
        }
        ProviderId::OpenAi => {
            if let Some(choices) = payload.get("choices").and_then(Value::as_array) {
                for choice in choices {
                    if let Some(text) = choice
                        .get("delta")
                        .and_then(|d| d.get("content"))
                        .and_then(Value::as_str)
                    {
                        events.push(UnifiedEvent::TextDelta {
                            text: text.to_string(),
                        });
                    }
                }
            }
            if let Some(usage) = payload.get("usage").filter(|usage| !usage.is_null()) {
                events.push(UnifiedEvent::Usage {
                    input_tokens: usage
                        .get("prompt_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    output_tokens: usage
                        .get("completion_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    total_tokens: usage.get("total_tokens").and_then(Value::as_u64),
                });
            }
        }
    }
    events
}

fn gemini_body(request: &GenerateRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{"text": request.system_instruction}]
        },
        "contents": to_gemini_contents(&request.turns),
        "generationConfig": {
            "temperature": request.temperature,
        }
    })
}

fn to_gemini_contents(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "model",
            };
            json!({
                "role": role,
                "parts": [{"text": turn.text}]
            })
        })
        .collect()
}

fn openai_chat_body(request: &GenerateRequest) -> Value {
    json!({
        "model": request.model,
        "messages": to_openai_chat_messages(request),
        "stream": true,
        "temperature": request.temperature,
    })
}

fn to_openai_chat_messages(request: &GenerateRequest) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": request.system_instruction})];
    messages.extend(request.turns.iter().map(|turn| {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        json!({"role": role, "content": turn.text})
    }));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gemini-test".to_string(),
            system_instruction: "be brief".to_string(),
            turns: vec![Turn::assistant("welcome"), Turn::user("revenue?")],
            temperature: Some(0.7),
        }
    }

    fn texts(events: &[Result<UnifiedEvent>]) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                Ok(UnifiedEvent::TextDelta { text }) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn maps_gemini_parts_and_skips_thoughts() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking...", "thought": true},
                        {"text": "Revenue grew"}
                    ]
                }
            }],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 2,
                "totalTokenCount": 14
            }
        });
        let events = map_payload_to_events(ProviderId::Gemini, &payload);
        assert_eq!(
            events,
            vec![
                UnifiedEvent::TextDelta {
                    text: "Revenue grew".to_string()
                },
                UnifiedEvent::Usage {
                    input_tokens: 12,
                    output_tokens: 2,
                    total_tokens: Some(14)
                }
            ]
        );
    }

    #[test]
    fn maps_openai_chat_delta() {
        let payload = json!({
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hello"}}],
            "usage": null
        });
        let events = map_payload_to_events(ProviderId::OpenAi, &payload);
        assert_eq!(
            events,
            vec![UnifiedEvent::TextDelta {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn maps_in_band_error_to_failed() {
        let payload = json!({
            "error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        });
        let events = map_payload_to_events(ProviderId::Gemini, &payload);
        assert_eq!(
            events,
            vec![UnifiedEvent::Failed {
                code: "RESOURCE_EXHAUSTED".to_string(),
                message: "quota exceeded".to_string()
            }]
        );
    }

    #[test]
    fn gemini_body_uses_model_role_and_system_instruction() {
        let body = gemini_body(&request());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["contents"][1]["role"], "user");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "revenue?");
        assert!(body["generationConfig"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn openai_body_puts_system_message_first() {
        let body = openai_chat_body(&request());
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn decodes_frames_split_across_chunks() {
        let frames = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Reve\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"nue grew\"}]}}]}\r\n\r\n",
        );
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = frames
            .as_bytes()
            .chunks(7)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        let events: Vec<_> = decode_event_stream(ProviderId::Gemini, futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(texts(&events), "Revenue grew");
        assert!(matches!(events.last(), Some(Ok(UnifiedEvent::Completed))));
    }

    #[tokio::test]
    async fn skips_done_marker_and_reports_malformed_json() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: {oops\n\ndata: [DONE]\n\n";
        let chunks = vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())];

        let events: Vec<_> = decode_event_stream(ProviderId::OpenAi, futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(texts(&events), "ok");
        assert!(events.iter().any(|event| event.is_err()));
    }

    #[tokio::test]
    async fn transport_errors_surface_as_err_items() {
        let chunks = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
        ];
        let events: Vec<_> = decode_event_stream(ProviderId::OpenAi, futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(texts(&events), "par");
        assert!(events.iter().any(|event| matches!(
            event,
            Err(err) if err.to_string().contains("connection reset")
        )));
    }
}
