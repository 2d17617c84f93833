/// Streaming Gemini client — opens a server-sent-events response and yields
/// the text fragments as they arrive.
use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, ReadableStreamDefaultReader, RequestInit, Response, TextDecoder};

use storyweave::core::session::{FragmentStream, StoryGenerator, StreamFailure};

const API_ROOT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-2.5-flash";

/// The API key is baked in at build time; without one, every generation
/// operation fails before a request is made.
pub struct GeminiGenerator {
    api_key: Option<&'static str>,
    model: &'static str,
}

impl GeminiGenerator {
    pub fn from_env() -> Self {
        GeminiGenerator {
            api_key: option_env!("GEMINI_API_KEY"),
            model: MODEL,
        }
    }
}

fn js_failure(value: JsValue) -> StreamFailure {
    match value.as_string() {
        Some(message) => StreamFailure::new(message),
        None => StreamFailure::new(format!("{value:?}")),
    }
}

#[async_trait(?Send)]
impl StoryGenerator for GeminiGenerator {
    fn is_configured(&self) -> bool {
        self.api_key.is_some_and(|key| !key.is_empty())
    }

    async fn open(&self, prompt: &str) -> Result<FragmentStream, StreamFailure> {
        let key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StreamFailure::new("API key is not set"))?;
        let url = format!(
            "{API_ROOT}/{}:streamGenerateContent?alt=sse&key={key}",
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        })
        .to_string();

        let headers = Headers::new().map_err(js_failure)?;
        headers
            .set("Content-Type", "application/json")
            .map_err(js_failure)?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(&body));

        let window = web_sys::window().ok_or_else(|| StreamFailure::new("no window"))?;
        let response: Response = JsFuture::from(window.fetch_with_str_and_init(&url, &init))
            .await
            .map_err(js_failure)?
            .dyn_into()
            .map_err(js_failure)?;
        if !response.ok() {
            return Err(StreamFailure::new(format!(
                "generation request failed with HTTP {}",
                response.status()
            )));
        }
        let stream = response
            .body()
            .ok_or_else(|| StreamFailure::new("response has no body"))?;
        let reader: ReadableStreamDefaultReader = stream
            .get_reader()
            .dyn_into()
            .map_err(|obj| js_failure(obj.into()))?;
        let decoder = TextDecoder::new().map_err(js_failure)?;
        Ok(sse_fragments(reader, decoder).boxed_local())
    }
}

struct SseState {
    reader: ReadableStreamDefaultReader,
    decoder: TextDecoder,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn the raw byte stream into a lazy sequence of story fragments. Each
/// SSE event carries a JSON payload; events may be split across reads, so
/// bytes are buffered until an event boundary shows up.
fn sse_fragments(
    reader: ReadableStreamDefaultReader,
    decoder: TextDecoder,
) -> impl futures::Stream<Item = Result<String, StreamFailure>> {
    let state = SseState {
        reader,
        decoder,
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }
            let chunk = match JsFuture::from(state.reader.read()).await {
                Ok(chunk) => chunk,
                Err(err) => {
                    state.done = true;
                    return Some((Err(js_failure(err)), state));
                }
            };
            let finished = Reflect::get(&chunk, &JsValue::from_str("done"))
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if finished {
                state.done = true;
                drain_events(&mut state.buffer, &mut state.pending, true);
                continue;
            }
            let value = match Reflect::get(&chunk, &JsValue::from_str("value")) {
                Ok(value) => value,
                Err(err) => {
                    state.done = true;
                    return Some((Err(js_failure(err)), state));
                }
            };
            let mut bytes = Uint8Array::new(&value).to_vec();
            match state.decoder.decode_with_u8_array(&mut bytes) {
                Ok(text) => {
                    state.buffer.push_str(&text);
                    drain_events(&mut state.buffer, &mut state.pending, false);
                }
                Err(err) => {
                    state.done = true;
                    return Some((Err(js_failure(err)), state));
                }
            }
        }
    })
}

/// Split complete events off the front of the buffer; `flush` also consumes
/// a trailing event with no final boundary.
fn drain_events(buffer: &mut String, pending: &mut VecDeque<String>, flush: bool) {
    while let Some(boundary) = buffer.find("\n\n") {
        let event: String = buffer.drain(..boundary + 2).collect();
        if let Some(text) = event_text(&event) {
            pending.push_back(text);
        }
    }
    if flush && !buffer.trim().is_empty() {
        if let Some(text) = event_text(buffer) {
            pending.push_back(text);
        }
        buffer.clear();
    }
}

/// Extract the generated text from one SSE event's `data:` payload.
fn event_text(event: &str) -> Option<String> {
    let mut out = String::new();
    for line in event.lines() {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(data) else {
            continue;
        };
        let parts = payload["candidates"][0]["content"]["parts"].as_array();
        for part in parts.into_iter().flatten() {
            if let Some(text) = part["text"].as_str() {
                out.push_str(text);
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\n\n"
        )
    }

    #[test]
    fn complete_events_are_drained_in_order() {
        let mut buffer = format!("{}{}", event("Once"), event(" upon"));
        let mut pending = VecDeque::new();
        drain_events(&mut buffer, &mut pending, false);
        assert_eq!(pending, VecDeque::from(["Once".to_string(), " upon".to_string()]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_event_stays_buffered_until_flush() {
        let whole = event("tail");
        let (head, rest) = whole.split_at(20);
        let mut buffer = head.to_string();
        let mut pending = VecDeque::new();
        drain_events(&mut buffer, &mut pending, false);
        assert!(pending.is_empty());

        buffer.push_str(rest.trim_end_matches('\n'));
        drain_events(&mut buffer, &mut pending, true);
        assert_eq!(pending, VecDeque::from(["tail".to_string()]));
    }

    #[test]
    fn non_data_lines_and_done_markers_are_ignored() {
        assert_eq!(event_text(": keepalive comment"), None);
        assert_eq!(event_text("data: [DONE]"), None);
        assert_eq!(event_text("data: not json"), None);
    }
}
