//! Server-Sent Events Pump
//!
//! Shared line-buffered SSE processing for the hosted providers' `chat`
//! streams. Each provider supplies a parser that maps one `data:` payload to
//! a [`SseDelta`]; the pump pushes the resulting text chunks into the
//! [`ChatStreamSender`] and finishes with the terminal `Done` chunk.

use futures_util::StreamExt;

use agentflow_core::streaming::ChatStreamSender;

/// What a single SSE data payload contributed to the stream.
pub(crate) enum SseDelta {
    /// A text content delta
    Text(String),
    /// The stop reason reported by the provider
    Stop(String),
    /// End of stream signalled in-band (e.g. Anthropic `message_stop`)
    Done,
    /// Payload carried nothing relevant (pings, role deltas, usage frames)
    Skip,
}

/// Drive a streaming HTTP response to completion, forwarding text deltas.
///
/// Runs until the provider closes the connection, an in-band end marker is
/// seen, or the consumer drops its `ChatStream` (send failure). Always sends
/// the terminal `Done` chunk with the last stop reason observed.
pub(crate) async fn pump_sse(
    response: reqwest::Response,
    sender: ChatStreamSender,
    parse_data: fn(&serde_json::Value) -> SseDelta,
) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut stop_reason: Option<String> = None;

    'outer: while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("SSE stream read error: {}", e);
                break;
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Process complete lines
        while let Some(line_end) = buffer.find('\n') {
            let line = buffer[..line_end].trim().to_string();
            buffer = buffer[line_end + 1..].to_string();

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();

            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                break 'outer;
            }

            let value: serde_json::Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                // Partial or malformed frame; skip it rather than abort the stream
                Err(_) => continue,
            };

            match parse_data(&value) {
                SseDelta::Text(text) => {
                    if !text.is_empty() && !sender.text(text).await {
                        // Consumer stopped pulling; stop producing.
                        return;
                    }
                }
                SseDelta::Stop(reason) => {
                    stop_reason = Some(reason);
                }
                SseDelta::Done => break 'outer,
                SseDelta::Skip => {}
            }
        }
    }

    sender.done(stop_reason).await;
}

/// Parser for OpenAI-compatible chat completion chunks (OpenAI, GLM).
pub(crate) fn parse_openai_compatible_data(value: &serde_json::Value) -> SseDelta {
    let choice = &value["choices"][0];
    if let Some(content) = choice["delta"]["content"].as_str() {
        if !content.is_empty() {
            return SseDelta::Text(content.to_string());
        }
    }
    if let Some(reason) = choice["finish_reason"].as_str() {
        return SseDelta::Stop(reason.to_string());
    }
    SseDelta::Skip
}
