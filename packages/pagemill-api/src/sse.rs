//! Server-sent-events push channel.
//!
//! One event type flows here: a job status update carrying a full job record
//! as its payload, scoped per project. The decoder is incremental and
//! byte-oriented so frames split across network chunks (including inside a
//! multi-byte character) reassemble correctly.

use async_trait::async_trait;
use futures::StreamExt;

use pagemill_core::api::{ApiError, ApiResult, JobUpdateStream, PushChannel};
use pagemill_core::types::{Job, ProjectId};

use crate::PagemillClient;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// `event:` field, when the server names the event type.
    pub event: Option<String>,
    /// Concatenated `data:` lines, newline-joined.
    pub data: String,
}

/// Incremental SSE frame decoder.
///
/// Feed raw chunks as they arrive; complete events (terminated by a blank
/// line) come back in order. Comment lines (`:`) and fields this client does
/// not use (`id:`, `retry:`) are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        // Only consume up to the last complete line; a partial line stays
        // buffered for the next chunk.
        while let Some(boundary) = find_event_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..boundary).collect();
            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }
}

/// Index just past the first blank line terminating an event, if any.
fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    let mut index = 0;
    let mut line_start = 0;
    while index < buffer.len() {
        if buffer[index] == b'\n' {
            let line = &buffer[line_start..index];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                return Some(index + 1);
            }
            line_start = index + 1;
        }
        index += 1;
    }
    None
}

fn parse_frame(frame: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() && event.event.is_none() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

#[async_trait]
impl PushChannel for PagemillClient {
    /// `GET /projects/{id}/events` — long-lived stream of job updates.
    async fn subscribe(&self, project_id: ProjectId) -> ApiResult<JobUpdateStream> {
        let url = self.url(&format!("/projects/{}/events", project_id.0));
        let resp = self
            .request(
                self.client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "text/event-stream"),
            )
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        tracing::debug!(%project_id, "Event stream open");

        let mut decoder = SseDecoder::new();
        let stream = resp
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .filter_map(decode_job_update)
                    .collect::<Vec<ApiResult<Job>>>(),
                Err(err) => vec![Err(ApiError::Transport(err.to_string()))],
            })
            .flat_map(futures::stream::iter);

        Ok(stream.boxed())
    }
}

/// Turn a decoded frame into a job update. Unknown event types and
/// keep-alive frames are dropped; malformed payloads surface as decode
/// errors so the subscriber can log them.
fn decode_job_update(event: SseEvent) -> Option<ApiResult<Job>> {
    if let Some(name) = &event.event {
        if name != "job_update" {
            tracing::debug!(event = %name, "Ignoring unknown push event type");
            return None;
        }
    }
    if event.data.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&event.data).map_err(ApiError::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_simple_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: job_update\ndata: {\"x\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("job_update"));
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn reassembles_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        assert!(decoder.push(b" 1}\n").is_empty());
        let events = decoder.push(b"\ndata: second\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\": 1}");
        assert_eq!(events[1].data, "second");
    }

    #[test]
    fn multiline_data_joins_with_newlines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn comments_and_unused_fields_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nid: 7\nretry: 100\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn job_update_payload_decodes_to_job() {
        let payload = serde_json::json!({
            "id": "018f0d37-7a5e-7bbd-a1b2-3c4d5e6f7081",
            "project_id": "018f0d37-7a5e-7bbd-a1b2-3c4d5e6f7082",
            "task_name": "crawl_sources",
            "status": "in_progress",
            "created_at": "2025-03-01T12:00:00Z",
            "updated_at": "2025-03-01T12:00:05Z",
            "progress": { "processed_items": 3, "total_items": 10 }
        });
        let event = SseEvent {
            event: Some("job_update".into()),
            data: payload.to_string(),
        };
        let job = decode_job_update(event).unwrap().unwrap();
        assert_eq!(job.task_name.as_str(), "crawl_sources");
        assert_eq!(job.progress.unwrap().total_items, 10);
    }

    #[test]
    fn unknown_event_types_are_dropped() {
        let event = SseEvent {
            event: Some("heartbeat".into()),
            data: "{}".into(),
        };
        assert!(decode_job_update(event).is_none());
    }

    #[test]
    fn malformed_payload_surfaces_as_decode_error() {
        let event = SseEvent {
            event: Some("job_update".into()),
            data: "not json".into(),
        };
        let result = decode_job_update(event).unwrap();
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
