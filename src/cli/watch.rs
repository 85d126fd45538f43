// CLI live view: follows /api/events and prints one line per event

use reqwest::Client;
use serde_json::Value;

use super::{base_url, handle_request_error};

/// A parsed server-sent event block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
}

/// Parse one `\n\n`-terminated SSE block. Comment-only blocks (keepalives,
/// lag notices) yield `None`.
pub fn parse_sse_block(block: &str) -> Option<SseMessage> {
    let mut message = SseMessage::default();
    let mut saw_field = false;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            message.event = rest.trim_start().to_string();
            saw_field = true;
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !message.data.is_empty() {
                message.data.push('\n');
            }
            message.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            saw_field = true;
        }
    }

    saw_field.then_some(message)
}

/// Render an event as a single status line. The `data` field carries the
/// tagged JSON, so the payload lives under `json["data"]`.
pub fn describe_event(message: &SseMessage) -> Option<String> {
    let json: Value = serde_json::from_str(&message.data).ok()?;
    let payload = &json["data"];

    match message.event.as_str() {
        "telemetry_updated" => {
            let stats = &payload["stats"];
            let count = |key: &str| stats[key].as_u64().unwrap_or(0);
            Some(format!(
                "[{}] running={} queued={} completed={} failed={} cancelled={} machines={}/{}",
                payload["timestamp"].as_str().unwrap_or("?"),
                count("running_jobs"),
                count("queued_jobs"),
                count("completed_jobs"),
                count("failed_jobs"),
                count("cancelled_jobs"),
                count("active_machines"),
                count("total_machines"),
            ))
        }
        "job_changed" => Some(format!(
            "[{}] job {} {}",
            payload["timestamp"].as_str().unwrap_or("?"),
            payload["job_id"].as_str().unwrap_or("?"),
            payload["change"].as_str().unwrap_or("changed"),
        )),
        _ => None,
    }
}

/// qjt watch
pub async fn cmd_watch(host: &str, port: u16, job: Option<&str>) -> anyhow::Result<()> {
    let client = Client::new();
    let mut url = format!("{}/api/events", base_url(host, port));
    if let Some(id) = job {
        url.push_str(&format!("?job_id={}", id));
    }

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    if !response.status().is_success() {
        anyhow::bail!("Event stream unavailable (HTTP {})", response.status());
    }

    println!("Watching telemetry on {} (Ctrl+C to stop)", base_url(host, port));
    follow_sse_stream(response).await
}

async fn follow_sse_stream(response: reqwest::Response) -> anyhow::Result<()> {
    use futures_util::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow::anyhow!("SSE stream error: {}", e))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find("\n\n") {
            let block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();

            if let Some(line) = parse_sse_block(&block).as_ref().and_then(describe_event) {
                println!("{}", line);
            }
        }
    }

    println!("--- Event stream closed ---");
    Ok(())
}
