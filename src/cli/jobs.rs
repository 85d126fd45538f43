// CLI client commands: stats, jobs, job, machines, submit, cancel

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use super::{base_url, handle_request_error};
use crate::models::JobSpec;

/// Send a request and decode the JSON body, turning error responses into
/// an error carrying the server's message.
async fn send_json(request: RequestBuilder, host: &str, port: u16) -> anyhow::Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or("Unknown error");
        anyhow::bail!("{}", message);
    }

    Ok(body)
}

/// Format a relative time string like "2 minutes ago".
fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let secs = Utc::now().signed_duration_since(*dt).num_seconds().max(0);
    if secs < 60 {
        format!("{} seconds ago", secs)
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}

fn relative_field(value: &Value) -> String {
    match value.as_str().map(|ts| ts.parse::<DateTime<Utc>>()) {
        Some(Ok(dt)) => format_relative_time(&dt),
        _ => "-".to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Filters for `GET /api/jobs`, sent as URL-encoded query parameters.
#[derive(Debug, Default, Serialize)]
pub struct JobsQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// qjt stats
pub async fn cmd_stats(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/stats", base_url(host, port));
    let body = send_json(client.get(&url), host, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let count = |key: &str| body[key].as_u64().unwrap_or(0);
    println!("Jobs");
    println!("  Running:    {}", count("running_jobs"));
    println!("  Queued:     {}", count("queued_jobs"));
    println!("  Completed:  {}", count("completed_jobs"));
    println!("  Failed:     {}", count("failed_jobs"));
    println!("  Cancelled:  {}", count("cancelled_jobs"));
    println!("  Today:      {}", count("total_jobs_today"));
    println!("Machines");
    println!(
        "  Active:     {}/{}",
        count("active_machines"),
        count("total_machines")
    );
    println!(
        "Avg wait:     {:.1} min",
        body["average_wait_time"].as_f64().unwrap_or(0.0)
    );
    println!(
        "Success rate: {:.1}%",
        body["success_rate"].as_f64().unwrap_or(0.0)
    );

    Ok(())
}

/// qjt jobs
pub async fn cmd_jobs(
    host: &str,
    port: u16,
    query: &JobsQuery<'_>,
    json: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/jobs", base_url(host, port));
    let body = send_json(client.get(&url).query(query), host, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let empty_vec = vec![];
    let jobs = body.as_array().unwrap_or(&empty_vec);

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<10}{:<11}{:<16}{:<20}{:<7}{:<8}{:<16}{:<10}",
        "ID", "STATUS", "BACKEND", "CIRCUIT", "QUBITS", "SHOTS", "CREATED", "DURATION"
    );

    for job in jobs {
        println!(
            "{:<10}{:<11}{:<16}{:<20}{:<7}{:<8}{:<16}{:<10}",
            job["id"].as_str().unwrap_or("?"),
            job["status"].as_str().unwrap_or("?"),
            truncate(job["backend"].as_str().unwrap_or("?"), 15),
            truncate(job["circuit_label"].as_str().unwrap_or("?"), 19),
            job["qubits"].as_u64().unwrap_or(0),
            job["shots"].as_u64().unwrap_or(0),
            relative_field(&job["created"]),
            job["duration"].as_str().unwrap_or("-"),
        );
    }

    Ok(())
}

/// qjt job <id>
pub async fn cmd_job(host: &str, port: u16, id: &str, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/jobs/{}", base_url(host, port), id);
    let job = send_json(client.get(&url), host, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!("Job {}", job["id"].as_str().unwrap_or(id));
    println!("  Status:   {}", job["status"].as_str().unwrap_or("?"));
    println!("  Backend:  {}", job["backend"].as_str().unwrap_or("?"));
    println!("  Circuit:  {}", job["circuit_label"].as_str().unwrap_or("?"));
    println!("  Qubits:   {}", job["qubits"].as_u64().unwrap_or(0));
    println!("  Depth:    {}", job["depth"].as_u64().unwrap_or(0));
    println!("  Shots:    {}", job["shots"].as_u64().unwrap_or(0));
    println!("  User:     {}", job["user_id"].as_str().unwrap_or("?"));
    println!(
        "  Created:  {} ({})",
        job["created"].as_str().unwrap_or("?"),
        relative_field(&job["created"])
    );
    println!("  Duration: {}", job["duration"].as_str().unwrap_or("-"));

    Ok(())
}

/// qjt machines
pub async fn cmd_machines(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/machines", base_url(host, port));
    let body = send_json(client.get(&url), host, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let empty_vec = vec![];
    let machines = body.as_array().unwrap_or(&empty_vec);

    println!(
        "{:<16}{:<14}{:<13}{:<8}{:<9}{:<10}{:<8}",
        "NAME", "LOCATION", "STATUS", "QUBITS", "PENDING", "FIDELITY", "UPTIME"
    );

    for machine in machines {
        println!(
            "{:<16}{:<14}{:<13}{:<8}{:<9}{:<10}{:<8}",
            truncate(machine["name"].as_str().unwrap_or("?"), 15),
            truncate(machine["location"].as_str().unwrap_or("?"), 13),
            machine["status"].as_str().unwrap_or("?"),
            machine["qubit_count"].as_u64().unwrap_or(0),
            machine["pending"].as_u64().unwrap_or(0),
            format!("{:.1}%", machine["fidelity"].as_f64().unwrap_or(0.0)),
            format!("{:.1}%", machine["uptime"].as_f64().unwrap_or(0.0)),
        );
    }

    Ok(())
}

/// qjt submit
pub async fn cmd_submit(host: &str, port: u16, spec: &JobSpec) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/jobs", base_url(host, port));
    let job = send_json(client.post(&url).json(spec), host, port).await?;

    println!(
        "Job '{}' submitted.",
        job["id"].as_str().unwrap_or("unknown")
    );
    println!("  Backend: {}", job["backend"].as_str().unwrap_or("?"));
    println!("  Circuit: {}", job["circuit_label"].as_str().unwrap_or("?"));
    println!("  Status:  {}", job["status"].as_str().unwrap_or("?"));

    Ok(())
}

/// qjt cancel <id>
pub async fn cmd_cancel(host: &str, port: u16, id: &str) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/jobs/{}/cancel", base_url(host, port), id);
    let job = send_json(client.post(&url), host, port).await?;

    println!("Job '{}' cancelled.", job["id"].as_str().unwrap_or(id));

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_relative_time_seconds_ago() {
        let past = Utc::now() - chrono::Duration::seconds(30);
        let result = format_relative_time(&past);
        assert!(result.contains("seconds ago"), "Got: {}", result);
    }

    #[test]
    fn test_format_relative_time_minutes_ago() {
        let past = Utc::now() - chrono::Duration::minutes(5);
        let result = format_relative_time(&past);
        assert!(result.contains("minutes ago"), "Got: {}", result);
    }

    #[test]
    fn test_format_relative_time_days_ago() {
        let past = Utc::now() - chrono::Duration::days(3);
        let result = format_relative_time(&past);
        assert_eq!(result, "3 days ago");
    }

    #[test]
    fn test_format_relative_time_future_clamps_to_zero() {
        let future = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(format_relative_time(&future), "0 seconds ago");
    }

    #[test]
    fn test_relative_field_handles_missing_and_invalid() {
        assert_eq!(relative_field(&Value::Null), "-");
        assert_eq!(relative_field(&Value::String("yesterday".into())), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Quantum Fourier Transform", 10), "Quantum...");
    }

    fn encoded(query: &JobsQuery<'_>) -> Option<String> {
        Client::new()
            .get("http://127.0.0.1:8377/api/jobs")
            .query(query)
            .build()
            .unwrap()
            .url()
            .query()
            .map(str::to_string)
    }

    #[test]
    fn test_jobs_query_encoding() {
        assert_eq!(encoded(&JobsQuery::default()), None);
        assert_eq!(
            encoded(&JobsQuery {
                status: Some("queued"),
                backend: Some("ibm_kyoto"),
                limit: Some(5),
                ..Default::default()
            })
            .as_deref(),
            Some("status=queued&backend=ibm_kyoto&limit=5")
        );
        assert_eq!(
            encoded(&JobsQuery {
                search: Some("Ibm Kyo"),
                ..Default::default()
            })
            .as_deref(),
            Some("search=Ibm+Kyo")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_connection_error() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let result = send_json(client.get("http://127.0.0.1:1/api/stats"), "127.0.0.1", 1).await;
        let msg = result.unwrap_err().to_string();
        assert!(
            msg.contains("Could not connect") || msg.contains("Request failed"),
            "Got: {}",
            msg
        );
    }
}
