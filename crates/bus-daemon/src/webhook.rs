//! Webhook ingress (component N): a tiny HTTP server exposing `POST /send`
//! and `GET /health` so external systems can deliver messages onto the bus
//! without shelling out to the CLI.
//!
//! Grounded on `tiny_http` usage in the auth crate's local OAuth callback
//! server (`Server::http`, a receiver thread bridged into async via an
//! mpsc channel, `spawn_blocking` for the blocking `req.respond`), adapted
//! from a one-shot OAuth redirect catcher to a long-lived request loop.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use agent_bus_core::config::Config;
use agent_bus_core::event_log::{emit_event_best_effort, EventFields};
use agent_bus_core::io::inbox;
use agent_bus_core::layout::{is_known_role, Layout};
use agent_bus_core::registry::SendPolicy;
use agent_bus_core::schema::message::{Message, MessageType};
use agent_bus_core::subscriptions;
use serde::Deserialize;
use tiny_http::{Method, Response, Server};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SendRequest {
    to: String,
    #[serde(default = "default_action")]
    action: String,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    msg_type: Option<String>,
}

fn default_action() -> String {
    "webhook".to_string()
}

fn parse_msg_type(raw: Option<&str>) -> MessageType {
    match raw {
        Some("request") => MessageType::Request,
        Some("response") => MessageType::Response,
        Some("event") => MessageType::Event,
        _ => MessageType::Request,
    }
}

fn required_token(config: &Config) -> Option<String> {
    std::env::var(&config.webhook.token_env_var).ok()
}

fn check_auth(request: &tiny_http::Request, token: &Option<String>) -> bool {
    let Some(expected) = token else { return true };
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("authorization"))
        .map(|h| h.value.as_str() == format!("Bearer {expected}"))
        .unwrap_or(false)
}

fn respond_json(code: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid");
    Response::from_string(body)
        .with_status_code(code)
        .with_header(header)
}

fn handle_send(
    layout: &Layout,
    config: &Config,
    policy: &SendPolicy,
    mut request: tiny_http::Request,
    max_body_bytes: usize,
) {
    let mut body = String::new();
    let mut limited = request.as_reader().take(max_body_bytes as u64 + 1);
    if let Err(e) = limited.read_to_string(&mut body) {
        warn!(error = %e, "failed to read webhook request body");
        let _ = request.respond(respond_json(400, r#"{"error":"unreadable body"}"#));
        return;
    }
    if body.len() > max_body_bytes {
        let _ = request.respond(respond_json(413, r#"{"error":"body too large"}"#));
        return;
    }

    let parsed: Result<SendRequest, _> = serde_json::from_str(&body);
    let send_req = match parsed {
        Ok(r) => r,
        Err(e) => {
            let msg = format!(r#"{{"ok":false,"error":"invalid json: {e}"}}"#);
            let _ = request.respond(respond_json(400, &msg));
            return;
        }
    };

    let Some(payload) = send_req.payload else {
        let _ = request.respond(respond_json(
            400,
            r#"{"ok":false,"error":"missing required field: payload"}"#,
        ));
        return;
    };

    if !is_known_role(&send_req.to) {
        let _ = request.respond(respond_json(400, r#"{"ok":false,"error":"unknown role"}"#));
        return;
    }
    if let Some(reason) = policy.check("webhook", &send_req.to) {
        let msg = format!(r#"{{"ok":false,"error":"send denied: {reason}"}}"#);
        let _ = request.respond(respond_json(403, &msg));
        return;
    }

    let message = Message::new(
        "webhook",
        &send_req.to,
        parse_msg_type(send_req.msg_type.as_deref()),
        &send_req.action,
        &payload,
    );

    match inbox::send(layout, &message, true, &config.send.auto_cc_set()) {
        Ok(()) => {
            let _ = subscriptions::fan_out(layout, &message);
            let _ = agent_bus_core::io::trigger::fire(layout);
            emit_event_best_effort(EventFields {
                level: "info",
                source: "webhook",
                action: "send",
                role: Some(send_req.to.clone()),
                message_id: Some(message.id.clone()),
                result: Some("ok".to_string()),
                ..Default::default()
            });
            let body = format!(r#"{{"ok":true,"id":"{}"}}"#, message.id);
            let _ = request.respond(respond_json(200, &body));
        }
        Err(e) => {
            emit_event_best_effort(EventFields {
                level: "warn",
                source: "webhook",
                action: "send",
                role: Some(send_req.to.clone()),
                error: Some(e.to_string()),
                result: Some("error".to_string()),
                ..Default::default()
            });
            let msg = format!(r#"{{"ok":false,"error":"{e}"}}"#);
            let _ = request.respond(respond_json(500, &msg));
        }
    }
}

/// Writes `<port>:<pid>` so the CLI can find and signal a running webhook.
fn write_pid_file(layout: &Layout, port: u16) -> std::io::Result<()> {
    std::fs::write(layout.webhook_pid(), format!("{port}:{}", std::process::id()))
}

fn remove_pid_file(layout: &Layout) {
    let _ = std::fs::remove_file(layout.webhook_pid());
}

/// Runs the webhook server until `cancel` fires. The `tiny_http::Server`
/// blocks on `recv`, so the receive loop lives on its own OS thread and
/// feeds requests to the async task through a channel, the same bridge the
/// OAuth callback server uses for its blocking listener.
pub async fn run(
    layout: Layout,
    config: Config,
    session: String,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let server = Server::http(format!("0.0.0.0:{}", config.webhook.port))
        .map_err(|e| anyhow::anyhow!("failed to bind webhook port {}: {e}", config.webhook.port))?;
    write_pid_file(&layout, config.webhook.port)?;
    info!(port = config.webhook.port, "webhook server listening");
    let started_at = Instant::now();

    let server = Arc::new(server);
    let (tx, mut rx) = mpsc::channel::<tiny_http::Request>(32);
    let recv_server = server.clone();
    let recv_cancel = cancel.clone();
    std::thread::spawn(move || {
        while !recv_cancel.is_cancelled() {
            match recv_server.recv_timeout(std::time::Duration::from_millis(200)) {
                Ok(Some(req)) => {
                    if tx.blocking_send(req).is_err() {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(_) => break,
            }
        }
    });

    let policy = SendPolicy::default();
    let token = required_token(&config);
    let max_body = config.webhook.max_body_bytes;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe_req = rx.recv() => {
                let Some(request) = maybe_req else { break };
                let layout = layout.clone();
                let config = config.clone();
                let policy = policy.clone();
                let token = token.clone();
                let session = session.clone();
                tokio::task::spawn_blocking(move || {
                    dispatch(&layout, &config, &policy, request, max_body, &token, &session, started_at);
                });
            }
        }
    }

    remove_pid_file(&layout);
    info!("webhook server stopped");
    Ok(())
}

fn dispatch(
    layout: &Layout,
    config: &Config,
    policy: &SendPolicy,
    mut request: tiny_http::Request,
    max_body: usize,
    token: &Option<String>,
    session: &str,
    started_at: Instant,
) {
    match (request.method(), request.url()) {
        (&Method::Get, "/health") => {
            let body = format!(
                r#"{{"ok":true,"session":"{session}","uptime_seconds":{}}}"#,
                started_at.elapsed().as_secs()
            );
            let _ = request.respond(respond_json(200, &body));
        }
        (&Method::Post, "/send") => {
            if !check_auth(&request, token) {
                let _ = request.respond(respond_json(401, r#"{"ok":false,"error":"unauthorized"}"#));
                return;
            }
            handle_send(layout, config, policy, request, max_body)
        }
        _ => {
            let _ = request.respond(respond_json(405, r#"{"ok":false,"error":"method not allowed"}"#));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_msg_type_defaults_to_request() {
        assert_eq!(parse_msg_type(None), MessageType::Request);
        assert_eq!(parse_msg_type(Some("bogus")), MessageType::Request);
        assert_eq!(parse_msg_type(Some("event")), MessageType::Event);
    }

    #[test]
    fn required_token_reads_configured_env_var() {
        let mut config = Config::default();
        config.webhook.token_env_var = "BUS_WEBHOOK_TEST_TOKEN".to_string();
        unsafe {
            std::env::remove_var("BUS_WEBHOOK_TEST_TOKEN");
        }
        assert!(required_token(&config).is_none());
        unsafe {
            std::env::set_var("BUS_WEBHOOK_TEST_TOKEN", "secret");
        }
        assert_eq!(required_token(&config), Some("secret".to_string()));
        unsafe {
            std::env::remove_var("BUS_WEBHOOK_TEST_TOKEN");
        }
    }
}
