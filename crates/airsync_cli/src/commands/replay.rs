//! Replay command implementation.
//!
//! A session file seeds an in-memory backend and lists recorded requests,
//! which are run in order through one [`SyncServer`].

use airsync_codec::Element;
use airsync_engine::{
    Credentials, EngineConfig, MemoryBackend, MemoryStateStore, NullProgress, QueryParams,
    Request, Response, SyncServer,
};
use airsync_protocol::Command;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A recorded session.
#[derive(Debug, Deserialize)]
pub struct Session {
    /// Configuration overriding the one given on the command line.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    /// Accounts known to the backend. Without accounts every logon succeeds.
    #[serde(default)]
    pub users: Vec<SeedUser>,
    /// Messages delivered before the first request.
    #[serde(default)]
    pub mail: Vec<SeedMail>,
    /// Requests in the order they are replayed.
    pub requests: Vec<RecordedRequest>,
}

/// A backend account.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

/// A message delivered into a folder.
#[derive(Debug, Deserialize)]
pub struct SeedMail {
    /// Target folder.
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Raw RFC 822 text.
    pub mime: String,
}

fn default_folder() -> String {
    "inbox".to_string()
}

/// One request of the session.
#[derive(Debug, Deserialize)]
pub struct RecordedRequest {
    /// Command.
    pub command: Command,
    /// Device id.
    pub device_id: String,
    /// User name.
    pub user: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Protocol version.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Policy key header.
    #[serde(default)]
    pub policy_key: Option<String>,
    /// Query parameters.
    #[serde(default)]
    pub query: QueryParams,
    /// Tag-element body.
    #[serde(default)]
    pub body: Option<Vec<Element>>,
    /// Plain text body, for the mail commands.
    #[serde(default)]
    pub plain: Option<String>,
}

impl RecordedRequest {
    fn to_request(&self) -> Request {
        let mut request = Request::new(
            self.command,
            self.device_id.as_str(),
            Credentials::new(self.user.as_str(), self.password.as_str()),
        )
        .with_query(self.query.clone());
        if let Some(version) = &self.protocol_version {
            request = request.with_version(version.as_str());
        }
        if let Some(key) = &self.policy_key {
            request = request.with_policy_key(key.as_str());
        }
        if let Some(body) = &self.body {
            request = request.with_elements(body.clone());
        } else if let Some(plain) = &self.plain {
            request = request.with_plain(plain.as_bytes().to_vec());
        }
        request
    }
}

/// Outcome of one replayed request.
#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    /// Position in the session.
    pub index: usize,
    /// Command.
    pub command: Command,
    /// HTTP status the transport would answer with.
    pub http_status: u16,
    /// Reply elements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    /// Size of a raw reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_bytes: Option<usize>,
    /// Error message of a failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parses a session file.
pub fn load(path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read session {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

/// Replays a session against a fresh in-memory backend.
pub fn replay(session: &Session, config: EngineConfig) -> Vec<ReplayOutcome> {
    let backend = MemoryBackend::with_standard_folders();
    for user in &session.users {
        backend.add_user(&user.user, &user.password);
    }
    for mail in &session.mail {
        if backend.deliver_mime(&mail.folder, &mail.mime).is_none() {
            warn!("Folder {} does not exist, message dropped", mail.folder);
        }
    }

    let config = session.config.clone().unwrap_or(config);
    let server = SyncServer::new(Arc::new(backend), Arc::new(MemoryStateStore::new()))
        .with_config(config)
        .with_progress(Arc::new(NullProgress));

    session
        .requests
        .iter()
        .enumerate()
        .map(|(index, recorded)| {
            let mut outcome = ReplayOutcome {
                index,
                command: recorded.command,
                http_status: 200,
                elements: Vec::new(),
                raw_bytes: None,
                error: None,
            };
            match server.process(recorded.to_request()) {
                Ok(Response::Empty) => {}
                Ok(Response::Elements(elements)) => outcome.elements = elements,
                Ok(Response::Raw { data, .. }) => outcome.raw_bytes = Some(data.len()),
                Err(err) => {
                    outcome.http_status = err.http_status();
                    outcome.error = Some(err.to_string());
                }
            }
            outcome
        })
        .collect()
}

/// Runs the replay command.
pub fn run(
    path: &Path,
    config: EngineConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = load(path)?;
    info!("Replaying {} requests from {:?}", session.requests.len(), path);
    let outcomes = replay(&session, config);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        "text" => {
            for outcome in &outcomes {
                print_outcome(outcome);
            }
        }
        other => return Err(format!("unknown format {other}").into()),
    }
    Ok(())
}

fn print_outcome(outcome: &ReplayOutcome) {
    println!(
        "[{}] {} -> HTTP {}",
        outcome.index, outcome.command, outcome.http_status
    );
    if let Some(error) = &outcome.error {
        println!("  error: {error}");
    }
    if let Some(size) = outcome.raw_bytes {
        println!("  {size} bytes");
    }
    for line in render(&outcome.elements) {
        println!("  {line}");
    }
}

/// Renders an element stream one element per line, indented by depth.
fn render(elements: &[Element]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut iter = elements.iter().peekable();
    while let Some(element) = iter.next() {
        let indent = "  ".repeat(depth);
        match element {
            Element::Start(tag) => match iter.peek() {
                Some(Element::Content(text)) => {
                    lines.push(format!("{indent}<{tag}> {text}"));
                    iter.next();
                    if matches!(iter.peek(), Some(Element::End)) {
                        iter.next();
                    } else {
                        depth += 1;
                    }
                }
                Some(Element::End) => {
                    lines.push(format!("{indent}<{tag}/>"));
                    iter.next();
                }
                _ => {
                    lines.push(format!("{indent}<{tag}>"));
                    depth += 1;
                }
            },
            Element::Content(text) => lines.push(format!("{indent}{text}")),
            Element::End => depth = depth.saturating_sub(1),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = r#"{
        "users": [{ "user": "user", "password": "secret" }],
        "mail": [{ "mime": "Subject: hello\r\n\r\nbody" }],
        "requests": [
            { "command": "Notify", "device_id": "dev1", "user": "user", "password": "secret" },
            { "command": "Notify", "device_id": "dev1", "user": "user", "password": "wrong" },
            { "command": "ValidateCert", "device_id": "dev1", "user": "user", "password": "secret" }
        ]
    }"#;

    #[test]
    fn replays_in_order() {
        let session: Session = serde_json::from_str(SESSION).unwrap();
        let outcomes = replay(&session, EngineConfig::default());
        let statuses: Vec<u16> = outcomes.iter().map(|o| o.http_status).collect();
        assert_eq!(statuses, vec![200, 401, 501]);
        assert!(!outcomes[0].elements.is_empty());
        assert!(outcomes[1].error.is_some());
    }

    #[test]
    fn render_nests_children() {
        use airsync_codec::Tag;
        let root = Tag::new(0, 5);
        let leaf = Tag::new(0, 6);
        let elements = vec![
            Element::Start(root),
            Element::Start(leaf),
            Element::Content("1".into()),
            Element::End,
            Element::Start(leaf),
            Element::End,
            Element::End,
        ];
        assert_eq!(
            render(&elements),
            vec!["<00:05>", "  <00:06> 1", "  <00:06/>"]
        );
    }
}
