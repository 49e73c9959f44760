// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use maxims_app::{MaximContent, Story};
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const STORY_SEEDS: [(&str, &str, &str); 4] = [
    (
        "The Spurs' film sessions",
        "Gregg Popovich pairs hard-edged feedback with warmth so players hear that they belong.",
        "You are part of this group. This group is special. I believe in you.",
    ),
    (
        "Navy SEAL after-action reviews",
        "Teams strip away rank after every mission and examine their own mistakes out loud.",
        "Vulnerability does not come after trust; it precedes it.",
    ),
    (
        "Pixar's BrainTrust",
        "Directors bring unfinished films to a room of peers who deliver candid notes without authority.",
        "Early on, all of our movies suck.",
    ),
    (
        "Danny Meyer's restaurants",
        "Staff repeat simple catchphrases until the purpose becomes a shared habit.",
        "Good things happen when people feel safe.",
    ),
];

const MOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Deterministic content for `maxim`; the story set rotates with the maxim
/// length so different maxims get visibly different stories.
pub fn sample_content(maxim: &str) -> MaximContent {
    let first = maxim.len() % STORY_SEEDS.len();
    let second = (first + 1) % STORY_SEEDS.len();
    MaximContent {
        maxim: maxim.to_owned(),
        meaning: format!(
            "\"{maxim}\" describes a habit that makes a group feel safe and connected."
        ),
        stories: [first, second]
            .into_iter()
            .map(|index| {
                let (title, narrative, quote) = STORY_SEEDS[index];
                Story {
                    title: title.to_owned(),
                    narrative: narrative.to_owned(),
                    quote: quote.to_owned(),
                }
            })
            .collect(),
    }
}

pub fn content_json(content: &MaximContent) -> String {
    json!({
        "maxim": content.maxim,
        "meaning": content.meaning,
        "stories": content
            .stories
            .iter()
            .map(|story| json!({
                "title": story.title,
                "narrative": story.narrative,
                "quote": story.quote,
            }))
            .collect::<Vec<_>>(),
    })
    .to_string()
}

/// A successful `generateContent` body whose single candidate says `text`.
pub fn gemini_reply(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP",
            "index": 0
        }],
        "modelVersion": "gemini-2.5-flash"
    })
    .to_string()
}

pub fn gemini_error(code: u16, status: &str, message: &str) -> String {
    json!({
        "error": { "code": code, "message": message, "status": status }
    })
    .to_string()
}

pub fn temp_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp config dir")?;
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Holds the reply back for `delay` after the request arrives.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub api_key: Option<String>,
    pub body: String,
}

/// In-process stand-in for the Gemini endpoint. Answers each incoming request
/// with the next queued reply, then stops.
pub struct MockGemini {
    base_url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockGemini {
    pub fn start(replies: Vec<MockReply>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}/v1beta", server.server_addr());

        let handle = thread::spawn(move || -> Result<Vec<RecordedRequest>> {
            let mut recorded = Vec::new();
            for reply in replies {
                let Some(mut request) = server
                    .recv_timeout(MOCK_TIMEOUT)
                    .context("receive mock request")?
                else {
                    break;
                };

                let mut body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut body)
                    .context("read mock request body")?;
                let api_key = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("x-goog-api-key"))
                    .map(|header| header.value.as_str().to_owned());
                recorded.push(RecordedRequest {
                    method: request.method().as_str().to_owned(),
                    url: request.url().to_owned(),
                    api_key,
                    body,
                });

                let header = Header::from_bytes("Content-Type", reply.content_type)
                    .map_err(|()| anyhow!("invalid content type {}", reply.content_type))?;
                let response = Response::from_string(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                if reply.delay.is_zero() {
                    request.respond(response).context("send mock response")?;
                } else {
                    // The client may have given up by now.
                    thread::sleep(reply.delay);
                    let _ = request.respond(response);
                }
            }
            Ok(recorded)
        });

        Ok(Self { base_url, handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the server thread and returns what it saw.
    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::{content_json, gemini_error, gemini_reply, sample_content, temp_config};
    use anyhow::Result;
    use maxims_app::MaximContent;

    #[test]
    fn sample_content_is_deterministic() {
        assert_eq!(sample_content("Embrace fun"), sample_content("Embrace fun"));
        assert_eq!(sample_content("Embrace fun").stories.len(), 2);
        assert_ne!(
            sample_content("Embrace fun").stories,
            sample_content("Pick up trash!").stories
        );
    }

    #[test]
    fn content_json_decodes_back_to_content() -> Result<()> {
        let content = sample_content("Pick up trash");
        let decoded: MaximContent = serde_json::from_str(&content_json(&content))?;
        assert_eq!(decoded, content);
        Ok(())
    }

    #[test]
    fn envelopes_are_valid_json() -> Result<()> {
        let reply: serde_json::Value = serde_json::from_str(&gemini_reply("hi"))?;
        assert_eq!(reply["candidates"][0]["content"]["parts"][0]["text"], "hi");

        let error: serde_json::Value =
            serde_json::from_str(&gemini_error(403, "PERMISSION_DENIED", "nope"))?;
        assert_eq!(error["error"]["code"], 403);
        Ok(())
    }

    #[test]
    fn temp_config_writes_file() -> Result<()> {
        let (_dir, path) = temp_config("version = 1\n")?;
        assert_eq!(std::fs::read_to_string(path)?, "version = 1\n");
        Ok(())
    }
}
