use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::log_sanitize::{BODY_PREVIEW_CHARS, sanitize_preview};

/// "Fetch endpoint → JSON or failure". `Ok(None)` means the endpoint answered
/// with an empty body.
#[async_trait(?Send)]
pub trait Transport {
    async fn fetch(&self, path: &str) -> Result<Option<Value>>;
}

/// Shared transports: the owner keeps a handle (e.g. to read the journal).
#[async_trait(?Send)]
impl<T: Transport + ?Sized> Transport for Rc<T> {
    async fn fetch(&self, path: &str) -> Result<Option<Value>> {
        (**self).fetch(path).await
    }
}

fn parse_body(path: &str, text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| Error::msg(format!("malformed body from {path}: {e}")))
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn fetch(&self, path: &str) -> Result<Option<Value>> {
        let url = self.url_for(path);
        let started = Instant::now();
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        debug!(
            %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            body = %sanitize_preview(&text, BODY_PREVIEW_CHARS),
            "fetched"
        );
        if !status.is_success() {
            return Err(Error::msg(format!("GET {url} failed with status {status}")));
        }
        parse_body(path, &text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Started(String),
    Finished(String),
}

#[derive(Debug, Clone)]
enum Canned {
    Body(String),
    Fail(String),
}

/// In-memory endpoint table used for offline fixtures and tests. Every
/// request start and finish is journaled so load ordering can be inspected.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: BTreeMap<String, Canned>,
    delays: BTreeMap<String, Duration>,
    journal: RefCell<Vec<FetchEvent>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture file: a JSON object mapping endpoint paths to bodies. A `null`
    /// body stands for an empty response.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::msg(format!("failed to read fixture {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|e| Error::msg(format!("fixture {} is not JSON: {e}", path.display())))?;
        let Some(routes) = value.as_object() else {
            return Err(Error::msg(format!(
                "fixture {} must be an object of path -> body",
                path.display()
            )));
        };
        let mut out = Self::new();
        for (route, body) in routes {
            out = match body {
                Value::Null => out.with_raw(route, ""),
                other => out.with_body(route, other.clone()),
            };
        }
        Ok(out)
    }

    pub fn with_body(self, path: &str, body: Value) -> Self {
        self.with_raw(path, &body.to_string())
    }

    pub fn with_raw(mut self, path: &str, body: &str) -> Self {
        self.routes
            .insert(normalize_path(path), Canned::Body(body.to_string()));
        self
    }

    pub fn with_failure(mut self, path: &str, reason: &str) -> Self {
        self.routes
            .insert(normalize_path(path), Canned::Fail(reason.to_string()));
        self
    }

    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_path(path), delay);
        self
    }

    pub fn journal(&self) -> Vec<FetchEvent> {
        self.journal.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.journal
            .borrow()
            .iter()
            .filter(|e| matches!(e, FetchEvent::Started(_)))
            .count()
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

#[async_trait(?Send)]
impl Transport for MemoryTransport {
    async fn fetch(&self, path: &str) -> Result<Option<Value>> {
        let path = normalize_path(path);
        self.journal
            .borrow_mut()
            .push(FetchEvent::Started(path.clone()));
        if let Some(delay) = self.delays.get(&path) {
            tokio::time::sleep(*delay).await;
        }
        self.journal
            .borrow_mut()
            .push(FetchEvent::Finished(path.clone()));
        match self.routes.get(&path) {
            Some(Canned::Body(text)) => parse_body(&path, text),
            Some(Canned::Fail(reason)) => Err(Error::msg(format!("GET {path} failed: {reason}"))),
            None => Err(Error::msg(format!("GET {path} failed with status 404 Not Found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn empty_body_is_no_data() {
        let t = MemoryTransport::new().with_raw("a/actual", "  ");
        assert_eq!(t.fetch("/a/actual").await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_and_unknown_routes_fail() {
        let t = MemoryTransport::new().with_raw("bad", "{not json");
        assert!(t.fetch("bad").await.is_err());
        assert!(t.fetch("missing").await.is_err());
        assert_eq!(t.request_count(), 2);
    }

    #[tokio::test]
    async fn fixture_file_routes_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        fs::write(
            &path,
            json!({"dispositivos": [{"id": "dev-01"}], "x/actual": null}).to_string(),
        )
        .unwrap();
        let t = MemoryTransport::from_fixture_file(&path).unwrap();
        assert_eq!(
            t.fetch("dispositivos").await.unwrap(),
            Some(json!([{"id": "dev-01"}]))
        );
        assert_eq!(t.fetch("x/actual").await.unwrap(), None);
    }

    #[test]
    fn http_urls_join_cleanly() {
        let t = HttpTransport::new("http://host/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(t.url_for("/dispositivos"), "http://host/api/dispositivos");
    }
}
