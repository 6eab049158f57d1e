//! Scripted network for exercising the controller without sockets.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use crate::Error;
use crate::network::{Network, Request, Response};

#[derive(Debug, Clone)]
enum Scripted {
    Respond { final_path: Option<String>, status: u16, content_type: String, body: Bytes },
    Fail,
    Hang,
}

/// Network double keyed by URL path.
///
/// Unscripted paths fail like an unreachable host.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    gated: Mutex<HashSet<String>>,
    gate_open: AtomicBool,
    gate: Notify,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` with the given status and body.
    pub fn respond(&self, path: &str, status: u16, content_type: &str, body: &str) {
        self.script(
            path,
            Scripted::Respond {
                final_path: None,
                status,
                content_type: content_type.to_string(),
                body: Bytes::from(body.to_string()),
            },
        );
    }

    /// Answer `path` as if it had been redirected to `final_path`.
    pub fn respond_redirected(&self, path: &str, final_path: &str, status: u16, content_type: &str, body: &str) {
        self.script(
            path,
            Scripted::Respond {
                final_path: Some(final_path.to_string()),
                status,
                content_type: content_type.to_string(),
                body: Bytes::from(body.to_string()),
            },
        );
    }

    /// Fail `path` with a transport error.
    pub fn fail(&self, path: &str) {
        self.script(path, Scripted::Fail);
    }

    /// Never answer `path`.
    pub fn hang(&self, path: &str) {
        self.script(path, Scripted::Hang);
    }

    /// Fail every request while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold requests for `path` until [`ScriptedNetwork::open_gate`].
    pub fn gate(&self, path: &str) {
        self.gate_open.store(false, Ordering::SeqCst);
        self.gated.lock().unwrap().insert(path.to_string());
    }

    /// Let every held request through.
    pub fn open_gate(&self) {
        self.gate_open.store(true, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Paths requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn script(&self, path: &str, scripted: Scripted) {
        self.routes.lock().unwrap().insert(path.to_string(), scripted);
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(path.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }

        let held = self.gated.lock().unwrap().contains(&path);
        if held {
            loop {
                let released = self.gate.notified();
                if self.gate_open.load(Ordering::SeqCst) {
                    break;
                }
                released.await;
            }
        }

        let scripted = self.routes.lock().unwrap().get(&path).cloned();
        match scripted {
            Some(Scripted::Respond { final_path, status, content_type, body }) => {
                let url = match final_path {
                    Some(p) => request.url.join(&p).map_err(|e| Error::InvalidUrl(e.to_string()))?,
                    None => request.url.clone(),
                };
                Ok(Response {
                    url,
                    status,
                    content_type: Some(content_type.clone()),
                    headers: vec![("content-type".to_string(), content_type)],
                    body,
                })
            }
            Some(Scripted::Hang) => std::future::pending().await,
            Some(Scripted::Fail) | None => Err(Error::Network(format!("connection refused: {}", request.url))),
        }
    }
}
