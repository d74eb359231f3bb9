//! Request client that answers from a recorded fixture.
//!
//! A fixture is a JSON document listing request/answer exchanges. Each
//! incoming request is matched against the first unused exchange whose
//! request equals it once the takeout and range wrappers are removed.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, Request, RequestClient, Response, Result, RpcError};

const NO_MATCH: &str = "REPLAY_NO_MATCH";

/// Recorded answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Response(Response),
    Error(RpcError),
}

/// One request together with how the server answered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub request: Request,
    #[serde(flatten)]
    pub reply: Reply,
    /// Simulated latency before answering.
    #[serde(default)]
    pub delay_ms: u64,
    /// Answer every matching request instead of only the first.
    #[serde(default)]
    pub repeat: bool,
}

impl Exchange {
    #[must_use]
    pub const fn response(request: Request, response: Response) -> Self {
        Self {
            request,
            reply: Reply::Response(response),
            delay_ms: 0,
            repeat: false,
        }
    }

    #[must_use]
    pub const fn error(request: Request, error: RpcError) -> Self {
        Self {
            request,
            reply: Reply::Error(error),
            delay_ms: 0,
            repeat: false,
        }
    }

    #[must_use]
    pub const fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub const fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Fixture {
    exchanges: Vec<Exchange>,
}

#[derive(Debug)]
struct Slot {
    exchange: Exchange,
    used: bool,
}

#[derive(Debug, Default)]
struct ReplayState {
    slots: Vec<Slot>,
    log: Vec<Request>,
}

/// Replays exchanges in place of a live connection.
#[derive(Debug, Default)]
pub struct ReplayClient {
    state: Mutex<ReplayState>,
}

impl ReplayClient {
    #[must_use]
    pub fn new(exchanges: Vec<Exchange>) -> Self {
        let slots = exchanges
            .into_iter()
            .map(|exchange| Slot {
                exchange,
                used: false,
            })
            .collect();
        Self {
            state: Mutex::new(ReplayState {
                slots,
                log: Vec::new(),
            }),
        }
    }

    /// Load a fixture file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a valid fixture.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::io("Failed to read replay fixture", path, e))?;
        let fixture: Fixture = serde_json::from_str(&content).map_err(AppError::json_parse)?;
        tracing::debug!(
            path = %path.display(),
            exchanges = fixture.exchanges.len(),
            "Loaded replay fixture"
        );
        Ok(Self::new(fixture.exchanges))
    }

    /// Every request received so far, wrappers included.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .clone()
    }

    /// Exchanges that were never used.
    #[must_use]
    pub fn unused(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .iter()
            .filter(|slot| !slot.used && !slot.exchange.repeat)
            .count()
    }

    fn take_reply(&self, request: &Request) -> Option<(Reply, u64)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.log.push(request.clone());
        let inner = request.inner();
        let slot = state
            .slots
            .iter_mut()
            .find(|slot| (slot.exchange.repeat || !slot.used) && slot.exchange.request == *inner)?;
        slot.used = true;
        Some((slot.exchange.reply.clone(), slot.exchange.delay_ms))
    }
}

#[async_trait]
impl RequestClient for ReplayClient {
    async fn send(&self, request: Request) -> std::result::Result<Response, RpcError> {
        let Some((reply, delay_ms)) = self.take_reply(&request) else {
            tracing::warn!(request = ?request.inner(), "No recorded exchange for request");
            return Err(RpcError::new(400, NO_MATCH));
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Error(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_matches_unwrapped_request_once() {
        let client = ReplayClient::new(vec![Exchange::response(
            Request::GetContacts,
            Response::Contacts { list: vec![] },
        )]);
        let answer = client
            .send(Request::GetContacts.with_takeout(9))
            .await
            .unwrap();
        assert_eq!(answer, Response::Contacts { list: vec![] });

        let error = client.send(Request::GetContacts).await.unwrap_err();
        assert_eq!(error.kind, NO_MATCH);
        assert_eq!(client.requests().len(), 2);
        assert_eq!(client.unused(), 0);
    }

    #[tokio::test]
    async fn test_repeated_exchange_answers_every_time() {
        let client = ReplayClient::new(vec![Exchange::response(
            Request::FinishTakeoutSession { success: true },
            Response::Ok,
        )
        .repeated()]);
        for _ in 0..3 {
            let answer = client
                .send(Request::FinishTakeoutSession { success: true })
                .await;
            assert_eq!(answer, Ok(Response::Ok));
        }
    }

    #[tokio::test]
    async fn test_fixture_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        let fixture = r#"{
            "exchanges": [
                {"request": {"method": "get_self"}, "error": {"code": 401, "type": "AUTH_KEY_UNREGISTERED"}},
                {"request": {"method": "finish_takeout_session", "success": true}, "response": {"shape": "ok"}}
            ]
        }"#;
        fs::write(&path, fixture).unwrap();

        let client = ReplayClient::from_file(&path).unwrap();
        let error = client.send(Request::GetSelf).await.unwrap_err();
        assert_eq!(error, RpcError::new(401, "AUTH_KEY_UNREGISTERED"));
        let answer = client
            .send(Request::FinishTakeoutSession { success: true })
            .await
            .unwrap();
        assert_eq!(answer, Response::Ok);
    }

    #[test]
    fn test_missing_fixture_is_local_error() {
        let error = ReplayClient::from_file(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert_eq!(error.kind(), crate::domain::ErrorKind::Local);
    }
}
