// Directory access seam for game nodes.
//
// `DirectoryClient` is the interface the coordinator talks to; the caller's
// identity is baked into the client (an opaque bearer credential on the
// remote implementation, a validated player id on the local one).
//
// Two implementations:
// - `LocalClient` — wraps an in-process `Directory`. Used by tests and by
//   setups where every node shares one registry.
// - `HttpClient` — blocking JSON-over-HTTP per the RPC table, for nodes
//   talking to a remote directory service.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DirectoryError;
use crate::registry::Directory;
use crate::session::{Outcome, PlayerId, Session, SessionKind, TurnMode};

/// One-shot request/response access to the session directory.
pub trait DirectoryClient: Send + Sync {
    fn create_session(
        &self,
        endpoint: &str,
        kind: SessionKind,
        turn_mode: TurnMode,
    ) -> Result<Session, DirectoryError>;

    fn join_session(&self, name: &str, endpoint: &str) -> Result<Session, DirectoryError>;

    fn get_session(&self, id: i64) -> Result<Session, DirectoryError>;

    fn list_sessions(&self, offset: usize, limit: usize) -> Result<Vec<Session>, DirectoryError>;

    fn finalize_outcome(&self, id: i64, outcome: Outcome) -> Result<Session, DirectoryError>;
}

/// In-process client: a registry handle plus the validated caller.
pub struct LocalClient {
    directory: Arc<Directory>,
    player: PlayerId,
}

impl LocalClient {
    pub fn new(directory: Arc<Directory>, player: PlayerId) -> Self {
        Self { directory, player }
    }
}

impl DirectoryClient for LocalClient {
    fn create_session(
        &self,
        endpoint: &str,
        kind: SessionKind,
        turn_mode: TurnMode,
    ) -> Result<Session, DirectoryError> {
        self.directory
            .create_session(self.player, endpoint, kind, turn_mode)
    }

    fn join_session(&self, name: &str, endpoint: &str) -> Result<Session, DirectoryError> {
        self.directory.join_session(self.player, name, endpoint)
    }

    fn get_session(&self, id: i64) -> Result<Session, DirectoryError> {
        self.directory.get_session(self.player, id)
    }

    fn list_sessions(&self, offset: usize, limit: usize) -> Result<Vec<Session>, DirectoryError> {
        self.directory.list_sessions(self.player, offset, limit)
    }

    fn finalize_outcome(&self, id: i64, outcome: Outcome) -> Result<Session, DirectoryError> {
        self.directory.finalize_outcome(self.player, id, outcome)
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    endpoint: &'a str,
    kind: SessionKind,
    turn_mode: TurnMode,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    name: &'a str,
    endpoint: &'a str,
}

#[derive(Serialize)]
struct FinalizeRequest {
    outcome: Outcome,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Blocking HTTP client for a remote directory service.
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// `base_url` without a trailing slash; `token` is the opaque bearer
    /// credential the service validates into a player id.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        debug!(method, %url, "directory rpc");
        self.agent
            .request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
    }

    fn read<T: serde::de::DeserializeOwned>(
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, DirectoryError> {
        match result {
            Ok(response) => response
                .into_json()
                .map_err(|err| DirectoryError::Transport(err.to_string())),
            Err(ureq::Error::Status(code, response)) => {
                if code == 401 {
                    return Err(DirectoryError::Auth);
                }
                match response.into_json::<ErrorBody>() {
                    Ok(body) => Err(DirectoryError::from_wire(&body.error)),
                    Err(_) => Err(DirectoryError::Transport(format!("http status {code}"))),
                }
            }
            Err(err) => Err(DirectoryError::Transport(err.to_string())),
        }
    }
}

impl DirectoryClient for HttpClient {
    fn create_session(
        &self,
        endpoint: &str,
        kind: SessionKind,
        turn_mode: TurnMode,
    ) -> Result<Session, DirectoryError> {
        let result = self.request("POST", "/play").send_json(CreateRequest {
            endpoint,
            kind,
            turn_mode,
        });
        Self::read(result)
    }

    fn join_session(&self, name: &str, endpoint: &str) -> Result<Session, DirectoryError> {
        let result = self
            .request("POST", "/enter-game")
            .send_json(JoinRequest { name, endpoint });
        Self::read(result)
    }

    fn get_session(&self, id: i64) -> Result<Session, DirectoryError> {
        Self::read(self.request("GET", &format!("/play/{id}")).call())
    }

    fn list_sessions(&self, offset: usize, limit: usize) -> Result<Vec<Session>, DirectoryError> {
        Self::read(
            self.request("GET", &format!("/play?offset={offset}&limit={limit}"))
                .call(),
        )
    }

    fn finalize_outcome(&self, id: i64, outcome: Outcome) -> Result<Session, DirectoryError> {
        let result = self
            .request("POST", &format!("/play/{id}/outcome"))
            .send_json(FinalizeRequest { outcome });
        Self::read(result)
    }
}
