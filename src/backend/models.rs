//! Control API payloads

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v2/auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

/// Response of `POST /api/v2/auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub data: LoginData,
}

/// Session data of a successful login; other fields are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub token: String,
}

/// One managed server as listed by `GET /api/v2/servers`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub server_id: String,
    pub server_port: u16,
}

/// Response of `GET /api/v2/servers`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerList {
    #[serde(default)]
    pub data: Vec<ServerEntry>,
}

impl ServerList {
    /// Find the server listening on `port`
    pub fn by_port(&self, port: u16) -> Option<&ServerEntry> {
        self.data.iter().find(|server| server.server_port == port)
    }
}

// Older control API releases send numeric ids.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
