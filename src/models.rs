use chrono::{DateTime, FixedOffset};

use crate::pseudonym::{hash, Digest};

/// Which logical server produced the request, so several servers can share one database.
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct ServerIdentity {
    pub vhost: String,
    pub port: u16,
}

/// The visitor-identifying part of a line. Values are raw here and only ever
/// reach the `log` table as digests.
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct UserIdentity {
    pub remote: String,
    pub referer: String,
    pub agent: String,
}

impl UserIdentity {
    pub fn hashed_remote(&self) -> Digest {
        hash(&self.remote)
    }

    pub fn hashed_referer(&self) -> Digest {
        hash(&self.referer)
    }

    pub fn hashed_agent(&self) -> Digest {
        hash(&self.agent)
    }
}

#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct RequestFacts {
    pub time: DateTime<FixedOffset>,
    pub method: String,
    pub path: String,
    pub params: String,
    pub http: String,
    pub status: u16,
    pub bytes: i64,
}

#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct LogRecord {
    pub server: ServerIdentity,
    pub user: UserIdentity,
    pub request: RequestFacts,
}
