//! Per-IP sender reputation tracking.
//!
//! The tracker only remembers what its [`ReputationSource`] last reported for
//! each address. The bundled [`StaticReputationSource`] reports a fixed status;
//! a real blocklist lookup plugs in behind the same trait.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;

/// Reputation of a sending address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReputationStatus {
    /// Safe to send from.
    Good,
    /// Listed or otherwise degraded.
    Poor,
    /// The source had no verdict.
    Unknown,
}

impl fmt::Display for ReputationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        })
    }
}

/// Last known reputation of one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationRecord {
    /// Address checked.
    pub ip: IpAddr,
    /// Status reported by the source.
    pub status: ReputationStatus,
    /// When the source was queried.
    pub checked_at: DateTime<Utc>,
}

/// Where reputation verdicts come from.
#[async_trait]
pub trait ReputationSource: Send + Sync + fmt::Debug {
    /// Looks up the current reputation of `ip`.
    async fn check(&self, ip: IpAddr) -> Result<ReputationStatus>;
}

/// Source that reports the same status for every address.
#[derive(Debug, Clone)]
pub struct StaticReputationSource {
    status: ReputationStatus,
}

impl StaticReputationSource {
    /// Source reporting `Good` for everything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: ReputationStatus::Good,
        }
    }

    /// Source reporting `status` for everything.
    #[must_use]
    pub const fn with_status(status: ReputationStatus) -> Self {
        Self { status }
    }
}

impl Default for StaticReputationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReputationSource for StaticReputationSource {
    async fn check(&self, _ip: IpAddr) -> Result<ReputationStatus> {
        Ok(self.status)
    }
}

/// In-memory map from address to its latest reputation record.
#[derive(Debug)]
pub struct ReputationTracker {
    source: Box<dyn ReputationSource>,
    records: HashMap<IpAddr, ReputationRecord>,
}

impl ReputationTracker {
    /// Creates an empty tracker backed by `source`.
    #[must_use]
    pub fn new(source: Box<dyn ReputationSource>) -> Self {
        Self {
            source,
            records: HashMap::new(),
        }
    }

    /// Queries the source for `ip` and stores the result, replacing any
    /// earlier record.
    ///
    /// # Errors
    ///
    /// Returns whatever the source fails with; the stored record is left
    /// untouched in that case.
    pub async fn monitor(&mut self, ip: IpAddr) -> Result<ReputationStatus> {
        let status = self.source.check(ip).await?;
        info!(%ip, %status, "reputation checked");
        self.records.insert(
            ip,
            ReputationRecord {
                ip,
                status,
                checked_at: Utc::now(),
            },
        );
        Ok(status)
    }

    /// Whether `ip` was monitored and found `Good`.
    #[must_use]
    pub fn is_reputation_good(&self, ip: IpAddr) -> bool {
        self.status(ip) == Some(ReputationStatus::Good)
    }

    /// Last status recorded for `ip`.
    #[must_use]
    pub fn status(&self, ip: IpAddr) -> Option<ReputationStatus> {
        self.records.get(&ip).map(|r| r.status)
    }

    /// Full record for `ip`.
    #[must_use]
    pub fn record(&self, ip: IpAddr) -> Option<&ReputationRecord> {
        self.records.get(&ip)
    }

    /// Number of monitored addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been monitored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ReputationTracker {
    fn default() -> Self {
        Self::new(Box::new(StaticReputationSource::new()))
    }
}
