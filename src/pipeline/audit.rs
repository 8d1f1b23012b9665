// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail of pipeline events for a single request.

use std::sync::Mutex;
use std::time::Instant;

use crate::clock::SharedClock;
use crate::error::PipelineFailure;

/// One event in a request's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    SniffOnStartup,
    SniffOnFail,
    SniffOnStaleCluster,
    SniffSuccess,
    SniffFailure,
    PingSuccess,
    PingFailure,
    HealthyResponse,
    BadResponse,
    BadRequest,
    MaxRetriesReached,
    MaxTimeoutReached,
    FailedOverAllNodes,
    NoNodesAttempted,
    CancellationRequested,
    Resurrection,
}

impl AuditEvent {
    #[must_use]
    pub fn from_pipeline_failure(failure: PipelineFailure) -> Option<Self> {
        match failure {
            PipelineFailure::MaxRetriesReached => Some(Self::MaxRetriesReached),
            PipelineFailure::MaxTimeoutReached => Some(Self::MaxTimeoutReached),
            PipelineFailure::NoNodesAttempted => Some(Self::NoNodesAttempted),
            PipelineFailure::Cancelled => Some(Self::CancellationRequested),
            _ => None,
        }
    }
}

/// A single recorded audit entry: the event, when it happened, and the node
/// and path it pertains to, if any.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub timestamp: Instant,
    pub node: Option<String>,
    pub path_and_query: Option<String>,
    pub exception: Option<String>,
}

/// The ordered, append-only trail of events produced while serving one request.
///
/// Timestamps are drawn from the pipeline's configured [`crate::clock::Clock`]
/// so that tests can assert monotonic ordering deterministically.
#[derive(Debug)]
pub struct Auditor {
    clock: SharedClock,
    entries: Mutex<Vec<AuditEntry>>,
}

impl Auditor {
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(
        &self,
        event: AuditEvent,
        node: Option<&str>,
        path_and_query: Option<&str>,
        exception: Option<String>,
    ) {
        let entry = AuditEntry {
            event,
            timestamp: self.clock.now(),
            node: node.map(str::to_string),
            path_and_query: path_and_query.map(str::to_string),
            exception,
        };
        self.entries.lock().unwrap().push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    #[must_use]
    pub fn contains(&self, event: AuditEvent) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e.event == event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    #[test]
    fn records_events_in_order_with_monotonic_timestamps() {
        let clock = MockClock::new();
        let auditor = Auditor::new(clock.clone());
        auditor.record(AuditEvent::SniffOnStartup, None, None, None);
        clock.advance(std::time::Duration::from_millis(5));
        auditor.record(AuditEvent::SniffSuccess, None, None, None);
        clock.advance(std::time::Duration::from_millis(5));
        auditor.record(AuditEvent::HealthyResponse, Some("http://localhost:9200"), Some("/"), None);

        let entries = auditor.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event, AuditEvent::SniffOnStartup);
        assert_eq!(entries[2].node.as_deref(), Some("http://localhost:9200"));
        assert!(entries[0].timestamp <= entries[1].timestamp);
        assert!(entries[1].timestamp <= entries[2].timestamp);
        assert!(auditor.contains(AuditEvent::SniffSuccess));
        assert!(!auditor.contains(AuditEvent::BadResponse));
    }
}
