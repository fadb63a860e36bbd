//! Lifecycle contract shared by the automation, import and reconciliation
//! services.
//!
//! The registry drives `init`/`shutdown`; the health endpoint reads
//! [`Service::health`].

use serde::Serialize;

use fp_core::error::FpResult;

/// Where a service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Created,
    Running,
    /// Running without an external provider it would normally use.
    /// Local work (CRUD, CSV upload, previews) still succeeds.
    Degraded,
    Stopped,
    Failed,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether requests can be served in this state.
    pub fn is_serving(self) -> bool {
        matches!(self, Self::Running | Self::Degraded)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the health report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub state: ServiceState,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    /// Called once by the registry before any request is served.
    fn init(&mut self) -> FpResult<()>;

    fn shutdown(&mut self) -> FpResult<()>;

    /// What is missing while the service runs degraded.
    fn degraded_reason(&self) -> Option<&str> {
        None
    }

    fn is_healthy(&self) -> bool {
        self.state().is_serving()
    }

    fn health(&self) -> ServiceHealth {
        let state = self.state();
        ServiceHealth {
            name: self.name().to_string(),
            state,
            healthy: self.is_healthy(),
            detail: match state {
                ServiceState::Degraded => self.degraded_reason().map(str::to_string),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FeedService {
        state: ServiceState,
        has_feed: bool,
    }

    impl Service for FeedService {
        fn name(&self) -> &str {
            "feed"
        }
        fn state(&self) -> ServiceState {
            self.state
        }
        fn init(&mut self) -> FpResult<()> {
            self.state = if self.has_feed { ServiceState::Running } else { ServiceState::Degraded };
            Ok(())
        }
        fn shutdown(&mut self) -> FpResult<()> {
            self.state = ServiceState::Stopped;
            Ok(())
        }
        fn degraded_reason(&self) -> Option<&str> {
            (!self.has_feed).then_some("no feed configured")
        }
    }

    #[test]
    fn test_lifecycle_health() {
        let mut svc = FeedService { state: ServiceState::Created, has_feed: true };
        assert!(!svc.is_healthy());
        svc.init().unwrap();
        let health = svc.health();
        assert!(health.healthy);
        assert_eq!(health.state, ServiceState::Running);
        assert!(health.detail.is_none());
        svc.shutdown().unwrap();
        assert!(!svc.is_healthy());
    }

    #[test]
    fn test_degraded_reports_reason() {
        let mut svc = FeedService { state: ServiceState::Created, has_feed: false };
        svc.init().unwrap();
        let health = svc.health();
        assert!(health.healthy);
        assert_eq!(health.detail.as_deref(), Some("no feed configured"));

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["detail"], "no feed configured");
    }

    #[test]
    fn test_stopped_hides_reason() {
        let mut svc = FeedService { state: ServiceState::Created, has_feed: false };
        svc.init().unwrap();
        svc.shutdown().unwrap();
        assert!(svc.health().detail.is_none());
        assert_eq!(svc.state().to_string(), "stopped");
    }
}
