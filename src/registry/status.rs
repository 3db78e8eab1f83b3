//! Wire-level status types.
//!
//! These are the JSON payloads exchanged with services: heartbeat reports,
//! notices and the request/response bodies of the query methods.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Liveness state reported by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Starting,
    /// Healthy.
    Online,
    /// Presumed failed. Revivable by a later report.
    Offline,
    Stopping,
    /// Graceful exit. Terminal.
    Stopped,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Starting => "starting",
            State::Online => "online",
            State::Offline => "offline",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starting" => Ok(State::Starting),
            "online" => Ok(State::Online),
            "offline" => Ok(State::Offline),
            "stopping" => Ok(State::Stopping),
            "stopped" => Ok(State::Stopped),
            other => Err(format!("unknown state: {}", other)),
        }
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// A heartbeat report, and the snapshot returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Unique service name.
    pub name: String,

    /// Integer classification of the service.
    #[serde(default)]
    pub domain: i32,

    pub state: State,

    #[serde(default)]
    pub ready: bool,

    /// Heartbeat period override in seconds. 0 keeps the current value.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub check_interval: u32,

    /// Missed-interval tolerance override. 0 keeps the current value.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub allow_failures: u32,

    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub time: u64,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>, state: State) -> Self {
        Self {
            name: name.into(),
            domain: 0,
            state,
            ready: false,
            check_interval: 0,
            allow_failures: 0,
            time: 0,
        }
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_domain(mut self, domain: i32) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_check_interval(mut self, secs: u32) -> Self {
        self.check_interval = secs;
        self
    }

    pub fn with_allow_failures(mut self, failures: u32) -> Self {
        self.allow_failures = failures;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatusReq {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatusRsp {
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStatusListReq {
    /// Names to report on. Absent or empty means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusList {
    #[serde(default)]
    pub services: Vec<ServiceStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStatusListRsp {
    pub list: StatusList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_report_decodes() {
        let status: ServiceStatus =
            serde_json::from_str(r#"{"name":"alpha","state":"online"}"#).unwrap();
        assert_eq!(status.name, "alpha");
        assert_eq!(status.state, State::Online);
        assert!(!status.ready);
        assert_eq!(status.check_interval, 0);
    }

    #[test]
    fn test_overrides_use_camel_case() {
        let status = ServiceStatus::new("alpha", State::Online)
            .with_check_interval(2)
            .with_allow_failures(4);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["checkInterval"], 2);
        assert_eq!(json["allowFailures"], 4);

        let bare = serde_json::to_value(ServiceStatus::new("beta", State::Stopped)).unwrap();
        assert!(bare.get("checkInterval").is_none());
        assert_eq!(bare["state"], "stopped");
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!("Online".parse::<State>(), Ok(State::Online));
        assert!("zombie".parse::<State>().is_err());
    }

    #[test]
    fn test_list_request_observed_is_optional() {
        let req: QueryStatusListReq = serde_json::from_str("{}").unwrap();
        assert!(req.observed.is_none());
    }
}
