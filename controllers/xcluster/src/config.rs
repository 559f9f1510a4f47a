//! Controller configuration.
//!
//! Everything is read once from environment variables at startup.

use crate::error::ControllerError;
use crate::reconciler::ReconcilerSettings;
use std::time::Duration;

const DEFAULT_REQUEUE_SECONDS: u64 = 10;
const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_RETRY_MIN_SECONDS: u64 = 5;
const DEFAULT_RETRY_MAX_SECONDS: u64 = 300;

/// Runtime configuration of the XCluster Controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// metal-api base URL (`METALCTL_URL`)
    pub metal_url: String,
    /// Bearer token for the metal-api (`METALCTL_API_TOKEN`)
    pub metal_token: String,
    /// Namespace to watch; all namespaces when `None` (`WATCH_NAMESPACE`)
    pub namespace: Option<String>,
    /// Delay before re-checking a resource that is not ready yet
    pub requeue_after: Duration,
    /// Max concurrent passes per controller
    pub concurrency: u16,
    pub retry_min: Duration,
    pub retry_max: Duration,
}

impl ControllerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of an
    /// environment variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "{} environment variable is required",
                        name
                    ))
                })
        };
        let seconds = |name: &str, default: u64| -> Result<Duration, ControllerError> {
            Ok(Duration::from_secs(parse_or(&lookup, name, default)?))
        };

        let config = Self {
            metal_url: required("METALCTL_URL")?,
            metal_token: required("METALCTL_API_TOKEN")?,
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            requeue_after: seconds("XCLUSTER_REQUEUE_SECONDS", DEFAULT_REQUEUE_SECONDS)?,
            concurrency: parse_or(&lookup, "XCLUSTER_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            retry_min: seconds("XCLUSTER_RETRY_MIN_SECONDS", DEFAULT_RETRY_MIN_SECONDS)?,
            retry_max: seconds("XCLUSTER_RETRY_MAX_SECONDS", DEFAULT_RETRY_MAX_SECONDS)?,
        };

        if config.retry_min.is_zero() || config.retry_min > config.retry_max {
            return Err(ControllerError::InvalidConfig(format!(
                "retry bounds must satisfy 0 < min <= max, got {}s and {}s",
                config.retry_min.as_secs(),
                config.retry_max.as_secs()
            )));
        }
        if config.concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "XCLUSTER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            requeue_after: self.requeue_after,
            retry_min: self.retry_min,
            retry_max: self.retry_max,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{}={:?} is not valid: {}", name, raw, e))
        }),
    }
}
