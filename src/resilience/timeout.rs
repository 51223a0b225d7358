use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Timeout configuration for provider operations (SPEC_FULL.md §5: 30s
/// default, configurable per provider).
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub default_timeout: Duration,
    pub network_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            network_timeout: Duration::from_secs(10),
        }
    }
}

impl TimeoutConfig {
    pub fn fast() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            network_timeout: Duration::from_secs(3),
        }
    }

    pub fn slow() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            network_timeout: Duration::from_secs(30),
        }
    }

    pub fn get_timeout(&self, operation_type: TimeoutType) -> Duration {
        match operation_type {
            TimeoutType::Default => self.default_timeout,
            TimeoutType::Network => self.network_timeout,
            TimeoutType::Custom(duration) => duration,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TimeoutType {
    Default,
    Network,
    Custom(Duration),
}

/// Extension trait to add timeout functionality to futures
pub trait TimeoutExt<T> {
    async fn with_timeout(self) -> Result<T>;
    async fn with_timeout_duration(self, duration: Duration) -> Result<T>;
    async fn with_timeout_type(self, timeout_type: TimeoutType, config: &TimeoutConfig) -> Result<T>;
}

impl<F, T> TimeoutExt<T> for F
where
    F: Future<Output = T>,
{
    async fn with_timeout(self) -> Result<T> {
        self.with_timeout_duration(TimeoutConfig::default().default_timeout).await
    }

    async fn with_timeout_duration(self, duration: Duration) -> Result<T> {
        match timeout(duration, self).await {
            Ok(result) => Ok(result),
            Err(_) => Err(Error::Timeout { timeout: duration }),
        }
    }

    async fn with_timeout_type(self, timeout_type: TimeoutType, config: &TimeoutConfig) -> Result<T> {
        let duration = config.get_timeout(timeout_type);
        self.with_timeout_duration(duration).await
    }
}

/// Wraps a fallible operation with timeout tracking and logging.
pub struct TimeoutWrapper {
    config: TimeoutConfig,
    operation_name: String,
}

impl TimeoutWrapper {
    pub fn new(operation_name: impl Into<String>, config: TimeoutConfig) -> Self {
        Self { config, operation_name: operation_name.into() }
    }

    pub async fn execute<F, Fut, T>(&self, operation: F, timeout_type: TimeoutType) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout_duration = self.config.get_timeout(timeout_type.clone());
        let start_time = Instant::now();

        debug!("starting operation '{}' with timeout {:?}", self.operation_name, timeout_duration);

        match timeout(timeout_duration, operation()).await {
            Ok(Ok(value)) => {
                debug!("operation '{}' completed in {:?}", self.operation_name, start_time.elapsed());
                Ok(value)
            }
            Ok(Err(error)) => {
                debug!("operation '{}' failed after {:?}: {}", self.operation_name, start_time.elapsed(), error);
                Err(error)
            }
            Err(_) => {
                warn!("operation '{}' timed out after {:?}", self.operation_name, timeout_duration);
                Err(Error::Timeout { timeout: timeout_duration })
            }
        }
    }

    pub async fn execute_with_timeout<F, Fut, T>(&self, operation: F, custom_timeout: Duration) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::Custom(custom_timeout)).await
    }

    pub async fn execute_network<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::Network).await
    }
}

/// Coordinates timeout configuration across providers and the orchestrator.
pub struct TimeoutManager {
    config: TimeoutConfig,
}

impl TimeoutManager {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn wrapper(&self, operation_name: impl Into<String>) -> TimeoutWrapper {
        TimeoutWrapper::new(operation_name, self.config.clone())
    }

    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F, timeout_type: TimeoutType) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.wrapper(operation_name).execute(operation, timeout_type).await
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: TimeoutConfig) {
        self.config = config;
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new(TimeoutConfig::default())
    }
}

pub mod convenience {
    use super::*;

    pub async fn with_default_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        future.with_timeout().await
    }

    pub async fn with_network_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let config = TimeoutConfig::default();
        future.with_timeout_duration(config.network_timeout).await
    }

    pub async fn with_timeout_and_logging<F, T>(future: F, timeout_duration: Duration, operation_name: &str) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let wrapper = TimeoutWrapper::new(operation_name, TimeoutConfig::default());
        wrapper.execute_with_timeout(|| future, timeout_duration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_timeout_ext_success() {
        let result = async { 42 }.with_timeout_duration(Duration::from_millis(100)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_ext_timeout() {
        let result = async {
            sleep(Duration::from_millis(200)).await;
            42
        }
        .with_timeout_duration(Duration::from_millis(100))
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_timeout_wrapper() {
        let config = TimeoutConfig::fast();
        let wrapper = TimeoutWrapper::new("test_operation", config);

        let result = wrapper.execute(|| async { Ok::<i32, Error>(42) }, TimeoutType::Default).await;
        assert_eq!(result.unwrap(), 42);

        let result = wrapper
            .execute(
                || async {
                    sleep(Duration::from_secs(10)).await;
                    Ok::<i32, Error>(42)
                },
                TimeoutType::Default,
            )
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_timeout_manager() {
        let manager = TimeoutManager::new(TimeoutConfig::fast());

        let result = manager.execute("test_op", || async { Ok::<i32, Error>(42) }, TimeoutType::Network).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_types() {
        let config = TimeoutConfig::default();

        assert_eq!(config.get_timeout(TimeoutType::Default), config.default_timeout);
        assert_eq!(config.get_timeout(TimeoutType::Network), config.network_timeout);

        let custom_duration = Duration::from_secs(99);
        assert_eq!(config.get_timeout(TimeoutType::Custom(custom_duration)), custom_duration);
    }

    #[tokio::test]
    async fn test_convenience_functions() {
        use super::convenience::*;

        let result = with_default_timeout(async { 42 }).await;
        assert_eq!(result.unwrap(), 42);

        let result = with_network_timeout(async { 42 }).await;
        assert_eq!(result.unwrap(), 42);

        let result = with_timeout_and_logging(async { Ok::<i32, Error>(42) }, Duration::from_millis(100), "test_operation").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_config_presets() {
        let fast = TimeoutConfig::fast();
        assert!(fast.default_timeout < TimeoutConfig::default().default_timeout);

        let slow = TimeoutConfig::slow();
        assert!(slow.default_timeout > TimeoutConfig::default().default_timeout);
    }
}
