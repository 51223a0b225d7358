pub mod circuit_breaker;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
pub use retry::{retry, retry_with_policy, RetryConfig, RetryPolicy};
pub use timeout::{TimeoutConfig, TimeoutExt};
