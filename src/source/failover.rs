//! Ordered failover across package sources

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AllSourcesFailed, SourceError, SourceFailure};
use crate::source::registry::PackageRegistry;

/// Runs an operation against each source in order until one succeeds
#[derive(Clone)]
pub struct PackageSourceFailover {
    registries: Vec<Arc<dyn PackageRegistry>>,
}

impl PackageSourceFailover {
    pub fn new(registries: Vec<Arc<dyn PackageRegistry>>) -> Self {
        Self { registries }
    }

    /// Try `attempt` against every source in order.
    ///
    /// Per-source errors are collected and only returned, as one
    /// [`AllSourcesFailed`], once every source has failed.
    pub async fn first_success<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt: F,
    ) -> Result<T, AllSourcesFailed>
    where
        F: FnMut(Arc<dyn PackageRegistry>) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut failures = Vec::new();

        for registry in &self.registries {
            match attempt(registry.clone()).await {
                Ok(value) => {
                    if !failures.is_empty() {
                        debug!(
                            "{} succeeded on {} after {} failed source(s)",
                            operation,
                            registry.display_name(),
                            failures.len()
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let source_name = registry.display_name();
                    warn!("Failed to {} from {}: {}", operation, source_name, error);
                    failures.push(SourceFailure { source_name, error });
                }
            }
        }

        Err(AllSourcesFailed {
            operation: operation.to_string(),
            failures,
        })
    }
}
