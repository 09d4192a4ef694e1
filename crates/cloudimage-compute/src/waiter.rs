//! Resource lifecycle waiter
//!
//! Turns the control plane's "accepted, check back later" semantics into a
//! call that returns once the resource has settled, failed, or the deadline
//! has passed. Every wait is built on [`Waiter::poll`]; the named variants
//! only differ in the predicate they hand it.

use crate::client::ComputeClient;
use crate::error::{ComputeError, Result};
use crate::model::{Resource, ResourceKind, ResourceState, Server};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Default interval between two polls of the same resource
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How a single observation of a resource should be treated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settle {
    /// Not there yet; poll again.
    Pending,
    /// Target reached; return the observed resource.
    Reached,
    /// Resource is gone and that was the goal.
    Gone,
    /// Terminal failure; stop polling and report the reason.
    Failed(String),
}

/// Bounded, cancellable polling of a single resource
#[derive(Clone)]
pub struct Waiter {
    client: Arc<dyn ComputeClient>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Waiter {
    pub fn new(client: Arc<dyn ComputeClient>, cancel: CancellationToken) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `kind`/`id` until `check` says the wait is over.
    ///
    /// Sleeps never extend past the deadline: the last poll happens at the
    /// deadline at the latest. Cancellation is observed while sleeping.
    ///
    /// # Returns
    /// * `Ok(Some(resource))` - `check` returned [`Settle::Reached`]
    /// * `Ok(None)` - `check` returned [`Settle::Gone`]
    /// * `Err(ComputeError::ResourceFailed)` - `check` returned [`Settle::Failed`]
    /// * `Err(ComputeError::Timeout)` - deadline elapsed
    /// * `Err(ComputeError::Cancelled)` - cancellation was requested
    pub async fn poll<F>(
        &self,
        kind: ResourceKind,
        id: &str,
        expected: &str,
        timeout: Duration,
        mut check: F,
    ) -> Result<Option<Resource>>
    where
        F: FnMut(Option<&Resource>) -> Settle + Send,
    {
        let deadline = Instant::now() + timeout;
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ComputeError::Cancelled);
            }

            attempt += 1;
            let resource = self.client.get_resource(kind, id).await?;

            match check(resource.as_ref()) {
                Settle::Reached => {
                    tracing::debug!("{} '{}' reached {} after {} poll(s)", kind, id, expected, attempt);
                    return Ok(resource);
                }
                Settle::Gone => {
                    tracing::debug!("{} '{}' is gone after {} poll(s)", kind, id, attempt);
                    return Ok(None);
                }
                Settle::Failed(reason) => {
                    let state = resource
                        .as_ref()
                        .map(|r| r.state())
                        .unwrap_or(ResourceState::Unknown);
                    return Err(ComputeError::ResourceFailed {
                        kind,
                        id: id.to_string(),
                        state,
                        reason,
                    });
                }
                Settle::Pending => {
                    if let Some(resource) = &resource {
                        tracing::debug!(
                            "{} '{}' is {} (waiting for {})",
                            kind,
                            id,
                            resource.state(),
                            expected
                        );
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ComputeError::Timeout {
                    kind,
                    id: id.to_string(),
                    expected: expected.to_string(),
                    timeout,
                });
            }

            let delay = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ComputeError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }

    /// Wait until the resource's state equals `expected`.
    pub async fn wait_for(
        &self,
        kind: ResourceKind,
        id: &str,
        expected: ResourceState,
        timeout: Duration,
    ) -> Result<Resource> {
        let resource = self
            .poll(kind, id, &expected.to_string(), timeout, |resource| {
                match resource {
                    None => Settle::Failed(format!("{} '{}' no longer exists", kind, id)),
                    Some(r) if r.state() == expected => Settle::Reached,
                    Some(r) if r.state().is_failed() => Settle::Failed(failure_reason(r)),
                    Some(_) => Settle::Pending,
                }
            })
            .await?;

        resource.ok_or_else(|| ComputeError::ResourceNotFound(format!("{} '{}'", kind, id)))
    }

    /// Wait for a newly created resource to finish deploying.
    pub async fn wait_for_deploy(
        &self,
        kind: ResourceKind,
        id: &str,
        timeout: Duration,
    ) -> Result<Resource> {
        self.wait_for(kind, id, ResourceState::Normal, timeout).await
    }

    /// Wait for an in-place change (shutdown, export, ...) to complete.
    pub async fn wait_for_change(
        &self,
        kind: ResourceKind,
        id: &str,
        action_description: &str,
        timeout: Duration,
    ) -> Result<Resource> {
        tracing::debug!("Waiting for {} on {} '{}'", action_description, kind, id);
        self.wait_for(kind, id, ResourceState::Normal, timeout).await
    }

    /// Wait until the resource can no longer be found.
    pub async fn wait_for_delete(&self, kind: ResourceKind, id: &str, timeout: Duration) -> Result<()> {
        self.poll(kind, id, "deleted", timeout, |resource| match resource {
            None => Settle::Gone,
            Some(r) if r.state().is_failed() => Settle::Failed(failure_reason(r)),
            Some(_) => Settle::Pending,
        })
        .await?;

        Ok(())
    }

    /// Wait for a server to finish a graceful shutdown.
    pub async fn wait_for_shutdown(&self, server_id: &str, timeout: Duration) -> Result<Server> {
        let resource = self
            .poll(ResourceKind::Server, server_id, "shut down", timeout, |resource| {
                match resource {
                    None => Settle::Failed(format!("server '{}' no longer exists", server_id)),
                    Some(Resource::Server(server)) if server.is_shut_down() => Settle::Reached,
                    Some(r) if r.state().is_failed() => Settle::Failed(failure_reason(r)),
                    Some(_) => Settle::Pending,
                }
            })
            .await?;

        resource
            .and_then(Resource::into_server)
            .ok_or_else(|| ComputeError::ResourceNotFound(format!("server '{}'", server_id)))
    }
}

fn failure_reason(resource: &Resource) -> String {
    resource
        .failure_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("control plane reports state {}", resource.state()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerImage, Progress};
    use crate::testing::{FakeCompute, Then};

    fn waiter(fake: &Arc<FakeCompute>) -> Waiter {
        Waiter::new(fake.clone(), CancellationToken::new())
    }

    fn server(id: &str, state: ResourceState) -> Resource {
        Resource::Server(Server {
            id: id.to_string(),
            name: format!("server-{}", id),
            state,
            started: true,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_deploy_reaches_normal() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingAdd), 3, Then::Settle);

        let resource = waiter(&fake)
            .wait_for_deploy(ResourceKind::Server, "srv-1", Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(resource.state(), ResourceState::Normal);
        assert_eq!(fake.poll_count(ResourceKind::Server, "srv-1"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_reports_failure_reason() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(
            Resource::CustomerImage(CustomerImage {
                id: "img-1".to_string(),
                name: "img-B".to_string(),
                state: ResourceState::PendingAdd,
                progress: Some(Progress {
                    action: Some("CLONE_SERVER".to_string()),
                    failure_reason: Some("Disk snapshot failed".to_string()),
                }),
                ..Default::default()
            }),
            1,
            Then::Fail(ResourceState::FailedAdd),
        );

        let err = waiter(&fake)
            .wait_for_deploy(ResourceKind::CustomerImage, "img-1", Duration::from_secs(600))
            .await
            .unwrap_err();

        match err {
            ComputeError::ResourceFailed { state, reason, .. } => {
                assert_eq!(state, ResourceState::FailedAdd);
                assert_eq!(reason, "Disk snapshot failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingAdd), u32::MAX, Then::Settle);

        let started = Instant::now();
        let err = waiter(&fake)
            .wait_for_deploy(ResourceKind::Server, "srv-1", Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(err, ComputeError::Timeout { .. }));
        // The final poll happens at the deadline, never an interval past it.
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_is_clamped_to_deadline() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingAdd), u32::MAX, Then::Settle);

        let started = Instant::now();
        let err = waiter(&fake)
            .with_poll_interval(Duration::from_secs(7))
            .wait_for_deploy(ResourceKind::Server, "srv-1", Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(err, ComputeError::Timeout { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(fake.poll_count(ResourceKind::Server, "srv-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_delete_succeeds_when_gone() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingDelete), 2, Then::Remove);

        waiter(&fake)
            .wait_for_delete(ResourceKind::Server, "srv-1", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(fake.server("srv-1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_missing_resource_fails() {
        let fake = Arc::new(FakeCompute::new());

        let err = waiter(&fake)
            .wait_for_deploy(ResourceKind::Server, "nope", Duration::from_secs(600))
            .await
            .unwrap_err();

        assert!(matches!(err, ComputeError::ResourceFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_observed_within_one_interval() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingAdd), u32::MAX, Then::Settle);

        let cancel = CancellationToken::new();
        let waiter = Waiter::new(fake.clone(), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = waiter
            .wait_for_deploy(ResourceKind::Server, "srv-1", Duration::from_secs(1200))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() <= Duration::from_secs(12) + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_shutdown() {
        let fake = Arc::new(FakeCompute::new());
        fake.track(server("srv-1", ResourceState::PendingChange), 2, Then::ShutDown);

        let server = waiter(&fake)
            .wait_for_shutdown("srv-1", Duration::from_secs(300))
            .await
            .unwrap();

        assert!(server.is_shut_down());
    }
}
