use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Answers "what is in focus right now?".
///
/// Called once per sampling interval under a timeout; dropping the future must
/// abandon the query. `Ok(None)` means nothing identifiable was focused; errors
/// are logged by the caller and dropped.
#[async_trait]
pub trait ActivitySampler: Send + Sync + 'static {
    async fn current_focus(&self) -> Result<Option<String>>;
}

/// Plain closures run inline on the runtime, so they must not block.
#[async_trait]
impl<F> ActivitySampler for F
where
    F: Fn() -> Result<Option<String>> + Send + Sync + 'static,
{
    async fn current_focus(&self) -> Result<Option<String>> {
        self()
    }
}

/// Query `sampler`, giving up after `timeout`. Blank labels come back as `None`.
pub async fn sample_with_timeout(
    sampler: Arc<dyn ActivitySampler>,
    timeout: Duration,
) -> Result<Option<String>> {
    let label = tokio::time::timeout(timeout, sampler.current_focus())
        .await
        .map_err(|_| anyhow!("sampler timed out after {}ms", timeout.as_millis()))??;

    Ok(label
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_closure_sampler_label_is_trimmed() {
        let sampler: Arc<dyn ActivitySampler> =
            Arc::new(|| -> Result<Option<String>> { Ok(Some("  Editor  ".to_string())) });
        let label = sample_with_timeout(sampler, Duration::from_secs(1)).await.unwrap();
        assert_eq!(label.as_deref(), Some("Editor"));
    }

    #[tokio::test]
    async fn test_blank_label_is_none() {
        let sampler: Arc<dyn ActivitySampler> =
            Arc::new(|| -> Result<Option<String>> { Ok(Some("   ".to_string())) });
        assert_eq!(
            sample_with_timeout(sampler, Duration::from_secs(1)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_errors_propagate_to_caller() {
        let sampler: Arc<dyn ActivitySampler> =
            Arc::new(|| -> Result<Option<String>> { Err(anyhow!("no display")) });
        let err = sample_with_timeout(sampler, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no display"));
    }

    struct SlowSampler {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ActivitySampler for SlowSampler {
        async fn current_focus(&self) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(Some("late".to_string()))
        }
    }

    #[tokio::test]
    async fn test_slow_sampler_times_out_and_is_abandoned() {
        let finished = Arc::new(AtomicBool::new(false));
        let sampler: Arc<dyn ActivitySampler> = Arc::new(SlowSampler {
            finished: finished.clone(),
        });

        let err = sample_with_timeout(sampler, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
