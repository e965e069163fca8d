//! Hybrid execution
//!
//! Runs a unit of AI work on the preferred path and substitutes the server
//! path when the preferred one fails. The caller never needs to know which
//! path produced the value; the UI learns it through [`FallbackNotice`].
//!
//! There is no retry, no backoff and no timeout. A primary producer that never
//! resolves blocks the operation.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Where a unit of work should run first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    /// In-process engine, server on failure
    #[default]
    Browser,
    /// Server only
    Server,
}

/// Result of a hybrid run
#[derive(Debug, Clone, PartialEq)]
pub struct HybridOutcome<T> {
    pub value: T,
    pub used_server: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HybridState {
    Idle,
    AttemptingPrimary,
    AttemptingFallback,
    Succeeded,
    Failed,
}

/// Shared flag telling the UI that the fallback path ran
#[derive(Debug, Clone, Default)]
pub struct FallbackNotice(Arc<AtomicBool>);

impl FallbackNotice {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Invoke `primary`; on failure invoke `fallback`.
///
/// When both fail, the fallback's error is returned as-is.
pub async fn execute_with_fallback<T, PE, FE, P, PFut, F, FFut>(
    primary: P,
    fallback: F,
) -> Result<HybridOutcome<T>, FE>
where
    PE: Display,
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T, PE>>,
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<T, FE>>,
{
    match primary().await {
        Ok(value) => Ok(HybridOutcome {
            value,
            used_server: false,
        }),
        Err(e) => {
            tracing::warn!("Primary path failed, falling back to server: {}", e);
            let value = fallback().await?;
            Ok(HybridOutcome {
                value,
                used_server: true,
            })
        }
    }
}

/// Stateful selector owned by one consumer
#[derive(Debug, Clone)]
pub struct HybridExecutor {
    notice: FallbackNotice,
    state: Arc<Mutex<HybridState>>,
}

impl Default for HybridExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridExecutor {
    pub fn new() -> Self {
        Self {
            notice: FallbackNotice::default(),
            state: Arc::new(Mutex::new(HybridState::Idle)),
        }
    }

    pub fn notice(&self) -> FallbackNotice {
        self.notice.clone()
    }

    pub fn state(&self) -> HybridState {
        *self.state.lock().expect("hybrid state mutex poisoned")
    }

    /// Run according to `preference`.
    ///
    /// `Browser` tries `local` first and falls back to `server`; `Server` calls
    /// `server` only.
    pub async fn run<T, LE, SE, L, LFut, S, SFut>(
        &self,
        preference: ExecutionPath,
        local: L,
        server: S,
    ) -> Result<HybridOutcome<T>, SE>
    where
        LE: Display,
        L: FnOnce() -> LFut,
        LFut: Future<Output = Result<T, LE>>,
        S: FnOnce() -> SFut,
        SFut: Future<Output = Result<T, SE>>,
    {
        self.notice.clear();

        if preference == ExecutionPath::Server {
            self.transition(HybridState::AttemptingFallback);
            return self.finish(server().await.map(|value| HybridOutcome {
                value,
                used_server: true,
            }));
        }

        self.transition(HybridState::AttemptingPrimary);
        let result = execute_with_fallback(local, || {
            self.transition(HybridState::AttemptingFallback);
            self.notice.set();
            server()
        })
        .await;
        self.finish(result)
    }

    fn finish<T, E>(&self, result: Result<T, E>) -> Result<T, E> {
        self.transition(if result.is_ok() {
            HybridState::Succeeded
        } else {
            HybridState::Failed
        });
        result
    }

    fn transition(&self, next: HybridState) {
        *self.state.lock().expect("hybrid state mutex poisoned") = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fallback_calls = AtomicUsize::new(0);

        let outcome = execute_with_fallback(
            || async { Ok::<_, String>("local") },
            || async {
                fallback_calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("server")
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.value, "local");
        assert!(!outcome.used_server);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let outcome = execute_with_fallback(
            || async { Err::<i32, _>("no gpu") },
            || async { Ok::<_, String>(42) },
        )
        .await
        .unwrap();

        assert_eq!(outcome.value, 42);
        assert!(outcome.used_server);
    }

    #[tokio::test]
    async fn test_both_fail_returns_fallback_error() {
        let err = execute_with_fallback(
            || async { Err::<(), _>("primary broke") },
            || async { Err::<(), _>("server broke") },
        )
        .await
        .unwrap_err();

        assert_eq!(err, "server broke");
    }

    #[tokio::test]
    async fn test_executor_sets_notice_on_fallback() {
        let executor = HybridExecutor::new();
        let notice = executor.notice();

        let outcome = executor
            .run(
                ExecutionPath::Browser,
                || async { Err::<u8, _>("unavailable") },
                || async { Ok::<_, String>(7) },
            )
            .await
            .unwrap();

        assert!(outcome.used_server);
        assert!(notice.is_set());
        assert_eq!(executor.state(), HybridState::Succeeded);

        // Next run clears the flag
        executor
            .run(
                ExecutionPath::Browser,
                || async { Ok::<_, String>(1) },
                || async { Ok::<_, String>(2) },
            )
            .await
            .unwrap();
        assert!(!notice.is_set());
    }

    #[tokio::test]
    async fn test_executor_server_preference_never_calls_local() {
        let executor = HybridExecutor::new();
        let local_calls = AtomicUsize::new(0);

        let outcome = executor
            .run(
                ExecutionPath::Server,
                || async {
                    local_calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("local")
                },
                || async { Ok::<_, String>("server") },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value, "server");
        assert!(outcome.used_server);
        assert!(!executor.notice().is_set());
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_executor_failed_state() {
        let executor = HybridExecutor::new();
        let result = executor
            .run(
                ExecutionPath::Browser,
                || async { Err::<(), _>("a") },
                || async { Err::<(), _>("b") },
            )
            .await;

        assert_eq!(result.unwrap_err(), "b");
        assert_eq!(executor.state(), HybridState::Failed);
        // The fallback ran, so the notice is raised even though it failed
        assert!(executor.notice().is_set());
    }

    #[tokio::test]
    async fn test_executor_state_while_each_path_runs() {
        let executor = HybridExecutor::new();
        let observer = executor.clone();
        let seen = Mutex::new(Vec::new());

        executor
            .run(
                ExecutionPath::Browser,
                || async {
                    seen.lock().unwrap().push((observer.state(), observer.notice().is_set()));
                    Err::<u8, _>("unavailable")
                },
                || async {
                    seen.lock().unwrap().push((observer.state(), observer.notice().is_set()));
                    Ok::<_, String>(3)
                },
            )
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (HybridState::AttemptingPrimary, false),
                (HybridState::AttemptingFallback, true),
            ]
        );
        assert_eq!(executor.state(), HybridState::Succeeded);
    }
}
