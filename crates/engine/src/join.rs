//! Joining concurrent outbound operations.
//!
//! A step invocation waits on a few network operations at once: the next-step
//! dispatch and, in some modes, a blocking hint. They are awaited together;
//! results come back in the order the operations were submitted. Only members
//! marked [`Membership::Blocking`] can fail the join, the errors of
//! fire-and-forget members are logged and dropped.
//!
//! Operations the step must not wait for at all are detached by the runtime
//! and never enter a join.

use futures::future::{join_all, BoxFuture};
use tracing::warn;

use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Blocking,
    FireAndForget,
}

pub struct JoinMember<T> {
    label: String,
    membership: Membership,
    future: BoxFuture<'static, Result<T, EngineError>>,
}

impl<T> JoinMember<T> {
    pub fn blocking<F>(label: impl Into<String>, future: F) -> Self
    where
        F: std::future::Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            membership: Membership::Blocking,
            future: Box::pin(future),
        }
    }

    pub fn fire_and_forget<F>(label: impl Into<String>, future: F) -> Self
    where
        F: std::future::Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            membership: Membership::FireAndForget,
            future: Box::pin(future),
        }
    }
}

/// Await every member and return their values by position.
///
/// A fire-and-forget member that failed yields `None` at its position.
///
/// # Errors
/// The error of the first (by position) blocking member that failed.
pub async fn join_designated<T>(
    members: Vec<JoinMember<T>>,
) -> Result<Vec<Option<T>>, EngineError> {
    let (labels, futures): (Vec<_>, Vec<_>) = members
        .into_iter()
        .map(|m| ((m.label, m.membership), m.future))
        .unzip();

    let results = join_all(futures).await;

    let mut values = Vec::with_capacity(results.len());
    let mut first_blocking_error = None;

    for ((label, membership), result) in labels.into_iter().zip(results) {
        match result {
            Ok(value) => values.push(Some(value)),
            Err(e) => {
                match membership {
                    Membership::Blocking => {
                        if first_blocking_error.is_none() {
                            first_blocking_error = Some(e);
                        }
                    }
                    Membership::FireAndForget => {
                        warn!(operation = %label, "fire-and-forget operation failed: {e}");
                    }
                }
                values.push(None);
            }
        }
    }

    match first_blocking_error {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fail(msg: &str) -> EngineError {
        EngineError::MalformedRequest(msg.into())
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_submission_order() {
        let members = vec![
            JoinMember::blocking("slow", async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1)
            }),
            JoinMember::fire_and_forget("fast", async { Ok(2) }),
            JoinMember::blocking("medium", async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(3)
            }),
        ];

        let values = join_designated(members).await.unwrap();
        assert_eq!(values, vec![Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn fire_and_forget_failures_do_not_fail_the_join() {
        let members = vec![
            JoinMember::fire_and_forget("hint", async { Err(fail("unreachable")) }),
            JoinMember::blocking("dispatch", async { Ok("sent") }),
        ];

        let values = join_designated(members).await.unwrap();
        assert_eq!(values, vec![None, Some("sent")]);
    }

    #[tokio::test]
    async fn blocking_failure_fails_the_join_after_all_complete() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let members: Vec<JoinMember<()>> = vec![
            JoinMember::blocking("dispatch", async { Err(fail("first")) }),
            JoinMember::fire_and_forget("report", async move {
                tx.send(()).ok();
                Ok(())
            }),
            JoinMember::blocking("other", async { Err(fail("second")) }),
        ];

        let err = join_designated(members).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedRequest(msg) if msg == "first"));
        assert!(rx.await.is_ok(), "fire-and-forget member still ran");
    }
}
