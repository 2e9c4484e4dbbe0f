//! Optimistic update helper.
//!
//! Applies a local mutation immediately, runs the remote effect against the
//! mutated state, and applies the inverse mutation if the remote effect fails.
//! The inverse is a targeted revert rather than a whole-state restore, so
//! changes made by other operations while the remote call was in flight
//! survive the rollback.

use std::future::Future;

use tokio::sync::watch;

/// Run `remote` after optimistically applying `apply` to `state`.
///
/// `remote` receives a copy of the state as it was right after `apply`.
/// On failure `revert` is applied and the error is returned unchanged.
///
/// # Errors
///
/// Returns whatever error `remote` produced.
pub async fn run<S, T, E, Fut>(
    state: &watch::Sender<S>,
    apply: impl FnOnce(&mut S),
    revert: impl FnOnce(&mut S),
    remote: impl FnOnce(S) -> Fut,
) -> Result<T, E>
where
    S: Clone,
    Fut: Future<Output = Result<T, E>>,
{
    state.send_modify(apply);
    let applied = state.borrow().clone();

    match remote(applied).await {
        Ok(value) => Ok(value),
        Err(err) => {
            state.send_modify(revert);
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_keeps_mutation() {
        let (tx, _rx) = watch::channel(vec![1]);
        let seen = run(
            &tx,
            |v: &mut Vec<i32>| v.push(2),
            |v: &mut Vec<i32>| {
                v.pop();
            },
            |snapshot| async move { Ok::<_, ()>(snapshot.len()) },
        )
        .await
        .unwrap();

        assert_eq!(seen, 2);
        assert_eq!(*tx.borrow(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failure_reverts_mutation() {
        let (tx, _rx) = watch::channel(vec![1]);
        let result: Result<(), &str> = run(
            &tx,
            |v: &mut Vec<i32>| v.push(2),
            |v: &mut Vec<i32>| v.retain(|n| *n != 2),
            |_| async { Err("remote down") },
        )
        .await;

        assert_eq!(result.unwrap_err(), "remote down");
        assert_eq!(*tx.borrow(), vec![1]);
    }

    #[tokio::test]
    async fn test_subscribers_observe_optimistic_value() {
        let (tx, mut rx) = watch::channel(0);
        let _ = run(
            &tx,
            |v: &mut i32| *v = 5,
            |v: &mut i32| *v = 0,
            |_| async { Err::<(), _>(()) },
        )
        .await;

        // Final value is the reverted one, and the receiver was notified.
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 0);
    }
}
