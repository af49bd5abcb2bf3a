//! Bounded drain of connection tasks.

use std::time::Duration;

use tokio::task::JoinSet;

/// Wait up to `grace` for every task in `tasks` to finish, then abort the rest.
///
/// Returns how many tasks had to be aborted.
pub async fn drain<T: 'static>(tasks: &mut JoinSet<T>, grace: Duration) -> usize {
    let pending = tasks.len();
    if pending == 0 {
        return 0;
    }
    tracing::info!(connections = pending, grace_ms = grace.as_millis() as u64, "Draining connections");

    let finished = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if finished.is_ok() {
        return 0;
    }

    let remaining = tasks.len();
    tracing::warn!(connections = remaining, "Grace period elapsed, closing connections");
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finished_tasks_are_not_aborted() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { tokio::time::sleep(Duration::from_millis(10)).await });
        assert_eq!(drain(&mut tasks, Duration::from_secs(1)).await, 0);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn stragglers_are_aborted_after_grace() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(std::future::pending::<()>());
        let aborted = drain(&mut tasks, Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);
        assert!(tasks.is_empty());
    }
}
