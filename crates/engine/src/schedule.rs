use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Where a periodic loop was when shutdown arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    /// Between passes.
    Idle,
    /// During a pass; the pass was dropped unfinished.
    Interrupted,
}

/// Runs `pass` every `period`, the first one immediately, until `shutdown`
/// resolves. Shutdown is honoured while a pass is in flight, not only between
/// passes.
pub async fn run_every<S, F, Fut>(period: Duration, shutdown: S, mut pass: F) -> Stopped
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => return Stopped::Idle,
        }
        // A pass that has already finished wins over a shutdown that raced it.
        tokio::select! {
            biased;
            _ = pass() => {}
            _ = &mut shutdown => return Stopped::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn shutdown_interrupts_a_pass_that_never_finishes() {
        let started = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();

        let counter = started.clone();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            run_every(Duration::from_secs(300), rx, || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>()
            }),
        )
        .await
        .expect("loop should stop on shutdown");

        stopper.await.unwrap();
        assert_eq!(stopped, Stopped::Interrupted);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_between_passes_stops_idle() {
        let passes = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);

        let counter = passes.clone();
        let stopped = run_every(Duration::from_millis(10), rx, move || {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }
            async {}
        })
        .await;

        assert_eq!(stopped, Stopped::Idle);
        assert_eq!(passes.load(Ordering::SeqCst), 3);
    }
}
