//! Repeating alert cadence

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::{AlertNotifier, ToneSpec};

/// Decides when a cue is due given the alerting flag over time.
///
/// A cue fires on the rising edge and then once per interval while the
/// flag stays set. Clearing the flag cancels the schedule immediately.
#[derive(Debug, Clone)]
pub struct AlertCadence {
    interval: Duration,
    next_due: Option<Instant>,
}

impl AlertCadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Feed the current flag; returns true when a cue should play now
    pub fn update(&mut self, alerting: bool, now: Instant) -> bool {
        if !alerting {
            self.next_due = None;
            return false;
        }

        match self.next_due {
            Some(due) if now < due => false,
            _ => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// When the next repeat is due, if the flag is set
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }
}

/// Drive `notifier` from the alerting flag until the sender is dropped.
///
/// Returns the number of cues played.
pub async fn run_alert_loop<N>(
    mut alerting: watch::Receiver<bool>,
    notifier: Arc<N>,
    tone: ToneSpec,
    interval: Duration,
) -> u64
where
    N: AlertNotifier + ?Sized,
{
    let mut cadence = AlertCadence::new(interval);
    let mut fired = 0u64;
    info!("Alert loop started ({}ms cadence)", interval.as_millis());

    loop {
        let raised = *alerting.borrow_and_update();
        let was_active = cadence.is_active();
        if cadence.update(raised, Instant::now()) {
            if !was_active {
                debug!("Alert raised");
            }
            notifier.notify(&tone);
            fired += 1;
        } else if was_active && !raised {
            debug!("Alert cleared");
        }

        let due = cadence.next_due();
        tokio::select! {
            changed = alerting.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {}
        }
    }

    info!("Alert loop stopped after {} cues", fired);
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        count: AtomicUsize,
    }

    impl AlertNotifier for CountingNotifier {
        fn notify(&self, _tone: &ToneSpec) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CountingNotifier {
        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_cadence_rising_edge_then_interval() {
        let start = Instant::now();
        let mut cadence = AlertCadence::new(Duration::from_millis(1000));

        assert!(!cadence.update(false, start));
        assert!(cadence.update(true, start));
        assert!(!cadence.update(true, start + Duration::from_millis(500)));
        assert!(!cadence.update(true, start + Duration::from_millis(999)));
        assert!(cadence.update(true, start + Duration::from_millis(1000)));
        assert!(!cadence.update(true, start + Duration::from_millis(1500)));
        assert_eq!(cadence.next_due(), Some(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_cadence_clears_immediately() {
        let start = Instant::now();
        let mut cadence = AlertCadence::new(Duration::from_millis(1000));

        assert!(cadence.update(true, start));
        assert!(!cadence.update(false, start + Duration::from_millis(100)));
        assert!(!cadence.is_active());
        assert_eq!(cadence.next_due(), None);
        // Re-raising fires at once without waiting out the old interval
        assert!(cadence.update(true, start + Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_repeats_while_alerting() {
        let (tx, rx) = watch::channel(false);
        let notifier = Arc::new(CountingNotifier::default());
        let handle = tokio::spawn(run_alert_loop(
            rx,
            notifier.clone(),
            ToneSpec::default(),
            Duration::from_millis(1000),
        ));

        settle().await;
        assert_eq!(notifier.count(), 0);

        tx.send(true).unwrap();
        settle().await;
        assert_eq!(notifier.count(), 1);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        settle().await;
        assert_eq!(notifier.count(), 2);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(notifier.count(), 3);

        tx.send(false).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(notifier.count(), 3);

        drop(tx);
        assert_eq!(handle.await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_true_does_not_refire() {
        let (tx, rx) = watch::channel(false);
        let notifier = Arc::new(CountingNotifier::default());
        let handle = tokio::spawn(run_alert_loop(
            rx,
            notifier.clone(),
            ToneSpec::default(),
            Duration::from_millis(1000),
        ));

        tx.send(true).unwrap();
        settle().await;
        tx.send(true).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(true).unwrap();
        settle().await;
        assert_eq!(notifier.count(), 1);

        drop(tx);
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_refires_on_new_rising_edge() {
        let (tx, rx) = watch::channel(false);
        let notifier = Arc::new(CountingNotifier::default());
        let handle = tokio::spawn(run_alert_loop(
            rx,
            notifier.clone(),
            ToneSpec::default(),
            Duration::from_millis(1000),
        ));

        tx.send(true).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(false).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        settle().await;
        assert_eq!(notifier.count(), 2);

        // The repeat is scheduled from the second edge, not the first
        tokio::time::sleep(Duration::from_millis(900)).await;
        settle().await;
        assert_eq!(notifier.count(), 2);
        tokio::time::sleep(Duration::from_millis(150)).await;
        settle().await;
        assert_eq!(notifier.count(), 3);

        drop(tx);
        assert_eq!(handle.await.unwrap(), 3);
    }
}
