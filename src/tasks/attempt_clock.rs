use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::services::attempt_session::AttemptSession;
use crate::services::attempt_timer::{TickOutcome, TimerSnapshot, TimerState};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the attempt timer once per second and publishes snapshots.
///
/// The clock never submits. A snapshot with `auto_submitted` set is the signal
/// for the owner to call `submit`. The task ends on expiry, when the timer is
/// no longer running, on teardown, or on shutdown.
pub(crate) fn spawn(
    session: AttemptSession,
    shutdown: watch::Receiver<bool>,
) -> (watch::Receiver<TimerSnapshot>, JoinHandle<()>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(session.timer_snapshot());
    let handle = tokio::spawn(run(session, snapshot_tx, shutdown));
    (snapshot_rx, handle)
}

async fn run(
    session: AttemptSession,
    snapshots: watch::Sender<TimerSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {}
        }

        if !session.is_alive() {
            break;
        }

        let outcome = session.tick();
        let snapshot = session.timer_snapshot();
        let running = snapshot.state == TimerState::Running;
        if snapshots.send(snapshot).is_err() {
            break;
        }
        if outcome == TickOutcome::Expired || !running {
            break;
        }
    }

    tracing::debug!(attempt_id = %session.attempt_id(), "Attempt clock stopped");
}
