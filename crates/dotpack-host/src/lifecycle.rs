//! Request-lifecycle controllers.
//!
//! A controller owns at most one armed debounce timer and at most one live
//! cancellation token. `trigger` always supersedes the previous attempt
//! (cancels its timer and token) before arming the next, so per controller
//! there is never more than one non-cancelled operation in flight.
//!
//! ```text
//! Idle --trigger--> Pending --timer--> InFlight --done--> Completed
//!   ^                  |                  |
//!   +-----cancel-------+------------------+      dispose --> Disposed
//! ```
//!
//! The search controller debounces; the details controller starts
//! immediately. Cancellation is cooperative: the runner receives the token
//! and is expected to drop its result once the token has fired.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Work started by a controller.
pub type Runner<I> = Arc<dyn Fn(I, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// A runner holds the live token.
    InFlight,
    Completed,
    Disposed,
}

#[derive(Debug)]
struct Slot {
    phase: Phase,
    /// Bumped on every trigger/cancel/dispose; stale timers and runners
    /// compare against it before touching the slot.
    generation: u64,
    timer: Option<CancellationToken>,
    live: Option<CancellationToken>,
}

impl Slot {
    /// Cancel the armed timer and the live token, if any.
    fn supersede(&mut self) -> bool {
        let mut superseded = false;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
            superseded = true;
        }
        if let Some(live) = self.live.take() {
            live.cancel();
            superseded = true;
        }
        superseded
    }
}

/// Debounce + single-flight controller for one logical request stream.
pub struct LifecycleController<I> {
    name: &'static str,
    debounce: Option<Duration>,
    runner: Runner<I>,
    slot: Arc<Mutex<Slot>>,
}

impl<I> fmt::Debug for LifecycleController<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.name)
            .field("debounce", &self.debounce)
            .field("phase", &lock(&self.slot).phase)
            .finish()
    }
}

/// Dropping the last handle disposes, so an armed timer never fires for an
/// owner that is gone.
impl<I> Drop for LifecycleController<I> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<I> LifecycleController<I> {
    #[must_use]
    pub fn phase(&self) -> Phase {
        lock(&self.slot).phase
    }

    /// Clear any armed timer and cancel any live token; back to idle.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        if slot.phase == Phase::Disposed {
            return;
        }
        slot.supersede();
        slot.generation += 1;
        slot.phase = Phase::Idle;
    }

    /// Like [`Self::cancel`], but the controller accepts no further triggers.
    pub fn dispose(&self) {
        let mut slot = lock(&self.slot);
        if slot.phase == Phase::Disposed {
            return;
        }
        slot.supersede();
        slot.generation += 1;
        slot.phase = Phase::Disposed;
        debug!(controller = self.name, "disposed");
    }
}

impl<I: Send + 'static> LifecycleController<I> {
    /// A controller that waits `debounce` after the last trigger.
    pub fn debounced<F>(name: &'static str, debounce: Duration, runner: F) -> Self
    where
        F: Fn(I, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self::with_debounce(name, Some(debounce), runner)
    }

    /// A controller that starts work as soon as it is triggered.
    pub fn immediate<F>(name: &'static str, runner: F) -> Self
    where
        F: Fn(I, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self::with_debounce(name, None, runner)
    }

    fn with_debounce<F>(name: &'static str, debounce: Option<Duration>, runner: F) -> Self
    where
        F: Fn(I, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            name,
            debounce,
            runner: Arc::new(runner),
            slot: Arc::new(Mutex::new(Slot {
                phase: Phase::Idle,
                generation: 0,
                timer: None,
                live: None,
            })),
        }
    }

    /// Supersede any pending or in-flight attempt and schedule `input`.
    ///
    /// Must be called from within a tokio runtime. Returns false after
    /// [`Self::dispose`].
    pub fn trigger(&self, input: I) -> bool {
        match self.debounce {
            Some(delay) => self.arm(input, delay),
            None => self.trigger_now(input),
        }
    }

    /// Supersede any pending or in-flight attempt and start `input` without
    /// waiting for the debounce window.
    pub fn trigger_now(&self, input: I) -> bool {
        let claimed = {
            let mut slot = lock(&self.slot);
            let Some(generation) = self.begin(&mut slot) else {
                return false;
            };
            Self::claim(&mut slot, generation).map(|token| (generation, token))
        };
        if let Some((generation, token)) = claimed {
            tokio::spawn(Self::launch(&self.slot, &self.runner, generation, token, input));
        }
        true
    }

    fn arm(&self, input: I, delay: Duration) -> bool {
        let mut slot = lock(&self.slot);
        let Some(generation) = self.begin(&mut slot) else {
            return false;
        };

        let timer = CancellationToken::new();
        slot.timer = Some(timer.clone());
        slot.phase = Phase::Pending;
        drop(slot);

        trace!(controller = self.name, generation, ?delay, "armed");

        let shared = Arc::clone(&self.slot);
        let runner = Arc::clone(&self.runner);
        let name = self.name;
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {
                    trace!(controller = name, generation, "timer cleared");
                }
                () = tokio::time::sleep(delay) => {
                    let claimed = Self::claim(&mut lock(&shared), generation);
                    if let Some(token) = claimed {
                        Self::launch(&shared, &runner, generation, token, input).await;
                    }
                }
            }
        });
        true
    }

    /// Supersede the previous attempt. Returns the new generation, or `None`
    /// when disposed.
    fn begin(&self, slot: &mut Slot) -> Option<u64> {
        if slot.phase == Phase::Disposed {
            debug!(controller = self.name, "trigger after dispose ignored");
            return None;
        }
        if slot.supersede() {
            debug!(controller = self.name, "superseded previous request");
        }
        slot.generation += 1;
        Some(slot.generation)
    }

    /// Allocate the live token, unless `generation` has been superseded in
    /// the meantime.
    fn claim(slot: &mut Slot, generation: u64) -> Option<CancellationToken> {
        if slot.generation != generation || slot.phase == Phase::Disposed {
            return None;
        }

        let token = CancellationToken::new();
        slot.timer = None;
        slot.live = Some(token.clone());
        slot.phase = Phase::InFlight;
        Some(token)
    }

    /// Build the runner future. Called without the slot lock held, so a
    /// runner may inspect or cancel its own controller.
    fn launch(
        shared: &Arc<Mutex<Slot>>,
        runner: &Runner<I>,
        generation: u64,
        token: CancellationToken,
        input: I,
    ) -> BoxFuture<'static, ()> {
        let work = runner(input, token);
        let shared = Arc::clone(shared);
        Box::pin(async move {
            work.await;
            let mut slot = lock(&shared);
            if slot.generation == generation && slot.phase == Phase::InFlight {
                slot.live = None;
                slot.phase = Phase::Completed;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{OnceLock, Weak};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log) -> impl Fn(String, CancellationToken) -> BoxFuture<'static, ()> {
        let log = Arc::clone(log);
        move |input, _token| {
            let log = Arc::clone(&log);
            async move { log.lock().unwrap().push(input) }.boxed()
        }
    }

    /// Runner that takes 1s unless cancelled first.
    fn slow(log: &Log) -> impl Fn(String, CancellationToken) -> BoxFuture<'static, ()> {
        let log = Arc::clone(log);
        move |input, token| {
            let log = Arc::clone(&log);
            async move {
                tokio::select! {
                    () = token.cancelled() => log.lock().unwrap().push(format!("{input}:cancelled")),
                    () = tokio::time::sleep(Duration::from_secs(1)) => log.lock().unwrap().push(format!("{input}:done")),
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_triggers_run_once_with_last_input() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::debounced("search", Duration::from_millis(300), recording(&log));

        ctl.trigger("F".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctl.trigger("Fo".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctl.trigger("Foo".to_string());
        assert_eq!(ctl.phase(), Phase::Pending);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(*log.lock().unwrap(), vec!["Foo"]);
        assert_eq!(ctl.phase(), Phase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_timer_runs_nothing() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::debounced("search", Duration::from_millis(300), recording(&log));

        ctl.trigger("Foo".to_string());
        ctl.cancel();
        assert_eq!(ctl.phase(), Phase::Idle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_before_timer_runs_nothing_and_rejects_triggers() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::debounced("search", Duration::from_millis(300), recording(&log));

        ctl.trigger("Foo".to_string());
        ctl.dispose();
        assert!(!ctl.trigger("Bar".to_string()));
        assert!(!ctl.trigger_now("Baz".to_string()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(ctl.phase(), Phase::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_cancels_in_flight_work() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::immediate("details", slow(&log));

        ctl.trigger("A".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ctl.phase(), Phase::InFlight);

        ctl.trigger("B".to_string());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*log.lock().unwrap(), vec!["A:cancelled", "B:done"]);
        assert_eq!(ctl.phase(), Phase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_live_token() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::immediate("details", slow(&log));

        ctl.trigger("A".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctl.dispose();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*log.lock().unwrap(), vec!["A:cancelled"]);
        assert_eq!(ctl.phase(), Phase::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_now_skips_debounce_and_clears_pending() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::debounced("search", Duration::from_millis(300), recording(&log));

        ctl.trigger("typed".to_string());
        ctl.trigger_now("more".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*log.lock().unwrap(), vec!["more"]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*log.lock().unwrap(), vec!["more"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_clears_pending_timer() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::debounced("search", Duration::from_millis(300), recording(&log));

        assert!(ctl.trigger("Foo".to_string()));
        drop(ctl);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_cancels_live_token() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::immediate("details", slow(&log));

        ctl.trigger("A".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(ctl);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*log.lock().unwrap(), vec!["A:cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_may_touch_its_controller() {
        let log: Log = Arc::default();
        let handle: Arc<OnceLock<Weak<LifecycleController<String>>>> = Arc::default();

        let runner = {
            let log = Arc::clone(&log);
            let handle = Arc::clone(&handle);
            move |input: String, _token: CancellationToken| {
                let ctl = handle.get().and_then(Weak::upgrade);
                let phase = ctl.as_ref().map(|ctl| ctl.phase());
                if input == "stop" {
                    if let Some(ctl) = &ctl {
                        ctl.cancel();
                    }
                }
                log.lock().unwrap().push(format!("{input}:{phase:?}"));
                async {}.boxed()
            }
        };

        let ctl = Arc::new(LifecycleController::debounced(
            "search",
            Duration::from_millis(300),
            runner,
        ));
        handle.set(Arc::downgrade(&ctl)).unwrap();

        assert!(ctl.trigger_now("now".to_string()));
        ctl.trigger("later".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctl.trigger_now("stop".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["now:Some(InFlight)", "later:Some(InFlight)", "stop:Some(InFlight)"]
        );
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[test]
    fn test_debug_shows_phase() {
        let log: Log = Arc::default();
        let ctl = LifecycleController::immediate("details", recording(&log));
        let shown = format!("{ctl:?}");
        assert!(shown.contains("details"));
        assert!(shown.contains("Idle"));
    }
}
