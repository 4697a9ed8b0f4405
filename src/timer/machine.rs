//! Background tick loop driving a [`TimerState`].
//!
//! The controlling thread owns the `StageMachine`; each `start` spawns one
//! worker thread that is the only writer of the countdown while it runs. The
//! worker publishes a snapshot into a single shared slot after every tick.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::stage::{Stage, TimeLeft, TimerAlert};
use super::state::{TimerSnapshot, TimerState};
use crate::crop::{CropType, PlanterType};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};

/// Label emitted once by `reset`.
pub const RESET_LABEL: &str = "Reset";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickSettings {
    /// Time between two status emissions
    pub period: Duration,
    /// Emissions per countdown second
    pub ticks_per_second: u32,
    /// How long `stop` waits for the loop to exit
    pub stop_timeout: Duration,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            ticks_per_second: 10,
            stop_timeout: Duration::from_secs(1),
        }
    }
}

/// Status handed to the display sink on every emission.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerUpdate {
    pub time_left: TimeLeft,
    pub stage: Stage,
    /// Stage label, or `"Reset"` for the reset emission
    pub label: &'static str,
    /// Alerts raised since the previous emission
    pub alerts: Vec<TimerAlert>,
}

pub type TickCallback = Arc<dyn Fn(&TimerUpdate) + Send + Sync>;

struct Slot {
    /// Bumped on every start and stop; stale workers cannot publish
    generation: u64,
    snapshot: TimerSnapshot,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

pub struct StageMachine {
    slot: Arc<Mutex<Slot>>,
    worker: Option<Worker>,
    on_tick: TickCallback,
    sink: Arc<dyn DiagnosticSink>,
    settings: TickSettings,
}

impl StageMachine {
    pub fn new(
        on_tick: impl Fn(&TimerUpdate) + Send + Sync + 'static,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                snapshot: TimerSnapshot::default(),
            })),
            worker: None,
            on_tick: Arc::new(on_tick),
            sink,
            settings: TickSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: TickSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Starts counting down the growing stage from `seconds`.
    ///
    /// A loop that is already running is stopped first.
    pub fn start(&mut self, seconds: u32, crop: CropType, planter: PlanterType) {
        if self.worker.is_some() {
            self.stop();
        }

        let state = TimerState::new(seconds, crop, planter);
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.snapshot = state.snapshot(true);
            slot.generation
        };

        self.sink.record(&DiagnosticEvent::TimerStarted {
            seconds,
            stage: state.stage,
        });

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();
        let ctx = LoopContext {
            running: running.clone(),
            slot: self.slot.clone(),
            generation,
            on_tick: self.on_tick.clone(),
            sink: self.sink.clone(),
            settings: self.settings,
        };

        let handle = thread::spawn(move || {
            run_tick_loop(state, &ctx);
            let _ = done_tx.send(());
        });

        self.worker = Some(Worker {
            running,
            handle,
            done: done_rx,
        });
    }

    /// Stops the loop and waits a bounded time for it to exit.
    ///
    /// Stopping an idle machine does nothing.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.running.store(false, Ordering::SeqCst);

        let timed_out = match worker.done.recv_timeout(self.settings.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                false
            }
            // The thread is left detached; its generation is retired below
            Err(RecvTimeoutError::Timeout) => true,
        };

        {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.snapshot.running = false;
        }
        self.sink.record(&DiagnosticEvent::TimerStopped { timed_out });
    }

    /// Restores the original growing time, clears alerts and emits a `"Reset"`
    /// update. Restarts the countdown when it was running.
    pub fn reset(&mut self) {
        let was_running = self.is_running();
        self.stop();

        let (seconds, crop, planter) = {
            let mut slot = lock(&self.slot);
            let snapshot = &mut slot.snapshot;
            snapshot.time_left = TimeLeft::Finite(snapshot.original_time);
            snapshot.stage = Stage::Growing;
            snapshot.notifications_sent.clear();
            (snapshot.original_time, snapshot.crop, snapshot.planter)
        };

        emit(
            self.on_tick.as_ref(),
            self.sink.as_ref(),
            &TimerUpdate {
                time_left: TimeLeft::Finite(seconds),
                stage: Stage::Growing,
                label: RESET_LABEL,
                alerts: Vec::new(),
            },
        );

        if was_running {
            self.start(seconds, crop, planter);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        lock(&self.slot).snapshot.clone()
    }
}

impl Drop for StageMachine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    running: Arc<AtomicBool>,
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    on_tick: TickCallback,
    sink: Arc<dyn DiagnosticSink>,
    settings: TickSettings,
}

impl LoopContext {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn publish(&self, snapshot: TimerSnapshot) {
        let mut slot = lock(&self.slot);
        if slot.generation == self.generation {
            slot.snapshot = snapshot;
        }
    }
}

fn run_tick_loop(mut state: TimerState, ctx: &LoopContext) {
    let mut pending: Vec<TimerAlert> = Vec::new();

    while ctx.is_running() {
        ctx.publish(state.snapshot(true));
        emit(
            ctx.on_tick.as_ref(),
            ctx.sink.as_ref(),
            &TimerUpdate {
                time_left: state.time_left,
                stage: state.stage,
                label: state.stage.label(),
                alerts: std::mem::take(&mut pending),
            },
        );

        thread::sleep(ctx.settings.period);
        if !ctx.is_running() {
            break;
        }

        let stage = state.stage;
        let alerts = state.tick(ctx.settings.ticks_per_second);
        for alert in &alerts {
            ctx.sink.record(&DiagnosticEvent::Alert(*alert));
        }
        if state.stage != stage {
            ctx.sink.record(&DiagnosticEvent::StageEntered(state.stage));
        }
        pending.extend(alerts);
    }

    ctx.publish(state.snapshot(false));
}

/// Calls the display callback; a panic inside it is reported and swallowed.
fn emit(
    on_tick: &(dyn Fn(&TimerUpdate) + Send + Sync),
    sink: &dyn DiagnosticSink,
    update: &TimerUpdate,
) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_tick(update))) {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        sink.record(&DiagnosticEvent::CallbackFailed(msg));
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopSink;
    use crate::diagnostics::testing::MemorySink;
    use std::time::Instant;

    fn fast() -> TickSettings {
        TickSettings {
            period: Duration::from_millis(1),
            ticks_per_second: 1,
            stop_timeout: Duration::from_secs(1),
        }
    }

    fn wait_for(machine: &StageMachine, pred: impl Fn(&TimerSnapshot) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if pred(&machine.snapshot()) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn recording() -> (Arc<Mutex<Vec<TimerUpdate>>>, impl Fn(&TimerUpdate) + Send + Sync + 'static) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        (updates, move |u: &TimerUpdate| sink.lock().unwrap().push(u.clone()))
    }

    #[test]
    fn test_runs_into_next_stage() {
        let (updates, on_tick) = recording();
        let sink = Arc::new(MemorySink::default());
        let mut machine = StageMachine::new(on_tick, sink.clone()).with_settings(fast());

        machine.start(3, CropType::Coca, PlanterType::Basic);
        assert!(machine.is_running());
        assert!(wait_for(&machine, |s| s.stage == Stage::Ready));
        machine.stop();

        let snapshot = machine.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.stage, Stage::Ready);
        assert!(snapshot.notifications_sent.contains("growing_completed"));

        let updates = updates.lock().unwrap();
        assert_eq!(updates[0].label, "Growing");
        assert_eq!(updates[0].time_left, TimeLeft::Finite(3));
        assert!(updates.iter().any(|u| u.label == "Ready"));
        assert!(
            updates
                .iter()
                .any(|u| u.alerts.contains(&TimerAlert::StageCompleted(Stage::Growing)))
        );
        assert!(sink.contains("Entered Ready stage"));
        assert!(sink.contains("Alert: growing_completed"));
    }

    #[test]
    fn test_runs_through_to_seeding() {
        let (updates, on_tick) = recording();
        let mut machine = StageMachine::new(on_tick, Arc::new(NoopSink)).with_settings(TickSettings {
            period: Duration::from_micros(200),
            ..fast()
        });

        // 3 s growing, 240 s ready, 180 s flowering
        machine.start(3, CropType::Marijuana, PlanterType::PlanterBox);
        assert!(wait_for(&machine, |s| s.stage == Stage::Seeding));
        thread::sleep(Duration::from_millis(5));

        machine.stop();
        let stopped = machine.snapshot();
        machine.stop();
        assert_eq!(machine.snapshot(), stopped);
        assert_eq!(stopped.stage, Stage::Seeding);
        assert_eq!(stopped.time_left, TimeLeft::Infinite);

        let updates = updates.lock().unwrap();
        let mut order: Vec<Stage> = updates.iter().map(|u| u.stage).collect();
        order.dedup();
        assert_eq!(order, Stage::ALL.to_vec());

        let seeding: Vec<_> = updates.iter().filter(|u| u.stage == Stage::Seeding).collect();
        assert!(!seeding.is_empty());
        assert!(seeding.iter().all(|u| u.time_left == TimeLeft::Infinite));
    }

    #[test]
    fn test_stop_twice_is_same_as_once() {
        let mut machine = StageMachine::new(|_: &TimerUpdate| {}, Arc::new(NoopSink))
            .with_settings(fast());
        machine.start(500, CropType::Marijuana, PlanterType::Basic);
        thread::sleep(Duration::from_millis(10));

        machine.stop();
        let once = machine.snapshot();
        machine.stop();
        assert_eq!(machine.snapshot(), once);
        assert!(!machine.is_running());
    }

    #[test]
    fn test_stop_is_bounded_and_silences_loop() {
        let (updates, on_tick) = recording();
        let mut machine =
            StageMachine::new(on_tick, Arc::new(NoopSink)).with_settings(TickSettings::default());
        machine.start(2280, CropType::Coca, PlanterType::Basic);
        thread::sleep(Duration::from_millis(150));

        let started = Instant::now();
        machine.stop();
        assert!(started.elapsed() < Duration::from_secs(1));

        let count = updates.lock().unwrap().len();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(updates.lock().unwrap().len(), count);
    }

    #[test]
    fn test_start_while_running_replaces_loop() {
        let (updates, on_tick) = recording();
        let mut machine = StageMachine::new(on_tick, Arc::new(NoopSink)).with_settings(fast());

        machine.start(900, CropType::Coca, PlanterType::Basic);
        thread::sleep(Duration::from_millis(10));
        machine.start(100, CropType::Marijuana, PlanterType::PlanterBox);
        thread::sleep(Duration::from_millis(10));

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.original_time, 100);
        assert_eq!(snapshot.crop, CropType::Marijuana);

        machine.stop();
        let count = updates.lock().unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(updates.lock().unwrap().len(), count);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_loop() {
        let sink = Arc::new(MemorySink::default());
        let mut machine = StageMachine::new(
            |_: &TimerUpdate| panic!("display gone"),
            sink.clone(),
        )
        .with_settings(fast());

        machine.start(1000, CropType::Coca, PlanterType::Basic);
        assert!(wait_for(&machine, |s| s.time_left.seconds().is_some_and(|t| t < 995)));
        assert!(machine.is_running());
        machine.stop();
        assert!(sink.contains("Tick callback failed: display gone"));
    }

    #[test]
    fn test_reset_restores_and_restarts() {
        let (updates, on_tick) = recording();
        let mut machine = StageMachine::new(on_tick, Arc::new(NoopSink)).with_settings(fast());

        machine.start(2, CropType::Coca, PlanterType::Basic);
        assert!(wait_for(&machine, |s| s.stage == Stage::Ready));
        machine.reset();

        assert!(machine.is_running());
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.original_time, 2);
        assert!(
            updates
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.label == RESET_LABEL && u.time_left == TimeLeft::Finite(2))
        );
        machine.stop();
    }

    #[test]
    fn test_reset_while_stopped_stays_stopped() {
        let (updates, on_tick) = recording();
        let mut machine = StageMachine::new(on_tick, Arc::new(NoopSink)).with_settings(fast());

        machine.start(50, CropType::Coca, PlanterType::Basic);
        assert!(wait_for(&machine, |s| s.time_left != TimeLeft::Finite(50)));
        machine.stop();
        machine.reset();

        assert!(!machine.is_running());
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.time_left, TimeLeft::Finite(50));
        assert_eq!(snapshot.stage, Stage::Growing);
        assert!(snapshot.notifications_sent.is_empty());
        let last = updates.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.label, RESET_LABEL);
    }
}
