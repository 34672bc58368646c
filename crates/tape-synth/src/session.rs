//! Live session driver.
//!
//! A [`LiveSession`] owns the last emitted bar/volume pair and one periodic
//! task that replaces it on every tick. The decision between advancing the
//! current bar and opening the next one is re-made from the wall clock each
//! time, so a late tick lands in the right window instead of drifting.
//!
//! Readers never hold the state across a tick: [`LiveSession::snapshot`]
//! copies it out of a `watch` channel, and [`LiveSession::next_event`] yields
//! each transition as an owned value.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use rand::Rng;
use serde::Serialize;
use tape_core::{BAR_INTERVAL_SECS, Bar, VolumeBar};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::generator::SyntheticGenerator;

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Events buffered for a slow reader before new ones are dropped.
const EVENT_BUFFER: usize = 256;

/// Source of the current time in whole seconds since epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub const fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The last emitted bar and its volume.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LiveState {
    /// Current bar.
    pub bar: Bar,
    /// Volume of the current bar.
    pub volume: VolumeBar,
}

impl LiveState {
    /// Pairs a bar with its volume.
    #[must_use]
    pub const fn new(bar: Bar, volume: VolumeBar) -> Self {
        Self { bar, volume }
    }
}

/// Which of the two transitions a tick applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Intra-bar tick on the current window.
    Advance,
    /// Open the following window.
    NextBar,
}

/// Picks the transition for a tick at `now`.
#[must_use]
pub const fn decide(now: i64, bar: &Bar) -> Transition {
    if now >= bar.time + BAR_INTERVAL_SECS {
        Transition::NextBar
    } else {
        Transition::Advance
    }
}

/// One emitted transition with the state it produced.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LiveEvent {
    /// The current bar moved.
    Update(LiveState),
    /// A new bar was opened.
    Bar(LiveState),
}

impl LiveEvent {
    /// State after the transition.
    #[must_use]
    pub const fn state(&self) -> LiveState {
        match self {
            Self::Update(state) | Self::Bar(state) => *state,
        }
    }

    /// Lowercase event name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Bar(_) => "bar",
        }
    }
}

/// Applies one tick to `state`.
pub fn step<R: Rng>(
    generator: &mut SyntheticGenerator<R>,
    now: i64,
    state: &LiveState,
) -> LiveEvent {
    match decide(now, &state.bar) {
        Transition::NextBar => {
            let (bar, volume) = generator.next_bar(&state.bar);
            LiveEvent::Bar(LiveState::new(bar, volume))
        }
        Transition::Advance => {
            let (bar, volume) = generator.advance_bar(&state.bar, &state.volume);
            LiveEvent::Update(LiveState::new(bar, volume))
        }
    }
}

/// A running simulation seeded from a last bar.
///
/// The tick task is the only writer. Dropping the session, or calling
/// [`LiveSession::stop`], aborts it.
pub struct LiveSession {
    state: watch::Receiver<LiveState>,
    events: mpsc::Receiver<LiveEvent>,
    task: JoinHandle<()>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("state", &*self.state.borrow())
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl LiveSession {
    /// Starts ticking from `initial` on the current tokio runtime.
    pub fn spawn<R>(
        initial: LiveState,
        generator: SyntheticGenerator<R>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self
    where
        R: Rng + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(initial);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let task = tokio::spawn(async move {
            let mut generator = generator;
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let current = *state_tx.borrow();
                let event = step(&mut generator, clock.now(), &current);
                if let LiveEvent::Bar(state) = event {
                    debug!(time = state.bar.time, open = state.bar.open, "Opened bar");
                }
                state_tx.send_replace(event.state());
                if event_tx.try_send(event).is_err() {
                    trace!("Live event dropped, reader is behind or gone");
                }
            }
        });

        Self {
            state: state_rx,
            events: event_rx,
            task,
        }
    }

    /// Copy of the current bar/volume pair.
    #[must_use]
    pub fn snapshot(&self) -> LiveState {
        *self.state.borrow()
    }

    /// Waits for the next transition. Returns `None` once the session stops.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Turns the session into a stream of transitions that owns it; dropping
    /// the stream stops the ticks.
    pub fn into_events(self) -> impl Stream<Item = LiveEvent> + Send {
        futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }

    /// Stops scheduling ticks.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// True while the tick task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}
