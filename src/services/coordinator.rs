//! Session coordinator: owns the round lifecycle.
//!
//! The coordinator is a single actor task. Every entry point, fetch
//! completion, timer, and countdown tick is a [`Command`] processed one at a
//! time on that task, so session state and the coordinator flags are only
//! ever touched from one place and every event is published from it.
//!
//! ```text
//! CoordinatorHandle ──┐
//! CountdownDriver  ───┼──► mpsc ──► Coordinator ──► EventBus ──► subscribers
//! fetch tasks      ───┤                 │
//! delay timers     ───┘                 └──► spawn(fetch / sleep)
//! ```

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::AbortHandle,
    time::{sleep, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::SessionTimings,
    services::{
        countdown::CountdownDriver,
        item_source::{FetchError, ItemSource},
    },
    state::{
        event_bus::{EventBus, GameEvent},
        phase::{CoordinatorPhase, InvalidTransition, PhaseEvent, PhaseMachine},
        session::{Player, PuzzleItem, Session},
    },
};

/// Failures returned to callers of [`CoordinatorHandle`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The coordinator task is no longer running.
    #[error("session coordinator stopped")]
    Stopped,
    /// The request is not valid in the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Result of [`CoordinatorHandle::submit_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The answer was graded against the current item.
    Graded {
        /// Grading verdict.
        correct: bool,
    },
    /// No item is loaded yet; nothing was counted.
    NoItem,
    /// No active round; termination was requested instead.
    Inactive,
}

/// Result of [`CoordinatorHandle::request_next_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A background fetch was started.
    Started,
    /// A fetch is already in flight; nothing was done.
    AlreadyLoading,
    /// The round expired; termination was requested instead.
    SessionInactive,
    /// No round is running.
    NotRunning,
}

/// Point-in-time view of the coordinator and its current round.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Coordinator phase.
    pub phase: CoordinatorPhase,
    /// Player of the current (or last) round.
    pub player: Option<Player>,
    /// Puzzle currently shown.
    pub current_item: Option<PuzzleItem>,
    /// Correct answers in the round.
    pub score: u32,
    /// Answers submitted in the round.
    pub attempts: u32,
    /// Round accuracy in percent.
    pub accuracy: f64,
    /// Time left in the round.
    pub remaining: Duration,
    /// Whether the round accepts answers.
    pub active: bool,
    /// Whether a fetch is in flight.
    pub loading: bool,
}

enum Command {
    Start {
        player: Player,
        reply: oneshot::Sender<Result<SessionSnapshot, InvalidTransition>>,
    },
    Submit {
        value: i32,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    RequestNextItem {
        reply: oneshot::Sender<RequestOutcome>,
    },
    End {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    FetchCompleted {
        generation: u64,
        result: Result<PuzzleItem, FetchError>,
    },
    RetryFetch {
        generation: u64,
    },
    FollowUp {
        generation: u64,
        sequence: u64,
    },
    Tick {
        generation: u64,
        remaining: Duration,
    },
    CountdownExpired {
        generation: u64,
    },
}

/// Cloneable entry point to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Start a round for `player`. Rejected while a round is running.
    pub async fn start_session(&self, player: Player) -> Result<SessionSnapshot, CoordinatorError> {
        let snapshot = self.call(|reply| Command::Start { player, reply }).await??;
        Ok(snapshot)
    }

    /// Grade `value` against the current item.
    pub async fn submit_answer(&self, value: i32) -> Result<SubmitOutcome, CoordinatorError> {
        self.call(|reply| Command::Submit { value, reply }).await
    }

    /// Ask for the next item, e.g. to skip the current one.
    pub async fn request_next_item(&self) -> Result<RequestOutcome, CoordinatorError> {
        self.call(|reply| Command::RequestNextItem { reply }).await
    }

    /// Terminate the round. Returns `true` only for the call that performed
    /// the termination.
    pub async fn end_session(&self) -> Result<bool, CoordinatorError> {
        self.call(|reply| Command::End { reply }).await
    }

    /// Current state of the coordinator.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, CoordinatorError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Report a countdown observation. Returns `false` once the coordinator is gone.
    pub(crate) fn tick(&self, generation: u64, remaining: Duration) -> bool {
        self.tx
            .send(Command::Tick {
                generation,
                remaining,
            })
            .is_ok()
    }

    /// Report that the countdown of round `generation` reached zero.
    pub(crate) fn countdown_expired(&self, generation: u64) {
        let _ = self.tx.send(Command::CountdownExpired { generation });
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }
}

/// Actor state. Lives on its own task; see the module docs.
pub struct Coordinator {
    bus: Arc<EventBus>,
    source: Arc<dyn ItemSource>,
    timings: SessionTimings,
    commands: mpsc::WeakUnboundedSender<Command>,
    machine: PhaseMachine,
    session: Option<Session>,
    generation: u64,
    is_loading_item: bool,
    has_ended: bool,
    follow_up: Option<AbortHandle>,
    follow_up_sequence: u64,
    retry: Option<AbortHandle>,
    countdown: Option<CountdownDriver>,
}

impl Coordinator {
    /// Spawn the coordinator task and return a handle to it.
    ///
    /// The task stops once every handle is dropped and no timer or fetch is
    /// pending.
    pub fn spawn(
        bus: Arc<EventBus>,
        source: Arc<dyn ItemSource>,
        timings: SessionTimings,
    ) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            bus,
            source,
            timings,
            commands: tx.downgrade(),
            machine: PhaseMachine::new(),
            session: None,
            generation: 0,
            is_loading_item: false,
            has_ended: false,
            follow_up: None,
            follow_up_sequence: 0,
            retry: None,
            countdown: None,
        };
        tokio::spawn(coordinator.run(rx));
        CoordinatorHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.dispatch(command);
        }
        self.cancel_timers();
        debug!("session coordinator stopped");
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Start { player, reply } => {
                let _ = reply.send(self.start_session(player));
            }
            Command::Submit { value, reply } => {
                let _ = reply.send(self.submit_answer(value));
            }
            Command::RequestNextItem { reply } => {
                let _ = reply.send(self.request_next_item());
            }
            Command::End { reply } => {
                let _ = reply.send(self.end_session());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::FetchCompleted { generation, result } => {
                self.on_fetch_completed(generation, result);
            }
            Command::RetryFetch { generation } => {
                if generation == self.generation {
                    self.retry = None;
                    self.is_loading_item = false;
                    self.request_next_item();
                }
            }
            Command::FollowUp {
                generation,
                sequence,
            } => {
                if generation == self.generation && sequence == self.follow_up_sequence {
                    self.follow_up = None;
                    self.request_next_item();
                }
            }
            Command::Tick {
                generation,
                remaining,
            } => {
                if generation == self.generation
                    && self.machine.phase() == CoordinatorPhase::Running
                {
                    self.bus.publish(&GameEvent::Tick { remaining });
                }
            }
            Command::CountdownExpired { generation } => {
                if generation == self.generation {
                    self.end_session();
                }
            }
        }
    }

    fn start_session(&mut self, player: Player) -> Result<SessionSnapshot, InvalidTransition> {
        self.machine.apply(PhaseEvent::Start)?;
        self.cancel_timers();

        self.generation += 1;
        let session = Session::new(player.clone(), self.timings.session_duration);
        let clock = session.clock();
        self.session = Some(session);
        self.has_ended = false;
        // A fetch still running for the previous round reports a stale generation.
        self.is_loading_item = false;

        info!(
            username = %player.username,
            generation = self.generation,
            duration_secs = self.timings.session_duration.as_secs(),
            "player session started"
        );
        self.bus
            .publish(&GameEvent::PlayerSessionStarted { player });

        if let Some(tx) = self.commands.upgrade() {
            self.countdown = Some(CountdownDriver::spawn(
                clock,
                self.timings.tick_interval,
                self.generation,
                CoordinatorHandle { tx },
            ));
        }

        self.request_next_item();
        Ok(self.snapshot())
    }

    fn request_next_item(&mut self) -> RequestOutcome {
        if self.machine.phase() != CoordinatorPhase::Running {
            return RequestOutcome::NotRunning;
        }
        if self.is_loading_item {
            debug!("item load already in flight; ignoring request");
            return RequestOutcome::AlreadyLoading;
        }
        if !self.session_is_active() {
            self.end_session();
            return RequestOutcome::SessionInactive;
        }

        self.is_loading_item = true;
        self.spawn_fetch();
        RequestOutcome::Started
    }

    fn spawn_fetch(&self) {
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        let fetch = self.source.fetch_one();
        let limit = self.timings.fetch_timeout;
        let generation = self.generation;

        tokio::spawn(async move {
            let result = match timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };
            let _ = tx.send(Command::FetchCompleted { generation, result });
        });
    }

    fn on_fetch_completed(&mut self, generation: u64, result: Result<PuzzleItem, FetchError>) {
        if generation != self.generation {
            debug!(generation, "discarding fetch result from a previous round");
            return;
        }

        let still_active =
            self.machine.phase() == CoordinatorPhase::Running && self.session_is_active();

        match result {
            Ok(item) => {
                self.is_loading_item = false;
                if !still_active {
                    debug!("round expired while loading; discarding item");
                    return;
                }
                if let Some(session) = self.session.as_mut() {
                    session.set_current_item(item.clone());
                }
                debug!(image_len = item.image().len(), "item loaded");
                self.bus.publish(&GameEvent::ItemLoaded { item });
            }
            Err(err) if still_active => {
                warn!(
                    error = %err,
                    backoff_ms = self.timings.retry_backoff.as_millis() as u64,
                    "item fetch failed; retrying"
                );
                // The loading flag stays set until the retry fires.
                self.retry = self.schedule(
                    self.timings.retry_backoff,
                    Command::RetryFetch { generation },
                );
            }
            Err(err) => {
                self.is_loading_item = false;
                debug!(error = %err, "item fetch failed after the round ended; not retrying");
            }
        }
    }

    fn submit_answer(&mut self, value: i32) -> SubmitOutcome {
        if self.machine.phase() != CoordinatorPhase::Running || !self.session_is_active() {
            self.end_session();
            return SubmitOutcome::Inactive;
        }
        let Some(session) = self.session.as_mut() else {
            return SubmitOutcome::Inactive;
        };
        if session.current_item().is_none() {
            debug!(value, "answer submitted before any item loaded; ignoring");
            return SubmitOutcome::NoItem;
        }

        let correct = session.check_answer(value);
        let player = session.player().clone();
        debug!(value, correct, score = session.score(), "answer graded");

        self.bus.publish(&GameEvent::AnswerSubmitted {
            value,
            correct,
            player: player.clone(),
        });
        self.bus.publish(&GameEvent::ScoreUpdated { player });

        self.schedule_follow_up();
        SubmitOutcome::Graded { correct }
    }

    fn schedule_follow_up(&mut self) {
        if let Some(previous) = self.follow_up.take() {
            previous.abort();
        }
        self.follow_up_sequence += 1;
        self.follow_up = self.schedule(
            self.timings.follow_up_delay,
            Command::FollowUp {
                generation: self.generation,
                sequence: self.follow_up_sequence,
            },
        );
    }

    fn end_session(&mut self) -> bool {
        if self.has_ended {
            debug!("session already ended; ignoring duplicate end request");
            return false;
        }
        if self.machine.phase() != CoordinatorPhase::Running {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        self.has_ended = true;
        if let Err(err) = self.machine.apply(PhaseEvent::BeginEnd) {
            warn!(error = %err, "unexpected phase while ending session");
        }
        session.end();
        let player = session.player().clone();
        let summary = session.summary();
        self.cancel_timers();

        info!(
            username = %player.username,
            score = summary.score,
            attempts = summary.attempts,
            accuracy = summary.accuracy,
            passed = summary.passed,
            "player session ended"
        );
        self.bus
            .publish(&GameEvent::SessionEnded { player, summary });

        if let Err(err) = self.machine.apply(PhaseEvent::FinishEnd) {
            warn!(error = %err, "unexpected phase after ending session");
        }
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        let phase = self.machine.phase();
        match &self.session {
            Some(session) => {
                let summary = session.summary();
                SessionSnapshot {
                    phase,
                    player: Some(session.player().clone()),
                    current_item: session.current_item().cloned(),
                    score: summary.score,
                    attempts: summary.attempts,
                    accuracy: summary.accuracy,
                    remaining: session.remaining(),
                    active: phase == CoordinatorPhase::Running && session.is_active(),
                    loading: self.is_loading_item,
                }
            }
            None => SessionSnapshot {
                phase,
                player: None,
                current_item: None,
                score: 0,
                attempts: 0,
                accuracy: 0.0,
                remaining: Duration::ZERO,
                active: false,
                loading: false,
            },
        }
    }

    fn session_is_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    fn schedule(&self, delay: Duration, command: Command) -> Option<AbortHandle> {
        let tx = self.commands.upgrade()?;
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(command);
        });
        Some(task.abort_handle())
    }

    fn cancel_timers(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.stop();
        }
        if let Some(follow_up) = self.follow_up.take() {
            follow_up.abort();
        }
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use futures::future::BoxFuture;
    use tokio::{sync::Notify, time::Instant};

    use super::*;
    use crate::state::event_bus::{EventKind, Subscriber};

    const SOLUTION: i32 = 4;

    /// Replays a script of outcomes, then succeeds forever.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<i32, ()>>>,
        delay: Mutex<VecDeque<Duration>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<i32, ()>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                delay: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn always_ok() -> Arc<Self> {
            Self::new(Vec::new())
        }

        fn with_delays(self: Arc<Self>, delays: Vec<Duration>) -> Arc<Self> {
            *self.delay.lock().unwrap() = delays.into();
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ItemSource for ScriptedSource {
        fn fetch_one(&self) -> BoxFuture<'static, Result<PuzzleItem, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(SOLUTION));
            let delay = self.delay.lock().unwrap().pop_front().unwrap_or_default();
            Box::pin(async move {
                sleep(delay).await;
                next.map(|solution| PuzzleItem::new(vec![0xAB; 4], solution))
                    .map_err(|()| FetchError::Parse("scripted failure".into()))
            })
        }
    }

    /// Blocks every fetch until released.
    struct GatedSource {
        gate: Arc<Notify>,
        calls: AtomicUsize,
    }

    impl ItemSource for GatedSource {
        fn fetch_one(&self) -> BoxFuture<'static, Result<PuzzleItem, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.clone();
            Box::pin(async move {
                gate.notified().await;
                Ok(PuzzleItem::new(vec![1], SOLUTION))
            })
        }
    }

    fn timings(duration_secs: u64) -> SessionTimings {
        SessionTimings {
            session_duration: Duration::from_secs(duration_secs),
            ..SessionTimings::default()
        }
    }

    fn setup(
        timings: SessionTimings,
        source: Arc<dyn ItemSource>,
    ) -> (CoordinatorHandle, mpsc::UnboundedReceiver<GameEvent>) {
        let bus = Arc::new(EventBus::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder: Arc<dyn Subscriber> = Arc::new(move |event: &GameEvent| {
            let _ = tx.send(event.clone());
        });
        let kinds: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|kind| *kind != EventKind::Tick)
            .collect();
        bus.subscribe_many(&kinds, recorder);
        (Coordinator::spawn(bus, source, timings), rx)
    }

    async fn next_of(rx: &mut mpsc::UnboundedReceiver<GameEvent>, kind: EventKind) -> GameEvent {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if event.kind() == kind {
                return event;
            }
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn count(events: &[GameEvent], kind: EventKind) -> usize {
        events.iter().filter(|event| event.kind() == kind).count()
    }

    #[tokio::test(start_paused = true)]
    async fn start_publishes_started_then_loads_first_item() {
        let (handle, mut events) = setup(timings(30), ScriptedSource::always_ok());

        let snapshot = handle.start_session(Player::new("alice")).await.unwrap();
        assert_eq!(snapshot.phase, CoordinatorPhase::Running);
        assert!(snapshot.active);

        let first = events.recv().await.unwrap();
        assert!(matches!(first, GameEvent::PlayerSessionStarted { ref player } if player.username == "alice"));
        let loaded = next_of(&mut events, EventKind::ItemLoaded).await;
        assert!(matches!(loaded, GameEvent::ItemLoaded { ref item } if item.solution() == SOLUTION));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.current_item.is_some());
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn round_with_three_answers_ends_once() {
        let (handle, mut events) = setup(timings(5), ScriptedSource::always_ok());
        handle.start_session(Player::new("alice")).await.unwrap();

        for (value, expected) in [(SOLUTION, true), (SOLUTION + 1, false), (SOLUTION, true)] {
            next_of(&mut events, EventKind::ItemLoaded).await;
            let outcome = handle.submit_answer(value).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::Graded { correct: expected });
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.score, 2);
        assert_eq!(snapshot.attempts, 3);
        assert!((snapshot.accuracy - 66.67).abs() < 0.01);

        let ended = next_of(&mut events, EventKind::SessionEnded).await;
        match ended {
            GameEvent::SessionEnded { player, summary } => {
                assert_eq!(summary.score, 2);
                assert_eq!(summary.attempts, 3);
                assert!(summary.passed);
                assert_eq!(player.total_attempts, 3);
            }
            other => panic!("expected session end, got {other:?}"),
        }

        sleep(Duration::from_secs(3)).await;
        assert_eq!(count(&drain(&mut events), EventKind::SessionEnded), 0);
        assert_eq!(
            handle.snapshot().await.unwrap().phase,
            CoordinatorPhase::Ended
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_are_retried_until_success() {
        let source = ScriptedSource::new(vec![Err(()), Err(())]);
        let (handle, mut events) = setup(timings(30), source.clone());

        let started = Instant::now();
        handle.start_session(Player::new("alice")).await.unwrap();
        next_of(&mut events, EventKind::ItemLoaded).await;

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2), "waited {waited:?}");
        assert!(waited < Duration::from_secs(3), "waited {waited:?}");
        assert_eq!(source.calls(), 3);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count(&drain(&mut events), EventKind::ItemLoaded), 0);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn request_while_loading_is_noop() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(GatedSource {
            gate: gate.clone(),
            calls: AtomicUsize::new(0),
        });
        let (handle, mut events) = setup(timings(30), source.clone());
        handle.start_session(Player::new("alice")).await.unwrap();

        for _ in 0..3 {
            assert_eq!(
                handle.request_next_item().await.unwrap(),
                RequestOutcome::AlreadyLoading
            );
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        next_of(&mut events, EventKind::ItemLoaded).await;
        assert_eq!(
            handle.request_next_item().await.unwrap(),
            RequestOutcome::Started
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_end_requests_publish_once() {
        let (handle, mut events) = setup(timings(30), ScriptedSource::always_ok());
        handle.start_session(Player::new("alice")).await.unwrap();

        let calls = (0..8).map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.end_session().await.unwrap() })
        });
        let results = futures::future::join_all(calls).await;
        let performed = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(performed, 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(count(&drain(&mut events), EventKind::SessionEnded), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_and_safety_net_end_only_once() {
        let timings = SessionTimings {
            session_duration: Duration::from_secs(1),
            // the countdown misses the exact expiry instant
            tick_interval: Duration::from_secs(2),
            ..SessionTimings::default()
        };
        let (handle, mut events) = setup(timings, ScriptedSource::always_ok());
        handle.start_session(Player::new("alice")).await.unwrap();
        next_of(&mut events, EventKind::ItemLoaded).await;

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(
            handle.submit_answer(SOLUTION).await.unwrap(),
            SubmitOutcome::Inactive
        );
        assert!(!handle.end_session().await.unwrap());

        sleep(Duration::from_secs(3)).await;
        let events = drain(&mut events);
        assert_eq!(count(&events, EventKind::SessionEnded), 1);
        assert_eq!(count(&events, EventKind::AnswerSubmitted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn item_arriving_after_expiry_is_discarded() {
        let source = ScriptedSource::always_ok().with_delays(vec![Duration::from_secs(8)]);
        let (handle, mut events) = setup(timings(5), source);
        handle.start_session(Player::new("alice")).await.unwrap();

        next_of(&mut events, EventKind::SessionEnded).await;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(count(&drain(&mut events), EventKind::ItemLoaded), 0);
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.current_item.is_none());
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out_and_retries() {
        let source = ScriptedSource::always_ok().with_delays(vec![Duration::from_secs(60)]);
        let timings = SessionTimings {
            fetch_timeout: Duration::from_secs(2),
            ..timings(30)
        };
        let (handle, mut events) = setup(timings, source.clone());

        let started = Instant::now();
        handle.start_session(Player::new("alice")).await.unwrap();
        next_of(&mut events, EventKind::ItemLoaded).await;

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_without_item_is_not_counted() {
        let source = Arc::new(GatedSource {
            gate: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        });
        let (handle, mut events) = setup(timings(30), source);
        handle.start_session(Player::new("alice")).await.unwrap();

        assert_eq!(
            handle.submit_answer(3).await.unwrap(),
            SubmitOutcome::NoItem
        );
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.attempts, 0);
        assert_eq!(count(&drain(&mut events), EventKind::AnswerSubmitted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_answers_schedule_a_single_follow_up() {
        let source = ScriptedSource::always_ok();
        let (handle, mut events) = setup(timings(30), source.clone());
        handle.start_session(Player::new("alice")).await.unwrap();
        next_of(&mut events, EventKind::ItemLoaded).await;

        handle.submit_answer(SOLUTION).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        handle.submit_answer(SOLUTION + 2).await.unwrap();

        next_of(&mut events, EventKind::ItemLoaded).await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(count(&drain(&mut events), EventKind::ItemLoaded), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rules_follow_the_phase_machine() {
        let (handle, mut events) = setup(timings(2), ScriptedSource::always_ok());
        handle.start_session(Player::new("alice")).await.unwrap();

        let err = handle
            .start_session(Player::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidTransition(_)));

        next_of(&mut events, EventKind::SessionEnded).await;
        let snapshot = handle.start_session(Player::new("bob")).await.unwrap();
        assert_eq!(snapshot.phase, CoordinatorPhase::Running);
        assert_eq!(snapshot.attempts, 0);

        let ended = next_of(&mut events, EventKind::SessionEnded).await;
        assert!(matches!(ended, GameEvent::SessionEnded { ref player, .. } if player.username == "bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_points_are_noops_before_start() {
        let (handle, mut events) = setup(timings(30), ScriptedSource::always_ok());

        assert_eq!(
            handle.request_next_item().await.unwrap(),
            RequestOutcome::NotRunning
        );
        assert_eq!(
            handle.submit_answer(1).await.unwrap(),
            SubmitOutcome::Inactive
        );
        assert!(!handle.end_session().await.unwrap());
        assert_eq!(handle.snapshot().await.unwrap().phase, CoordinatorPhase::Idle);
        assert!(drain(&mut events).is_empty());
    }
}
