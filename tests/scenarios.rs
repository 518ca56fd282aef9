use std::sync::Arc;
use std::time::Duration;

use jump_fsm::{
    Config, Event, EventSet, FsmError, Machine, Outcome, State, StateSet, TimerId,
    TransitionTable,
};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, StateSet)]
enum Link {
    #[fsm(name = "IDLE")]
    Idle,
    #[fsm(name = "CONNECTING")]
    Connecting,
    #[fsm(name = "UP")]
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EventSet)]
enum Stimulus {
    #[fsm(name = "CONNECT")]
    Connect,
    #[fsm(name = "TIMEOUT")]
    Timeout,
}

#[derive(Debug, Default)]
struct Session {
    t1: Option<TimerId>,
    timeouts: usize,
}

type LinkMachine = Machine<Session>;

const T1_DELAY: Duration = Duration::from_millis(50);

fn start_connecting(m: &mut LinkMachine, _: Event, _: ()) {
    m.set_state(Link::Connecting);
    let t1 = m.context().t1.expect("t1 bound");
    m.arm_timer(t1, T1_DELAY, Stimulus::Timeout, ())
        .expect("t1 idle");
}

fn fail(m: &mut LinkMachine, _: Event, _: ()) {
    m.context_mut().timeouts += 1;
    m.set_state(Link::Idle);
}

fn link_table() -> Arc<TransitionTable<Session>> {
    TransitionTable::for_sets::<Link, Stimulus>("link")
        .on(Link::Idle, Stimulus::Connect, start_connecting)
        .on(Link::Connecting, Stimulus::Timeout, fail)
        .build()
        .unwrap()
}

fn link_machine(history: usize) -> LinkMachine {
    let mut m = Machine::new(
        "link0",
        link_table(),
        Link::Idle,
        Session::default(),
        Config::default().with_history(history),
    )
    .unwrap();
    let t1 = m.bind_timer();
    m.context_mut().t1 = Some(t1);
    m
}

fn t1(m: &LinkMachine) -> TimerId {
    m.context().t1.unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lets spawned timer tasks run after the paused clock moved.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_then_timeout_returns_to_idle() {
    init_tracing();
    let mut m = link_machine(0);

    assert_eq!(m.dispatch(Stimulus::Connect, ()), Outcome::Handled);
    assert_eq!(m.state(), State::from(Link::Connecting));

    // No further events: T1 fires on its own.
    tokio::time::timeout(Duration::from_millis(100), m.step())
        .await
        .expect("timeout event within 100ms");
    assert_eq!(m.state_name(), "IDLE");
    assert_eq!(m.context().timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_then_timeout_spawned() {
    let (handle, task) = link_machine(0).spawn();

    handle.send(Stimulus::Connect, ()).await.unwrap();
    handle.wait_for_state(Link::Connecting).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.current_state(), State::from(Link::Idle));

    handle.shutdown_immediate();
    let session = task.await.unwrap();
    assert_eq!(session.timeouts, 1);
}

#[test]
fn test_event_without_handler_is_ignored() {
    let mut m = link_machine(4);
    assert_eq!(m.dispatch(Stimulus::Timeout, ()), Outcome::Ignored);
    assert_eq!(m.state(), State::from(Link::Idle));
    assert_eq!(m.context().timeouts, 0);
    assert_eq!(m.print_history(), vec!["IDLE"]);
}

#[test]
fn test_out_of_range_transition_is_bad_template() {
    let result = TransitionTable::<Session>::for_sets::<Link, Stimulus>("link")
        .on(State::new(5), Event::new(0), fail)
        .build();
    assert!(matches!(result, Err(FsmError::BadTemplate { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_timer_does_not_fire_early() {
    let mut m = link_machine(0);
    let t0 = Instant::now();
    m.dispatch(Stimulus::Connect, ());

    tokio::time::advance(Duration::from_millis(49)).await;
    settle().await;
    assert_eq!(m.pump(), 0);
    assert_eq!(m.state(), State::from(Link::Connecting));
    assert!(m.is_timer_pending(t1(&m)));

    assert_eq!(m.step().await, Outcome::Handled);
    let elapsed = t0.elapsed();
    assert!(elapsed >= T1_DELAY && elapsed < T1_DELAY + Duration::from_millis(5));
    assert_eq!(m.state(), State::from(Link::Idle));
    assert!(!m.is_timer_pending(t1(&m)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let mut m = link_machine(0);
    let t1 = t1(&m);

    // Never armed.
    assert!(!m.cancel_timer(t1));
    assert!(!m.cancel_timer(t1));

    // Pending.
    m.dispatch(Stimulus::Connect, ());
    assert!(m.cancel_timer(t1));
    assert!(!m.cancel_timer(t1));
    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(m.pump(), 0);
    assert_eq!(m.state(), State::from(Link::Connecting));

    // Already fired.
    m.arm_timer(t1, T1_DELAY, Stimulus::Timeout, ()).unwrap();
    m.step().await;
    assert_eq!(m.state(), State::from(Link::Idle));
    assert!(!m.cancel_timer(t1));
    assert!(!m.cancel_timer(t1));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_expiry_queued_discards_it() {
    let mut m = link_machine(0);
    let t1 = t1(&m);
    m.dispatch(Stimulus::Connect, ());

    // The expiry is posted but not yet dispatched.
    tokio::time::advance(T1_DELAY).await;
    settle().await;

    assert!(m.cancel_timer(t1));
    assert_eq!(m.pump(), 1);
    assert_eq!(m.state(), State::from(Link::Connecting));
    assert_eq!(m.context().timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_arm_twice_is_refused() {
    let mut m = link_machine(0);
    let t1 = t1(&m);
    m.arm_timer(t1, T1_DELAY, Stimulus::Timeout, ()).unwrap();
    let err = m
        .arm_timer(t1, T1_DELAY, Stimulus::Timeout, ())
        .unwrap_err();
    assert!(matches!(err, FsmError::TimerPending { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_rearm_moves_deadline() {
    let mut m = link_machine(0);
    let t1 = t1(&m);
    let t0 = Instant::now();
    m.dispatch(Stimulus::Connect, ());

    tokio::time::advance(Duration::from_millis(30)).await;
    m.rearm_timer(t1, T1_DELAY, Stimulus::Timeout, ()).unwrap();
    assert_eq!(m.timer_remaining(t1), Some(T1_DELAY));

    // Past the original deadline, before the new one.
    tokio::time::advance(Duration::from_millis(30)).await;
    settle().await;
    assert_eq!(m.pump(), 0);
    assert_eq!(m.state(), State::from(Link::Connecting));

    m.step().await;
    let elapsed = t0.elapsed();
    assert!(elapsed >= Duration::from_millis(80) && elapsed < Duration::from_millis(85));
    assert_eq!(m.state(), State::from(Link::Idle));
    assert_eq!(m.context().timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_unarmed_timer_arms_it() {
    let mut m = link_machine(0);
    let t1 = t1(&m);
    m.set_state(Link::Connecting);
    m.rearm_timer(t1, T1_DELAY, Stimulus::Timeout, ()).unwrap();
    m.step().await;
    assert_eq!(m.state(), State::from(Link::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_history_through_timeout() {
    init_tracing();
    let mut m = link_machine(3);
    m.dispatch(Stimulus::Connect, ());
    m.step().await;

    // Capacity 3 keeps the last three of five records.
    assert_eq!(
        m.print_history(),
        vec!["CONNECTING", "CONNECTING / TIMEOUT", "IDLE"]
    );
    assert!(m.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_returns_context_with_timers_pending() {
    let mut m = link_machine(0);
    m.dispatch(Stimulus::Connect, ());
    let extra = m.bind_timer();
    m.arm_timer(extra, Duration::from_secs(5), Stimulus::Timeout, ())
        .unwrap();

    let session = m.destroy();
    assert_eq!(session.timeouts, 0);
    tokio::time::sleep(Duration::from_secs(10)).await;
}

#[test]
fn test_unknown_timer() {
    let mut a = link_machine(0);
    let mut b = link_machine(0);
    let foreign = {
        b.bind_timer();
        b.bind_timer()
    };
    assert!(!a.cancel_timer(foreign));
    let err = a
        .arm_timer(foreign, T1_DELAY, Stimulus::Timeout, ())
        .unwrap_err();
    assert!(matches!(err, FsmError::UnknownTimer { .. }));
}

#[test]
fn test_state_without_any_handler() {
    let mut m = link_machine(0);
    m.set_state(Link::Up);
    assert_eq!(m.dispatch(Stimulus::Connect, ()), Outcome::Ignored);
    assert_eq!(m.dispatch(Stimulus::Timeout, ()), Outcome::Ignored);
    assert_eq!(Link::try_from(m.state()), Ok(Link::Up));
}
