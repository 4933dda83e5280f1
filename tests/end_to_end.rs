use arduino_bridge::consumers::{ButtonConsumer, ButtonEventKind, ButtonSettings};
use arduino_bridge::router::{InputConsumer, InputRouter, PumpHandle, ReaderLineSource};
use arduino_bridge::{ButtonDebouncer, ButtonState, PinIdentifier, ProcessResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Records every debouncer result for one pin.
struct RecordingButton {
    pin: PinIdentifier,
    debouncer: Mutex<ButtonDebouncer>,
    results: Mutex<Vec<ProcessResult>>,
}

impl RecordingButton {
    fn new(pin: PinIdentifier) -> Arc<Self> {
        Arc::new(Self {
            pin,
            debouncer: Mutex::new(ButtonDebouncer::default()),
            results: Mutex::new(Vec::new()),
        })
    }
}

impl InputConsumer for RecordingButton {
    fn process_input(&self, pin: PinIdentifier, value: f32) {
        if pin != self.pin {
            return;
        }
        let result = self.debouncer.lock().unwrap().process_input(value);
        self.results.lock().unwrap().push(result);
    }
}

async fn pump(router: &Arc<InputRouter>, input: &'static [u8]) {
    let handle = PumpHandle::spawn(
        router.dispatcher(),
        Some(ReaderLineSource::new(input)),
        CancellationToken::new(),
        Duration::from_secs(30),
    )
    .unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn press_hold_release_sequence() {
    let router = InputRouter::new();
    let button = RecordingButton::new(PinIdentifier::D4);
    router.register(&button);

    pump(&router, b"4#0\n4#1\n4#1\n4#0\n").await;

    let results = button.results.lock().unwrap().clone();
    let states: Vec<ButtonState> = results.iter().map(|r| r.current_state).collect();
    assert_eq!(
        states,
        vec![
            ButtonState::None,
            ButtonState::Pressed,
            ButtonState::Pressed,
            ButtonState::Released
        ]
    );
    assert!(results[1].was_pressed);
    assert!(!results[2].state_changed);
    assert!(results[3].was_released);
    assert_eq!(results.iter().filter(|r| r.state_changed).count(), 2);
}

#[tokio::test]
async fn noise_and_other_pins_do_not_reach_the_button() {
    let router = InputRouter::new();
    let button = RecordingButton::new(PinIdentifier::D4);
    router.register(&button);

    pump(&router, b"\nabc\n4#\n4#x\n4#3#4\n99#1\n5#1\n4#1.7\n").await;

    let results = button.results.lock().unwrap().clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].current_value, 1.0);
    assert!(results[0].was_pressed);

    let stats = router.dispatcher().stats();
    assert_eq!(stats.lines, 8);
    assert_eq!(stats.broadcast, 2);
}

#[tokio::test]
async fn button_consumer_reports_edges_through_channel() {
    let router = InputRouter::new();
    let (tx, mut rx) = mpsc::channel(16);
    let button = Arc::new(ButtonConsumer::new(
        "fire",
        PinIdentifier::A0,
        ButtonSettings {
            press_threshold: 0.5,
            hold_threshold_ms: 60_000,
        },
        tx,
    ));
    router.register(&button);

    pump(&router, b"14#0.2\n14#0.9\n14#0.8\n14#0.5\n").await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, ButtonEventKind::Pressed);
    assert_eq!(first.name, "fire");
    let second = rx.recv().await.unwrap();
    assert!(matches!(second.kind, ButtonEventKind::Released { .. }));
    assert!(rx.try_recv().is_err());

    router.unregister(&button);
    assert!(router.is_empty());
}
