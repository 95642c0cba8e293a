//! Recording fakes shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::controller::DimmerController;
use crate::dimmer::Collaborators;
use crate::hardware::{BrightnessFeed, HardwareBrightness, HardwareEvent, Subscription};
use crate::notify::{DimmingToast, Notifier, Toast};
use crate::overlay::OverlayBackend;
use crate::preference::MemoryStore;
use crate::reconciler::{BrightnessReconciler, ReconcilerSettings};
use crate::shortcut::ShortcutSubscriptionManager;
use crate::state::DimmerState;

/// Something a collaborator was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Activate,
    SetLevel(f64),
    Clear,
    HardwareWrite(f64),
    Toast(DimmingToast),
}

type CallLog = Rc<RefCell<Vec<Call>>>;

pub(crate) fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Fresh, empty directory under the system temp dir.
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "dimmer-test-{}-{}-{}",
        std::process::id(),
        name,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) struct RecordingOverlay {
    log: CallLog,
}

impl OverlayBackend for RecordingOverlay {
    fn activate(&self) {
        self.log.borrow_mut().push(Call::Activate);
    }

    fn set_level(&self, level: f64) {
        self.log.borrow_mut().push(Call::SetLevel(level));
    }

    fn clear(&self) {
        self.log.borrow_mut().push(Call::Clear);
    }
}

pub(crate) struct RecordingNotifier {
    log: CallLog,
    toasts: RefCell<Vec<Toast>>,
}

impl Notifier for RecordingNotifier {
    fn toast(&self, toast: &Toast) {
        self.log.borrow_mut().push(Call::Toast(toast.kind));
        self.toasts.borrow_mut().push(toast.clone());
    }
}

/// Hardware whose button presses are driven by the test.
pub(crate) struct FakeHardware {
    feed: BrightnessFeed,
    log: CallLog,
    writes: RefCell<Vec<f64>>,
    /// Report writes to subscribers before `write_brightness` returns.
    synchronous_echo: Cell<bool>,
}

impl FakeHardware {
    pub(crate) fn press(&self, level: f64) {
        self.feed.publish(level);
    }

    pub(crate) fn set_synchronous_echo(&self, enabled: bool) {
        self.synchronous_echo.set(enabled);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    pub(crate) fn writes(&self) -> Vec<f64> {
        self.writes.borrow().clone()
    }
}

impl HardwareBrightness for FakeHardware {
    fn subscribe(&self, callback: Box<dyn Fn(&HardwareEvent)>) -> Subscription {
        self.feed.subscribe(callback)
    }

    fn write_brightness(&self, level: f64) {
        self.log.borrow_mut().push(Call::HardwareWrite(level));
        self.writes.borrow_mut().push(level);
        if self.synchronous_echo.get() {
            self.feed.publish(level);
        }
    }
}

/// A controller and reconciler wired to recording fakes.
pub(crate) struct Rig {
    pub state: Rc<DimmerState>,
    pub controller: Rc<DimmerController>,
    pub reconciler: Rc<BrightnessReconciler>,
    pub hardware: Rc<FakeHardware>,
    pub store: Rc<MemoryStore>,
    overlay: Rc<RecordingOverlay>,
    notifier: Rc<RecordingNotifier>,
    log: CallLog,
}

impl Rig {
    pub(crate) fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub(crate) fn with_store(store: MemoryStore) -> Self {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let overlay = Rc::new(RecordingOverlay { log: log.clone() });
        let notifier = Rc::new(RecordingNotifier {
            log: log.clone(),
            toasts: RefCell::new(Vec::new()),
        });
        let hardware = Rc::new(FakeHardware {
            feed: BrightnessFeed::new(),
            log: log.clone(),
            writes: RefCell::new(Vec::new()),
            synchronous_echo: Cell::new(false),
        });

        let state = Rc::new(DimmerState::new());
        let controller = Rc::new(DimmerController::new(state.clone(), overlay.clone()));
        let reconciler = Rc::new(BrightnessReconciler::new(
            state.clone(),
            controller.clone(),
            hardware.clone(),
            notifier.clone(),
            ReconcilerSettings::default(),
        ));

        Self {
            state,
            controller,
            reconciler,
            hardware,
            store: Rc::new(store),
            overlay,
            notifier,
            log,
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    pub(crate) fn toasts(&self) -> Vec<Toast> {
        self.notifier.toasts.borrow().clone()
    }

    /// Subscribe the rig's reconciler to the fake hardware.
    pub(crate) fn subscribe_reconciler(&self) -> Subscription {
        let reconciler = Rc::downgrade(&self.reconciler);
        self.hardware.subscribe(Box::new(move |event| {
            if let Some(reconciler) = reconciler.upgrade() {
                reconciler.on_hardware_brightness_changed(event.level);
            }
        }))
    }

    pub(crate) fn shortcut_manager(&self) -> ShortcutSubscriptionManager {
        ShortcutSubscriptionManager::new(
            self.hardware.clone(),
            self.reconciler.clone(),
            self.store.clone(),
        )
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            hardware: self.hardware.clone(),
            overlay: self.overlay.clone(),
            notifier: self.notifier.clone(),
            store: self.store.clone(),
        }
    }
}
