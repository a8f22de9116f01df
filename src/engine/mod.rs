//! `Engine`: the public operation surface (spec.md §4.2 table), wrapping
//! `RuntimeState` behind a single mutex guarding all runtime state.
//!
//! Grounded on `examples/original_source/src/core/engine/engine_lifecycle.cpp`
//! (`start`/`stop` thread management) and `engine_setting.cpp`
//! (`setSetting`).

pub mod focus;
pub mod generator;
pub mod pipeline;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::{KeyId, KeymapId, Modifier, ModifierType, Setting};
use crate::event_bus::EventBus;
use crate::platform::{ActionExecutor, InputCapture, WindowHandle, WindowSystem};

use focus::FocusOfThread;
use pipeline::PipelineContext;
use state::RuntimeState;

/// Owns the mutable runtime state, the event queue, and the consumer
/// thread. `start`/`stop` are idempotent; calling either twice in a row is
/// a no-op rather than a panic, matching the original's defensive
/// `if (m_inputQueue) return;` guards.
pub struct Engine {
    state: Mutex<RuntimeState>,
    bus: Arc<EventBus>,
    executor: Arc<dyn ActionExecutor>,
    window_system: Arc<dyn WindowSystem>,
    capture: Mutex<Option<Box<dyn InputCapture>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    enabled: AtomicBool,
}

impl Engine {
    pub fn new(
        setting: Arc<Setting>,
        executor: Arc<dyn ActionExecutor>,
        window_system: Arc<dyn WindowSystem>,
    ) -> Self {
        Engine {
            state: Mutex::new(RuntimeState::new(setting)),
            bus: Arc::new(EventBus::new()),
            executor,
            window_system,
            capture: Mutex::new(None),
            consumer: Mutex::new(None),
            enabled: AtomicBool::new(true),
        }
    }

    /// Installs the capture hook and starts the single consumer thread.
    /// A no-op if already started.
    pub fn start(&self, mut capture: Box<dyn InputCapture>) -> Result<(), crate::platform::PlatformError> {
        let mut consumer_guard = self.consumer.lock().unwrap();
        if consumer_guard.is_some() {
            return Ok(());
        }

        let bus = self.bus.clone();
        capture.start(Box::new(move |event| {
            bus.push(crate::rule_engine::translate(&event, 0));
        }))?;
        *self.capture.lock().unwrap() = Some(capture);

        let bus = self.bus.clone();
        let executor = self.executor.clone();
        let window_system = self.window_system.clone();
        // SAFETY note for reviewers: the consumer thread only ever reaches
        // `self.state` through the `Mutex`; `Engine` outlives the thread
        // because `stop()` joins it before any drop could run.
        let state_ptr: *const Mutex<RuntimeState> = &self.state;
        let handle = std::thread::spawn(move || {
            // The pointer is valid for the thread's lifetime: `stop()`
            // joins this handle before `Engine` (and `self.state`) can be
            // dropped.
            let state_mutex = unsafe { &*state_ptr };
            loop {
                let Some(raw) = bus.pop() else { break };
                let pctx = PipelineContext {
                    executor: executor.as_ref(),
                    window_system: window_system.as_ref(),
                    current_window: 0,
                };
                let mut state = state_mutex.lock().unwrap();
                pipeline::process_event(&mut state, &pctx, raw);
            }
        });
        *consumer_guard = Some(handle);
        Ok(())
    }

    /// Uninstalls the capture hook, closes the queue, and joins the
    /// consumer thread. A no-op if not started.
    pub fn stop(&self) {
        if let Some(mut capture) = self.capture.lock().unwrap().take() {
            if let Err(e) = capture.stop() {
                log::warn!("engine: capture stop failed: {e}");
            }
        }
        self.bus.close();
        if let Some(handle) = self.consumer.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn enable(&self, on: bool) {
        self.enabled.store(on, Ordering::SeqCst);
        self.state.lock().unwrap().enabled = on;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Migrates per-key state and re-resolves focus keymaps under the lock.
    pub fn set_setting(&self, new_setting: Arc<Setting>) {
        self.state.lock().unwrap().install_setting(new_setting);
    }

    pub fn set_focus(
        &self,
        thread_id: u64,
        hwnd: WindowHandle,
        class: &str,
        title: &str,
        is_console: bool,
    ) {
        let mut state = self.state.lock().unwrap();
        let keymaps = focus::resolve_focus_keymaps(&state.setting, class, title);
        let mut f = FocusOfThread::new(thread_id, hwnd);
        f.class = class.to_string();
        f.title = title.to_string();
        f.is_console = is_console;
        f.keymaps = keymaps;
        state.focus.insert(thread_id, f);
        state.current_thread = Some(thread_id);
    }

    pub fn set_lock_state(
        &self,
        numlock: bool,
        capslock: bool,
        scrolllock: bool,
        kanalock: bool,
        imelock: bool,
        imecomp: bool,
    ) {
        let mut state = self.state.lock().unwrap();
        set_bit(&mut state.lock_modifier, ModifierType::NumLock, numlock);
        set_bit(&mut state.lock_modifier, ModifierType::CapsLock, capslock);
        set_bit(&mut state.lock_modifier, ModifierType::ScrollLock, scrolllock);
        set_bit(&mut state.lock_modifier, ModifierType::KanaLock, kanalock);
        set_bit(&mut state.lock_modifier, ModifierType::ImeLock, imelock);
        set_bit(&mut state.lock_modifier, ModifierType::ImeComp, imecomp);
    }

    pub fn thread_attach_notify(&self, thread_id: u64, hwnd: WindowHandle) {
        let mut state = self.state.lock().unwrap();
        state
            .focus
            .entry(thread_id)
            .or_insert_with(|| FocusOfThread::new(thread_id, hwnd));
    }

    pub fn thread_detach_notify(&self, thread_id: u64) {
        self.state.lock().unwrap().focus.remove(&thread_id);
    }

    pub fn sync_notify(&self) {
        log::debug!("engine: sync notified");
    }

    /// Test/introspection seam: the current keymap for a given thread
    /// (falling back to Global), without needing a real capture backend.
    pub fn current_keymap_for(&self, thread_id: Option<u64>) -> KeymapId {
        let mut state = self.state.lock().unwrap();
        state.current_thread = thread_id;
        state.current_keymap()
    }

    /// Test/introspection seam: the held-key counter step 3 of
    /// `pipeline::process_event` maintains.
    pub fn current_key_press_count(&self) -> i64 {
        self.state.lock().unwrap().current_key_press_count
    }

    /// Test/introspection seam: step 4's modifier snapshot, without driving
    /// a full event through the pipeline.
    pub fn current_modifier(&self, keymap: KeymapId, repeat_key: KeyId, up: bool) -> Modifier {
        self.state.lock().unwrap().build_current_modifier(keymap, repeat_key, up)
    }

    /// Processes one event directly, bypassing the queue and the capture
    /// backend entirely. Used by the IPC notifier for synthetic input and
    /// by tests.
    pub fn inject_event(&self, event: pipeline::RawEvent) {
        let pctx = PipelineContext {
            executor: self.executor.as_ref(),
            window_system: self.window_system.as_ref(),
            current_window: 0,
        };
        let mut state = self.state.lock().unwrap();
        pipeline::process_event(&mut state, &pctx, event);
    }
}

fn set_bit(modifier: &mut Modifier, ty: ModifierType, on: bool) {
    if on {
        modifier.press(ty);
    } else {
        modifier.release(ty);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
