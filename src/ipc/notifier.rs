//! Datagram receiver thread: reads notifications off a loopback socket and
//! dispatches each one into the engine under its own lock (§4.7, §5's
//! "IPC receiver" row).
//!
//! Grounded on `examples/original_source/src/core/notification_dispatcher.cpp`'s
//! observer/dispatch loop: recv, decode, fan out to the handler, loop --
//! a malformed datagram is logged and dropped, the channel stays open.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::Engine;

use super::{decode, Message};

/// Base port for the loopback notification channel; the session id is
/// added so concurrent sessions on the same host do not collide (§6 "The
/// channel name encodes the OS session id to isolate concurrent user
/// sessions").
const BASE_PORT: u16 = 47_100;

/// How long a single `recv_from` call blocks before re-checking the
/// shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Resolves the current desktop session id used to pick this process's
/// notification port. Falls back to 0 (single-session use) when the
/// platform exposes none.
pub fn session_id() -> u16 {
    std::env::var("XDG_SESSION_ID")
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(0)
}

fn channel_port(session: u16) -> u16 {
    BASE_PORT.wrapping_add(session)
}

/// Owns the receiver thread; dropping or calling `stop` joins it.
pub struct Notifier {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Binds the session-scoped loopback socket and starts the receiver
    /// thread, dispatching decoded messages into `engine`.
    pub fn start(engine: Arc<Engine>, session: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", channel_port(session)))?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 2048];
            loop {
                if thread_shutdown.load(Ordering::SeqCst) {
                    return;
                }
                match socket.recv_from(&mut buf) {
                    Ok((n, _addr)) => match decode(&buf[..n]) {
                        Ok(message) => dispatch(&engine, message),
                        Err(e) => log::warn!("ipc: dropping malformed datagram: {e}"),
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                        continue;
                    }
                    Err(e) => {
                        log::error!("ipc: receiver socket error: {e}");
                        return;
                    }
                }
            }
        });

        Ok(Notifier { shutdown, handle: Some(handle) })
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fans a decoded message out to the matching `Engine` operation (§4.4
/// "IPC-delivered" operations table).
fn dispatch(engine: &Engine, message: Message) {
    match message {
        Message::SetFocus { hwnd, thread_id, class, title } => {
            engine.set_focus(thread_id, hwnd, &class, &title, false);
        }
        Message::Name { thread_id, class, title } => {
            engine.set_focus(thread_id, 0, &class, &title, false);
        }
        Message::LockState { numlock, capslock, scrolllock, kanalock, imelock, imecomp } => {
            engine.set_lock_state(numlock, capslock, scrolllock, kanalock, imelock, imecomp);
        }
        Message::Sync => engine.sync_notify(),
        Message::ThreadAttach { thread_id, hwnd } => engine.thread_attach_notify(thread_id, hwnd),
        Message::ThreadDetach { thread_id } => engine.thread_detach_notify(thread_id),
        Message::Command32 { thread_id, value } => {
            log::debug!("ipc: command32 from thread {thread_id}: {value:#x}");
        }
        Message::Command64 { thread_id, value } => {
            log::debug!("ipc: command64 from thread {thread_id}: {value:#x}");
        }
        Message::Show { state, is_mdi } => {
            log::debug!("ipc: show {state:?} (mdi={is_mdi})");
        }
        Message::Log(text) => log::info!("ipc: {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Setting;
    use crate::platform::{ActionExecutor, NullWindowSystem, PlatformError, Action as PAction};
    use std::sync::Arc;

    struct NullExecutor;
    impl ActionExecutor for NullExecutor {
        fn execute(&self, _action: &PAction) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn test_engine() -> Arc<Engine> {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(crate::config::Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        Arc::new(Engine::new(
            Arc::new(setting),
            Arc::new(NullExecutor) as Arc<dyn ActionExecutor>,
            Arc::new(NullWindowSystem),
        ))
    }

    /// Like `test_engine`, but with an extra window-matched keymap so a
    /// dispatched `SetFocus` has somewhere other than `Global` to resolve to.
    fn test_engine_with_window_keymap() -> (Arc<Engine>, crate::config::KeymapId) {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(crate::config::Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let mut matched = crate::config::Keymap::new("Matched");
        matched.window_match = Some(crate::config::WindowMatch {
            kind: crate::config::WindowMatchKind::And,
            class_pattern: Some("X".to_string()),
            title_pattern: None,
        });
        let matched_id = setting.keymaps.push(matched);
        let engine = Arc::new(Engine::new(
            Arc::new(setting),
            Arc::new(NullExecutor) as Arc<dyn ActionExecutor>,
            Arc::new(NullWindowSystem),
        ));
        (engine, matched_id)
    }

    #[test]
    fn channel_port_varies_by_session() {
        assert_ne!(channel_port(0), channel_port(1));
    }

    #[test]
    fn set_focus_datagram_updates_engine_focus() {
        let (engine, matched) = test_engine_with_window_keymap();
        let msg = Message::SetFocus { hwnd: 7, thread_id: 42, class: "X".into(), title: "Y".into() };
        dispatch(&engine, msg);
        assert_eq!(engine.current_keymap_for(Some(42)), matched);
    }

    #[test]
    fn notifier_start_and_stop_round_trip() {
        let engine = test_engine();
        // Pick a high, unlikely-to-collide session offset per test run.
        let mut notifier = Notifier::start(engine, 60_001u16 % 1000).unwrap();
        notifier.stop();
    }
}
