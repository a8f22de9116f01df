//! IPC message types and decoding (spec.md §4.7, §6 "IPC message layout").
//!
//! The original channel is a named datagram pipe carrying fixed-layout
//! records tagged with a `Type` byte. This crate has no window-system
//! watcher of its own to be the *other* end of that pipe (out of scope,
//! spec.md §1), so the wire format is kept but the transport is a loopback
//! UDP socket (`notifier`) -- any external focus/lock watcher on the same
//! session can still talk to it without OS-specific IPC bindings.

pub mod notifier;

use std::convert::TryInto;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("malformed datagram: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowState {
    Maximized,
    Minimized,
    Normal,
}

/// One decoded IPC datagram (§4.7's type roster).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    SetFocus { hwnd: usize, thread_id: u64, class: String, title: String },
    /// Focus info without making it the active window (§4.7 "`name`").
    Name { thread_id: u64, class: String, title: String },
    LockState { numlock: bool, capslock: bool, scrolllock: bool, kanalock: bool, imelock: bool, imecomp: bool },
    Sync,
    ThreadAttach { thread_id: u64, hwnd: usize },
    ThreadDetach { thread_id: u64 },
    Command32 { thread_id: u64, value: u32 },
    Command64 { thread_id: u64, value: u64 },
    Show { state: ShowState, is_mdi: bool },
    Log(String),
}

const TYPE_SET_FOCUS: u8 = 1;
const TYPE_NAME: u8 = 2;
const TYPE_LOCK_STATE: u8 = 3;
const TYPE_SYNC: u8 = 4;
const TYPE_THREAD_ATTACH: u8 = 5;
const TYPE_THREAD_DETACH: u8 = 6;
const TYPE_COMMAND32: u8 = 7;
const TYPE_COMMAND64: u8 = 8;
const TYPE_SHOW: u8 = 9;
const TYPE_LOG: u8 = 10;

fn read_u64(bytes: &[u8], at: usize) -> Result<u64, IpcError> {
    bytes
        .get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| IpcError::Malformed("truncated u64".into()))
}

fn read_usize_field(bytes: &[u8], at: usize) -> Result<usize, IpcError> {
    Ok(read_u64(bytes, at)? as usize)
}

/// Reads a length-prefixed (u16 LE) UTF-8 string starting at `at`. Returns
/// the string and the offset of the byte right after it.
fn read_string(bytes: &[u8], at: usize) -> Result<(String, usize), IpcError> {
    let len = bytes
        .get(at..at + 2)
        .and_then(|s| s.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| IpcError::Malformed("truncated string length".into()))? as usize;
    let start = at + 2;
    let end = start + len;
    let raw = bytes
        .get(start..end)
        .ok_or_else(|| IpcError::Malformed("truncated string body".into()))?;
    let s = String::from_utf8_lossy(raw).into_owned();
    Ok((s, end))
}

/// Parses one datagram (§6 "Each datagram begins with a `Type` field").
/// Never panics on malformed input: every failure path returns `Err` so the
/// caller can log and drop the message while keeping the channel open
/// (§7 "IPC malformed message").
pub fn decode(bytes: &[u8]) -> Result<Message, IpcError> {
    let &tag = bytes.first().ok_or_else(|| IpcError::Malformed("empty datagram".into()))?;
    let body = &bytes[1..];
    match tag {
        TYPE_SET_FOCUS => {
            let hwnd = read_usize_field(body, 0)?;
            let thread_id = read_u64(body, 8)?;
            let (class, next) = read_string(body, 16)?;
            let (title, _) = read_string(body, next)?;
            Ok(Message::SetFocus { hwnd, thread_id, class, title })
        }
        TYPE_NAME => {
            let thread_id = read_u64(body, 0)?;
            let (class, next) = read_string(body, 8)?;
            let (title, _) = read_string(body, next)?;
            Ok(Message::Name { thread_id, class, title })
        }
        TYPE_LOCK_STATE => {
            let flags = body.first().ok_or_else(|| IpcError::Malformed("missing lock flags".into()))?;
            Ok(Message::LockState {
                numlock: flags & 0b0000_0001 != 0,
                capslock: flags & 0b0000_0010 != 0,
                scrolllock: flags & 0b0000_0100 != 0,
                kanalock: flags & 0b0000_1000 != 0,
                imelock: flags & 0b0001_0000 != 0,
                imecomp: flags & 0b0010_0000 != 0,
            })
        }
        TYPE_SYNC => Ok(Message::Sync),
        TYPE_THREAD_ATTACH => {
            let thread_id = read_u64(body, 0)?;
            let hwnd = read_usize_field(body, 8)?;
            Ok(Message::ThreadAttach { thread_id, hwnd })
        }
        TYPE_THREAD_DETACH => {
            let thread_id = read_u64(body, 0)?;
            Ok(Message::ThreadDetach { thread_id })
        }
        TYPE_COMMAND32 => {
            let thread_id = read_u64(body, 0)?;
            let value = body
                .get(8..12)
                .and_then(|s| s.try_into().ok())
                .map(u32::from_le_bytes)
                .ok_or_else(|| IpcError::Malformed("truncated command32 value".into()))?;
            Ok(Message::Command32 { thread_id, value })
        }
        TYPE_COMMAND64 => {
            let thread_id = read_u64(body, 0)?;
            let value = read_u64(body, 8)?;
            Ok(Message::Command64 { thread_id, value })
        }
        TYPE_SHOW => {
            let state_byte = body.first().ok_or_else(|| IpcError::Malformed("missing show state".into()))?;
            let state = match state_byte {
                0 => ShowState::Maximized,
                1 => ShowState::Minimized,
                2 => ShowState::Normal,
                other => return Err(IpcError::Malformed(format!("unknown show state {other}"))),
            };
            let is_mdi = body.get(1).copied().unwrap_or(0) != 0;
            Ok(Message::Show { state, is_mdi })
        }
        TYPE_LOG => {
            let (text, _) = read_string(body, 0)?;
            Ok(Message::Log(text))
        }
        other => Err(IpcError::Malformed(format!("unknown message type {other}"))),
    }
}

/// Encodes a message in the same layout `decode` reads. Used by tests and
/// by any in-process caller synthesizing notifications (e.g. a future GUI
/// built against this crate).
pub fn encode(message: &Message) -> Vec<u8> {
    fn push_string(buf: &mut Vec<u8>, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u16::MAX as usize) as u16;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&bytes[..len as usize]);
    }

    let mut buf = Vec::new();
    match message {
        Message::SetFocus { hwnd, thread_id, class, title } => {
            buf.push(TYPE_SET_FOCUS);
            buf.extend_from_slice(&(*hwnd as u64).to_le_bytes());
            buf.extend_from_slice(&thread_id.to_le_bytes());
            push_string(&mut buf, class);
            push_string(&mut buf, title);
        }
        Message::Name { thread_id, class, title } => {
            buf.push(TYPE_NAME);
            buf.extend_from_slice(&thread_id.to_le_bytes());
            push_string(&mut buf, class);
            push_string(&mut buf, title);
        }
        Message::LockState { numlock, capslock, scrolllock, kanalock, imelock, imecomp } => {
            buf.push(TYPE_LOCK_STATE);
            let mut flags = 0u8;
            flags |= (*numlock as u8) << 0;
            flags |= (*capslock as u8) << 1;
            flags |= (*scrolllock as u8) << 2;
            flags |= (*kanalock as u8) << 3;
            flags |= (*imelock as u8) << 4;
            flags |= (*imecomp as u8) << 5;
            buf.push(flags);
        }
        Message::Sync => buf.push(TYPE_SYNC),
        Message::ThreadAttach { thread_id, hwnd } => {
            buf.push(TYPE_THREAD_ATTACH);
            buf.extend_from_slice(&thread_id.to_le_bytes());
            buf.extend_from_slice(&(*hwnd as u64).to_le_bytes());
        }
        Message::ThreadDetach { thread_id } => {
            buf.push(TYPE_THREAD_DETACH);
            buf.extend_from_slice(&thread_id.to_le_bytes());
        }
        Message::Command32 { thread_id, value } => {
            buf.push(TYPE_COMMAND32);
            buf.extend_from_slice(&thread_id.to_le_bytes());
            buf.extend_from_slice(&value.to_le_bytes());
        }
        Message::Command64 { thread_id, value } => {
            buf.push(TYPE_COMMAND64);
            buf.extend_from_slice(&thread_id.to_le_bytes());
            buf.extend_from_slice(&value.to_le_bytes());
        }
        Message::Show { state, is_mdi } => {
            buf.push(TYPE_SHOW);
            buf.push(match state {
                ShowState::Maximized => 0,
                ShowState::Minimized => 1,
                ShowState::Normal => 2,
            });
            buf.push(*is_mdi as u8);
        }
        Message::Log(text) => {
            buf.push(TYPE_LOG);
            push_string(&mut buf, text);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_focus_round_trips() {
        let msg = Message::SetFocus { hwnd: 0x1234, thread_id: 77, class: "Emacs".into(), title: "scratch".into() };
        assert_eq!(decode(&encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn lock_state_round_trips() {
        let msg = Message::LockState {
            numlock: true,
            capslock: false,
            scrolllock: true,
            kanalock: false,
            imelock: false,
            imecomp: true,
        };
        assert_eq!(decode(&encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn empty_datagram_is_malformed_not_a_panic() {
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn unknown_type_tag_is_malformed() {
        assert!(decode(&[255]).is_err());
    }

    #[test]
    fn truncated_string_is_malformed() {
        let mut bytes = vec![TYPE_NAME];
        bytes.extend_from_slice(&77u64.to_le_bytes());
        bytes.extend_from_slice(&100u16.to_le_bytes()); // claims 100 bytes, provides none
        assert!(decode(&bytes).is_err());
    }
}
