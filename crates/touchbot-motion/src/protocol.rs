use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Command, LineTransport, ProtocolError};

/// Identity check performed right after the link opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub command: String,
    pub response: String,
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            command: "IsDelta".to_string(),
            response: "YesDelta".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// `None` skips the identity check.
    pub handshake: Option<Handshake>,
    /// Pause after opening the link, before any traffic.
    pub settle_ms: u64,
    /// How long to wait for the handshake reply.
    pub handshake_timeout_ms: u64,
    /// How long to wait for `ok` / `error` after a command.
    pub response_timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            handshake: Some(Handshake::default()),
            settle_ms: 500,
            handshake_timeout_ms: 2000,
            response_timeout_ms: 5000,
        }
    }
}

impl ProtocolConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// How a command exchange ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// A line starting with `ok` arrived.
    Ok,
    /// A line starting with `error` arrived.
    Error,
    /// The response timeout elapsed first.
    TimedOut,
    /// The command is fire-and-forget.
    NotAwaited,
}

/// Everything the device said in reply to one command.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub command: String,
    /// Non-empty reply lines in arrival order, terminator included.
    pub lines: Vec<String>,
    pub completion: Completion,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self.completion, Completion::Ok | Completion::NotAwaited)
    }

    /// The `ok` / `error` line, if one arrived.
    pub fn terminator(&self) -> Option<&str> {
        match self.completion {
            Completion::Ok | Completion::Error => self.lines.last().map(String::as_str),
            _ => None,
        }
    }
}

fn classify(line: &str) -> Option<Completion> {
    let lower = line.to_ascii_lowercase();
    if lower.starts_with("ok") {
        Some(Completion::Ok)
    } else if lower.starts_with("error") {
        Some(Completion::Error)
    } else {
        None
    }
}

/// Request/response framing over a [`LineTransport`].
///
/// At most one exchange is in flight: draining stale input, writing the
/// command and collecting its reply happen under one lock, and
/// [`MotionProtocol::disconnect`] takes the same lock.
pub struct MotionProtocol {
    config: ProtocolConfig,
    link: Mutex<Option<Box<dyn LineTransport>>>,
}

impl MotionProtocol {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            link: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn link(&self) -> MutexGuard<'_, Option<Box<dyn LineTransport>>> {
        // the next exchange drains input, so a poisoned link is still usable
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.link().is_some()
    }

    /// Take ownership of `transport`, settle and verify the device identity.
    ///
    /// Any previous connection is closed first. On failure `transport` is
    /// dropped, which closes it.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn connect(&self, mut transport: Box<dyn LineTransport>) -> Result<(), ProtocolError> {
        let mut link = self.link();
        if link.take().is_some() {
            info!("closing previous connection");
        }

        thread::sleep(self.config.settle());

        if let Some(handshake) = &self.config.handshake {
            transport.discard_input()?;
            transport.write_line(&handshake.command)?;
            let reply = transport.read_line(self.config.handshake_timeout())?;
            match reply.as_deref().map(str::trim) {
                Some(got) if got == handshake.response => {
                    debug!("handshake `{}` -> `{got}`", handshake.command);
                }
                Some(got) if !got.is_empty() => {
                    warn!("handshake rejected: `{got}`");
                    return Err(ProtocolError::HandshakeMismatch {
                        expected: handshake.response.clone(),
                        got: got.to_string(),
                    });
                }
                _ => {
                    warn!("no handshake response");
                    return Err(ProtocolError::NoHandshakeResponse);
                }
            }
        }

        *link = Some(transport);
        info!("motion controller connected");
        Ok(())
    }

    /// Close the link. Waits for an in-flight exchange to finish.
    pub fn disconnect(&self) {
        if self.link().take().is_some() {
            info!("motion controller disconnected");
        }
    }

    pub fn send(&self, command: &Command) -> Result<Response, ProtocolError> {
        self.send_line(&command.to_string(), command.expects_ack())
    }

    /// Send one raw line and, if `await_ack`, collect replies until a
    /// terminator or the response timeout.
    ///
    /// A timeout is reported through [`Completion::TimedOut`], not as an
    /// error; only transport failures and a missing link are errors.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn send_line(&self, line: &str, await_ack: bool) -> Result<Response, ProtocolError> {
        let line = line.trim();
        let mut link = self.link();
        let transport = link.as_mut().ok_or(ProtocolError::NotConnected)?;

        transport.discard_input()?;
        debug!(">> {line}");
        transport.write_line(line)?;

        let mut response = Response {
            command: line.to_string(),
            lines: Vec::new(),
            completion: Completion::NotAwaited,
        };
        if !await_ack {
            return Ok(response);
        }

        let deadline = Instant::now() + self.config.response_timeout();
        response.completion = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Completion::TimedOut;
            }
            let Some(raw) = transport.read_line(remaining)? else {
                continue;
            };
            let reply = raw.trim();
            if reply.is_empty() {
                continue;
            }
            debug!("<< {reply}");
            response.lines.push(reply.to_string());
            if let Some(done) = classify(reply) {
                break done;
            }
        };

        match response.completion {
            Completion::TimedOut => warn!(
                "`{line}` not acknowledged within {:?} ({} line(s) received)",
                self.config.response_timeout(),
                response.lines.len()
            ),
            Completion::Error => warn!(
                "`{line}` rejected: {}",
                response.terminator().unwrap_or_default()
            ),
            _ => {}
        }
        Ok(response)
    }
}

impl Default for MotionProtocol {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;

    fn fast_config() -> ProtocolConfig {
        ProtocolConfig {
            settle_ms: 0,
            handshake_timeout_ms: 50,
            response_timeout_ms: 50,
            ..ProtocolConfig::default()
        }
    }

    #[test]
    fn terminators_are_case_insensitive_prefixes() {
        assert_eq!(classify("ok"), Some(Completion::Ok));
        assert_eq!(classify("OK T:21"), Some(Completion::Ok));
        assert_eq!(classify("Error: out of range"), Some(Completion::Error));
        assert_eq!(classify("echo: busy"), None);
    }

    #[test]
    fn send_without_link_is_not_connected() {
        let protocol = MotionProtocol::new(fast_config());
        let err = protocol.send(&Command::Home).unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
    }

    #[test]
    fn mode_switch_returns_immediately() {
        let (transport, handle) = ScriptedTransport::delta();
        let protocol = MotionProtocol::new(fast_config());
        protocol.connect(Box::new(transport)).unwrap();

        let response = protocol.send(&Command::RelativeMode).unwrap();
        assert_eq!(response.completion, Completion::NotAwaited);
        assert!(response.lines.is_empty());
        assert_eq!(handle.sent(), vec!["IsDelta", "G91"]);
    }

    #[test]
    fn empty_lines_are_skipped() {
        let (transport, _handle) = ScriptedTransport::new(|line| match line {
            "IsDelta" => vec!["YesDelta".into()],
            _ => vec!["".into(), "  ".into(), "ok".into()],
        });
        let protocol = MotionProtocol::new(fast_config());
        protocol.connect(Box::new(transport)).unwrap();

        let response = protocol.send(&Command::Home).unwrap();
        assert_eq!(response.lines, vec!["ok"]);
        assert!(response.is_ok());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: ProtocolConfig = serde_json::from_str(r#"{"response_timeout_ms": 250}"#).unwrap();
        assert_eq!(cfg.handshake, Some(Handshake::default()));
        assert_eq!(cfg.settle(), Duration::from_millis(500));
        assert_eq!(cfg.response_timeout(), Duration::from_millis(250));

        let silent: ProtocolConfig = serde_json::from_str(r#"{"handshake": null}"#).unwrap();
        assert!(silent.handshake.is_none());
    }

    #[test]
    fn handshake_can_be_disabled() {
        let (transport, handle) = ScriptedTransport::new(|_| vec!["ok".into()]);
        let protocol = MotionProtocol::new(ProtocolConfig {
            handshake: None,
            ..fast_config()
        });
        protocol.connect(Box::new(transport)).unwrap();
        assert!(protocol.is_connected());
        assert!(handle.sent().is_empty());
    }
}
