//! Cross-agent consent checks.
//!
//! An agent may read only its own records. Callers either name the requesting
//! agent explicitly or rely on the gate's "current agent" context, which the
//! session layer sets when an agent becomes active. With neither, the gate
//! fails closed.

use crate::{Error, Result};
use std::sync::Mutex;

/// Maximum length of an agent id held as context, in bytes.
pub const MAX_AGENT_ID_LENGTH: usize = 255;

/// Consent gate with a process-wide current-agent context.
///
/// # Example
///
/// ```rust
/// use katra::ConsentGate;
///
/// let gate = ConsentGate::new();
/// assert!(gate.check(Some("ci-alpha"), "ci-alpha").is_ok());
/// assert!(gate.check(Some("ci-alpha"), "ci-beta").is_err());
///
/// gate.set_context(Some("ci-beta"))?;
/// assert!(gate.check_current("ci-beta").is_ok());
/// # Ok::<(), katra::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ConsentGate {
    context: Mutex<Option<String>>,
}

impl ConsentGate {
    /// Creates a gate with no current agent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears the current agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty id or one longer than
    /// [`MAX_AGENT_ID_LENGTH`] bytes, and [`Error::InvalidState`] if the
    /// context lock is poisoned.
    pub fn set_context(&self, agent_id: Option<&str>) -> Result<()> {
        if let Some(id) = agent_id {
            if id.is_empty() {
                return Err(Error::InvalidInput("agent id cannot be empty".to_string()));
            }
            if id.len() > MAX_AGENT_ID_LENGTH {
                return Err(Error::InvalidInput(format!(
                    "agent id is {} bytes, max {MAX_AGENT_ID_LENGTH}",
                    id.len()
                )));
            }
        }

        let mut context = self
            .context
            .lock()
            .map_err(|_| Error::invalid_state("set_consent_context", "Lock poisoned"))?;
        *context = agent_id.map(str::to_string);
        tracing::debug!(agent = ?agent_id, "Consent context updated");
        Ok(())
    }

    /// Returns the current agent, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the context lock is poisoned.
    pub fn context(&self) -> Result<Option<String>> {
        self.context
            .lock()
            .map(|c| c.clone())
            .map_err(|_| Error::invalid_state("get_consent_context", "Lock poisoned"))
    }

    /// Checks whether `requester` may access records owned by `target`.
    ///
    /// A `None` requester falls back to the current agent.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `target` is empty
    /// - [`Error::InvalidState`] if there is no requester and no current agent
    /// - [`Error::ConsentRequired`] if requester and target differ
    pub fn check(&self, requester: Option<&str>, target: &str) -> Result<()> {
        if target.is_empty() {
            return Err(Error::InvalidInput("target agent cannot be empty".to_string()));
        }

        let requester = match requester {
            Some(r) => r.to_string(),
            None => self.context()?.ok_or_else(|| {
                Error::invalid_state("consent_check", "no requester and no current agent")
            })?,
        };

        if requester == target {
            return Ok(());
        }

        tracing::warn!(
            requester = %requester,
            target = %target,
            "Consent violation: cross-agent access denied"
        );
        metrics::counter!("consent_denials_total").increment(1);
        Err(Error::ConsentRequired {
            requester,
            target: target.to_string(),
        })
    }

    /// Checks the current agent against `target`.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check) with no explicit requester.
    pub fn check_current(&self, target: &str) -> Result<()> {
        self.check(None, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_same_agent_allowed() {
        assert!(ConsentGate::new().check(Some("A"), "A").is_ok());
    }

    #[test]
    fn test_cross_agent_denied() {
        let err = ConsentGate::new().check(Some("A"), "B").unwrap_err();
        match err {
            Error::ConsentRequired { requester, target } => {
                assert_eq!(requester, "A");
                assert_eq!(target, "B");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_requester_no_context_fails_closed() {
        let err = ConsentGate::new().check(None, "B").unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_context_used_when_requester_missing() {
        let gate = ConsentGate::new();
        gate.set_context(Some("B")).unwrap();
        assert!(gate.check(None, "B").is_ok());
        assert!(gate.check_current("B").is_ok());
        assert!(matches!(
            gate.check_current("C"),
            Err(Error::ConsentRequired { .. })
        ));

        gate.set_context(None).unwrap();
        assert_eq!(gate.context().unwrap(), None);
        assert!(gate.check_current("B").is_err());
    }

    #[test]
    fn test_explicit_requester_overrides_context() {
        let gate = ConsentGate::new();
        gate.set_context(Some("B")).unwrap();
        assert!(gate.check(Some("A"), "B").is_err());
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(matches!(
            ConsentGate::new().check(Some("A"), ""),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_context_length_limit() {
        let gate = ConsentGate::new();
        assert!(gate.set_context(Some(&"a".repeat(MAX_AGENT_ID_LENGTH))).is_ok());
        assert!(matches!(
            gate.set_context(Some(&"a".repeat(MAX_AGENT_ID_LENGTH + 1))),
            Err(Error::InvalidInput(_))
        ));
        assert!(gate.set_context(Some("")).is_err());
    }

    #[test]
    fn test_poisoned_lock_fails_closed() {
        let gate = Arc::new(ConsentGate::new());
        let clone = Arc::clone(&gate);
        let _ = std::thread::spawn(move || {
            let _guard = clone.context.lock().unwrap();
            panic!("poison the consent context");
        })
        .join();

        assert!(matches!(
            gate.check(None, "A"),
            Err(Error::InvalidState { .. })
        ));
        // An explicit requester never touches the lock.
        assert!(gate.check(Some("A"), "A").is_ok());
    }
}
