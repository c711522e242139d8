//! Passcode-gated access to locked notes and the Locked category.
//!
//! The controller only tracks session state. It never sees the notes
//! themselves; callers pass the configured passcode in on every call so the
//! controller can't drift from what is persisted.

use crate::Error;
use std::fmt;
use tracing::debug;

/// Number of digits in a passcode.
pub const PASSCODE_LEN: usize = 4;

/// A configured passcode: exactly four ASCII digits, stored and compared in
/// plain form. It gates access in the UI; it does not encrypt anything.
#[derive(Clone, PartialEq, Eq)]
pub struct Passcode(String);

impl Passcode {
    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.len() != PASSCODE_LEN || !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(format!(
                "passcode must be exactly {} digits",
                PASSCODE_LEN
            )));
        }
        Ok(Self(input.to_string()))
    }

    pub fn matches(&self, input: &str) -> bool {
        self.0 == input
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passcode(****)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VaultState {
    #[default]
    Locked,
    Unlocked,
}

/// Navigation interrupted by a passcode prompt, replayed after unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Category(String),
    Note(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Verify,
    Set,
}

/// Result of asking for something behind the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    /// Proceed; carries whatever was requested.
    Granted(T),
    /// No passcode is configured, so the vault can't be entered at all.
    PasscodeRequired,
    /// The passcode prompt is open; the request was recorded and will be
    /// replayed by a successful verification.
    NeedsUnlock,
}

impl<T> Access<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Outcome of a passcode entry. `Unlocked` carries the replayed pending
/// action, if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification<R> {
    Unlocked(Option<R>),
    Rejected,
}

impl<R> Verification<R> {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Verification::Unlocked(_))
    }
}

/// Session state for the vault. Starts locked and is never persisted.
#[derive(Debug, Default)]
pub struct VaultController {
    state: VaultState,
    pending: Option<PendingAction>,
    prompt: Option<PromptMode>,
}

impl VaultController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// The prompt currently shown, if any.
    pub fn prompt(&self) -> Option<PromptMode> {
        self.prompt
    }

    /// Gate a navigation into the vault.
    pub fn request(&mut self, target: PendingAction, passcode: Option<&Passcode>) -> Access<()> {
        if self.is_unlocked() {
            return Access::Granted(());
        }
        if passcode.is_none() {
            debug!(?target, "vault entry refused: no passcode configured");
            return Access::PasscodeRequired;
        }
        debug!(?target, "vault entry deferred until unlock");
        self.pending = Some(target);
        self.prompt = Some(PromptMode::Verify);
        Access::NeedsUnlock
    }

    /// Check a passcode entry. A mismatch leaves the prompt open for retry;
    /// there is no attempt limit.
    pub fn verify(
        &mut self,
        input: &str,
        passcode: Option<&Passcode>,
    ) -> Verification<PendingAction> {
        match passcode {
            Some(code) if code.matches(input) => Verification::Unlocked(self.unlock()),
            _ => {
                debug!("passcode rejected");
                Verification::Rejected
            }
        }
    }

    /// Open the prompt in set mode (entered from settings, not gated).
    pub fn begin_set(&mut self) {
        self.prompt = Some(PromptMode::Set);
    }

    /// A new passcode was accepted: behaves like a successful unlock.
    pub fn accept_new_passcode(&mut self) -> Option<PendingAction> {
        self.unlock()
    }

    /// Dismiss the prompt without unlocking and forget the pending action.
    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
        self.pending = None;
    }

    /// Lock the session unconditionally.
    pub fn seal(&mut self) {
        debug!("vault sealed");
        self.state = VaultState::Locked;
        self.prompt = None;
        self.pending = None;
    }

    fn unlock(&mut self) -> Option<PendingAction> {
        debug!("vault unlocked");
        self.state = VaultState::Unlocked;
        self.prompt = None;
        self.pending.take()
    }
}
