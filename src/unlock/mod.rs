// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Credential unlock gate and the session it produces

pub mod cipher;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GateConfig, UnlockPolicy};
use crate::{Result, VisualError};

/// Browser-session scoped state handed to the collection controller
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: Uuid,
    unlocked: bool,
    #[serde(skip)]
    credential: Option<String>,
}

impl Session {
    /// A fresh session that has not passed the gate
    pub fn locked() -> Self {
        Self {
            id: Uuid::new_v4(),
            unlocked: false,
            credential: None,
        }
    }

    /// An already-unlocked session (CLI use, tests)
    pub fn unlocked(credential: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            unlocked: true,
            credential,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Access token recovered by the encrypted-token policy
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn require_unlocked(&self) -> Result<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(VisualError::Auth("Session is locked".to_string()))
        }
    }

    fn unlock(&mut self, credential: Option<String>) {
        self.unlocked = true;
        self.credential = credential;
    }
}

/// Cheap authenticated request used to double-check a decrypted token
#[async_trait]
pub trait TokenProbe: Send + Sync {
    async fn probe(&self, token: &str) -> Result<()>;
}

/// Password screen state machine
pub struct UnlockGate {
    policy: UnlockPolicy,
    error_display: Duration,
    verify_with_probe: bool,
    input: String,
    rejected_at: Option<Instant>,
    persistent_error: Option<String>,
    session: Session,
}

impl UnlockGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            policy: config.unlock.clone(),
            error_display: Duration::from_millis(config.error_display_ms),
            verify_with_probe: config.verify_with_probe,
            input: String::new(),
            rejected_at: None,
            persistent_error: None,
            session: Session::locked(),
        }
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_unlocked()
    }

    /// Whether an error should be shown right now.
    ///
    /// Static matching flashes for the configured delay; the token policy
    /// keeps its message until the next attempt.
    pub fn shows_error(&self) -> bool {
        if self.persistent_error.is_some() {
            return true;
        }
        self.rejected_at
            .is_some_and(|at| at.elapsed() < self.error_display)
    }

    /// Message to display alongside [`Self::shows_error`]
    pub fn error_message(&self) -> Option<String> {
        if let Some(msg) = &self.persistent_error {
            return Some(msg.clone());
        }
        self.shows_error().then(|| "Incorrect password".to_string())
    }

    /// Submit the current input
    pub async fn submit(&mut self, probe: Option<&dyn TokenProbe>) -> bool {
        let secret = std::mem::take(&mut self.input);
        self.attempt(&secret, probe).await
    }

    /// Try a secret. Returns whether the session is now unlocked.
    pub async fn attempt(&mut self, secret: &str, probe: Option<&dyn TokenProbe>) -> bool {
        if self.session.is_unlocked() {
            return true;
        }
        self.persistent_error = None;

        if secret.trim().is_empty() {
            debug!("Rejecting empty secret");
            self.fail(VisualError::Auth("Password must not be empty".to_string()));
            return false;
        }

        match self.check(secret, probe).await {
            Ok(credential) => {
                info!("Session {} unlocked", self.session.id());
                self.rejected_at = None;
                self.input.clear();
                self.session.unlock(credential);
                true
            }
            Err(e) => {
                warn!("Unlock attempt failed: {}", e);
                self.fail(e);
                false
            }
        }
    }

    async fn check(&self, secret: &str, probe: Option<&dyn TokenProbe>) -> Result<Option<String>> {
        match &self.policy {
            UnlockPolicy::StaticMatch { expected } => {
                if secret == expected {
                    Ok(None)
                } else {
                    Err(VisualError::Auth("Incorrect password".to_string()))
                }
            }
            UnlockPolicy::EncryptedToken { ciphertext } => {
                let token = cipher::open(secret, ciphertext)?;
                if self.verify_with_probe {
                    if let Some(probe) = probe {
                        probe.probe(&token).await.map_err(|e| {
                            VisualError::Auth(format!("Token rejected by content store: {}", e))
                        })?;
                    }
                }
                Ok(Some(token))
            }
        }
    }

    fn fail(&mut self, error: VisualError) {
        match self.policy {
            UnlockPolicy::StaticMatch { .. } => {
                self.input.clear();
                self.rejected_at = Some(Instant::now());
            }
            UnlockPolicy::EncryptedToken { .. } => {
                self.persistent_error = Some(error.to_string());
            }
        }
    }
}
