//! Backoff exponentiel avec jitter complet pour les reconnexions

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Délai de base entre deux tentatives (secondes)
pub const BACKOFF_BASE_SECONDS: u64 = 7;

/// Plafond d'un délai (secondes)
///
/// Value: 300 seconds (5 minutes)
pub const BACKOFF_MAX_SECONDS: u64 = 300;

/// Exposant maximal : au-delà, la borne n'augmente plus
pub const BACKOFF_MAX_EXPONENT: u32 = 10;

/// Politique de reconnexion d'un nœud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_base_seconds")]
    pub base_seconds: u64,
    #[serde(default = "default_max_delay_seconds")]
    pub max_delay_seconds: u64,
    /// `None` : réessayer indéfiniment
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_base_seconds() -> u64 {
    BACKOFF_BASE_SECONDS
}

fn default_max_delay_seconds() -> u64 {
    BACKOFF_MAX_SECONDS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_seconds: BACKOFF_BASE_SECONDS,
            max_delay_seconds: BACKOFF_MAX_SECONDS,
            max_attempts: None,
        }
    }
}

/// Générateur de délais de reconnexion
///
/// Chaque appel à [`Backoff::delay`] incrémente l'exposant (plafonné à
/// [`BACKOFF_MAX_EXPONENT`]) et tire un délai uniforme dans
/// `[0, base * 2^exp]`, borné par le plafond. Si plus de `base * 2^11`
/// se sont écoulés depuis l'appel précédent, l'exposant repart de zéro.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    exponent: u32,
    reset_after: Duration,
    last_invocation: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            exponent: 0,
            reset_after: base.saturating_mul(2u32.pow(BACKOFF_MAX_EXPONENT + 1)),
            last_invocation: None,
        }
    }

    pub fn from_policy(policy: &ReconnectPolicy) -> Self {
        Self::new(
            Duration::from_secs(policy.base_seconds),
            Duration::from_secs(policy.max_delay_seconds),
        )
    }

    /// Calcule le prochain délai d'attente
    pub fn delay(&mut self) -> Duration {
        let now = Instant::now();
        if let Some(last) = self.last_invocation {
            if now.duration_since(last) > self.reset_after {
                self.exponent = 0;
            }
        }
        self.last_invocation = Some(now);

        self.exponent = (self.exponent + 1).min(BACKOFF_MAX_EXPONENT);

        let bound = self.bound();
        let jitter = rand::rng().random_range(0.0..=bound.as_secs_f64());
        Duration::try_from_secs_f64(jitter).unwrap_or(bound).min(bound)
    }

    /// Borne supérieure du prochain délai à exposant courant
    pub fn bound(&self) -> Duration {
        self.base.saturating_mul(2u32.pow(self.exponent)).min(self.ceiling)
    }

    /// Revient à l'état initial après une reconnexion réussie
    pub fn reset(&mut self) {
        self.exponent = 0;
        self.last_invocation = None;
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_policy(&ReconnectPolicy::default())
    }
}
