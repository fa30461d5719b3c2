//! Arithmetic challenges shown on the sign-up form.

use rand::{Rng, RngCore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CHALLENGE_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Most unanswered challenges kept at once.
pub const MAX_PENDING_CHALLENGES: usize = 10_000;

/// A challenge as sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub id: String,
    pub question: String,
}

struct Pending {
    answer: i64,
    expires_at: Instant,
}

/// Outstanding challenges. Each one can be answered once.
pub struct CaptchaStore {
    capacity: usize,
    pending: Mutex<HashMap<String, Pending>>,
}

impl Default for CaptchaStore {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_CHALLENGES)
    }
}

fn make_question<R: Rng>(rng: &mut R) -> (String, i64) {
    let (a, op, b, answer) = match rng.gen_range(0..3) {
        0 => {
            let (a, b) = (rng.gen_range(1..=50), rng.gen_range(1..=50));
            (a, '+', b, a + b)
        }
        1 => {
            let (a, b) = (rng.gen_range(25..=74), rng.gen_range(1..=25));
            (a, '-', b, a - b)
        }
        _ => {
            let (a, b) = (rng.gen_range(1..=12), rng.gen_range(1..=12));
            (a, '*', b, a * b)
        }
    };
    (format!("{a} {op} {b} = ?"), answer)
}

impl CaptchaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `capacity` challenges; the oldest one is
    /// dropped to make room.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a challenge and drops expired ones.
    pub fn issue(&self, now: Instant) -> Challenge {
        let mut rng = rand::thread_rng();
        let (question, answer) = make_question(&mut rng);
        let mut id = [0u8; 16];
        rng.fill_bytes(&mut id);
        let id = hex::encode(id);

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|_, p| p.expires_at > now);
            while pending.len() >= self.capacity {
                let Some(oldest) = pending
                    .iter()
                    .min_by_key(|(_, p)| p.expires_at)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                pending.remove(&oldest);
            }
            pending.insert(
                id.clone(),
                Pending {
                    answer,
                    expires_at: now + CHALLENGE_LIFETIME,
                },
            );
        }
        Challenge { id, question }
    }

    /// Checks an answer. The challenge is consumed whatever the outcome.
    pub fn verify(&self, id: &str, answer: &str, now: Instant) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        let Some(challenge) = pending.remove(id.trim()) else {
            return false;
        };
        challenge.expires_at > now
            && answer
                .trim()
                .parse::<i64>()
                .is_ok_and(|given| given == challenge.answer)
    }
}
