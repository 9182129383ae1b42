use std::collections::VecDeque;
use std::sync::Mutex;

use rand::Rng;

use super::domain::ReferenceId;
use super::repository::{NoticeRepository, RepositoryError};

pub const REFERENCE_PREFIX: &str = "REF-";
pub const REFERENCE_BODY_LEN: usize = 8;
pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ALLOCATION_ATTEMPTS: usize = 5;

/// Source of candidate references. Uniqueness is not its concern.
pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self) -> ReferenceId;
}

/// Draws candidates from the thread-local RNG, which is seeded from the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReferenceGenerator;

impl ReferenceGenerator for RandomReferenceGenerator {
    fn generate(&self) -> ReferenceId {
        let mut rng = rand::thread_rng();
        let mut value = String::with_capacity(REFERENCE_PREFIX.len() + REFERENCE_BODY_LEN);
        value.push_str(REFERENCE_PREFIX);
        for _ in 0..REFERENCE_BODY_LEN {
            let idx = rng.gen_range(0..REFERENCE_ALPHABET.len());
            value.push(REFERENCE_ALPHABET[idx] as char);
        }
        ReferenceId(value)
    }
}

/// Replays a fixed list of candidates, then falls back to random ones.
#[derive(Debug, Default)]
pub struct ScriptedReferenceGenerator {
    queue: Mutex<VecDeque<ReferenceId>>,
}

impl ScriptedReferenceGenerator {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(
                candidates
                    .into_iter()
                    .map(|value| ReferenceId(value.into()))
                    .collect(),
            ),
        }
    }
}

impl ReferenceGenerator for ScriptedReferenceGenerator {
    fn generate(&self) -> ReferenceId {
        let next = self
            .queue
            .lock()
            .expect("reference queue poisoned")
            .pop_front();
        next.unwrap_or_else(|| RandomReferenceGenerator.generate())
    }
}

/// Returns true when `value` has the `REF-XXXXXXXX` shape.
pub fn is_well_formed(value: &str) -> bool {
    match value.strip_prefix(REFERENCE_PREFIX) {
        Some(body) => {
            body.len() == REFERENCE_BODY_LEN
                && body.bytes().all(|byte| REFERENCE_ALPHABET.contains(&byte))
        }
        None => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("could not allocate a unique reference after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Finds a candidate reference that the repository does not hold yet.
///
/// The repository's unique index remains the final guard: a candidate that
/// passes here can still lose an insert race.
pub struct ReferenceAllocator {
    generator: Box<dyn ReferenceGenerator>,
    attempts: usize,
}

impl ReferenceAllocator {
    pub fn new(generator: Box<dyn ReferenceGenerator>) -> Self {
        Self {
            generator,
            attempts: ALLOCATION_ATTEMPTS,
        }
    }

    pub fn random() -> Self {
        Self::new(Box::new(RandomReferenceGenerator))
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn allocate<R>(&self, repository: &R) -> Result<ReferenceId, AllocationError>
    where
        R: NoticeRepository + ?Sized,
    {
        let mut budget = self.attempts;
        self.allocate_within(repository, &mut budget)
    }

    /// Like `allocate`, but charges every draw against a caller-held budget so
    /// insert retries and existence checks share one bound.
    pub fn allocate_within<R>(
        &self,
        repository: &R,
        budget: &mut usize,
    ) -> Result<ReferenceId, AllocationError>
    where
        R: NoticeRepository + ?Sized,
    {
        while *budget > 0 {
            *budget -= 1;
            let candidate = self.generator.generate();
            if !repository.exists(&candidate)? {
                return Ok(candidate);
            }
            let attempt = self.attempts.saturating_sub(*budget);
            tracing::warn!(%candidate, attempt, "reference candidate already taken");
        }

        Err(AllocationError::Exhausted {
            attempts: self.attempts,
        })
    }
}

impl Default for ReferenceAllocator {
    fn default() -> Self {
        Self::random()
    }
}

impl std::fmt::Debug for ReferenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceAllocator")
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}
