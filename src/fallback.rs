//! Ordered fallback chains.
//!
//! A chain is a list of named attempts for the same logical conversion. They
//! run strictly one after another; the first attempt whose value passes the
//! [`Acceptable`] check wins and the rest are never started. Failures are
//! logged and collected so that an exhausted chain can report every reason in
//! the order the attempts were tried.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info, warn};

use crate::error::{AttemptFailure, FluxifyError, Result};

pub type AttemptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Decides whether an attempt's value counts as a success
pub trait Acceptable {
    /// `None` when acceptable, otherwise the reason for rejection
    fn rejection(&self) -> Option<String>;
}

impl Acceptable for PathBuf {
    fn rejection(&self) -> Option<String> {
        match non_empty_file(self) {
            true => None,
            false => Some(format!("no output or empty file at {}", self.display())),
        }
    }
}

impl Acceptable for String {
    fn rejection(&self) -> Option<String> {
        match self.trim().is_empty() {
            true => Some("no text produced".to_string()),
            false => None,
        }
    }
}

/// True when `path` is an existing regular file of non-zero size
pub fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

struct Attempt<'a, T> {
    name: String,
    run: Box<dyn FnOnce() -> AttemptFuture<'a, T> + Send + 'a>,
}

/// Where a chain currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Trying(usize),
    Succeeded(usize),
    AllFailed,
}

/// Result of running a chain to completion
#[derive(Debug)]
pub enum ChainOutcome<T> {
    Succeeded {
        attempt: String,
        value: T,
        /// Attempts that failed before the winning one
        failures: Vec<AttemptFailure>,
    },
    AllFailed(Vec<AttemptFailure>),
}

pub struct FallbackChain<'a, T> {
    name: String,
    attempts: Vec<Attempt<'a, T>>,
}

impl<'a, T> FallbackChain<'a, T>
where
    T: Acceptable + Send + 'a,
{
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attempts: Vec::new(),
        }
    }

    /// Append an attempt; attempts run in the order they are added
    pub fn attempt<S, F, Fut>(mut self, name: S, run: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        self.attempts.push(Attempt {
            name: name.into(),
            run: Box::new(move || Box::pin(run())),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub async fn run(self) -> ChainOutcome<T> {
        let mut state = ChainState::Pending;
        let mut failures = Vec::new();
        debug!("{} [{:?}]: {} attempts", self.name, state, self.attempts.len());

        for (index, attempt) in self.attempts.into_iter().enumerate() {
            state = ChainState::Trying(index);
            info!("{} [{:?}]: trying {}", self.name, state, attempt.name);

            let reason = match (attempt.run)().await {
                Ok(value) => match value.rejection() {
                    None => {
                        state = ChainState::Succeeded(index);
                        info!("{} [{:?}]: {} succeeded", self.name, state, attempt.name);
                        return ChainOutcome::Succeeded {
                            attempt: attempt.name,
                            value,
                            failures,
                        };
                    }
                    Some(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            warn!("{}: {} failed: {}", self.name, attempt.name, reason);
            failures.push(AttemptFailure {
                attempt: attempt.name,
                reason,
            });
        }

        state = ChainState::AllFailed;
        warn!("{} [{:?}]: every attempt failed", self.name, state);
        ChainOutcome::AllFailed(failures)
    }

    /// Run the chain, turning exhaustion into `AllFallbacksExhausted`
    pub async fn run_or_exhausted(self) -> Result<T> {
        let chain = self.name.clone();
        match self.run().await {
            ChainOutcome::Succeeded { value, .. } => Ok(value),
            ChainOutcome::AllFailed(failures) => {
                Err(FluxifyError::AllFallbacksExhausted { chain, failures })
            }
        }
    }
}
