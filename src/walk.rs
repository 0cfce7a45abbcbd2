/*!
 * Walk control: cancellation, deadlines, depth limit and symlink cycles
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{PromptError, Result};

/// Shared stop signal for a running walk.
///
/// Clones share the same flag. A token built with [`CancelToken::with_timeout`]
/// also expires on its own once the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only stops when [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also stops once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fails with `Cancelled` or `TimedOut` once the walk must stop
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(PromptError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PromptError::TimedOut),
            _ => Ok(()),
        }
    }
}

/// Whether a directory met during a walk may be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descend {
    /// Expand it; carries the canonical path to push on the ancestor stack
    Enter(PathBuf),
    /// The depth limit was reached
    TooDeep,
    /// It resolves to one of its own ancestors
    Cycle,
    /// Its real location could not be resolved
    Unresolvable,
}

/// Per-walk state threaded through the recursion
#[derive(Debug)]
pub struct WalkGuard<'a> {
    token: &'a CancelToken,
    max_depth: usize,
    ancestors: Vec<PathBuf>,
}

impl<'a> WalkGuard<'a> {
    /// Start a walk at `root`
    pub fn new(token: &'a CancelToken, max_depth: usize, root: &Path) -> Self {
        let ancestors = fs::canonicalize(root).into_iter().collect();
        Self {
            token,
            max_depth,
            ancestors,
        }
    }

    pub fn check(&self) -> Result<()> {
        self.token.check()
    }

    /// Decide about a directory found at `depth` levels below the root
    pub fn descend(&self, dir: &Path, depth: usize) -> Descend {
        if depth > self.max_depth {
            return Descend::TooDeep;
        }
        match fs::canonicalize(dir) {
            Ok(real) if self.ancestors.contains(&real) => Descend::Cycle,
            Ok(real) => Descend::Enter(real),
            Err(_) => Descend::Unresolvable,
        }
    }

    pub fn enter(&mut self, real: PathBuf) {
        self.ancestors.push(real);
    }

    pub fn leave(&mut self) {
        self.ancestors.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(matches!(token.check(), Err(PromptError::Cancelled)));
    }

    #[test]
    fn expired_deadline_times_out() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(token.check(), Err(PromptError::TimedOut)));
    }

    #[test]
    fn depth_limit_stops_descent() {
        let dir = tempdir().unwrap();
        let token = CancelToken::new();
        let guard = WalkGuard::new(&token, 1, dir.path());

        fs::create_dir(dir.path().join("a")).unwrap();
        assert!(matches!(
            guard.descend(&dir.path().join("a"), 1),
            Descend::Enter(_)
        ));
        assert_eq!(guard.descend(&dir.path().join("a"), 2), Descend::TooDeep);
    }

    #[cfg(unix)]
    #[test]
    fn link_back_to_ancestor_is_a_cycle() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a").join("up")).unwrap();

        let token = CancelToken::new();
        let mut guard = WalkGuard::new(&token, 10, dir.path());
        match guard.descend(&dir.path().join("a"), 1) {
            Descend::Enter(real) => guard.enter(real),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            guard.descend(&dir.path().join("a").join("up"), 2),
            Descend::Cycle
        );
    }
}
