//! Debounced filter recomputation.
//!
//! Each keystroke schedules a fresh recomputation after a quiet period and
//! supersedes whatever was pending. Only the last scheduled predicate is
//! ever applied, and it is applied under the tree lock, so readers never
//! see a half-filtered tree.

use super::visibility::{apply_filter, set_expanded, SearchPattern, SpanFilter, TypeFilter};
use crate::parser::schema::Span;
use crate::utils::config::{AnalyzerConfig, DEFAULT_DEBOUNCE};
use crate::utils::error::FilterError;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a pending task
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Prevent the task from running if it has not started yet
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block until the timer has fired (whether or not the task ran)
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Identifies one scheduled task; goes stale once anything newer is scheduled
#[derive(Debug, Clone)]
pub struct Ticket {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Last-write-wins scheduler
///
/// Scheduling a task bumps a generation counter; a timer only runs its task
/// if no newer task was scheduled in the meantime. Tasks that act on shared
/// state should check their [`Ticket`] again once they hold the lock.
#[derive(Clone, Default)]
pub struct Debouncer {
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_with(delay, move |_| task())
    }

    /// Like [`Debouncer::schedule`], handing the task its own ticket
    pub fn schedule_with<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: FnOnce(&Ticket) + Send + 'static,
    {
        let ticket = Ticket {
            current: Arc::clone(&self.generation),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = thread::spawn(move || {
            thread::sleep(delay);
            if flag.load(Ordering::SeqCst) {
                trace!("Task {} cancelled", ticket.generation);
                return;
            }
            if !ticket.is_current() {
                trace!("Task {} superseded", ticket.generation);
                return;
            }
            task(&ticket);
        });

        ScheduledTask {
            cancelled,
            handle: Some(handle),
        }
    }

    /// Supersede anything pending without scheduling a replacement
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Owns a span tree and the filter currently applied to it
pub struct FilterController {
    tree: Arc<Mutex<Span>>,
    filter: Arc<Mutex<SpanFilter>>,
    debouncer: Debouncer,
    delay: Duration,
}

impl FilterController {
    pub fn new(root: Span) -> Self {
        Self::with_delay(root, DEFAULT_DEBOUNCE)
    }

    pub fn from_config(root: Span, config: &AnalyzerConfig) -> Self {
        Self::with_delay(root, config.debounce())
    }

    pub fn with_delay(root: Span, delay: Duration) -> Self {
        Self {
            tree: Arc::new(Mutex::new(root)),
            filter: Arc::new(Mutex::new(SpanFilter::default())),
            debouncer: Debouncer::new(),
            delay,
        }
    }

    /// Shared handle to the tree
    pub fn tree(&self) -> Arc<Mutex<Span>> {
        Arc::clone(&self.tree)
    }

    pub fn filter(&self) -> SpanFilter {
        self.filter.lock().clone()
    }

    /// Update the search term; an empty term clears it
    ///
    /// Invalid regexes are rejected immediately and leave the pending
    /// state untouched.
    pub fn set_search(&self, term: &str, regex: bool) -> Result<ScheduledTask, FilterError> {
        let search = match term.trim() {
            "" => None,
            t if regex => Some(SearchPattern::regex(t)?),
            t => Some(SearchPattern::substring(t)),
        };
        self.filter.lock().search = search;
        Ok(self.schedule())
    }

    pub fn set_type_filter(&self, type_filter: Option<TypeFilter>) -> ScheduledTask {
        self.filter.lock().type_filter = type_filter;
        self.schedule()
    }

    /// Expand or collapse a span; takes effect at the next recomputation
    pub fn set_expanded(&self, index: usize, expanded: bool) -> bool {
        set_expanded(&mut self.tree.lock(), index, expanded)
    }

    /// Recompute right away, superseding anything pending
    pub fn apply_now(&self) -> usize {
        let mut tree = self.tree.lock();
        self.debouncer.cancel_pending();
        let filter = self.filter();
        apply_filter(&mut tree, &filter)
    }

    fn schedule(&self) -> ScheduledTask {
        let tree = Arc::clone(&self.tree);
        let filter = self.filter();
        self.debouncer.schedule_with(self.delay, move |ticket| {
            let mut tree = tree.lock();
            // Something newer may have run while we waited for the lock.
            if !ticket.is_current() {
                trace!("Stale filter dropped");
                return;
            }
            let visible = apply_filter(&mut tree, &filter);
            debug!("Debounced filter applied: {} visible spans", visible);
        })
    }
}
