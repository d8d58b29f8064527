//! Per-flow task name allocation
//!
//! Unnamed tasks get `{label}_{n}` where `n` counts up per label.
//! Explicit names are kept verbatim while free and suffixed from `_2`
//! on collision. Allocation is split into `propose` (pure) and `commit`
//! so a failed registration leaves the counters untouched.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

/// Name chosen for a task, not yet recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NameProposal {
    pub name: Arc<str>,
    base: Arc<str>,
    suffix: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NameAllocator {
    taken: FxHashSet<Arc<str>>,
    counters: FxHashMap<Arc<str>, usize>,
}

impl NameAllocator {
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Pick a name for a task with base `label`
    ///
    /// `explicit` names are used as-is when free.
    pub fn propose(&self, label: &str, explicit: bool) -> NameProposal {
        if explicit && !self.is_taken(label) {
            return NameProposal {
                name: Arc::from(label),
                base: Arc::from(label),
                suffix: None,
            };
        }

        let last = self.counters.get(label).copied().unwrap_or(0);
        // the bare explicit name already occupies slot 1
        let mut n = if explicit { last.max(1) + 1 } else { last + 1 };
        loop {
            let candidate = format!("{label}_{n}");
            if !self.is_taken(&candidate) {
                return NameProposal {
                    name: Arc::from(candidate),
                    base: Arc::from(label),
                    suffix: Some(n),
                };
            }
            n += 1;
        }
    }

    pub fn commit(&mut self, proposal: NameProposal) {
        if let Some(n) = proposal.suffix {
            let counter = self.counters.entry(proposal.base).or_insert(0);
            *counter = (*counter).max(n);
        }
        self.taken.insert(proposal.name);
    }

    /// Record a name coming from a serialized flow
    ///
    /// Names shaped like `{base}_{n}` advance the counter for `base` so that
    /// tasks added after a restore keep counting where the saved flow left off.
    pub fn restore(&mut self, name: Arc<str>) {
        if let Some((base, digits)) = name.rsplit_once('_') {
            if let Ok(n) = digits.parse::<usize>() {
                if !base.is_empty() {
                    let counter = self.counters.entry(Arc::from(base)).or_insert(0);
                    *counter = (*counter).max(n);
                }
            }
        }
        self.taken.insert(name);
    }
}
