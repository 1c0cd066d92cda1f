//! Resolved rule table and its shared, swappable handle

use std::sync::{Arc, RwLock};

use crate::config::Rule;

/// Immutable snapshot of the rules for both directions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    version: u64,
    query: Vec<Rule>,
    result: Vec<Rule>,
}

impl RuleTable {
    /// Create a table from already-resolved rule lists
    pub fn new(version: u64, query: Vec<Rule>, result: Vec<Rule>) -> Self {
        Self {
            version,
            query,
            result,
        }
    }

    /// Reload generation this table was built for
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rules applied to outgoing queries
    pub fn query_rules(&self) -> &[Rule] {
        &self.query
    }

    /// Rules applied to backend results
    pub fn result_rules(&self) -> &[Rule] {
        &self.result
    }
}

/// Shared handle to the current [`RuleTable`]
///
/// Readers clone the current `Arc` under the read lock and then work on the
/// snapshot without holding any lock. A reload swaps the `Arc` under the
/// write lock.
#[derive(Debug, Clone, Default)]
pub struct SharedRuleTable {
    inner: Arc<RwLock<Arc<RuleTable>>>,
}

impl SharedRuleTable {
    /// Wrap an initial table
    pub fn new(table: RuleTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<RuleTable> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Publish a new table, returning the one it replaced
    pub fn replace(&self, table: RuleTable) -> Arc<RuleTable> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(table))
    }
}
