// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Execution contexts for a document run.
//!
//! A document run owns one carried context: bindings made by an earlier
//! block stay visible to later ones. Blocks marked `isolated` get a fresh
//! context of their own instead.

use std::sync::Arc;
use std::time::Duration;

use litmus_interp::{CapabilitySet, Interpreter, Value};
use tracing::debug;

use crate::extract::{CodeBlock, Document};
use crate::policy::{CancelToken, PolicyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// New for a single block.
    Fresh,
    /// Persists across the blocks of one document run.
    Carried,
}

/// An interpreter instance plus the limits its blocks run under.
pub struct ExecutionContext {
    pub(crate) interp: Interpreter,
    lifetime: Lifetime,
    pub(crate) timeout: Duration,
    pub(crate) cancel: CancelToken,
}

impl ExecutionContext {
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// A top-level binding made by an earlier block, if any.
    pub fn binding(&self, name: &str) -> Option<Value> {
        self.interp.global(name)
    }
}

/// Creates the contexts of document runs. Shared read-only by a worker.
pub struct ContextManager {
    policy: PolicyConfig,
    capabilities: Arc<CapabilitySet>,
    cancel: CancelToken,
}

impl ContextManager {
    pub fn new(policy: &PolicyConfig, capabilities: Arc<CapabilitySet>, cancel: CancelToken) -> Self {
        Self {
            policy: policy.clone(),
            capabilities,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn create(&self, lifetime: Lifetime) -> ExecutionContext {
        ExecutionContext {
            interp: Interpreter::new(self.policy.sandbox_config(self.capabilities.clone())),
            lifetime,
            timeout: self.policy.timeout(),
            cancel: self.cancel.clone(),
        }
    }

    /// Start a run of `document` with a new carried context.
    pub fn begin(&self, document: &Document) -> DocumentRun<'_> {
        debug!(document = %document.id, "context created");
        DocumentRun {
            manager: self,
            document_id: document.id.clone(),
            carried: Some(self.create(Lifetime::Carried)),
            isolated: None,
        }
    }
}

/// The contexts of one document run. Released on [`DocumentRun::end`] or
/// when dropped, whichever comes first.
pub struct DocumentRun<'m> {
    manager: &'m ContextManager,
    document_id: String,
    carried: Option<ExecutionContext>,
    isolated: Option<ExecutionContext>,
}

impl DocumentRun<'_> {
    /// The context `block` executes in.
    pub fn context_for(&mut self, block: &CodeBlock) -> &mut ExecutionContext {
        if block.annotations.isolated {
            debug!(document = %self.document_id, line = block.start_line, "fresh context");
            return self.isolated.insert(self.manager.create(Lifetime::Fresh));
        }
        let manager = self.manager;
        self.carried
            .get_or_insert_with(|| manager.create(Lifetime::Carried))
    }

    pub fn end(self) {}

    fn release(&mut self) {
        let had_carried = self.carried.take().is_some();
        self.isolated = None;
        if had_carried {
            debug!(document = %self.document_id, "context released");
        }
    }
}

impl Drop for DocumentRun<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn manager() -> ContextManager {
        let policy = PolicyConfig::default();
        let caps = Arc::new(policy.allow.clone());
        ContextManager::new(&policy, caps, CancelToken::new())
    }

    #[test]
    fn test_carried_context_keeps_bindings() {
        let doc = extract(
            "doc.md",
            "```js runnable\nlet a = 1;\n```\n```js runnable\na + 1\n```\n",
        )
        .unwrap();
        let blocks: Vec<&CodeBlock> = doc.runnable_blocks().collect();
        let manager = manager();
        let mut run = manager.begin(&doc);

        let first = run.context_for(blocks[0]);
        assert_eq!(first.lifetime(), Lifetime::Carried);
        first.interp.eval(&blocks[0].source);

        let second = run.context_for(blocks[1]);
        assert!(matches!(second.binding("a"), Some(Value::Number(n)) if n == 1.0));
        run.end();
    }

    #[test]
    fn test_isolated_blocks_see_nothing() {
        let doc = extract(
            "doc.md",
            "```js runnable\nvar shared = 1;\n```\n```js runnable isolated\nvar mine = 2;\n```\n```js runnable fresh\n1\n```\n",
        )
        .unwrap();
        let blocks: Vec<&CodeBlock> = doc.runnable_blocks().collect();
        let manager = manager();
        let mut run = manager.begin(&doc);

        run.context_for(blocks[0]).interp.eval(&blocks[0].source);
        let isolated = run.context_for(blocks[1]);
        assert_eq!(isolated.lifetime(), Lifetime::Fresh);
        assert!(isolated.binding("shared").is_none());
        isolated.interp.eval(&blocks[1].source);

        let next = run.context_for(blocks[2]);
        assert!(next.binding("mine").is_none());
        assert!(next.binding("shared").is_none());
    }

    #[test]
    fn test_new_run_starts_clean() {
        let doc = extract("doc.md", "```js runnable\nvar x = 5;\n```\n").unwrap();
        let block = doc.runnable_blocks().next().unwrap();
        let manager = manager();
        {
            let mut run = manager.begin(&doc);
            run.context_for(block).interp.eval(&block.source);
        }
        let mut run = manager.begin(&doc);
        assert!(run.context_for(block).binding("x").is_none());
    }
}
