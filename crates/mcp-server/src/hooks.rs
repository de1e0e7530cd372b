//! Post-event hook chain.
//!
//! After `memory_search_refs` and `memory_expand` assemble their output,
//! registered handlers see the full result and may substitute augmented
//! refs or windows. The chain is a sequenced async fold: each handler
//! receives the context its predecessors produced and returns the next
//! one. Parallel handler execution is not permitted, so augmentation
//! order is deterministic.

use recall_protocol::{ExpandResult, MemoryRef};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const HOOK_SEARCH_REFS_POST: &str = "tool:memory_search_refs:post";
pub const HOOK_EXPAND_POST: &str = "tool:memory_expand:post";

/// Context threaded through the fold.
#[derive(Debug, Default)]
pub struct HookContext {
    /// Full tool output as it would be returned.
    pub output: serde_json::Value,
    /// When set, replaces the core's refs in the final result.
    pub augmented_refs: Option<Vec<MemoryRef>>,
    /// When set, replaces the core's expanded windows.
    pub augmented_expanded: Option<Vec<ExpandResult>>,
}

pub type HookFuture = Pin<Box<dyn Future<Output = HookContext> + Send>>;
pub type HookHandler = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

#[derive(Clone, Default)]
pub struct HookRegistry {
    search_refs_post: Vec<HookHandler>,
    expand_post: Vec<HookHandler>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one of the post events. Unknown event names
    /// are ignored (the event vocabulary is closed).
    pub fn register(&mut self, event: &str, handler: HookHandler) {
        match event {
            HOOK_SEARCH_REFS_POST => self.search_refs_post.push(handler),
            HOOK_EXPAND_POST => self.expand_post.push(handler),
            other => log::warn!("ignoring hook registration for unknown event {other}"),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.search_refs_post.is_empty() && self.expand_post.is_empty()
    }

    pub async fn run_search_refs_post(&self, mut context: HookContext) -> HookContext {
        for handler in &self.search_refs_post {
            context = handler(context).await;
        }
        context
    }

    pub async fn run_expand_post(&self, mut context: HookContext) -> HookContext {
        for handler in &self.expand_post {
            context = handler(context).await;
        }
        context
    }
}
