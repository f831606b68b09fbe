use futures::future::BoxFuture;

use crate::error::Result;

/// Text generation capability: prompt in, text out.
///
/// Implementations do not enforce a timeout themselves; the adapter in
/// `switchboard-llm` wraps every call with one and drops the future on expiry,
/// so implementations must release their resources on drop.
pub trait Generator: Send + Sync + 'static {
    /// Backend name for logs (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>>;
}
