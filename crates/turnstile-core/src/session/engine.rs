//! Conversation engine port.
//!
//! The engine is the remote, stateful service that actually holds the
//! conversation. The core only needs to start or resume a conversation, run
//! exchanges on it, and tear it down. Implementations live outside the core
//! (wire protocol clients, test doubles).

use std::future::Future;

use turnstile_types::error::EngineError;
use turnstile_types::session::SessionKey;

/// Result of one exchange with the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    pub output: String,
    /// Token to resume from on the next turn. `None` keeps the previous one.
    pub resume_token: Option<String>,
}

/// A live client bound to one conversation.
///
/// Any method may fail with [`EngineError::StaleSession`] when the engine has
/// forgotten the conversation the handle was resumed from.
pub trait ConversationHandle: Send + Sync + 'static {
    /// Complete the initial handshake.
    fn connect(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Send one input and wait for the reply.
    fn exchange(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<ExchangeReply, EngineError>> + Send;

    /// Tear the client down. Called on eviction, clear, and shutdown.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

/// Factory for conversation handles.
pub trait ConversationEngine: Send + Sync + 'static {
    type Handle: ConversationHandle;

    /// Build a handle for `key`, resuming from `resume_token` when given.
    ///
    /// The returned handle is not yet connected.
    fn begin_or_resume(
        &self,
        key: &SessionKey,
        resume_token: Option<&str>,
    ) -> impl Future<Output = Result<Self::Handle, EngineError>> + Send;
}
