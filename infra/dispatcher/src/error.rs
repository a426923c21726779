use std::borrow::Cow;

/// Errors that can occur while dispatching an event.
#[herald_derive::herald_error]
pub enum DispatcherError {
    /// An async delivery could not be handed to its executor.
    #[error("Failed to schedule async delivery{}: {source}", format_context(.context))]
    Spawn { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A transactional handler panicked. The rest of the dispatch was skipped.
    #[error("Transactional handler panicked{}: {message}", format_context(.context))]
    HandlerPanicked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The executor dropped a transactional delivery before it ran.
    #[error("Transactional delivery abandoned{}: {message}", format_context(.context))]
    Abandoned { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
