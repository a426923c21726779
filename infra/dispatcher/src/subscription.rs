use crate::handler::HandlerId;
use std::fmt;
use std::sync::Weak;

/// The removal side of a dispatcher registry, erased over the payload type.
pub(crate) trait Registry: Send + Sync {
    fn remove(&self, id: HandlerId) -> bool;
    fn contains(&self, id: HandlerId) -> bool;
}

/// Handle returned by every subscribe call.
///
/// It is bound to the identity of one handler record, never to the callback, so
/// two subscriptions of the same closure are removed independently. The handle only
/// holds a weak reference: it never keeps a dispatcher alive, and dropping it leaves
/// the handler registered.
#[derive(Clone)]
pub struct Subscription {
    id: HandlerId,
    registry: Weak<dyn Registry>,
}

impl Subscription {
    pub(crate) fn new(id: HandlerId, registry: Weak<dyn Registry>) -> Self {
        Self { id, registry }
    }

    #[must_use]
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    /// Removes the handler from its dispatcher.
    ///
    /// Returns `true` if this call removed it. Calling it again, after a once
    /// handler already fired, or after the dispatcher was dropped is a no-op that
    /// returns `false`. Safe to call from inside the handler's own callback.
    pub fn unsubscribe(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| registry.remove(self.id))
    }

    /// Whether the handler is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| registry.contains(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("dispatcher_alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}
