use crate::core::ActorId;

type Handler<T> = Box<dyn FnMut(&T)>;

/// In-process publish/subscribe hub. A publisher never receives its own
/// messages.
pub struct Publisher<T> {
    subscribers: Vec<(ActorId, Handler<T>)>,
}

impl<T> Publisher<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, actor: ActorId, handler: impl FnMut(&T) + 'static) {
        self.subscribers.push((actor, Box::new(handler)));
    }

    pub fn unsubscribe(&mut self, actor: &ActorId) {
        self.subscribers.retain(|(subscriber, _)| subscriber != actor);
    }

    /// Delivers `payload` to every subscriber except `sender`. Returns the
    /// number of deliveries.
    pub fn publish(&mut self, sender: &ActorId, payload: &T) -> usize {
        let mut delivered = 0;
        for (subscriber, handler) in &mut self.subscribers {
            if subscriber != sender {
                handler(payload);
                delivered += 1;
            }
        }
        delivered
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field(
                "subscribers",
                &self.subscribers.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            )
            .finish()
    }
}
