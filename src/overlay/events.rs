//! Synchronous, ordered event dispatch.
//!
//! Listeners run in subscription order inside the call that emitted the
//! event. Nothing here is deferred, so the reconciliation loop stays easy to
//! follow: data changes first, presentation reacts, never the other way.

use std::fmt;

/// Returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners plus a journal of everything emitted.
pub struct EventBus<E> {
	listeners: Vec<(ListenerId, Box<dyn FnMut(&E)>)>,
	journal: Vec<E>,
	next_id: u64,
}

impl<E: Clone> EventBus<E> {
	/// No listeners, empty journal.
	pub fn new() -> Self {
		Self {
			listeners: Vec::new(),
			journal: Vec::new(),
			next_id: 0,
		}
	}

	/// Adds a listener after all existing ones.
	pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> ListenerId {
		let id = ListenerId(self.next_id);
		self.next_id += 1;
		self.listeners.push((id, Box::new(listener)));
		id
	}

	/// False when `id` was not subscribed.
	pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
		let before = self.listeners.len();
		self.listeners.retain(|(lid, _)| *lid != id);
		before != self.listeners.len()
	}

	/// Runs every listener, then journals the event.
	pub fn emit(&mut self, event: E) {
		for (_, listener) in &mut self.listeners {
			listener(&event);
		}
		self.journal.push(event);
	}

	/// Events emitted since the last drain, for the owning graph instance.
	pub fn drain(&mut self) -> Vec<E> {
		std::mem::take(&mut self.journal)
	}
}

impl<E: Clone> Default for EventBus<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> fmt::Debug for EventBus<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus")
			.field("listeners", &self.listeners.len())
			.field("pending", &self.journal.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	#[test]
	fn listeners_run_in_subscription_order() {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let mut bus = EventBus::<u32>::new();
		let (a, b) = (seen.clone(), seen.clone());
		bus.subscribe(move |e| a.borrow_mut().push(("a", *e)));
		let second = bus.subscribe(move |e| b.borrow_mut().push(("b", *e)));

		bus.emit(1);
		assert!(bus.unsubscribe(second));
		bus.emit(2);

		assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1), ("a", 2)]);
		assert_eq!(bus.drain(), vec![1, 2]);
		assert!(bus.drain().is_empty());
	}
}
