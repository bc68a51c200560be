//! Outward publication of view states, plus an in-process back/forward
//! history that implements it.

use tracing::debug;

use tilebrot_core::ViewState;

/// Receives view states for persistence (a URL bar, a file, a log).
pub trait StatePublisher {
    /// A user-driven mutation produced `state`.
    fn publish(&mut self, state: &ViewState);

    /// Record the state loaded at startup without adding an entry.
    fn replace(&mut self, state: &ViewState);
}

/// Bounded linear history with a cursor, like a browser's back/forward
/// stack. Publishing after going back discards the forward entries.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: Vec<ViewState>,
    pos: usize,
    capacity: usize,
}

impl SessionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            pos: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn current(&self) -> Option<ViewState> {
        self.entries.get(self.pos).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_go_back(&self) -> bool {
        self.pos > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.pos + 1 < self.entries.len()
    }

    /// Step back and return the state to navigate to.
    pub fn back(&mut self) -> Option<ViewState> {
        if !self.can_go_back() {
            return None;
        }
        self.pos -= 1;
        self.current()
    }

    /// Step forward and return the state to navigate to.
    pub fn forward(&mut self) -> Option<ViewState> {
        if !self.can_go_forward() {
            return None;
        }
        self.pos += 1;
        self.current()
    }
}

impl StatePublisher for SessionHistory {
    fn publish(&mut self, state: &ViewState) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.pos + 1);
        }
        self.entries.push(*state);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.pos = self.entries.len() - 1;
        debug!(entries = self.entries.len(), query = %state, "Published view state");
    }

    fn replace(&mut self, state: &ViewState) {
        match self.entries.get_mut(self.pos) {
            Some(entry) => *entry = *state,
            None => {
                self.entries.push(*state);
                self.pos = self.entries.len() - 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(cx: f64) -> ViewState {
        ViewState::new(cx, 0.0, 0.01, 100).unwrap()
    }

    #[test]
    fn replace_seeds_without_growing() {
        let mut h = SessionHistory::new(10);
        h.replace(&state(0.0));
        h.replace(&state(1.0));
        assert_eq!(h.len(), 1);
        assert_eq!(h.current(), Some(state(1.0)));
        assert!(!h.can_go_back());
    }

    #[test]
    fn back_and_forward_walk_the_stack() {
        let mut h = SessionHistory::new(10);
        h.replace(&state(0.0));
        h.publish(&state(1.0));
        h.publish(&state(2.0));

        assert_eq!(h.back(), Some(state(1.0)));
        assert_eq!(h.back(), Some(state(0.0)));
        assert_eq!(h.back(), None);
        assert_eq!(h.forward(), Some(state(1.0)));
        assert_eq!(h.forward(), Some(state(2.0)));
        assert_eq!(h.forward(), None);
    }

    #[test]
    fn publish_after_back_drops_forward_entries() {
        let mut h = SessionHistory::new(10);
        h.replace(&state(0.0));
        h.publish(&state(1.0));
        h.publish(&state(2.0));
        h.back();
        h.publish(&state(3.0));

        assert_eq!(h.len(), 3);
        assert!(!h.can_go_forward());
        assert_eq!(h.back(), Some(state(1.0)));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = SessionHistory::new(3);
        for i in 0..5 {
            h.publish(&state(i as f64));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.current(), Some(state(4.0)));
        assert_eq!(h.back(), Some(state(3.0)));
        assert_eq!(h.back(), Some(state(2.0)));
        assert_eq!(h.back(), None);
    }
}
