use std::collections::VecDeque;

use crate::core::llm::ChatTurn;

pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Bounded conversation history; the oldest turn is evicted first.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
    cap: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl ChatHistory {
    /// A cap of zero is treated as one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            turns: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        while self.turns.len() >= self.cap {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Owned copy, oldest first, for building a request.
    pub fn snapshot(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }
}
