//! Worker-local connection table.
//!
//! Slots addressed by `Token`; freed slots are reused through a free list.
//! A token is only reused after its connection has been removed, and the
//! worker never inserts while it is still walking a batch of events, so a
//! stale report can never reach a newer connection.

use epserve_core::multiplexer::Token;

pub struct ConnTable<C> {
    slots: Vec<Option<C>>,
    free: Vec<usize>,
    len: usize,
}

impl<C> Default for ConnTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ConnTable<C> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), len: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Vec::with_capacity(capacity), free: Vec::new(), len: 0 }
    }

    pub fn insert(&mut self, conn: C) -> Token {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(conn);
                idx
            }
            None => {
                self.slots.push(Some(conn));
                self.slots.len() - 1
            }
        };
        self.len += 1;
        Token(idx)
    }

    pub fn get(&self, token: Token) -> Option<&C> {
        self.slots.get(token.index())?.as_ref()
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut C> {
        self.slots.get_mut(token.index())?.as_mut()
    }

    pub fn remove(&mut self, token: Token) -> Option<C> {
        let conn = self.slots.get_mut(token.index())?.take()?;
        self.free.push(token.index());
        self.len -= 1;
        Some(conn)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|c| (Token(idx), c)))
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.iter().map(|(token, _)| token).collect()
    }
}
