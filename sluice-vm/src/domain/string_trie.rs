//! Finite-set-of-strings domain backed by a deterministic trie.

use core::fmt;
use std::collections::BTreeMap;

use sluice_ir::Type;

use crate::domain::Domain;

/// Maximum number of trie nodes before the domain saturates.
pub const TRIE_NODE_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Default, PartialEq)]
struct Node {
    terminal: bool,
    children: BTreeMap<u8, Node>,
}

impl Node {
    fn count(&self) -> usize {
        1 + self.children.values().map(Node::count).sum::<usize>()
    }

    fn word_count(&self) -> usize {
        usize::from(self.terminal) + self.children.values().map(Node::word_count).sum::<usize>()
    }

    fn insert(&mut self, word: &[u8]) {
        match word.split_first() {
            None => self.terminal = true,
            Some((&head, rest)) => self.children.entry(head).or_default().insert(rest),
        }
    }

    fn contains(&self, word: &[u8]) -> bool {
        match word.split_first() {
            None => self.terminal,
            Some((&head, rest)) => self
                .children
                .get(&head)
                .is_some_and(|child| child.contains(rest)),
        }
    }

    /// Union of paths.
    fn merge(&mut self, other: &Node) {
        self.terminal |= other.terminal;
        for (&byte, child) in &other.children {
            self.children.entry(byte).or_default().merge(child);
        }
    }

    /// Intersection of paths; prunes branches that die out.
    fn intersect(&mut self, other: &Node) {
        self.terminal &= other.terminal;
        self.children.retain(|byte, child| {
            let Some(theirs) = other.children.get(byte) else {
                return false;
            };
            child.intersect(theirs);
            child.terminal || !child.children.is_empty()
        });
    }

    fn is_subset(&self, other: &Node) -> bool {
        if self.terminal && !other.terminal {
            return false;
        }
        self.children.iter().all(|(byte, child)| {
            other
                .children
                .get(byte)
                .is_some_and(|theirs| child.is_subset(theirs))
        })
    }
}

/// Tracks the finite set of byte strings the array might equal.
///
/// Join is path union, meet is path intersection, both bounded by
/// [`TRIE_NODE_THRESHOLD`]; operations a trie cannot express saturate.
/// Bottom is the empty set.
#[derive(Debug, Clone, PartialEq)]
pub struct StringTrie {
    byte: bool,
    top: bool,
    root: Node,
}

impl StringTrie {
    /// Bottom value for an array of elements of type `elem`.
    pub fn bottom(elem: &Type) -> Self {
        let byte = *elem == Type::i8();
        Self {
            byte,
            top: !byte,
            root: Node::default(),
        }
    }

    /// Trie holding exactly the strings spelled by constant elements, read
    /// up to the first NUL.
    pub fn from_constant_elements(elem: &Type, values: &[Domain]) -> Self {
        let mut trie = Self::bottom(elem);
        if !trie.byte {
            return trie;
        }

        let mut word = Vec::new();
        for value in values {
            match value.as_singleton() {
                Some(v) if (1..=255).contains(&v.as_u64()) => word.push(v.as_u64() as u8),
                _ => break,
            }
        }
        trie.root.insert(&word);
        trie
    }

    /// Add one string to the set.
    pub fn insert(&mut self, word: &[u8]) {
        if self.top {
            return;
        }
        self.root.insert(word);
        self.enforce_cap();
    }

    /// Whether the set contains exactly this string.
    pub fn contains(&self, word: &[u8]) -> bool {
        self.top || self.root.contains(word)
    }

    /// Number of strings in the set.
    pub fn word_count(&self) -> usize {
        self.root.word_count()
    }

    fn enforce_cap(&mut self) {
        if self.root.count() > TRIE_NODE_THRESHOLD {
            self.set_top();
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether the set is empty.
    pub fn is_bottom(&self) -> bool {
        !self.top && self.root.word_count() == 0
    }

    /// Empty the set.
    pub fn set_bottom(&mut self) {
        if self.byte {
            self.top = false;
            self.root = Node::default();
        }
    }

    /// Whether every string is admitted.
    pub const fn is_top(&self) -> bool {
        self.top
    }

    /// Admit every string.
    pub fn set_top(&mut self) {
        self.top = true;
        self.root = Node::default();
    }

    /// Least upper bound: union of paths.
    pub fn join(&mut self, other: &Self) {
        if other.top {
            self.set_top();
        }
        if self.top {
            return;
        }
        self.root.merge(&other.root);
        self.enforce_cap();
    }

    /// Greatest lower bound: intersection of paths.
    pub fn meet(&mut self, other: &Self) {
        if other.top {
            return;
        }
        if self.top {
            *self = other.clone();
            return;
        }
        self.root.intersect(&other.root);
    }

    /// Subset order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        if other.top {
            return true;
        }
        if self.top {
            return false;
        }
        self.root.is_subset(&other.root)
    }

    /// Precision: exact for one string, degrading with the set size.
    pub fn accuracy(&self) -> f32 {
        if self.top {
            return 0.0;
        }
        match self.root.word_count() {
            0 | 1 => 1.0,
            n => (1.0 - n as f32 / TRIE_NODE_THRESHOLD as f32).max(0.0),
        }
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.root.count() * core::mem::size_of::<Node>()
    }

    /// A zeroed array is the empty string.
    pub fn set_zero(&mut self) {
        if !self.byte {
            return;
        }
        self.top = false;
        self.root = Node::default();
        self.root.insert(b"");
    }

    // --- Transfer functions ---------------------------------------------

    /// Element reads are not expressible on the path set.
    pub fn extract_element(&self, _index: &Domain) -> Domain {
        self.read(&Type::i8())
    }

    /// Block-level read.
    pub fn load(&self, ty: &Type, _offset: &Domain) -> Domain {
        self.read(ty)
    }

    fn read(&self, ty: &Type) -> Domain {
        if self.is_bottom() {
            Domain::bottom_of(ty)
        } else {
            Domain::top_of(ty)
        }
    }

    /// Block-level writes invalidate the whole set.
    pub fn store(&mut self, _value: &Domain, _offset: &Domain) {
        if self.byte {
            self.set_top();
        }
    }
}

impl fmt::Display for StringTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stringTrie ")?;
        if self.top {
            return write!(f, "top");
        }
        if self.is_bottom() {
            return write!(f, "bottom");
        }
        write!(f, "{} strings", self.root.word_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(words: &[&str]) -> StringTrie {
        let mut t = StringTrie::bottom(&Type::i8());
        for word in words {
            t.insert(word.as_bytes());
        }
        t
    }

    #[test]
    fn join_is_union() {
        let mut a = trie(&["cat", "car"]);
        a.join(&trie(&["dog"]));
        assert!(a.contains(b"cat"));
        assert!(a.contains(b"car"));
        assert!(a.contains(b"dog"));
        assert!(!a.contains(b"ca"));
        assert_eq!(a.word_count(), 3);
    }

    #[test]
    fn meet_is_intersection() {
        let mut a = trie(&["cat", "car", "dog"]);
        a.meet(&trie(&["car", "cow", "dog"]));
        assert!(a.contains(b"car"));
        assert!(a.contains(b"dog"));
        assert!(!a.contains(b"cat"));
        assert_eq!(a.word_count(), 2);
    }

    #[test]
    fn meet_of_disjoint_sets_is_bottom() {
        let mut a = trie(&["cat"]);
        a.meet(&trie(&["dog"]));
        assert!(a.is_bottom());
    }

    #[test]
    fn subset_order() {
        assert!(trie(&["car"]).less_or_equal(&trie(&["car", "cat"])));
        assert!(!trie(&["car", "cow"]).less_or_equal(&trie(&["car", "cat"])));
        assert!(trie(&[]).less_or_equal(&trie(&["car"])));
    }

    #[test]
    fn node_cap_saturates() {
        let mut t = StringTrie::bottom(&Type::i8());
        for i in 0..40u32 {
            t.insert(format!("word{i}").as_bytes());
        }
        assert!(t.is_top());
    }

    #[test]
    fn zero_is_the_empty_string() {
        let mut t = StringTrie::bottom(&Type::i8());
        t.set_zero();
        assert!(t.contains(b""));
        assert!(!t.contains(b"x"));
        assert_eq!(t.word_count(), 1);
    }
}
