//! Core types shared by the container, tree and storage layers.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Path separator. Node paths always end with it; the root path is the separator alone.
pub const SEPARATOR: char = '/';

/// Handle of a node (category) inside a [`Tree`](crate::tree::Tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle of a leaf item inside a [`Tree`](crate::tree::Tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) usize);

impl ItemId {
    /// Raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Either kind of tree entry. Used by the combined child namespace and by events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryId {
    Node(NodeId),
    Item(ItemId),
}

impl From<NodeId> for EntryId {
    fn from(id: NodeId) -> Self {
        EntryId::Node(id)
    }
}

impl From<ItemId> for EntryId {
    fn from(id: ItemId) -> Self {
        EntryId::Item(id)
    }
}

/// Protection flags carried by nodes and items
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemAttributes(u32);

impl ItemAttributes {
    pub const NONE: Self = Self(0);
    /// Structural; assigned once to the tree root and never toggled.
    pub const ROOT: Self = Self(1);
    pub const INDESTRUCTIBLE: Self = Self(1 << 1);
    pub const UNIQUE_NAME: Self = Self(1 << 2);
    pub const READ_ONLY: Self = Self(1 << 3);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::ROOT, "ROOT"),
        (Self::INDESTRUCTIBLE, "INDESTRUCTIBLE"),
        (Self::UNIQUE_NAME, "UNIQUE_NAME"),
        (Self::READ_ONLY, "READ_ONLY"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Sets or clears `flags`, never touching [`ItemAttributes::ROOT`].
    pub fn set(&mut self, flags: Self, value: bool) {
        let flags = flags & !Self::ROOT;
        if value {
            self.0 |= flags.0;
        } else {
            self.0 &= !flags.0;
        }
    }
}

impl BitOr for ItemAttributes {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ItemAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ItemAttributes {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for ItemAttributes {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for ItemAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" | "))
    }
}
