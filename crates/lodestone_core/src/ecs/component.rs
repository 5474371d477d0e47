//! Component kinds, interest masks and the [`Component`] trait.
//!
//! A kind is a bit *position* in `0..MAX_COMPONENT_KINDS`. The position indexes
//! per-entity storage; the single-bit mask `1 << position` is only derived when a
//! set-membership test is needed. Keeping the two apart means adding a
//! seventh (or sixty-fourth) kind never pushes a storage index out of bounds.

use std::fmt;

/// Upper bound on distinct component kinds, fixed by the width of [`ComponentMask`].
pub const MAX_COMPONENT_KINDS: usize = 64;

/// Identifies one component kind by its bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKind(u8);

impl ComponentKind {
    /// Creates a kind from its position, or `None` when the position is out of range.
    pub const fn new(position: u8) -> Option<Self> {
        if (position as usize) < MAX_COMPONENT_KINDS {
            Some(Self(position))
        } else {
            None
        }
    }

    /// Creates a kind in a `const` context.
    ///
    /// An out-of-range position fails compilation when used in a `const` item.
    pub const fn at(position: u8) -> Self {
        assert!((position as usize) < MAX_COMPONENT_KINDS, "component kind position out of range");
        Self(position)
    }

    /// Storage slot used for this kind.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit position of this kind.
    #[inline]
    pub const fn position(self) -> u8 {
        self.0
    }

    /// Single-bit mask for interest tests.
    #[inline]
    pub const fn bit(self) -> ComponentMask {
        ComponentMask(1u64 << self.0)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Set of component kinds, one bit per kind position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a mask from a list of kinds.
    pub const fn of(kinds: &[ComponentKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1u64 << kinds[i].0;
            i += 1;
        }
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when `kind` is in the set.
    pub const fn contains(self, kind: ComponentKind) -> bool {
        self.0 & (1u64 << kind.0) != 0
    }

    /// True when the two sets share at least one kind.
    pub const fn intersects(self, other: ComponentMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn with(self, kind: ComponentKind) -> Self {
        Self(self.0 | (1u64 << kind.0))
    }

    pub const fn without(self, kind: ComponentKind) -> Self {
        Self(self.0 & !(1u64 << kind.0))
    }

    /// Number of kinds in the set.
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }
}

impl std::ops::BitOr for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        ComponentMask(self.0 | rhs.0)
    }
}

impl From<ComponentKind> for ComponentMask {
    fn from(kind: ComponentKind) -> Self {
        kind.bit()
    }
}

/// A tagged data record attached to an entity.
///
/// Games implement this on a closed enum of their component records, one variant
/// per kind, so storage stays monomorphic and lookups never downcast.
pub trait Component: Send + 'static {
    /// The kind this record is stored under.
    fn kind(&self) -> ComponentKind;
}
