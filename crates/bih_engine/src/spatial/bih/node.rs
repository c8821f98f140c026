//! Tree nodes
//!
//! A node clips space along one axis with two planes: the first child owns
//! everything at or below `split[0]`, the second everything at or above
//! `split[1]`. Whatever lies strictly between the two belongs to neither.

/// Partition axis of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// x axis
    X,
    /// y axis
    Y,
    /// z axis
    Z,
}

impl Axis {
    /// All axes in x, y, z order
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Component index of this axis
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Axis for a component index, wrapping past z
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % 3]
    }

    /// The next axis in x, y, z rotation
    pub const fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }
}

/// What a node's child slot refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Child {
    /// Another node, stored this many slots after the parent
    Node(u32),
    /// A triangle of the owning mesh, by index
    Leaf(u32),
    /// Nothing; only the second child of a single-triangle root
    Empty,
}

impl Child {
    /// Whether this slot names a triangle directly
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

/// One node of a mesh's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    axis: Axis,
    /// Upper clip of the first child and lower clip of the second, in grid units
    pub split: [i16; 2],
    /// The two child slots
    pub child: [Child; 2],
}

impl Node {
    /// Create a node
    pub const fn new(axis: Axis, split: [i16; 2], child: [Child; 2]) -> Self {
        Self { axis, split, child }
    }

    /// Partition axis
    pub const fn axis(&self) -> Axis {
        self.axis
    }

    /// Whether child `which` (0 or 1) is a triangle rather than a node
    pub const fn is_leaf(&self, which: usize) -> bool {
        self.child[which].is_leaf()
    }

    /// Absolute index of child `which` if it is a node, given this node's index
    pub fn child_node(&self, which: usize, this: usize) -> Option<usize> {
        match self.child[which] {
            Child::Node(offset) => Some(this + offset as usize),
            Child::Leaf(_) | Child::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_rotation() {
        assert_eq!(Axis::Z.next(), Axis::X);
        assert_eq!(Axis::X.next(), Axis::Y);
        assert_eq!(Axis::from_index(4), Axis::Y);
    }

    #[test]
    fn test_child_accessors() {
        let node = Node::new(Axis::Y, [3, 5], [Child::Node(1), Child::Leaf(7)]);
        assert_eq!(node.axis(), Axis::Y);
        assert!(!node.is_leaf(0));
        assert!(node.is_leaf(1));
        assert_eq!(node.child_node(0, 10), Some(11));
        assert_eq!(node.child_node(1, 10), None);
    }

    #[test]
    fn test_empty_child_is_neither() {
        let node = Node::new(Axis::X, [0, i16::MAX], [Child::Leaf(0), Child::Empty]);
        assert!(!node.is_leaf(1));
        assert_eq!(node.child_node(1, 0), None);
    }
}
