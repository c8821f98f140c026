//! Tree construction
//!
//! Each node partitions its triangles in place around the midpoint of its
//! box, trying the longest axis first and rotating through the others when a
//! split leaves one side empty. The running maximum of the left side and
//! minimum of the right side become the node's two clip planes directly.
//! Nodes are laid out in pre-order: a node's slot is reserved before its
//! children are built, and children are addressed by forward offsets.

use super::mesh::{saturate_short, TriBB};
use super::node::{Axis, Child, Node};
use crate::foundation::math::{grid, IVec3};

/// Integer box accumulated while partitioning
#[derive(Debug, Clone, Copy)]
struct GridBox {
    min: IVec3,
    max: IVec3,
}

impl GridBox {
    fn empty() -> Self {
        Self {
            min: IVec3::repeat(i32::MAX),
            max: IVec3::repeat(i32::MIN),
        }
    }

    fn include(&mut self, lo: &IVec3, hi: &IVec3) {
        self.min = grid::min(&self.min, lo);
        self.max = grid::max(&self.max, hi);
    }
}

/// Outcome of splitting one index range
#[derive(Debug, Clone, Copy)]
struct Partition {
    /// Indices `[0, left)` go to the first child
    left: usize,
    split_left: i32,
    split_right: i32,
    left_box: GridBox,
    right_box: GridBox,
}

impl Partition {
    fn new() -> Self {
        Self {
            left: 0,
            split_left: i32::from(i16::MIN),
            split_right: i32::from(i16::MAX),
            left_box: GridBox::empty(),
            right_box: GridBox::empty(),
        }
    }

    fn push_left(&mut self, bb: &TriBB, axis: usize) {
        let (lo, hi) = (bb.min(), bb.max());
        self.split_left = self.split_left.max(hi[axis]);
        self.left_box.include(&lo, &hi);
    }

    fn push_right(&mut self, bb: &TriBB, axis: usize) {
        let (lo, hi) = (bb.min(), bb.max());
        self.split_right = self.split_right.min(lo[axis]);
        self.right_box.include(&lo, &hi);
    }
}

/// Build the tree for one mesh's triangles, appending nodes
///
/// Returns the depth of the new tree. `tribbs` must not be empty.
pub(crate) fn build_mesh(tribbs: &[TriBB], vmin: &IVec3, vmax: &IVec3, nodes: &mut Vec<Node>) -> usize {
    let count = u32::try_from(tribbs.len()).unwrap_or(u32::MAX);
    let mut indices: Vec<u32> = (0..count).collect();
    nodes.reserve(indices.len());
    build(tribbs, &mut indices, vmin, vmax, nodes)
}

fn longest_axis(vmin: &IVec3, vmax: &IVec3) -> Axis {
    let extent = vmax - vmin;
    let mut axis = Axis::Z;
    for k in [Axis::X, Axis::Y] {
        if extent[k.index()] > extent[axis.index()] {
            axis = k;
        }
    }
    axis
}

/// Swap-partition `indices` around `split`: a triangle goes left when more
/// of it lies below the split than above.
fn partition(tribbs: &[TriBB], indices: &mut [u32], axis: usize, split: i32) -> Partition {
    let mut part = Partition::new();
    let mut left = 0;
    let mut right = indices.len();
    while left < right {
        let bb = &tribbs[indices[left] as usize];
        let amin = bb.min()[axis];
        let amax = bb.max()[axis];
        if (split - amin).max(0) > (amax - split).max(0) {
            left += 1;
            part.push_left(bb, axis);
        } else {
            right -= 1;
            indices.swap(left, right);
            part.push_right(bb, axis);
        }
    }
    part.left = left;
    part
}

/// Split by array position when no axis separates anything
fn halve(tribbs: &[TriBB], indices: &[u32], axis: usize) -> Partition {
    let mut part = Partition::new();
    part.left = indices.len() / 2;
    for (i, &tidx) in indices.iter().enumerate() {
        let bb = &tribbs[tidx as usize];
        if i < part.left {
            part.push_left(bb, axis);
        } else {
            part.push_right(bb, axis);
        }
    }
    part
}

fn build(tribbs: &[TriBB], indices: &mut [u32], vmin: &IVec3, vmax: &IVec3, nodes: &mut Vec<Node>) -> usize {
    let count = indices.len();
    let mut axis = longest_axis(vmin, vmax);

    if count == 1 {
        let tidx = indices[0];
        let top = tribbs[tidx as usize].max()[axis.index()];
        nodes.push(Node::new(
            axis,
            [saturate_short(top), i16::MAX],
            [Child::Leaf(tidx), Child::Empty],
        ));
        return 1;
    }

    let mut part = Partition::new();
    for _ in 0..3 {
        let a = axis.index();
        part = partition(tribbs, indices, a, (vmax[a] + vmin[a]) / 2);
        if part.left > 0 && part.left < count {
            break;
        }
        axis = axis.next();
    }
    if part.left == 0 || part.left == count {
        part = halve(tribbs, indices, axis.index());
    }

    let this = nodes.len();
    nodes.push(Node::new(
        axis,
        [saturate_short(part.split_left), saturate_short(part.split_right)],
        [Child::Empty, Child::Empty],
    ));

    let (left, right) = indices.split_at_mut(part.left);
    let mut depth = 0;
    let mut child_of = |side: &mut [u32], bounds: &GridBox, nodes: &mut Vec<Node>| {
        if side.len() == 1 {
            Child::Leaf(side[0])
        } else {
            let offset = nodes.len() - this;
            depth = depth.max(build(tribbs, side, &bounds.min, &bounds.max, nodes));
            Child::Node(u32::try_from(offset).unwrap_or(u32::MAX))
        }
    };
    let first = child_of(left, &part.left_box, nodes);
    let second = child_of(right, &part.right_box, nodes);
    nodes[this].child = [first, second];
    depth + 1
}
