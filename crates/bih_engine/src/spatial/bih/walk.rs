//! Box descent shared by the collision and stain queries
//!
//! A child is entered whenever the query box reaches its side of the node's
//! clip plane, so a box sitting in the gap between the two planes touches
//! neither child. Leaves are handed to the visitor as triangle indices; the
//! visitor does its own per-triangle rejection.

use super::node::{Child, Node};
use super::ray::STACK_SIZE;
use crate::foundation::math::IVec3;

/// Visit every leaf of the tree at `root` that a grid box may overlap
pub(crate) fn for_each_leaf(nodes: &[Node], root: usize, bo: &IVec3, br: &IVec3, visit: &mut impl FnMut(usize)) {
    for_each_leaf_with_stack::<STACK_SIZE, _>(nodes, root, &(bo - br), &(bo + br), visit);
}

fn visit_leaf(child: Child, visit: &mut impl FnMut(usize)) {
    if let Child::Leaf(tidx) = child {
        visit(tidx as usize);
    }
}

pub(crate) fn for_each_leaf_with_stack<const N: usize, F: FnMut(usize)>(
    nodes: &[Node],
    mut at: usize,
    bmin: &IVec3,
    bmax: &IVec3,
    visit: &mut F,
) {
    let mut stack = [0usize; N];
    let mut depth = 0;
    loop {
        let node = &nodes[at];
        let axis = node.axis().index();
        let nearsplit = bmin[axis] - i32::from(node.split[0]);
        let farsplit = i32::from(node.split[1]) - bmax[axis];

        if nearsplit > 0 {
            // Entirely above the first child
            if farsplit <= 0 {
                if let Some(next) = node.child_node(1, at) {
                    at = next;
                    continue;
                }
                visit_leaf(node.child[1], visit);
            }
        } else if let Some(near_node) = node.child_node(0, at) {
            if farsplit <= 0 {
                match node.child_node(1, at) {
                    Some(far_node) if depth < N => {
                        stack[depth] = far_node;
                        depth += 1;
                    }
                    Some(far_node) => {
                        for_each_leaf_with_stack::<N, F>(nodes, near_node, bmin, bmax, visit);
                        at = far_node;
                        continue;
                    }
                    None => visit_leaf(node.child[1], visit),
                }
            }
            at = near_node;
            continue;
        } else {
            visit_leaf(node.child[0], visit);
            if farsplit <= 0 {
                if let Some(next) = node.child_node(1, at) {
                    at = next;
                    continue;
                }
                visit_leaf(node.child[1], visit);
            }
        }

        if depth == 0 {
            return;
        }
        depth -= 1;
        at = stack[depth];
    }
}
