//! Infers script structure from block positions.
//!
//! Nothing here is stored: successors and C-block bodies are recomputed from
//! coordinates on every call, so moving a block can never leave a stale link.

use crate::block::{BlockInstance, Point};
use crate::registry::BlockShape;
use std::collections::HashSet;

pub const BLOCK_HEIGHT: f64 = 40.0;
pub const HAT_BLOCK_HEIGHT: f64 = 40.0;
pub const C_BLOCK_HEADER_HEIGHT: f64 = 36.0;
pub const C_BLOCK_BOTTOM_HEIGHT: f64 = 16.0;
pub const C_BLOCK_MIN_BODY_HEIGHT: f64 = 24.0;
pub const C_BLOCK_INDENT: f64 = 20.0;
pub const STACK_TOLERANCE: f64 = 20.0;
pub const OCCUPANCY_TOLERANCE: f64 = 10.0;
pub const SNAP_THRESHOLD: f64 = 40.0;

// Bodies nested deeper than this are measured as empty.
const MAX_NESTING: usize = 32;

pub fn block_height(block: &BlockInstance, all: &[BlockInstance]) -> f64 {
    height_at(block, all, 0)
}

/// Height of a C-block's body region: at least the minimum, otherwise the sum of
/// the heights of the blocks stacked inside it (nested C-blocks measured first).
pub fn body_height(block: &BlockInstance, all: &[BlockInstance]) -> f64 {
    body_height_at(block, all, 0)
}

pub fn resolve_successor<'a>(
    block: &BlockInstance,
    all: &'a [BlockInstance],
) -> Option<&'a BlockInstance> {
    successor_at(block, all, 0)
}

pub fn resolve_first_child<'a>(
    block: &BlockInstance,
    all: &'a [BlockInstance],
) -> Option<&'a BlockInstance> {
    if block.shape() != BlockShape::CBlock {
        return None;
    }
    let expected = inside_point(block);
    nearest(block, all, expected, STACK_TOLERANCE)
}

/// The head followed by every successor below it. Reporters never chain.
pub fn resolve_stack<'a>(head: &'a BlockInstance, all: &'a [BlockInstance]) -> Vec<&'a BlockInstance> {
    let mut stack = vec![head];
    if head.shape() == BlockShape::Reporter {
        return stack;
    }
    let mut visited = HashSet::from([head.id.as_str()]);
    let mut current = head;
    while let Some(next) = resolve_successor(current, all) {
        if !visited.insert(next.id.as_str()) {
            break;
        }
        stack.push(next);
        current = next;
    }
    stack
}

/// Blocks stacked inside a C-block, top to bottom.
pub fn resolve_body<'a>(block: &BlockInstance, all: &'a [BlockInstance]) -> Vec<&'a BlockInstance> {
    match resolve_first_child(block, all) {
        Some(first) => resolve_stack(first, all),
        None => Vec::new(),
    }
}

pub fn bottom_point(block: &BlockInstance, all: &[BlockInstance]) -> Point {
    Point::new(block.x, block.y + block_height(block, all))
}

pub fn inside_point(block: &BlockInstance) -> Point {
    Point::new(block.x + C_BLOCK_INDENT, block.y + C_BLOCK_HEADER_HEIGHT)
}

fn height_at(block: &BlockInstance, all: &[BlockInstance], depth: usize) -> f64 {
    match block.shape() {
        BlockShape::CBlock => {
            C_BLOCK_HEADER_HEIGHT + body_height_at(block, all, depth) + C_BLOCK_BOTTOM_HEIGHT
        }
        BlockShape::Hat => HAT_BLOCK_HEIGHT,
        BlockShape::Stack | BlockShape::Reporter => BLOCK_HEIGHT,
    }
}

fn body_height_at(block: &BlockInstance, all: &[BlockInstance], depth: usize) -> f64 {
    if depth >= MAX_NESTING {
        return C_BLOCK_MIN_BODY_HEIGHT;
    }
    let Some(first) = resolve_first_child(block, all) else {
        return C_BLOCK_MIN_BODY_HEIGHT;
    };
    let mut total = 0.0;
    let mut visited = HashSet::from([block.id.as_str()]);
    let mut current = Some(first);
    while let Some(child) = current {
        if !visited.insert(child.id.as_str()) {
            break;
        }
        total += height_at(child, all, depth + 1);
        current = successor_at(child, all, depth + 1);
    }
    total.max(C_BLOCK_MIN_BODY_HEIGHT)
}

fn successor_at<'a>(
    block: &BlockInstance,
    all: &'a [BlockInstance],
    depth: usize,
) -> Option<&'a BlockInstance> {
    if block.shape() == BlockShape::Reporter {
        return None;
    }
    let expected = Point::new(block.x, block.y + height_at(block, all, depth));
    nearest(block, all, expected, STACK_TOLERANCE)
}

/// Closest chainable block within `tolerance` of `expected` on both axes.
/// Equal distances keep the earlier block in `all`.
fn nearest<'a>(
    from: &BlockInstance,
    all: &'a [BlockInstance],
    expected: Point,
    tolerance: f64,
) -> Option<&'a BlockInstance> {
    all.iter()
        .filter(|b| b.id != from.id)
        .filter(|b| matches!(b.shape(), BlockShape::Stack | BlockShape::CBlock))
        .filter(|b| (b.x - expected.x).abs() < tolerance && (b.y - expected.y).abs() < tolerance)
        .fold(None, |best: Option<(&BlockInstance, f64)>, candidate| {
            let distance = candidate.position().distance_to(expected);
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((candidate, distance)),
            }
        })
        .map(|(block, _)| block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{find_template, BlockName};

    fn block(id: &str, name: BlockName, x: f64, y: f64) -> BlockInstance {
        BlockInstance::new(id, find_template(name).unwrap(), Point::new(x, y))
    }

    fn ids(blocks: &[&BlockInstance]) -> Vec<String> {
        blocks.iter().map(|b| b.id.clone()).collect()
    }

    #[test]
    fn successor_is_found_within_tolerance() {
        let all = vec![
            block("hat", BlockName::EventsWhenFlagClicked, 0.0, 0.0),
            block("move", BlockName::MotionMoveSteps, 7.0, 52.0),
        ];
        assert_eq!(resolve_successor(&all[0], &all).map(|b| b.id.as_str()), Some("move"));
    }

    #[test]
    fn successor_outside_tolerance_ends_the_stack() {
        let all = vec![
            block("hat", BlockName::EventsWhenFlagClicked, 0.0, 0.0),
            block("far", BlockName::MotionMoveSteps, 25.0, 40.0),
        ];
        assert!(resolve_successor(&all[0], &all).is_none());
        assert_eq!(ids(&resolve_stack(&all[0], &all)), vec!["hat"]);
    }

    #[test]
    fn hats_and_reporters_never_follow_a_block() {
        let all = vec![
            block("a", BlockName::MotionMoveSteps, 0.0, 0.0),
            block("hat", BlockName::EventsWhenFlagClicked, 0.0, 40.0),
            block("rep", BlockName::MotionXPosition, 0.0, 40.0),
        ];
        assert!(resolve_successor(&all[0], &all).is_none());
    }

    #[test]
    fn reporter_head_is_a_singleton_stack() {
        let all = vec![
            block("rep", BlockName::OperatorsAdd, 0.0, 0.0),
            block("below", BlockName::MotionMoveSteps, 0.0, 40.0),
        ];
        assert_eq!(ids(&resolve_stack(&all[0], &all)), vec!["rep"]);
    }

    #[test]
    fn nearest_candidate_wins_ties() {
        let all = vec![
            block("top", BlockName::MotionMoveSteps, 0.0, 0.0),
            block("off", BlockName::MotionTurnCw, 12.0, 45.0),
            block("exact", BlockName::MotionTurnCcw, 0.0, 40.0),
        ];
        assert_eq!(resolve_successor(&all[0], &all).map(|b| b.id.as_str()), Some("exact"));
    }

    #[test]
    fn c_block_grows_with_its_body() {
        let mut all = vec![block("loop", BlockName::ControlRepeat, 0.0, 0.0)];
        assert_eq!(block_height(&all[0], &all), 36.0 + 24.0 + 16.0);

        all.push(block("c1", BlockName::MotionMoveSteps, 20.0, 36.0));
        all.push(block("c2", BlockName::MotionMoveSteps, 20.0, 76.0));
        assert_eq!(body_height(&all[0], &all), 80.0);
        assert_eq!(block_height(&all[0], &all), 132.0);
        assert_eq!(ids(&resolve_body(&all[0], &all)), vec!["c1", "c2"]);
    }

    #[test]
    fn successor_of_c_block_sits_below_its_grown_body() {
        let all = vec![
            block("loop", BlockName::ControlForever, 0.0, 0.0),
            block("c1", BlockName::MotionMoveSteps, 20.0, 36.0),
            block("after", BlockName::LooksShow, 0.0, 92.0),
        ];
        assert_eq!(resolve_successor(&all[0], &all).map(|b| b.id.as_str()), Some("after"));
        assert_eq!(ids(&resolve_stack(&all[0], &all)), vec!["loop", "after"]);
    }

    #[test]
    fn nested_c_blocks_measure_bottom_up() {
        let all = vec![
            block("outer", BlockName::ControlForever, 0.0, 0.0),
            block("inner", BlockName::ControlRepeat, 20.0, 36.0),
            block("leaf1", BlockName::MotionMoveSteps, 40.0, 72.0),
            block("leaf2", BlockName::MotionMoveSteps, 40.0, 112.0),
        ];
        // inner: 36 + 80 + 16 = 132
        assert_eq!(block_height(&all[1], &all), 132.0);
        assert_eq!(body_height(&all[0], &all), 132.0);
        assert_eq!(ids(&resolve_stack(&all[0], &all)), vec!["outer"]);
        assert_eq!(ids(&resolve_body(&all[1], &all)), vec!["leaf1", "leaf2"]);
    }

    #[test]
    fn first_child_only_for_c_blocks() {
        let all = vec![
            block("stack", BlockName::MotionMoveSteps, 0.0, 0.0),
            block("indented", BlockName::MotionMoveSteps, 20.0, 36.0),
        ];
        assert!(resolve_first_child(&all[0], &all).is_none());
    }
}
