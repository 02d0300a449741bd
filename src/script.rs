use crate::block::{BlockId, BlockInstance, ParamValue, Point};
use crate::geometry::{self, OCCUPANCY_TOLERANCE, SNAP_THRESHOLD};
use crate::registry::{BlockShape, BlockTemplate};
use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Directly under the target's bottom edge.
    Bottom,
    /// First slot of a C-block's body.
    Inside,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snap {
    pub target: BlockId,
    pub attachment: Attachment,
    pub at: Point,
}

/// One sprite's blocks. Order is insertion order and only matters for
/// tie-breaking; structure always comes from `geometry`.
#[derive(Debug, Clone, Default)]
pub struct Script {
    blocks: Vec<BlockInstance>,
    next_id: u64,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[BlockInstance] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BlockInstance> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn hats(&self) -> impl Iterator<Item = &BlockInstance> {
        self.blocks.iter().filter(|b| b.shape() == BlockShape::Hat)
    }

    pub fn place(&mut self, template: &'static BlockTemplate, drop_at: Point) -> &BlockInstance {
        self.place_with(template, drop_at, IndexMap::new())
    }

    /// Instantiates `template` near `drop_at`, snapping onto a nearby attachment
    /// point. `overrides` replace template default bindings.
    pub fn place_with(
        &mut self,
        template: &'static BlockTemplate,
        drop_at: Point,
        overrides: IndexMap<String, ParamValue>,
    ) -> &BlockInstance {
        let at = self
            .find_snap(template.shape, drop_at, &HashSet::new())
            .map(|snap| snap.at)
            .unwrap_or(drop_at);
        self.next_id += 1;
        let id = format!("{}-{}", template.name.as_str(), self.next_id);
        let mut block = BlockInstance::new(id, template, at);
        block.params.extend(overrides);
        debug!("placed {} at ({}, {})", block.id, at.x, at.y);
        let index = self.blocks.len();
        self.blocks.push(block);
        &self.blocks[index]
    }

    /// Adds a block exactly as given, without snapping.
    pub fn insert(&mut self, block: BlockInstance) -> Result<()> {
        if self.get(&block.id).is_some() {
            bail!("block '{}' already exists", block.id);
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Removes the block and everything stacked below it. Blocks inside a
    /// removed C-block's body are not part of its stack and stay behind.
    /// Returns the removed blocks in stack order.
    pub fn remove(&mut self, id: &str) -> Result<Vec<BlockInstance>> {
        let ids = self.stack_ids(id)?;
        let (mut removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.blocks)
            .into_iter()
            .partition(|b| ids.contains(&b.id));
        self.blocks = kept;
        debug!("removed {} block(s) starting at {}", removed.len(), id);
        let mut ordered = Vec::with_capacity(removed.len());
        for wanted in &ids {
            if let Some(pos) = removed.iter().position(|b| &b.id == wanted) {
                ordered.push(removed.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    pub fn update_param(&mut self, id: &str, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow!("unknown block '{}'", id))?;
        if block.template.param_def(name).is_none() {
            bail!("{} has no parameter '{}'", block.name().as_str(), name);
        }
        block.params.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Drags the block and its stack so that the block lands at `to` (or the
    /// attachment point it snaps to). Every moved block receives the same
    /// delta. Returns where the dragged block ended up.
    pub fn move_stack(&mut self, id: &str, to: Point) -> Result<Point> {
        let ids = self.stack_ids(id)?;
        let head = self
            .get(id)
            .ok_or_else(|| anyhow!("unknown block '{}'", id))?;
        let origin = head.position();
        let excluded = ids.iter().map(String::as_str).collect::<HashSet<_>>();
        let target = self
            .find_snap(head.shape(), to, &excluded)
            .map(|snap| snap.at)
            .unwrap_or(to);
        let (dx, dy) = (target.x - origin.x, target.y - origin.y);
        for block in self.blocks.iter_mut().filter(|b| ids.contains(&b.id)) {
            block.x += dx;
            block.y += dy;
        }
        Ok(target)
    }

    /// Nearest attachment point within the snap threshold of `head_at` for a
    /// head of shape `shape`. Blocks in `excluded` (the dragged stack) are
    /// neither targets nor occupants. Hats and reporters never snap.
    pub fn find_snap(&self, shape: BlockShape, head_at: Point, excluded: &HashSet<&str>) -> Option<Snap> {
        if matches!(shape, BlockShape::Hat | BlockShape::Reporter) {
            return None;
        }
        let mut best: Option<(Snap, f64)> = None;
        let mut consider = |snap: Snap| {
            let distance = head_at.distance_to(snap.at);
            let closer = match &best {
                Some((_, best_distance)) => distance < *best_distance,
                None => distance < SNAP_THRESHOLD,
            };
            if closer {
                best = Some((snap, distance));
            }
        };

        for target in self.blocks.iter().filter(|b| !excluded.contains(b.id.as_str())) {
            if target.shape() != BlockShape::Reporter {
                consider(Snap {
                    target: target.id.clone(),
                    attachment: Attachment::Bottom,
                    at: geometry::bottom_point(target, &self.blocks),
                });
            }
            if target.shape() == BlockShape::CBlock {
                let at = geometry::inside_point(target);
                let occupied = self.blocks.iter().any(|b| {
                    !excluded.contains(b.id.as_str())
                        && (b.x - at.x).abs() < OCCUPANCY_TOLERANCE
                        && (b.y - at.y).abs() < OCCUPANCY_TOLERANCE
                });
                if !occupied {
                    consider(Snap {
                        target: target.id.clone(),
                        attachment: Attachment::Inside,
                        at,
                    });
                }
            }
        }
        best.map(|(snap, _)| snap)
    }

    /// Blocks executed in order starting at `id`.
    pub fn stack_from(&self, id: &str) -> Result<Vec<&BlockInstance>> {
        let head = self
            .get(id)
            .ok_or_else(|| anyhow!("unknown block '{}'", id))?;
        Ok(geometry::resolve_stack(head, &self.blocks))
    }

    fn stack_ids(&self, id: &str) -> Result<Vec<BlockId>> {
        Ok(self
            .stack_from(id)?
            .into_iter()
            .map(|b| b.id.clone())
            .collect())
    }
}
