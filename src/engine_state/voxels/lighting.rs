//! # Light Propagation
//!
//! Flood-fill lighting inside a single chunk. Two channels are tracked per
//! block (see [`Block`](crate::engine_state::voxels::block::Block)):
//!
//! - **Sky light**: 15 in every cell with only air above it, then spread
//!   sideways and down into shaded transparent cells, losing one level per step.
//! - **Block light**: emitted by light sources and spread the same way.
//!
//! A full pass ([`calculate_lighting`]) recomputes both channels. After a
//! single-block edit, [`recalculate_lighting`] updates block light
//! incrementally: a removal flood clears every cell that was lit by the old
//! value and collects the brighter cells on its border, then an addition flood
//! refills from that border. Light does not cross chunk borders.

use std::collections::VecDeque;

use cgmath::Point3;

use crate::engine_state::voxels::block::{
    block_side::BlockSide,
    block_type::{BlockType, MAX_LIGHT_LEVEL},
};
use crate::engine_state::voxels::chunk::{ChunkVoxels, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};

type LocalPos = Point3<usize>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LightChannel {
    Block,
    Sky,
}

impl LightChannel {
    fn get(self, voxels: &ChunkVoxels, pos: LocalPos) -> u8 {
        match voxels.block(pos.x, pos.y, pos.z) {
            Some(block) => match self {
                LightChannel::Block => block.block_light(),
                LightChannel::Sky => block.sky_light(),
            },
            None => 0,
        }
    }

    fn set(self, voxels: &mut ChunkVoxels, pos: LocalPos, level: u8) {
        if let Some(block) = voxels.block_mut(pos.x, pos.y, pos.z) {
            match self {
                LightChannel::Block => block.set_block_light(level),
                LightChannel::Sky => block.set_sky_light(level),
            }
        }
    }
}

/// Neighbouring positions that lie inside the chunk.
fn neighbours(pos: LocalPos) -> impl Iterator<Item = LocalPos> {
    BlockSide::all().into_iter().filter_map(move |side| {
        let offset = side.offset();
        let x = pos.x as i32 + offset.x;
        let y = pos.y as i32 + offset.y;
        let z = pos.z as i32 + offset.z;
        let inside = (0..CHUNK_WIDTH as i32).contains(&x)
            && (0..CHUNK_HEIGHT as i32).contains(&y)
            && (0..CHUNK_DEPTH as i32).contains(&z);
        inside.then(|| Point3::new(x as usize, y as usize, z as usize))
    })
}

fn is_transparent(voxels: &ChunkVoxels, pos: LocalPos) -> bool {
    voxels.block(pos.x, pos.y, pos.z).is_some() && voxels.block_type(pos.x, pos.y, pos.z).is_transparent()
}

/// Spreads light outward from every queued position. Each step loses one
/// level; a cell is only raised, never lowered.
fn propagate(voxels: &mut ChunkVoxels, channel: LightChannel, mut queue: VecDeque<LocalPos>) {
    while let Some(pos) = queue.pop_front() {
        let level = channel.get(voxels, pos);
        if level <= 1 {
            continue;
        }
        for next in neighbours(pos) {
            if is_transparent(voxels, next) && channel.get(voxels, next) < level - 1 {
                channel.set(voxels, next, level - 1);
                queue.push_back(next);
            }
        }
    }
}

/// Clears light that was derived from `origin` at `origin_level`.
///
/// # Returns
/// Cells on the border of the cleared region whose light came from somewhere
/// else; these seed the refill.
fn remove_light(
    voxels: &mut ChunkVoxels,
    channel: LightChannel,
    origin: LocalPos,
    origin_level: u8,
) -> VecDeque<LocalPos> {
    let mut removal = VecDeque::from([(origin, origin_level)]);
    let mut refill = VecDeque::new();
    channel.set(voxels, origin, 0);

    while let Some((pos, level)) = removal.pop_front() {
        for next in neighbours(pos) {
            let next_level = channel.get(voxels, next);
            if next_level == 0 {
                continue;
            }
            if next_level < level {
                channel.set(voxels, next, 0);
                removal.push_back((next, next_level));
                if channel == LightChannel::Block {
                    let emission = voxels.block_type(next.x, next.y, next.z).light_emission();
                    if emission > 0 {
                        channel.set(voxels, next, emission);
                        refill.push_back(next);
                    }
                }
            } else {
                refill.push_back(next);
            }
        }
    }
    refill
}

fn clear_channel(voxels: &mut ChunkVoxels, channel: LightChannel) {
    for y in 0..CHUNK_HEIGHT {
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                channel.set(voxels, Point3::new(x, y, z), 0);
            }
        }
    }
}

/// Recomputes the sky channel of the whole chunk.
fn calculate_sky_light(voxels: &mut ChunkVoxels) {
    clear_channel(voxels, LightChannel::Sky);

    let mut lit = Vec::new();
    for z in 0..CHUNK_DEPTH {
        for x in 0..CHUNK_WIDTH {
            for y in (0..CHUNK_HEIGHT).rev() {
                if voxels.block_type(x, y, z) != BlockType::AIR {
                    break;
                }
                let pos = Point3::new(x, y, z);
                LightChannel::Sky.set(voxels, pos, MAX_LIGHT_LEVEL);
                lit.push(pos);
            }
        }
    }

    // Only cells next to something darker need to spread.
    let queue: VecDeque<LocalPos> = lit
        .into_iter()
        .filter(|&pos| {
            neighbours(pos).any(|next| {
                is_transparent(voxels, next) && LightChannel::Sky.get(voxels, next) < MAX_LIGHT_LEVEL - 1
            })
        })
        .collect();
    propagate(voxels, LightChannel::Sky, queue);
}

/// Recomputes the block channel of the whole chunk from its emitters.
fn calculate_block_light(voxels: &mut ChunkVoxels) {
    clear_channel(voxels, LightChannel::Block);

    let emitters: Vec<(LocalPos, u8)> = voxels
        .iter_blocks()
        .filter_map(|(pos, block)| {
            let emission = block.kind().light_emission();
            (emission > 0).then_some((pos, emission))
        })
        .collect();

    let mut queue = VecDeque::with_capacity(emitters.len());
    for (pos, emission) in emitters {
        LightChannel::Block.set(voxels, pos, emission);
        queue.push_back(pos);
    }
    propagate(voxels, LightChannel::Block, queue);
}

/// Full lighting pass over a chunk.
pub fn calculate_lighting(voxels: &mut ChunkVoxels) {
    calculate_sky_light(voxels);
    calculate_block_light(voxels);
}

/// Updates lighting after the block at `pos` changed.
///
/// With `removed_light_source` the block at `pos` used to emit light: its
/// contribution is flooded away and neighbouring sources refill the gap.
/// Otherwise the new block may be an emitter (light spreads from it), an
/// opaque block (light through it is removed) or an opened cell (neighbours
/// spread into it). Sky light is recomputed for the chunk in every case.
pub fn recalculate_lighting(voxels: &mut ChunkVoxels, pos: LocalPos, removed_light_source: bool) {
    let block_type = voxels.block_type(pos.x, pos.y, pos.z);
    let old_level = LightChannel::Block.get(voxels, pos);

    let queue = if removed_light_source || block_type.is_opaque() {
        let mut refill = remove_light(voxels, LightChannel::Block, pos, old_level);
        let emission = block_type.light_emission();
        if emission > 0 {
            LightChannel::Block.set(voxels, pos, emission);
            refill.push_back(pos);
        }
        refill
    } else if block_type.light_emission() > old_level {
        LightChannel::Block.set(voxels, pos, block_type.light_emission());
        VecDeque::from([pos])
    } else {
        neighbours(pos).collect()
    };
    propagate(voxels, LightChannel::Block, queue);

    calculate_sky_light(voxels);
}
