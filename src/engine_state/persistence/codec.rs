//! Binary encoding of a chunk's block data.
//!
//! Layout, little endian:
//! - magic `b"CHNK"` (4 bytes)
//! - format version (1 byte)
//! - chunk x, chunk z (2x i32)
//! - per sub-chunk, bottom up: a presence byte (0 = all air, 1 = data) and,
//!   when present, the raw `Block` records of the slab

use cgmath::Point2;

use crate::engine_state::voxels::block::{block_type::BlockType, Block};
use crate::engine_state::voxels::chunk::sub_chunk::SUB_CHUNK_VOLUME;
use crate::engine_state::voxels::chunk::{ChunkCoord, ChunkVoxels, SUB_CHUNKS_PER_CHUNK};
use crate::error::ChunkJobError;

/// Magic bytes at the start of every encoded chunk.
pub const MAGIC: [u8; 4] = *b"CHNK";

/// Current format version.
pub const VERSION: u8 = 1;

const HEADER_SIZE: usize = 4 + 1 + 4 + 4;
const SUB_CHUNK_BYTES: usize = SUB_CHUNK_VOLUME * std::mem::size_of::<Block>();

const ABSENT: u8 = 0;
const PRESENT: u8 = 1;

/// Encodes the blocks of a chunk. Missing and all-air sub-chunks are
/// written as a single presence byte.
pub fn encode_chunk(coord: ChunkCoord, voxels: &ChunkVoxels) -> Vec<u8> {
    let populated = (0..SUB_CHUNKS_PER_CHUNK)
        .filter(|&i| voxels.sub_chunk(i).is_some_and(|s| !s.is_empty()))
        .count();
    let mut bytes =
        Vec::with_capacity(HEADER_SIZE + SUB_CHUNKS_PER_CHUNK + populated * SUB_CHUNK_BYTES);

    bytes.extend_from_slice(&MAGIC);
    bytes.push(VERSION);
    bytes.extend_from_slice(&coord.x.to_le_bytes());
    bytes.extend_from_slice(&coord.y.to_le_bytes());

    for index in 0..SUB_CHUNKS_PER_CHUNK {
        match voxels.sub_chunk(index) {
            Some(sub_chunk) if !sub_chunk.is_empty() => {
                bytes.push(PRESENT);
                bytes.extend_from_slice(bytemuck::cast_slice(sub_chunk.blocks()));
            }
            _ => bytes.push(ABSENT),
        }
    }
    bytes
}

fn corrupt(message: impl Into<String>) -> ChunkJobError {
    ChunkJobError::CorruptJob(message.into())
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    i32::from_le_bytes(raw)
}

/// Reads the chunk coordinate from an encoded chunk's header.
pub fn peek_coord(bytes: &[u8]) -> Result<ChunkCoord, ChunkJobError> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(format!("{} bytes is too short for a header", bytes.len())));
    }
    if bytes[..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    if bytes[4] != VERSION {
        return Err(corrupt(format!("unsupported version {}", bytes[4])));
    }
    Ok(Point2::new(read_i32(bytes, 5), read_i32(bytes, 9)))
}

/// Splits the body into one optional slab per sub-chunk, validating
/// everything before any block is written.
fn parse_slabs(bytes: &[u8]) -> Result<Vec<Option<&[Block]>>, ChunkJobError> {
    let mut slabs = Vec::with_capacity(SUB_CHUNKS_PER_CHUNK);
    let mut cursor = HEADER_SIZE;

    for index in 0..SUB_CHUNKS_PER_CHUNK {
        let flag = *bytes
            .get(cursor)
            .ok_or_else(|| corrupt(format!("truncated at sub-chunk {index}")))?;
        cursor += 1;
        match flag {
            ABSENT => slabs.push(None),
            PRESENT => {
                let raw = bytes
                    .get(cursor..cursor + SUB_CHUNK_BYTES)
                    .ok_or_else(|| corrupt(format!("truncated data in sub-chunk {index}")))?;
                let blocks: &[Block] = bytemuck::try_cast_slice(raw)
                    .map_err(|e| corrupt(format!("sub-chunk {index}: {e}")))?;
                if let Some(bad) = blocks
                    .iter()
                    .find(|block| BlockType::from_int(block.block_type).is_none())
                {
                    return Err(corrupt(format!(
                        "unknown block type {} in sub-chunk {index}",
                        bad.block_type
                    )));
                }
                cursor += SUB_CHUNK_BYTES;
                slabs.push(Some(blocks));
            }
            other => {
                return Err(corrupt(format!(
                    "invalid presence flag {other} for sub-chunk {index}"
                )))
            }
        }
    }

    if cursor != bytes.len() {
        return Err(corrupt(format!("{} trailing bytes", bytes.len() - cursor)));
    }
    Ok(slabs)
}

/// Decodes an encoded chunk into `voxels`, which must already have every
/// sub-chunk attached.
///
/// # Errors
/// `CorruptJob` if the data is malformed or belongs to another chunk,
/// `MissingDependency` if `voxels` is not fully allocated. Nothing is
/// written on error.
pub fn decode_chunk(
    bytes: &[u8],
    expected: ChunkCoord,
    voxels: &mut ChunkVoxels,
) -> Result<(), ChunkJobError> {
    let coord = peek_coord(bytes)?;
    if coord != expected {
        return Err(corrupt(format!(
            "data is for chunk ({}, {}), expected ({}, {})",
            coord.x, coord.y, expected.x, expected.y
        )));
    }
    let slabs = parse_slabs(bytes)?;
    if !voxels.is_allocated() {
        return Err(ChunkJobError::MissingDependency {
            coord: expected,
            reason: "sub-chunks not allocated",
        });
    }

    for (index, slab) in slabs.into_iter().enumerate() {
        if let Some(sub_chunk) = voxels.sub_chunk_mut(index) {
            match slab {
                Some(blocks) => sub_chunk.blocks_mut().copy_from_slice(blocks),
                None => sub_chunk.clear(),
            }
        }
    }
    Ok(())
}
