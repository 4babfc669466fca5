//! # Job Handlers
//!
//! One handler per [`ChunkCommand`]. Handlers run on the worker thread with
//! exclusive use of the [`WorkerContext`], take a chunk's voxel lock only for
//! the duration of the job, publish the chunk's new [`ChunkStatus`] when done
//! and return the follow-up jobs of the pipeline:
//!
//! ```text
//! GenerateTerrain -> GenerateDecorations -> CalculateLighting -> TesselateVertices
//! ClientLoadChunk -> CalculateLighting
//! RecalculateLighting -> TesselateVertices
//! ```
//!
//! A job claims its chunk before touching it and holds the claim until the
//! new stage is published. Decorations also claim each neighbour a tree
//! spills into; a neighbour that was already lit goes back to
//! [`ChunkStatus::Decorated`] and gets a `CalculateLighting` job.

use std::ops::Deref;
use std::sync::Arc;
use std::thread;

use log::{debug, trace};

use crate::config::WorkerConfig;
use crate::engine_state::persistence::{codec, ChunkPersistence};
use crate::engine_state::rendering::{tesselate, NeighbourView};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{
    is_valid_chunk_coord, world_to_chunk_coord, world_to_local, ChunkCoord, ChunkHandle,
    ChunkStatus, ChunkVoxels, SUB_CHUNKS_PER_CHUNK,
};
use crate::engine_state::voxels::chunk_store::ChunkStore;
use crate::engine_state::voxels::generation::{DecorationGenerator, TerrainGenerator, TreePlan};
use crate::engine_state::voxels::lighting;
use crate::engine_state::voxels::sub_chunk_pool::SubChunkPool;
use crate::error::ChunkJobError;

use super::job::{ChunkCommand, ChunkJob, JobKind};

/// Exclusive claim on a chunk, released on drop, including while unwinding
/// from a panicking handler.
struct InFlight(Arc<ChunkHandle>);

impl InFlight {
    /// Waits for the chunk's claim. The main thread only ever holds it for
    /// a single edit or unload.
    fn claim(chunk: Arc<ChunkHandle>) -> Self {
        while !chunk.status_cell().try_begin_processing() {
            thread::yield_now();
        }
        InFlight(chunk)
    }
}

impl Deref for InFlight {
    type Target = ChunkHandle;

    fn deref(&self) -> &ChunkHandle {
        &self.0
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.status_cell().end_processing();
    }
}

/// Puts a chunk back to its stage from before a fill unless disarmed. A
/// chunk that had no data also hands its sub-chunks back to the pool.
struct FillRollback<'a> {
    chunk: &'a ChunkHandle,
    pool: &'a SubChunkPool,
    previous: ChunkStatus,
    armed: bool,
}

impl Drop for FillRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.previous == ChunkStatus::Unloaded {
            self.pool
                .release_many(self.chunk.voxels().get_mut().take_sub_chunks());
        }
        self.chunk.status_cell().store(self.previous);
    }
}

/// Everything the worker needs to execute jobs. Owned by the worker thread.
pub struct WorkerContext {
    store: Arc<ChunkStore>,
    persistence: Arc<dyn ChunkPersistence>,
    terrain: TerrainGenerator,
    decorations: DecorationGenerator,
    chain_follow_ups: bool,
}

impl WorkerContext {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<ChunkStore>,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> Self {
        WorkerContext {
            store,
            persistence,
            terrain: TerrainGenerator::new(config.seed, config.terrain.clone()),
            decorations: DecorationGenerator::new(config.seed, config.decorations.clone()),
            chain_follow_ups: config.chain_follow_ups,
        }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Runs the handler for `job`.
    ///
    /// # Returns
    /// The follow-up jobs to queue.
    pub fn execute(&self, job: &ChunkJob) -> Result<Vec<ChunkJob>, ChunkJobError> {
        if !is_valid_chunk_coord(job.coord) {
            return Err(ChunkJobError::CorruptJob(format!(
                "chunk ({}, {}) is outside the world",
                job.coord.x, job.coord.y
            )));
        }
        let chunk = self.claim_chunk(job)?;

        match &job.command {
            ChunkCommand::SaveBlockData => self.save_block_data(job, &chunk),
            ChunkCommand::ClientLoadChunk { data } => self.client_load_chunk(job, &chunk, data),
            ChunkCommand::GenerateTerrain => self.generate_terrain(job, &chunk),
            ChunkCommand::GenerateDecorations => self.generate_decorations(job, &chunk),
            ChunkCommand::CalculateLighting => self.calculate_lighting(job, &chunk),
            ChunkCommand::RecalculateLighting {
                block_that_updated,
                removed_light_source,
            } => self.recalculate_lighting(job, &chunk, *block_that_updated, *removed_light_source),
            ChunkCommand::TesselateVertices => self.tesselate_vertices(job, &chunk),
        }
    }

    /// Looks up and claims the job's chunk. Terrain and client loads create
    /// it when missing.
    fn claim_chunk(&self, job: &ChunkJob) -> Result<InFlight, ChunkJobError> {
        let creates = matches!(
            job.kind(),
            JobKind::GenerateTerrain | JobKind::ClientLoadChunk
        );
        loop {
            let chunk = if creates {
                self.store.get_or_create_chunk(job.coord)?
            } else {
                self.store
                    .get_chunk(job.coord)
                    .ok_or(ChunkJobError::MissingDependency {
                        coord: job.coord,
                        reason: "chunk not resident",
                    })?
            };
            if let Some(claimed) = self.claim_resident(chunk) {
                return Ok(claimed);
            }
            trace!(
                "Chunk ({}, {}) was unloaded before its {} job started",
                job.coord.x,
                job.coord.y,
                job.kind()
            );
        }
    }

    /// Claims `chunk` if it is still the store's handle for its coordinate.
    /// An unload can land between a lookup and the claim.
    fn claim_resident(&self, chunk: Arc<ChunkHandle>) -> Option<InFlight> {
        let claimed = InFlight::claim(chunk);
        self.store.is_resident(&claimed).then_some(claimed)
    }

    fn next_stage(&self, job: &ChunkJob, command: ChunkCommand) -> Vec<ChunkJob> {
        if self.chain_follow_ups {
            vec![job.follow_up(command)]
        } else {
            Vec::new()
        }
    }

    fn require_stage(
        chunk: &ChunkHandle,
        stage: ChunkStatus,
        reason: &'static str,
    ) -> Result<(), ChunkJobError> {
        if chunk.status() < stage {
            return Err(ChunkJobError::MissingDependency {
                coord: chunk.coord(),
                reason,
            });
        }
        Ok(())
    }

    /// Attaches pool sub-chunks to every empty slot.
    fn attach_sub_chunks(&self, voxels: &mut ChunkVoxels) -> Result<(), ChunkJobError> {
        let missing = SUB_CHUNKS_PER_CHUNK - voxels.allocated_count();
        if missing > 0 {
            let sub_chunks = self.store.pool().allocate_many(missing)?;
            self.store
                .pool()
                .release_many(voxels.install_sub_chunks(sub_chunks));
        }
        Ok(())
    }

    /// Allocates the chunk's voxels and runs `fill` on them. If `fill` fails
    /// or panics the chunk goes back to the stage it had before, and a chunk
    /// that had no data returns its sub-chunks to the pool.
    fn fill_chunk(
        &self,
        chunk: &ChunkHandle,
        fill: impl FnOnce(&mut ChunkVoxels) -> Result<(), ChunkJobError>,
    ) -> Result<(), ChunkJobError> {
        let mut rollback = FillRollback {
            chunk,
            pool: self.store.pool(),
            previous: chunk.status(),
            armed: true,
        };
        chunk.status_cell().store(ChunkStatus::Generating);

        {
            // Dropped before the rollback, which may need the lock.
            let mut guard = chunk.voxels().get_mut();
            let voxels: &mut ChunkVoxels = &mut guard;
            self.attach_sub_chunks(voxels).and_then(|()| fill(voxels))?;
        }
        rollback.armed = false;
        Ok(())
    }

    fn generate_terrain(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        self.fill_chunk(chunk, |voxels| self.terrain.generate(job.coord, voxels))?;
        chunk.status_cell().store(ChunkStatus::TerrainGenerated);
        Ok(self.next_stage(job, ChunkCommand::GenerateDecorations))
    }

    fn client_load_chunk(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
        data: &[u8],
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        // Reject data for another chunk before borrowing any sub-chunks.
        let coord = codec::peek_coord(data)?;
        if coord != job.coord {
            return Err(ChunkJobError::CorruptJob(format!(
                "data is for chunk ({}, {}), job targets ({}, {})",
                coord.x, coord.y, job.coord.x, job.coord.y
            )));
        }
        self.fill_chunk(chunk, |voxels| codec::decode_chunk(data, job.coord, voxels))?;
        chunk.status_cell().store(ChunkStatus::Decorated);
        Ok(self.next_stage(job, ChunkCommand::CalculateLighting))
    }

    fn save_block_data(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        Self::require_stage(chunk, ChunkStatus::TerrainGenerated, "nothing to save")?;
        let data = codec::encode_chunk(job.coord, &chunk.voxels().get());
        self.persistence.save(job.coord, &data)?;
        debug!(
            "Saved chunk ({}, {}): {} bytes",
            job.coord.x,
            job.coord.y,
            data.len()
        );
        Ok(Vec::new())
    }

    fn generate_decorations(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        Self::require_stage(chunk, ChunkStatus::TerrainGenerated, "terrain not generated")?;
        let trees = self.decorations.plan_trees(job.coord, &chunk.voxels().get());

        let mut relight: Vec<ChunkCoord> = Vec::new();
        let mut placed = 0;
        for tree in &trees {
            // Every chunk the canopy reaches must already have terrain. Each
            // stays claimed while the tree is written into it.
            let neighbours: Option<Vec<InFlight>> = tree
                .neighbour_chunks(job.coord)
                .into_iter()
                .map(|coord| {
                    self.store
                        .get_chunk(coord)
                        .and_then(|n| self.claim_resident(n))
                        .filter(|n| n.status() >= ChunkStatus::TerrainGenerated)
                })
                .collect();
            let Some(neighbours) = neighbours else {
                trace!(
                    "Skipping tree at ({}, {}, {}): neighbour not generated",
                    tree.base.x,
                    tree.base.y,
                    tree.base.z
                );
                continue;
            };

            let changed = place_tree(tree, chunk, &neighbours);
            placed += 1;
            for neighbour in neighbours.iter().filter(|n| changed.contains(&n.coord())) {
                // Leaves shade the columns below them.
                if neighbour.status() >= ChunkStatus::Lit {
                    neighbour.status_cell().regress_to(ChunkStatus::Decorated);
                    if !relight.contains(&neighbour.coord()) {
                        relight.push(neighbour.coord());
                    }
                }
            }
        }
        chunk.status_cell().store(ChunkStatus::Decorated);
        trace!(
            "Placed {placed} of {} trees in chunk ({}, {})",
            trees.len(),
            job.coord.x,
            job.coord.y
        );

        let mut follow_ups = self.next_stage(job, ChunkCommand::CalculateLighting);
        follow_ups.extend(
            relight
                .into_iter()
                .map(|coord| job.for_chunk(coord, ChunkCommand::CalculateLighting)),
        );
        Ok(follow_ups)
    }

    fn calculate_lighting(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        Self::require_stage(chunk, ChunkStatus::TerrainGenerated, "terrain not generated")?;
        lighting::calculate_lighting(&mut chunk.voxels().get_mut());
        chunk.status_cell().store(ChunkStatus::Lit);
        Ok(self.next_stage(job, ChunkCommand::TesselateVertices))
    }

    fn recalculate_lighting(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
        block_that_updated: cgmath::Point3<i32>,
        removed_light_source: bool,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        let p = block_that_updated;
        let local = world_to_local(p)
            .filter(|_| world_to_chunk_coord(p) == job.coord)
            .ok_or_else(|| {
                ChunkJobError::CorruptJob(format!(
                    "block ({}, {}, {}) is not in chunk ({}, {})",
                    p.x, p.y, p.z, job.coord.x, job.coord.y
                ))
            })?;
        Self::require_stage(chunk, ChunkStatus::TerrainGenerated, "terrain not generated")?;

        lighting::recalculate_lighting(&mut chunk.voxels().get_mut(), local, removed_light_source);
        chunk.status_cell().store(ChunkStatus::Lit);
        Ok(self.next_stage(job, ChunkCommand::TesselateVertices))
    }

    fn tesselate_vertices(
        &self,
        job: &ChunkJob,
        chunk: &ChunkHandle,
    ) -> Result<Vec<ChunkJob>, ChunkJobError> {
        Self::require_stage(chunk, ChunkStatus::Lit, "lighting not calculated")?;

        let neighbours: Vec<Option<Arc<ChunkHandle>>> = NeighbourView::NEIGHBOUR_OFFSETS
            .iter()
            .map(|&(dx, dz)| {
                let coord: ChunkCoord = cgmath::Point2::new(job.coord.x + dx, job.coord.y + dz);
                self.store
                    .get_chunk(coord)
                    .filter(|n| n.status() >= ChunkStatus::TerrainGenerated)
            })
            .collect();
        let guards: Vec<_> = neighbours
            .iter()
            .map(|n| n.as_ref().map(|n| n.voxels().get()))
            .collect();
        let center = chunk.voxels().get();
        let view = NeighbourView::new(&center, std::array::from_fn(|i| guards[i].as_deref()));

        let mut mesh = chunk.take_mesh().unwrap_or_default();
        tesselate(job.coord, &view, &mut mesh);
        drop(view);
        drop(center);
        drop(guards);

        chunk.store_mesh(mesh);
        chunk.status_cell().store(ChunkStatus::Ready);
        Ok(Vec::new())
    }
}

/// Writes a tree into its home chunk and the neighbours it reaches. Wood
/// replaces air and leaves; leaves only fill air.
///
/// # Returns
/// The neighbours whose blocks changed.
fn place_tree(tree: &TreePlan, home: &ChunkHandle, neighbours: &[InFlight]) -> Vec<ChunkCoord> {
    let mut changed = Vec::new();
    for (position, block_type) in tree.blocks() {
        let coord = world_to_chunk_coord(position);
        let target = if coord == home.coord() {
            home
        } else {
            match neighbours.iter().find(|n| n.coord() == coord) {
                Some(neighbour) => &**neighbour,
                None => continue,
            }
        };
        let Some(local) = world_to_local(position) else {
            continue;
        };

        let mut voxels = target.voxels().get_mut();
        let current = voxels.block_type(local.x, local.y, local.z);
        let fits = match block_type {
            BlockType::LEAVES => current == BlockType::AIR,
            _ => current == BlockType::AIR || current == BlockType::LEAVES,
        };
        if fits
            && voxels.set_block_type(local.x, local.y, local.z, block_type)
            && coord != home.coord()
            && !changed.contains(&coord)
        {
            changed.push(coord);
        }
    }
    changed
}
