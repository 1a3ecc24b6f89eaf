//! Noise-based procedural terrain generation

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::voxel::block::{Block, ids};
use crate::voxel::chunk::{CHUNK_DIM, CHUNK_HEIGHT, ChunkCoord, cell_index};

/// Fills cell arrays for chunk coordinates.
///
/// Implementations must be deterministic per coordinate: a chunk whose
/// file was lost is regenerated through this trait and should come
/// back as the world remembers it (minus any edits).
pub trait ChunkGenerator: Send + Sync {
    /// Fill `cells` (layout per [`cell_index`]) for the chunk at `coord`.
    fn generate(&self, coord: ChunkCoord, cells: &mut [Block]);
}

/// Parameters controlling the default heightmap terrain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainParams {
    pub seed: u32,
    /// Horizontal noise wavelength; larger values give smoother hills
    pub scale: f32,
    /// Peak terrain height in cells
    pub height_scale: f32,
    /// FBM detail levels
    pub octaves: u32,
    /// FBM amplitude falloff per octave
    pub persistence: f32,
    /// FBM frequency growth per octave
    pub lacunarity: f32,
    /// Columns below this height fill with water
    pub sea_level: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 64.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            sea_level: 32.0,
        }
    }
}

/// Heightmap terrain generator backed by fractal Brownian motion
pub struct TerrainGenerator {
    params: TerrainParams,
    height_noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    pub fn new(params: TerrainParams) -> Self {
        let height_noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(f64::from(params.persistence))
            .set_lacunarity(f64::from(params.lacunarity));

        Self { params, height_noise }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Terrain height at world position (x, z), in [0, height_scale].
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let sample = self.height_noise.get([
            f64::from(x / self.params.scale),
            f64::from(z / self.params.scale),
        ]);

        // Fbm output sits in [-1, 1]; remap onto the height range
        let t = (sample * 0.5 + 0.5) as f32;
        t * self.params.height_scale
    }
}

impl ChunkGenerator for TerrainGenerator {
    fn generate(&self, coord: ChunkCoord, cells: &mut [Block]) {
        let origin = coord.world_origin();
        let sea_level = self.params.sea_level;

        for x in 0..CHUNK_DIM {
            for z in 0..CHUNK_DIM {
                let height = self
                    .height_at(origin.x + x as f32, origin.z + z as f32)
                    .min((CHUNK_HEIGHT - 1) as f32);
                let surface = height as usize;

                // Columns barely above the waterline get beaches
                let surface_block = if height <= sea_level + 1.5 {
                    Block::new(ids::SAND)
                } else {
                    Block::new(ids::GRASS)
                };

                for y in 0..CHUNK_HEIGHT {
                    cells[cell_index(x, y, z)] = if y + 3 < surface {
                        Block::new(ids::STONE)
                    } else if y < surface {
                        Block::new(ids::DIRT)
                    } else if y == surface {
                        surface_block
                    } else if (y as f32) < sea_level {
                        Block::new(ids::WATER)
                    } else {
                        Block::AIR
                    };
                }
            }
        }
    }
}
