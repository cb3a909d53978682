use std::collections::{BTreeMap, BTreeSet};
use voxelfront_common::GridPos;
use voxelfront_mesh::MeshCategory;

/// One uploaded chunk mesh plus the bookkeeping the streamer needs.
#[derive(Debug)]
pub struct ChunkMesh<R> {
    pub grid: GridPos,
    pub vertex_count: usize,
    pub resource: R,
}

/// Cache of uploaded chunk meshes, bucketed by render category.
///
/// Owned by a single thread; the streamer mutates it between frames and the
/// renderer iterates it during frames. BTreeMaps keep iteration order
/// deterministic, which keeps draw order and test output stable.
#[derive(Debug)]
pub struct MeshCache<R> {
    opaque: BTreeMap<GridPos, ChunkMesh<R>>,
    water: BTreeMap<GridPos, ChunkMesh<R>>,
    plant: BTreeMap<GridPos, ChunkMesh<R>>,
}

impl<R> Default for MeshCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> MeshCache<R> {
    pub fn new() -> Self {
        Self {
            opaque: BTreeMap::new(),
            water: BTreeMap::new(),
            plant: BTreeMap::new(),
        }
    }

    fn bucket(&self, category: MeshCategory) -> &BTreeMap<GridPos, ChunkMesh<R>> {
        match category {
            MeshCategory::Opaque => &self.opaque,
            MeshCategory::Water => &self.water,
            MeshCategory::Plant => &self.plant,
        }
    }

    fn bucket_mut(&mut self, category: MeshCategory) -> &mut BTreeMap<GridPos, ChunkMesh<R>> {
        match category {
            MeshCategory::Opaque => &mut self.opaque,
            MeshCategory::Water => &mut self.water,
            MeshCategory::Plant => &mut self.plant,
        }
    }

    /// Insert a mesh, replacing any previous mesh for the same cell.
    pub fn insert(&mut self, category: MeshCategory, mesh: ChunkMesh<R>) -> Option<ChunkMesh<R>> {
        self.bucket_mut(category).insert(mesh.grid, mesh)
    }

    pub fn get(&self, category: MeshCategory, grid: GridPos) -> Option<&ChunkMesh<R>> {
        self.bucket(category).get(&grid)
    }

    /// True if any category holds a mesh for this cell.
    pub fn contains(&self, grid: GridPos) -> bool {
        MeshCategory::ALL.iter().any(|&c| self.bucket(c).contains_key(&grid))
    }

    /// Remove every category's mesh for a cell. No-op (returns false) when
    /// nothing was cached there.
    pub fn delete_mesh(&mut self, grid: GridPos) -> bool {
        let mut removed = false;
        for category in MeshCategory::ALL {
            removed |= self.bucket_mut(category).remove(&grid).is_some();
        }
        removed
    }

    /// Keep only cells for which the predicate holds; returns how many cells
    /// were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(GridPos) -> bool) -> usize {
        let before = self.positions().len();
        let doomed: Vec<GridPos> = self.positions().into_iter().filter(|&g| !keep(g)).collect();
        for grid in doomed {
            self.delete_mesh(grid);
        }
        before - self.positions().len()
    }

    pub fn iter(&self, category: MeshCategory) -> impl Iterator<Item = &ChunkMesh<R>> {
        self.bucket(category).values()
    }

    /// Every cell with at least one cached mesh.
    pub fn positions(&self) -> BTreeSet<GridPos> {
        let mut out = BTreeSet::new();
        for category in MeshCategory::ALL {
            out.extend(self.bucket(category).keys().copied());
        }
        out
    }

    pub fn len(&self, category: MeshCategory) -> usize {
        self.bucket(category).len()
    }

    /// Total mesh entries across all categories.
    pub fn total_len(&self) -> usize {
        self.opaque.len() + self.water.len() + self.plant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.water.clear();
        self.plant.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(x: i32, z: i32) -> ChunkMesh<u32> {
        ChunkMesh {
            grid: GridPos::new(x, z),
            vertex_count: 4,
            resource: 0,
        }
    }

    #[test]
    fn insert_replaces_previous_mesh() {
        let mut cache = MeshCache::new();
        assert!(cache.insert(MeshCategory::Opaque, mesh(0, 0)).is_none());
        let old = cache.insert(
            MeshCategory::Opaque,
            ChunkMesh {
                grid: GridPos::new(0, 0),
                vertex_count: 8,
                resource: 1u32,
            },
        );
        assert!(old.is_some());
        assert_eq!(cache.len(MeshCategory::Opaque), 1);
        assert_eq!(cache.get(MeshCategory::Opaque, GridPos::new(0, 0)).unwrap().vertex_count, 8);
    }

    #[test]
    fn delete_removes_all_categories() {
        let mut cache = MeshCache::new();
        cache.insert(MeshCategory::Opaque, mesh(1, 1));
        cache.insert(MeshCategory::Water, mesh(1, 1));
        assert!(cache.contains(GridPos::new(1, 1)));
        assert!(cache.delete_mesh(GridPos::new(1, 1)));
        assert!(!cache.contains(GridPos::new(1, 1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_of_absent_cell_is_noop() {
        let mut cache: MeshCache<u32> = MeshCache::new();
        assert!(!cache.delete_mesh(GridPos::new(9, 9)));
    }

    #[test]
    fn retain_drops_rejected_cells() {
        let mut cache = MeshCache::new();
        for x in 0..4 {
            cache.insert(MeshCategory::Opaque, mesh(x, 0));
        }
        let dropped = cache.retain(|g| g.x < 2);
        assert_eq!(dropped, 2);
        assert_eq!(cache.positions().len(), 2);
    }

    #[test]
    fn positions_union_over_categories() {
        let mut cache = MeshCache::new();
        cache.insert(MeshCategory::Opaque, mesh(0, 0));
        cache.insert(MeshCategory::Water, mesh(0, 0));
        cache.insert(MeshCategory::Plant, mesh(2, 2));
        assert_eq!(cache.positions().len(), 2);
        assert_eq!(cache.total_len(), 3);
    }
}
