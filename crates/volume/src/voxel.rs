use serde::{Deserialize, Serialize};

/// Material of a single voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Air,
    Grass,
    Dirt,
    Rock,
    Sand,
    Water,
    Flora,
}

/// A single voxel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voxel {
    pub material: Material,
}

impl Voxel {
    pub const AIR: Voxel = Voxel {
        material: Material::Air,
    };

    pub const fn new(material: Material) -> Self {
        Self { material }
    }

    pub fn is_air(&self) -> bool {
        self.material == Material::Air
    }

    pub fn is_water(&self) -> bool {
        self.material == Material::Water
    }

    pub fn is_plant(&self) -> bool {
        self.material == Material::Flora
    }

    /// Solid voxels occlude neighbouring faces; water and flora do not.
    pub fn is_solid(&self) -> bool {
        !matches!(
            self.material,
            Material::Air | Material::Water | Material::Flora
        )
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Self::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_not_solid() {
        assert!(Voxel::AIR.is_air());
        assert!(!Voxel::AIR.is_solid());
    }

    #[test]
    fn water_and_flora_do_not_occlude() {
        assert!(!Voxel::new(Material::Water).is_solid());
        assert!(!Voxel::new(Material::Flora).is_solid());
        assert!(Voxel::new(Material::Rock).is_solid());
        assert!(Voxel::new(Material::Grass).is_solid());
    }
}
