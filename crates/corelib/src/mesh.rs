//! CPU-side mesh representation shared by loaders, raycasting and upload.

use crate::Vec3;

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for v in &self.vertices {
            aabb.grow(Vec3::from(v.position));
        }
        aabb
    }

    /// Triangles as object-space corner positions. Out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = self.vertices.get(tri[0] as usize)?;
            let b = self.vertices.get(tri[1] as usize)?;
            let c = self.vertices.get(tri[2] as usize)?;
            Some([
                Vec3::from(a.position),
                Vec3::from(b.position),
                Vec3::from(c.position),
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![MeshVertex::default()], vec![0]);
        assert!(data.is_valid());
        assert!(!MeshData::default().is_valid());
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let data = MeshData::new(
            vec![
                MeshVertex::new([-1.0, 0.0, 2.0], [0.0; 3], [0.0; 2]),
                MeshVertex::new([3.0, -4.0, 0.5], [0.0; 3], [0.0; 2]),
            ],
            vec![0, 1, 0],
        );
        let b = data.bounds();
        assert_eq!(b.min, Vec3::new(-1.0, -4.0, 0.5));
        assert_eq!(b.max, Vec3::new(3.0, 0.0, 2.0));
        assert!(Aabb::EMPTY.is_empty());
    }
}
