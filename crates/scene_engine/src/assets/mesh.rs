//! Mesh geometry consumed by parts
//!
//! A mesh is immutable once loaded; parts share it through an `Arc` and only
//! ever read it on the render thread.

use crate::assets::AssetError;
use crate::foundation::math::{Vec2, Vec3};
use crate::render::PrimitiveKind;

/// Indexed geometry with optional normals and texture coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    kind: PrimitiveKind,
    vertices: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    tex_coords: Option<Vec<Vec2>>,
    indices: Vec<u32>,
    centroid: Vec3,
}

impl Mesh {
    /// Build a mesh, checking attribute lengths and index bounds
    pub fn new(
        kind: PrimitiveKind,
        vertices: Vec<Vec3>,
        normals: Option<Vec<Vec3>>,
        tex_coords: Option<Vec<Vec2>>,
        indices: Vec<u32>,
    ) -> Result<Self, AssetError> {
        if let Some(normals) = &normals {
            if normals.len() != vertices.len() {
                return Err(AssetError::LoadFailed(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    vertices.len()
                )));
            }
        }
        if let Some(tex_coords) = &tex_coords {
            if tex_coords.len() != vertices.len() {
                return Err(AssetError::LoadFailed(format!(
                    "{} texture coordinates for {} vertices",
                    tex_coords.len(),
                    vertices.len()
                )));
            }
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(AssetError::LoadFailed(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        let centroid = centroid_of(&vertices);
        Ok(Self { kind, vertices, normals, tex_coords, indices, centroid })
    }

    /// Axis-aligned cube centred on the origin, triangles with face normals
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (Vec3::x(), [Vec3::new(h, -h, -h), Vec3::new(h, h, -h), Vec3::new(h, h, h), Vec3::new(h, -h, h)]),
            (-Vec3::x(), [Vec3::new(-h, -h, h), Vec3::new(-h, h, h), Vec3::new(-h, h, -h), Vec3::new(-h, -h, -h)]),
            (Vec3::y(), [Vec3::new(-h, h, -h), Vec3::new(-h, h, h), Vec3::new(h, h, h), Vec3::new(h, h, -h)]),
            (-Vec3::y(), [Vec3::new(-h, -h, h), Vec3::new(-h, -h, -h), Vec3::new(h, -h, -h), Vec3::new(h, -h, h)]),
            (Vec3::z(), [Vec3::new(-h, -h, h), Vec3::new(h, -h, h), Vec3::new(h, h, h), Vec3::new(-h, h, h)]),
            (-Vec3::z(), [Vec3::new(h, -h, -h), Vec3::new(-h, -h, -h), Vec3::new(-h, h, -h), Vec3::new(h, h, -h)]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut tex_coords = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        let corner_uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.iter().zip(corner_uvs) {
                vertices.push(*corner);
                normals.push(normal);
                tex_coords.push(uv);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let centroid = centroid_of(&vertices);
        Self {
            kind: PrimitiveKind::Triangles,
            vertices,
            normals: Some(normals),
            tex_coords: Some(tex_coords),
            indices,
            centroid,
        }
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad(size: f32) -> Self {
        let h = size * 0.5;
        let vertices = vec![
            Vec3::new(-h, -h, 0.0),
            Vec3::new(h, -h, 0.0),
            Vec3::new(h, h, 0.0),
            Vec3::new(-h, h, 0.0),
        ];
        Self {
            kind: PrimitiveKind::Triangles,
            normals: Some(vec![Vec3::z(); 4]),
            tex_coords: Some(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ]),
            indices: vec![0, 1, 2, 0, 2, 3],
            centroid: Vec3::zeros(),
            vertices,
        }
    }

    /// Primitive kind used when drawing
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Vertex positions
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Per-vertex normals, if present
    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    /// Per-vertex texture coordinates, if present
    pub fn tex_coords(&self) -> Option<&[Vec2]> {
        self.tex_coords.as_deref()
    }

    /// Element indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Mean of all vertex positions, used for depth sorting
    pub const fn centroid(&self) -> Vec3 {
        self.centroid
    }
}

/// Mean of a vertex list; origin when empty
pub fn centroid_of(vertices: &[Vec3]) -> Vec3 {
    if vertices.is_empty() {
        return Vec3::zeros();
    }
    let sum = vertices.iter().fold(Vec3::zeros(), |acc, v| acc + v);
    sum / vertices.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_is_centred() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        assert_relative_eq!(cube.centroid(), Vec3::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn test_new_rejects_out_of_range_index() {
        let result = Mesh::new(
            PrimitiveKind::Triangles,
            vec![Vec3::zeros(), Vec3::x(), Vec3::y()],
            None,
            None,
            vec![0, 1, 3],
        );
        assert!(matches!(result, Err(AssetError::LoadFailed(_))));
    }

    #[test]
    fn test_new_rejects_mismatched_normals() {
        let result = Mesh::new(
            PrimitiveKind::Points,
            vec![Vec3::zeros(), Vec3::x()],
            Some(vec![Vec3::z()]),
            None,
            vec![0, 1],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_centroid_of_offset_triangle() {
        let mesh = Mesh::new(
            PrimitiveKind::Triangles,
            vec![Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 3.0, 0.0), Vec3::new(3.0, 0.0, 3.0)],
            None,
            None,
            vec![0, 1, 2],
        )
        .expect("valid mesh");
        assert_relative_eq!(mesh.centroid(), Vec3::new(3.0, 1.0, 1.0), epsilon = 1e-6);
    }
}
