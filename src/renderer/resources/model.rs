use std::path::Path;
use glam::{Mat4, Vec2, Vec3};
use crate::renderer::error::LoadError;
use crate::renderer::resources::mesh::{self, FaceVertex, MeshData};
use crate::renderer::resources::vertex::Vertex;

/// CPU-side geometry of the renderable object. Vertices are drawn as a plain
/// triangle list, three per face, without an index buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub vertices: Vec<Vertex>,
    pub transformation: Mat4,
}

impl Model {
    /// The built-in red/green/blue triangle shown before any model is loaded
    pub fn triangle() -> Self {
        let vertices = vec![
            Vertex { // Top
                position: Vec3::new(0.0, 0.5, 0.0),
                color: Vec3::new(1.0, 0.0, 0.0),
                texcoord: Vec2::new(0.5, 0.0),
                normal: Vec3::Z,
            },
            Vertex { // Bottom right
                position: Vec3::new(0.5, -0.5, 0.0),
                color: Vec3::new(0.0, 1.0, 0.0),
                texcoord: Vec2::new(1.0, 1.0),
                normal: Vec3::Z,
            },
            Vertex { // Bottom left
                position: Vec3::new(-0.5, -0.5, 0.0),
                color: Vec3::new(0.0, 0.0, 1.0),
                texcoord: Vec2::new(0.0, 1.0),
                normal: Vec3::Z,
            },
        ];

        Self {
            vertices,
            transformation: Mat4::IDENTITY,
        }
    }

    pub fn load_obj(path: &Path) -> Result<Self, LoadError> {
        Self::from_meshes(&mesh::load_obj(path)?)
    }

    /// Flattens every triangle corner into its own vertex and fits the
    /// result into a unit box centred on the origin
    pub fn from_meshes(meshes: &[MeshData]) -> Result<Self, LoadError> {
        let mut vertices = Vec::with_capacity(
            meshes.iter().map(|m| m.triangles.len() * 3).sum(),
        );
        for mesh in meshes {
            for corner in mesh.triangles.iter().flatten() {
                vertices.push(flatten_corner(mesh, corner)?);
            }
        }
        if vertices.is_empty() {
            return Err(LoadError::EmptyMesh);
        }

        let transformation = normalizing_transform(&vertices);

        Ok(Self {
            vertices,
            transformation,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

fn flatten_corner(mesh: &MeshData, corner: &FaceVertex) -> Result<Vertex, LoadError> {
    let [x, y, z] = attribute::<3>(&mesh.positions, corner.position, "position")?;

    // Colors share the position index when the file provides them
    let color = if mesh.vertex_colors.is_empty() {
        Vec3::ONE
    } else {
        Vec3::from_array(attribute::<3>(&mesh.vertex_colors, corner.position, "color")?)
    };

    // Image rows run top to bottom, OBJ v runs bottom to top
    let texcoord = match corner.texcoord {
        Some(index) => {
            let [u, v] = attribute::<2>(&mesh.texcoords, index, "texcoord")?;
            Vec2::new(u, 1.0 - v)
        }
        None => Vec2::ZERO,
    };

    let normal = match corner.normal {
        Some(index) => Vec3::from_array(attribute::<3>(&mesh.normals, index, "normal")?),
        None => Vec3::ZERO,
    };

    Ok(Vertex {
        position: Vec3::new(x, y, z),
        color,
        texcoord,
        normal,
    })
}

fn attribute<const N: usize>(
    values: &[f32],
    index: usize,
    name: &'static str,
) -> Result<[f32; N], LoadError> {
    let len = values.len() / N;
    values
        .get(index * N..(index + 1) * N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(LoadError::IndexOutOfRange {
            attribute: name,
            index,
            len,
        })
}

fn normalizing_transform(vertices: &[Vertex]) -> Mat4 {
    let (min, max) = vertices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), v| (min.min(v.position), max.max(v.position)),
    );

    let extent = (max - min).max_element();
    let scale = if extent > f32::EPSILON { 1.0 / extent } else { 1.0 };
    let center = (min + max) / 2.0;

    Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-center)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(position: usize, texcoord: Option<usize>, normal: Option<usize>) -> FaceVertex {
        FaceVertex {
            position,
            texcoord,
            normal,
        }
    }

    /// Two triangles sharing an edge of a 2x2 square in the z=1 plane
    fn square() -> MeshData {
        MeshData {
            positions: vec![
                0.0, 0.0, 1.0,
                2.0, 0.0, 1.0,
                2.0, 2.0, 1.0,
                0.0, 2.0, 1.0,
            ],
            vertex_colors: Vec::new(),
            texcoords: vec![0.0, 0.0, 1.0, 0.25],
            normals: vec![0.0, 0.0, 1.0],
            triangles: vec![
                [corner(0, Some(0), Some(0)), corner(1, Some(1), Some(0)), corner(2, None, None)],
                [corner(0, None, None), corner(2, None, None), corner(3, None, None)],
            ],
        }
    }

    #[test]
    fn every_corner_becomes_a_vertex() {
        let model = Model::from_meshes(&[square(), square()]).unwrap();

        assert_eq!(model.vertices.len(), 12);
        assert_eq!(model.vertex_count(), 12);
        // The shared corners are duplicated, not merged
        assert_eq!(model.vertices[0].position, model.vertices[3].position);
    }

    #[test]
    fn attributes_are_copied_or_defaulted() {
        let model = Model::from_meshes(&[square()]).unwrap();
        let v = &model.vertices;

        assert_eq!(v[1].texcoord, Vec2::new(1.0, 0.75));
        assert_eq!(v[0].normal, Vec3::Z);
        assert_eq!(v[2].texcoord, Vec2::ZERO);
        assert_eq!(v[2].normal, Vec3::ZERO);
        assert!(v.iter().all(|v| v.color == Vec3::ONE));
    }

    #[test]
    fn vertex_colors_follow_positions() {
        let mut mesh = square();
        mesh.vertex_colors = vec![
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,
            1.0, 1.0, 0.0,
        ];

        let model = Model::from_meshes(&[mesh]).unwrap();

        assert_eq!(model.vertices[1].color, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(model.vertices[5].color, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn model_is_fitted_into_a_unit_box() {
        let model = Model::from_meshes(&[square()]).unwrap();

        let corner_min = model.transformation.transform_point3(Vec3::new(0.0, 0.0, 1.0));
        let corner_max = model.transformation.transform_point3(Vec3::new(2.0, 2.0, 1.0));
        assert!(corner_min.abs_diff_eq(Vec3::new(-0.5, -0.5, 0.0), 1e-6));
        assert!(corner_max.abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-6));
    }

    #[test]
    fn degenerate_extent_keeps_unit_scale() {
        let mesh = MeshData {
            positions: vec![3.0, 3.0, 3.0],
            triangles: vec![[corner(0, None, None); 3]],
            ..Default::default()
        };

        let model = Model::from_meshes(&[mesh]).unwrap();

        assert_eq!(
            model.transformation,
            Mat4::from_translation(Vec3::splat(-3.0))
        );
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let mut mesh = square();
        mesh.triangles[1][2].position = 4;

        let err = Model::from_meshes(&[mesh]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::IndexOutOfRange { attribute: "position", index: 4, len: 4 }
        ));

        let mut mesh = square();
        mesh.triangles[0][0].normal = Some(1);
        let err = Model::from_meshes(&[mesh]).unwrap_err();
        assert!(matches!(err, LoadError::IndexOutOfRange { attribute: "normal", .. }));
    }

    #[test]
    fn empty_meshes_are_rejected() {
        let err = Model::from_meshes(&[MeshData::default()]).unwrap_err();
        assert!(matches!(err, LoadError::EmptyMesh));
    }

    #[test]
    fn triangle_has_three_colored_vertices() {
        let triangle = Model::triangle();

        assert_eq!(triangle.vertex_count(), 3);
        assert_eq!(triangle.vertices[0].color, Vec3::X);
        assert_eq!(triangle.vertices[1].color, Vec3::Y);
        assert_eq!(triangle.vertices[2].color, Vec3::Z);
        assert_eq!(triangle.transformation, Mat4::IDENTITY);
    }
}
