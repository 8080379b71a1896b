use std::path::Path;
use crate::renderer::error::LoadError;

/// Attribute indices of one corner of a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    pub position: usize,
    pub texcoord: Option<usize>,
    pub normal: Option<usize>,
}

/// A triangulated mesh with separate index streams per attribute, the way
/// OBJ files store them
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    /// xyz triples
    pub positions: Vec<f32>,
    /// rgb triples indexed like `positions`, empty when the file has none
    pub vertex_colors: Vec<f32>,
    /// uv pairs
    pub texcoords: Vec<f32>,
    /// xyz triples
    pub normals: Vec<f32>,
    pub triangles: Vec<[FaceVertex; 3]>,
}

impl MeshData {
    fn from_obj_mesh(mesh: tobj::Mesh) -> Self {
        let has_texcoords = mesh.texcoord_indices.len() == mesh.indices.len();
        let has_normals = mesh.normal_indices.len() == mesh.indices.len();

        let corners = mesh
            .indices
            .iter()
            .enumerate()
            .map(|(i, &position)| FaceVertex {
                position: position as usize,
                texcoord: has_texcoords.then(|| mesh.texcoord_indices[i] as usize),
                normal: has_normals.then(|| mesh.normal_indices[i] as usize),
            })
            .collect::<Vec<_>>();
        let triangles = corners
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        Self {
            positions: mesh.positions,
            vertex_colors: mesh.vertex_color,
            texcoords: mesh.texcoords,
            normals: mesh.normals,
            triangles,
        }
    }
}

/// Reads every shape of an OBJ file, triangulating polygons
pub fn load_obj(path: &Path) -> Result<Vec<MeshData>, LoadError> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        // Only faces are drawn, lines and points would split the triangle stream
        ignore_lines: true,
        ignore_points: true,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &options)
        .map_err(|source| LoadError::Obj {
            path: path.to_path_buf(),
            source,
        })?;
    // Materials are not rendered, a missing .mtl file is not an error
    if let Err(err) = materials {
        log::debug!("Ignoring materials of {:?}: {}", path, err);
    }

    log::info!("Loaded {} shape(s) from {:?}", models.len(), path);

    Ok(models
        .into_iter()
        .map(|model| MeshData::from_obj_mesh(model.mesh))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "objview-{}-{}.obj",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn quads_are_triangulated() {
        let path = write_obj(
            "quad",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3 4/4\n",
        );

        let meshes = load_obj(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(meshes.len(), 1);
        let mesh = &meshes[0];
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.positions.len(), 12);
        assert!(mesh.triangles.iter().flatten().all(|c| c.texcoord.is_some()));
        assert!(mesh.triangles.iter().flatten().all(|c| c.normal.is_none()));
    }

    #[test]
    fn lines_and_points_are_not_drawn() {
        let path = write_obj(
            "lines",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             l 1 2\np 3\n\
             f 1 2 3\nf 1 3 4\n",
        );

        let meshes = load_obj(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let triangles = meshes.iter().map(|m| m.triangles.len()).sum::<usize>();
        assert_eq!(triangles, 2);
        let positions = meshes[0].triangles.iter().map(|t| t.map(|c| c.position)).collect::<Vec<_>>();
        assert_eq!(positions, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_obj(Path::new("/nonexistent/model.obj")).unwrap_err();
        assert!(matches!(err, LoadError::Obj { .. }));
    }
}
