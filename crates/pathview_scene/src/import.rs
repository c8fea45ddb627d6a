//! Mesh asset import.

use std::path::Path;

use pathview_math::{Vec2, Vec3};

use crate::error::{Result, SceneError};
use crate::mesh::MeshData;

/// Loads mesh assets from disk.
///
/// Every returned mesh has complete per-vertex attributes. An asset that
/// holds no triangles is an import error.
pub trait AssetImporter {
    fn load(&self, path: &Path) -> Result<Vec<MeshData>>;
}

/// Wavefront OBJ importer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjImporter;

impl AssetImporter for ObjImporter {
    fn load(&self, path: &Path) -> Result<Vec<MeshData>> {
        let import_error = |message: String| SceneError::Import {
            path: path.to_path_buf(),
            message,
        };

        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )
        .map_err(|e| import_error(e.to_string()))?;

        let meshes: Vec<MeshData> = models
            .into_iter()
            .map(|model| convert(model.mesh))
            .filter(|mesh| !mesh.is_empty())
            .collect();

        if meshes.is_empty() {
            return Err(import_error("no meshes found".to_string()));
        }

        log::info!(
            "Loaded {} meshes ({} triangles) from {}",
            meshes.len(),
            meshes.iter().map(|m| m.primitive_count()).sum::<u32>(),
            path.display()
        );
        Ok(meshes)
    }
}

fn convert(mesh: tobj::Mesh) -> MeshData {
    let positions: Vec<Vec3> = mesh.positions.chunks_exact(3).map(Vec3::from_slice).collect();
    let normals: Vec<Vec3> = mesh.normals.chunks_exact(3).map(Vec3::from_slice).collect();
    let texcoords: Vec<Vec2> = mesh.texcoords.chunks_exact(2).map(Vec2::from_slice).collect();

    let mut data = MeshData::new(positions, mesh.indices)
        .with_normals(normals)
        .with_texcoords(texcoords);
    data.ensure_attributes();
    data
}
