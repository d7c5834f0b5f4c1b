//! Wavefront OBJ loading via the `tobj` crate.
//!
//! Material resolution is two-phase: if the caller supplied MTL text it is
//! parsed whenever the OBJ references a material library; any mesh that ends
//! up without a resolved material gets the default neutral one, so a
//! normalized scene never contains a material-less mesh.

use crate::error::{BridgeError, Result};
use crate::scene::{Material, Mesh, SceneGraph, SceneNode};
use std::io::Cursor;

const LOAD_OPTIONS: tobj::LoadOptions = tobj::LoadOptions {
    single_index: true,
    triangulate: true,
    ignore_points: true,
    ignore_lines: true,
};

/// Parse OBJ text (plus optional MTL text) into a scene graph.
pub fn load(text: &str, aux_mtl: Option<&str>) -> Result<SceneGraph> {
    let mut reader = Cursor::new(text.as_bytes());

    let (models, material_result) = tobj::load_obj_buf(&mut reader, &LOAD_OPTIONS, |_path| {
        // The OBJ names a material library; resolve it against the
        // caller-supplied MTL text regardless of the referenced path,
        // since browser-style uploads have no filesystem to consult.
        match aux_mtl {
            Some(mtl_text) => tobj::load_mtl_buf(&mut Cursor::new(mtl_text.as_bytes())),
            None => Err(tobj::LoadError::OpenFileFailed),
        }
    })?;

    // A failed or absent material library is not fatal; meshes fall back
    // to the default material below.
    let materials: Vec<tobj::Material> = material_result.unwrap_or_default();

    let mut node = SceneNode::new("obj");

    for model in &models {
        let raw = &model.mesh;
        if raw.positions.is_empty() {
            continue;
        }

        let material = raw
            .material_id
            .and_then(|id| materials.get(id))
            .map(convert_material)
            .unwrap_or_else(Material::default_neutral);

        let mut mesh = Mesh::new(material);
        mesh.positions = raw.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();
        mesh.indices = raw.indices.clone();
        super::check_indices(&mesh)?;

        if raw.normals.len() == raw.positions.len() {
            mesh.normals = raw.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect();
        } else {
            mesh.compute_normals();
        }

        if raw.texcoords.len() / 2 == raw.positions.len() / 3 {
            mesh.uvs = raw.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect();
        }

        node.meshes.push(mesh);
    }

    if node.meshes.is_empty() {
        return Err(BridgeError::InvalidModel(
            "OBJ contains no geometry".to_string(),
        ));
    }

    Ok(SceneGraph::new(node))
}

fn convert_material(raw: &tobj::Material) -> Material {
    let neutral = Material::default_neutral();
    let diffuse = raw.diffuse.unwrap_or([
        neutral.base_color[0],
        neutral.base_color[1],
        neutral.base_color[2],
    ]);
    let alpha = raw.dissolve.unwrap_or(1.0);

    Material {
        name: raw.name.clone(),
        base_color: [diffuse[0], diffuse[1], diffuse[2], alpha],
        // Approximate specular shininess as an inverse roughness term;
        // MTL has no metallic/roughness of its own.
        metallic: neutral.metallic,
        roughness: raw
            .shininess
            .map(|s| (1.0 - (s / 1000.0).clamp(0.0, 1.0)).max(0.05))
            .unwrap_or(neutral.roughness),
        double_sided: false,
    }
}
