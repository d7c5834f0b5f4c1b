//! STL loading via the `stl_io` crate.
//!
//! Handles both binary and ASCII STL (auto-detected). STL carries at best
//! flat per-face normals, so smooth vertex normals are always recomputed
//! from the indexed geometry, and the single resulting mesh gets the
//! default neutral material.

use crate::error::{BridgeError, Result};
use crate::scene::{Material, Mesh, SceneGraph, SceneNode};
use std::io::Cursor;

/// Parse STL bytes into a single-mesh scene graph.
pub fn load(bytes: &[u8]) -> Result<SceneGraph> {
    let mut cursor = Cursor::new(bytes);
    let stl = stl_io::read_stl(&mut cursor)?;

    if stl.faces.is_empty() {
        return Err(BridgeError::InvalidModel(
            "STL contains no triangles".to_string(),
        ));
    }

    let mut mesh = Mesh::new(Material::default_neutral());
    mesh.positions = stl
        .vertices
        .iter()
        .map(|v| {
            let p: [f32; 3] = (*v).into();
            p
        })
        .collect();
    mesh.indices = stl
        .faces
        .iter()
        .flat_map(|face| face.vertices.iter().map(|&i| i as u32))
        .collect();
    super::check_indices(&mesh)?;
    mesh.compute_normals();

    let mut node = SceneNode::new("stl");
    node.meshes.push(mesh);
    Ok(SceneGraph::new(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_TRIANGLE: &str = "\
solid triangle
facet normal 0 0 1
 outer loop
  vertex 0 0 0
  vertex 1 0 0
  vertex 0 1 0
 endloop
endfacet
endsolid triangle
";

    #[test]
    fn test_load_ascii_stl() {
        let scene = load(ASCII_TRIANGLE.as_bytes()).unwrap();
        assert_eq!(scene.root.meshes.len(), 1);

        let mesh = &scene.root.meshes[0];
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.has_normals());
        // Facet winding faces +Z; the recomputed smooth normals must agree.
        for n in &mesh.normals {
            assert!((n[2] - 1.0).abs() < 1e-6, "normal was {:?}", n);
        }
        assert_eq!(mesh.material, Material::default_neutral());
    }

    #[test]
    fn test_load_binary_stl() {
        // Minimal binary STL: 80-byte header, triangle count, one triangle.
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for f in [
            0.0f32, 0.0, 1.0, // normal
            0.0, 0.0, 0.0, // v0
            1.0, 0.0, 0.0, // v1
            0.0, 1.0, 0.0, // v2
        ] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes()); // attribute byte count

        let scene = load(&bytes).unwrap();
        assert_eq!(scene.root.meshes[0].triangle_count(), 1);
    }

    #[test]
    fn test_empty_stl_is_invalid() {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            load(&bytes),
            Err(BridgeError::InvalidModel(_))
        ));
    }
}
