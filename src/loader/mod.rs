//! Format loaders: one entry point per supported input encoding.
//!
//! Dispatch is a tagged union over the file extension rather than ad-hoc
//! branching at call sites; anything unrecognized fails with
//! [`BridgeError::UnsupportedFormat`] before any parsing happens.

pub mod gltf;
pub mod obj;
pub mod stl;

use crate::error::{BridgeError, Result};
use crate::scene::{Mesh, SceneGraph};

/// A supported input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Wavefront OBJ text geometry, optionally with a separate MTL file.
    Obj,
    /// Binary or ASCII STL triangle soup.
    Stl,
    /// glTF 2.0 interchange container (.gltf or .glb).
    Gltf,
}

impl InputFormat {
    /// Map a file extension to a format. Case-insensitive.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "obj" => Ok(InputFormat::Obj),
            "stl" => Ok(InputFormat::Stl),
            "gltf" | "glb" => Ok(InputFormat::Gltf),
            other => Err(BridgeError::UnsupportedFormat(other.to_string())),
        }
    }

    /// The extension of a file name, for dispatch.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = file_name.rsplit('.').next().unwrap_or(file_name);
        if extension == file_name {
            return Err(BridgeError::UnsupportedFormat(String::new()));
        }
        Self::from_extension(extension)
    }

    /// Whether this format can reference a separate material file.
    pub fn accepts_materials(&self) -> bool {
        matches!(self, InputFormat::Obj)
    }
}

/// Load raw file bytes into a scene graph.
///
/// `aux_mtl` is the text of a companion MTL file, honored only by the OBJ
/// loader; other formats ignore it.
pub fn load_model(bytes: &[u8], format: InputFormat, aux_mtl: Option<&str>) -> Result<SceneGraph> {
    match format {
        InputFormat::Obj => obj::load(&String::from_utf8_lossy(bytes), aux_mtl),
        InputFormat::Stl => stl::load(bytes),
        InputFormat::Gltf => gltf::load(bytes),
    }
}

/// Reject index buffers that reference vertices outside the position
/// buffer. Malformed input must surface as `InvalidModel`, never as a
/// panic further down the pipeline.
pub(crate) fn check_indices(mesh: &Mesh) -> Result<()> {
    let vertex_count = mesh.positions.len() as u32;
    if let Some(&bad) = mesh.indices.iter().find(|&&i| i >= vertex_count) {
        return Err(BridgeError::InvalidModel(format!(
            "Index {} out of bounds for {} vertices",
            bad, vertex_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Material;

    #[test]
    fn test_extension_dispatch() {
        assert_eq!(InputFormat::from_extension("obj").unwrap(), InputFormat::Obj);
        assert_eq!(InputFormat::from_extension("STL").unwrap(), InputFormat::Stl);
        assert_eq!(InputFormat::from_extension("glb").unwrap(), InputFormat::Gltf);
        assert_eq!(
            InputFormat::from_extension("gltf").unwrap(),
            InputFormat::Gltf
        );
    }

    #[test]
    fn test_unrecognized_extension_carries_the_extension() {
        let err = InputFormat::from_extension("fbx").unwrap_err();
        match err {
            crate::BridgeError::UnsupportedFormat(ext) => assert_eq!(ext, "fbx"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(
            InputFormat::from_file_name("cube.final.OBJ").unwrap(),
            InputFormat::Obj
        );
        assert!(InputFormat::from_file_name("no_extension").is_err());
    }

    #[test]
    fn test_check_indices_rejects_out_of_bounds() {
        let mut mesh = Mesh::new(Material::default_neutral());
        mesh.positions = vec![[0.0; 3], [1.0; 3], [2.0; 3]];
        mesh.indices = vec![0, 1, 2];
        assert!(check_indices(&mesh).is_ok());

        mesh.indices = vec![0, 1, 9];
        assert!(matches!(
            check_indices(&mesh),
            Err(BridgeError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_only_obj_accepts_materials() {
        assert!(InputFormat::Obj.accepts_materials());
        assert!(!InputFormat::Stl.accepts_materials());
        assert!(!InputFormat::Gltf.accepts_materials());
    }
}
