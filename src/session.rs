//! One conversion, one session.
//!
//! A [`ConversionSession`] owns every piece of in-progress state for a
//! single conversion: the selected file, optional material data, the loaded
//! scene, its stats, and the exported blob. Starting a new session replaces
//! the old object wholesale; there is no shared mutable state to reset
//! field by field.
//!
//! Each session carries a monotonic token. Starting a session makes its
//! token the active one, and results from a session whose token is no
//! longer active are discarded instead of committed. This covers the
//! drop-a-second-file re-entry case.

use crate::error::Result;
use crate::export::export_glb;
use crate::loader::{load_model, InputFormat};
use crate::scene::{normalize, SceneGraph, SceneStats};
use crate::store::ModelStore;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);
static ACTIVE_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Identity of one conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken(u64);

/// The state of one conversion from file selection to stored blob.
#[derive(Debug)]
pub struct ConversionSession {
    token: SessionToken,
    file_name: String,
    format: InputFormat,
    bytes: Vec<u8>,
    mtl: Option<String>,
    scene: Option<SceneGraph>,
    stats: Option<SceneStats>,
    glb: Option<Vec<u8>>,
}

impl ConversionSession {
    /// Begin a conversion for a selected file. Fails up front with
    /// `UnsupportedFormat` so callers never start a pipeline they cannot
    /// finish. The new session becomes the active one.
    pub fn begin(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let format = InputFormat::from_file_name(&file_name)?;

        let token = SessionToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        ACTIVE_TOKEN.store(token.0, Ordering::Relaxed);

        Ok(Self {
            token,
            file_name,
            format,
            bytes,
            mtl: None,
            scene: None,
            stats: None,
            glb: None,
        })
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Whether a newer session has been started since this one.
    pub fn is_stale(&self) -> bool {
        ACTIVE_TOKEN.load(Ordering::Relaxed) != self.token.0
    }

    /// Supply companion material data (MTL text). When the geometry has
    /// already been loaded this re-runs the load so the new materials take
    /// effect; material-after-geometry ordering is supported.
    pub fn supply_materials(&mut self, mtl_text: impl Into<String>) -> Result<()> {
        self.mtl = Some(mtl_text.into());
        if self.scene.is_some() {
            self.scene = Some(load_model(&self.bytes, self.format, self.mtl.as_deref())?);
            // Downstream products are invalidated by the reload.
            self.stats = None;
            self.glb = None;
        }
        Ok(())
    }

    /// Run the pipeline: load, normalize, export. On failure the caller
    /// drops the session and starts over; partial products never leak out.
    pub fn convert(&mut self) -> Result<&[u8]> {
        let mut scene = load_model(&self.bytes, self.format, self.mtl.as_deref())?;
        let stats = normalize(&mut scene);
        let glb = export_glb(&scene)?;

        self.scene = Some(scene);
        self.stats = Some(stats);
        self.glb = Some(glb);
        Ok(self.glb.as_deref().unwrap_or_default())
    }

    /// Stats from the most recent `convert`.
    pub fn stats(&self) -> Option<SceneStats> {
        self.stats
    }

    /// Exported blob from the most recent `convert`.
    pub fn glb(&self) -> Option<&[u8]> {
        self.glb.as_deref()
    }

    /// The file's base name: the upload name minus its extension.
    pub fn base_name(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(base, _)| base)
            .unwrap_or(&self.file_name)
    }

    /// Filename for downloading the converted blob.
    pub fn download_file_name(&self) -> String {
        format!("{}.{}", self.base_name(), crate::export::glb::GLB_EXTENSION)
    }

    /// Persist the converted blob unless this session has been superseded.
    /// Returns the history identifier, or `None` when the result was
    /// discarded as stale.
    pub fn store_if_current(&self, store: &ModelStore) -> Result<Option<String>> {
        if self.is_stale() {
            log::debug!(
                "Discarding stale conversion result for {}",
                self.file_name
            );
            return Ok(None);
        }
        let Some(glb) = self.glb.as_deref() else {
            return Ok(None);
        };
        store.store_conversion(self.base_name(), glb).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Sessions share the process-wide active token, so tests that begin
    // sessions must not interleave.
    static SESSION_LOCK: Mutex<()> = Mutex::new(());

    fn serialize_sessions() -> std::sync::MutexGuard<'static, ()> {
        SESSION_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    const TRIANGLE_OBJ: &str = "\
v 0.0 0.0 0.0
v 4.0 0.0 0.0
v 0.0 4.0 0.0
f 1 2 3
";

    const OBJ_WITH_MTL: &str = "\
mtllib tri.mtl
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
usemtl red
f 1 2 3
";

    const RED_MTL: &str = "\
newmtl red
Kd 1.0 0.0 0.0
";

    #[test]
    fn test_full_pipeline() {
        let _guard = serialize_sessions();
        let mut session =
            ConversionSession::begin("tri.obj", TRIANGLE_OBJ.as_bytes().to_vec()).unwrap();
        let glb = session.convert().unwrap().to_vec();

        assert_eq!(&glb[0..4], b"glTF");
        let stats = session.stats().unwrap();
        assert_eq!(stats.vertices, 3);
        assert_eq!(stats.triangles, 1);
        assert_eq!(session.download_file_name(), "tri.glb");
    }

    #[test]
    fn test_unsupported_extension_fails_at_begin() {
        let err = ConversionSession::begin("model.fbx", Vec::new()).unwrap_err();
        assert!(matches!(err, crate::BridgeError::UnsupportedFormat(ext) if ext == "fbx"));
    }

    #[test]
    fn test_material_after_geometry_reloads() {
        let _guard = serialize_sessions();
        let mut session =
            ConversionSession::begin("tri.obj", OBJ_WITH_MTL.as_bytes().to_vec()).unwrap();
        session.convert().unwrap();

        // Materials arrive late; the already-loaded geometry is reloaded
        // with them and stale products are dropped.
        session.supply_materials(RED_MTL).unwrap();
        assert!(session.glb().is_none());

        session.convert().unwrap();
        let scene = session.scene.as_ref().unwrap();
        let mut names = Vec::new();
        scene.for_each_mesh(|mesh, _| names.push(mesh.material.name.clone()));
        assert_eq!(names, vec!["red".to_string()]);
    }

    #[test]
    fn test_newer_session_makes_older_stale() {
        let _guard = serialize_sessions();
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let mut first =
            ConversionSession::begin("first.obj", TRIANGLE_OBJ.as_bytes().to_vec()).unwrap();
        first.convert().unwrap();

        let _second =
            ConversionSession::begin("second.obj", TRIANGLE_OBJ.as_bytes().to_vec()).unwrap();

        assert!(first.is_stale());
        assert_eq!(first.store_if_current(&store).unwrap(), None);
        assert!(store.get_current().unwrap().is_none());
    }

    #[test]
    fn test_store_if_current_persists() {
        let _guard = serialize_sessions();
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let mut session =
            ConversionSession::begin("fox.obj", TRIANGLE_OBJ.as_bytes().to_vec()).unwrap();
        session.convert().unwrap();

        let id = session.store_if_current(&store).unwrap().unwrap();
        let record = store.get_by_id(&id).unwrap().unwrap();
        assert_eq!(record.name, "fox");
        assert_eq!(store.get_current().unwrap().unwrap().name, "fox");
    }
}
