//! Export of normalized scenes to the canonical binary format.

pub mod glb;

pub use glb::export_glb;
