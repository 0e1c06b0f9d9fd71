//! Render backends.
//!
//! Backends consume the registry's active-buffer tree and issue one native
//! draw call per draw command. The batching core never depends on which
//! backend is active; everything a backend needs comes from
//! [`DrawManager::visit_active`](crate::manager::DrawManager::visit_active)
//! and the command fields.
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down)
//! - the wgpu backend converts to NDC in the shader using the per-command
//!   uniform block

mod backend;
mod recording;
mod wgpu_backend;

pub use backend::RenderBackend;
pub use recording::{RecordedFrame, RecordingBackend};
pub use wgpu_backend::WgpuRenderer;
