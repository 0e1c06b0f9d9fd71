use crate::draw::TextureId;
use crate::manager::DrawManager;

/// Contract between the batching core and a GPU backend.
///
/// Texture operations return `Option`/`bool` rather than panicking: resource
/// exhaustion is a backend condition the frame driver reacts to by skipping
/// the frame and retrying fresh on the next one.
pub trait RenderBackend {
    /// Allocates an RGBA texture and returns its opaque handle, or `None`
    /// when the backend cannot create it.
    fn create_texture(&mut self, width: u32, height: u32) -> Option<TextureId>;

    /// Uploads RGBA bytes to `id`. `false` when the handle is unknown or the
    /// data does not match the texture extent.
    fn set_texture_rgba(&mut self, id: TextureId, rgba: &[u8], width: u32, height: u32) -> bool;

    /// [`set_texture_rgba`](Self::set_texture_rgba) for BGRA-ordered input;
    /// the backend swizzles during upload.
    fn set_texture_bgra(&mut self, id: TextureId, bgra: &[u8], width: u32, height: u32) -> bool;

    fn delete_texture(&mut self, id: TextureId) -> bool;

    /// Renders one frame: refreshes the font-atlas texture when the atlas
    /// reports an update, then walks the registry's active tree in draw
    /// order and issues one native draw call per non-empty command, honoring
    /// clip rect, circular scissor, texture binding, key color and blur.
    ///
    /// Returning without having completed (e.g. no target, lost device)
    /// means "skip this frame and retry on the next one" — never a partial
    /// recovery mid-frame.
    fn draw(&mut self, manager: &DrawManager);
}
