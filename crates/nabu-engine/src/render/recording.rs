use std::collections::HashMap;

use crate::draw::TextureId;
use crate::manager::DrawManager;

use super::backend::RenderBackend;

/// Per-frame statistics captured by [`RecordingBackend`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Native draw calls that would have been issued (blur passes included).
    pub draw_calls: usize,
    pub vertices: usize,
    pub indices: usize,
    pub callbacks: usize,
}

/// CPU-only backend: performs the full frame walk and texture bookkeeping
/// without a GPU device.
///
/// Used by tests and headless validation, and doubles as the reference for
/// what a native backend must do per frame (font-texture refresh, command
/// iteration, callback dispatch).
#[derive(Default)]
pub struct RecordingBackend {
    next_tex: u64,
    textures: HashMap<TextureId, (u32, u32, Vec<u8>)>,
    pub frames: Vec<RecordedFrame>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_data(&self, id: TextureId) -> Option<&(u32, u32, Vec<u8>)> {
        self.textures.get(&id)
    }

    fn upload_font_texture(&mut self, manager: &DrawManager) {
        let fonts = manager.fonts();
        let tex_missing = fonts
            .tex_id()
            .is_none_or(|id| !self.textures.contains_key(&id));
        if !fonts.take_updated() && !tex_missing {
            return;
        }

        let (rgba, w, h) = fonts.tex_data_rgba32();
        let id = match fonts.tex_id().filter(|id| self.textures.contains_key(id)) {
            Some(id) => id,
            None => {
                let Some(id) = self.create_texture(w, h) else { return };
                fonts.set_tex_id(id);
                id
            }
        };
        self.set_texture_rgba(id, &rgba, w, h);
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> Option<TextureId> {
        self.next_tex += 1;
        let id = TextureId(self.next_tex);
        self.textures.insert(id, (width, height, Vec::new()));
        Some(id)
    }

    fn set_texture_rgba(&mut self, id: TextureId, rgba: &[u8], width: u32, height: u32) -> bool {
        let Some(entry) = self.textures.get_mut(&id) else {
            return false;
        };
        if entry.0 != width || entry.1 != height || rgba.len() != (width * height * 4) as usize {
            return false;
        }
        entry.2 = rgba.to_vec();
        true
    }

    fn set_texture_bgra(&mut self, id: TextureId, bgra: &[u8], width: u32, height: u32) -> bool {
        let mut rgba = bgra.to_vec();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        self.set_texture_rgba(id, &rgba, width, height)
    }

    fn delete_texture(&mut self, id: TextureId) -> bool {
        self.textures.remove(&id).is_some()
    }

    fn draw(&mut self, manager: &DrawManager) {
        self.upload_font_texture(manager);

        let mut frame = RecordedFrame::default();
        manager.visit_active(|buf| {
            frame.vertices += buf.vertices.len();
            frame.indices += buf.indices.len();
            for cmd in &buf.cmds {
                if let Some(cb) = &cmd.callback {
                    (cb.0)(cmd);
                    frame.callbacks += 1;
                    continue;
                }
                if cmd.elem_count == 0 {
                    continue;
                }
                let passes = if cmd.blur_strength > 0 {
                    cmd.blur_passes.max(1) as usize
                } else {
                    1
                };
                frame.draw_calls += passes;
            }
        });
        self.frames.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::coords::{Color, Vec2};
    use crate::draw::DrawCallback;
    use crate::manager::DrawManager;

    use super::*;

    fn manager() -> DrawManager {
        DrawManager::new(Vec2::new(800.0, 600.0))
    }

    #[test]
    fn texture_round_trip() {
        let mut backend = RecordingBackend::new();
        let id = backend.create_texture(2, 2).expect("texture");
        assert!(backend.set_texture_rgba(id, &[1u8; 16], 2, 2));
        assert!(!backend.set_texture_rgba(id, &[1u8; 4], 2, 2));
        assert!(backend.delete_texture(id));
        assert!(!backend.delete_texture(id));
    }

    #[test]
    fn bgra_upload_swizzles_to_rgba() {
        let mut backend = RecordingBackend::new();
        let id = backend.create_texture(1, 1).expect("texture");
        assert!(backend.set_texture_bgra(id, &[10, 20, 30, 40], 1, 1));
        let (_, _, data) = backend.texture_data(id).expect("data");
        assert_eq!(data, &[30, 20, 10, 40]);
    }

    #[test]
    fn draw_counts_batched_commands_once() {
        let m = manager();
        let id = m.register_buffer(0);
        {
            let buf = m.get_buffer(id);
            let mut buf = buf.lock().expect("buffer");
            for _ in 0..10 {
                buf.rectangle_filled(Vec2::zero(), Vec2::new(5.0, 5.0), Color::WHITE);
            }
        }
        m.swap_buffers(id);

        let mut backend = RecordingBackend::new();
        backend.draw(&m);
        let frame = backend.frames[0];
        assert_eq!(frame.draw_calls, 1);
        assert_eq!(frame.vertices, 40);
        assert_eq!(frame.indices, 60);
    }

    #[test]
    fn blur_commands_multiply_draw_calls() {
        let m = manager();
        let id = m.register_buffer(0);
        {
            let buf = m.get_buffer(id);
            let mut buf = buf.lock().expect("buffer");
            buf.set_blur(2, 3);
            buf.rectangle_filled(Vec2::zero(), Vec2::new(5.0, 5.0), Color::WHITE);
        }
        m.swap_buffers(id);

        let mut backend = RecordingBackend::new();
        backend.draw(&m);
        assert_eq!(backend.frames[0].draw_calls, 3);
    }

    #[test]
    fn command_callbacks_fire_instead_of_drawing() {
        let m = manager();
        let id = m.register_buffer(0);
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let buf = m.get_buffer(id);
            let mut buf = buf.lock().expect("buffer");
            let cmd_idx = buf.force_new_cmd();
            let fired = Arc::clone(&fired);
            buf.cmds[cmd_idx].callback = Some(DrawCallback(Arc::new(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            })));
        }
        m.swap_buffers(id);

        let mut backend = RecordingBackend::new();
        backend.draw(&m);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(backend.frames[0].callbacks, 1);
        assert_eq!(backend.frames[0].draw_calls, 0);
    }

    #[test]
    fn first_draw_uploads_the_font_atlas_texture() {
        let m = manager();
        assert!(m.fonts().tex_id().is_none());

        let mut backend = RecordingBackend::new();
        backend.draw(&m);

        let id = m.fonts().tex_id().expect("atlas texture");
        let (w, h, data) = backend.texture_data(id).expect("uploaded");
        assert_eq!(data.len(), (w * h * 4) as usize);
    }
}
