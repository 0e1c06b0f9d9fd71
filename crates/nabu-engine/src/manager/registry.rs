use std::sync::{Arc, Mutex, MutexGuard};

use crate::coords::Vec2;
use crate::draw::{DrawBuffer, DrawShared};
use crate::text::{Font, FontAtlas, FontLoadError};

/// Stable handle to a registered buffer slot.
///
/// Handles stay valid until [`DrawManager::remove_buffer`] frees the slot
/// (removal cascades through children and invalidates every descendant's
/// handle); a freed slot may be reissued by a later registration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferId(pub(crate) usize);

/// One double-buffered slot.
///
/// The two buffers exist so a producer can build the working copy while the
/// consumer renders the active copy; `swap_buffers` exchanges them. The
/// children list is kept sorted descending by priority.
struct BufferNode {
    active: Arc<Mutex<DrawBuffer>>,
    working: Arc<Mutex<DrawBuffer>>,
    children: Vec<(usize, BufferId)>,
    parent: Option<BufferId>,
    is_free: bool,
}

struct RegistryInner {
    nodes: Vec<BufferNode>,
    /// Top-level draw order, sorted ascending by priority (lowest priority
    /// renders first, highest lands on top).
    priorities: Vec<(usize, BufferId)>,
    free: Vec<BufferId>,
}

/// Registry of double-buffered draw buffers, the producer/consumer handoff
/// point.
///
/// All structural operations (register, remove, priority updates, swap,
/// buffer lookup) serialize on one mutex. Content mutation through the
/// buffer returned by [`get_buffer`](Self::get_buffer) is guarded by that
/// buffer's own mutex; the external contract remains one producer per buffer
/// at a time.
///
/// `swap_buffers` establishes the happens-before edge: everything written to
/// a working buffer before the swap is visible to the consumer reading the
/// new active buffer after it.
pub struct DrawManager {
    inner: Mutex<RegistryInner>,
    shared: Arc<DrawShared>,
}

impl DrawManager {
    pub fn new(screen_size: Vec2) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                nodes: Vec::new(),
                priorities: Vec::new(),
                free: Vec::new(),
            }),
            shared: Arc::new(DrawShared::new(screen_size)),
        }
    }

    pub fn update_screen_size(&self, size: Vec2) {
        self.shared.set_screen_size(size);
    }

    pub fn screen_size(&self) -> Vec2 {
        self.shared.screen_size()
    }

    /// The shared font atlas. Backends poll it for texture updates.
    pub fn fonts(&self) -> &FontAtlas {
        &self.shared.fonts
    }

    pub fn add_font(
        &self,
        data: &[u8],
        size_pixels: f32,
        ranges: &[(u32, u32)],
    ) -> Result<Arc<Font>, FontLoadError> {
        self.shared.fonts.add_font_from_bytes(data, size_pixels, ranges)
    }

    pub fn remove_font(&self, font: &Arc<Font>) {
        self.shared.fonts.remove_font(font);
    }

    // ── registration ──────────────────────────────────────────────────────

    /// Registers a top-level buffer and inserts it into the render order at
    /// `priority`. Freed slots are reused before the slot array grows.
    pub fn register_buffer(&self, priority: usize) -> BufferId {
        let mut inner = self.lock();
        let id = Self::alloc_node(&mut inner, &self.shared, false);
        inner.priorities.push((priority, id));
        inner.priorities.sort_by_key(|&(priority, _)| priority);
        id
    }

    /// Registers a buffer nested under `parent`. Child buffers never appear
    /// in the top-level order; they render with their parent, sorted
    /// descending by priority among siblings.
    ///
    /// # Panics
    /// Panics when `parent` is out of range.
    pub fn register_child_buffer(&self, parent: BufferId, priority: usize) -> BufferId {
        let mut inner = self.lock();
        assert!(parent.0 < inner.nodes.len(), "parent buffer out of range");
        let id = Self::alloc_node(&mut inner, &self.shared, true);
        inner.nodes[id.0].parent = Some(parent);
        let children = &mut inner.nodes[parent.0].children;
        children.push((priority, id));
        children.sort_by(|a, b| b.0.cmp(&a.0));
        id
    }

    fn alloc_node(inner: &mut RegistryInner, shared: &Arc<DrawShared>, child: bool) -> BufferId {
        let make_buffer = || {
            let mut buf = DrawBuffer::new(Arc::clone(shared));
            buf.set_child(child);
            Arc::new(Mutex::new(buf))
        };

        if let Some(id) = inner.free.pop() {
            let node = &mut inner.nodes[id.0];
            node.active = make_buffer();
            node.working = make_buffer();
            node.children.clear();
            node.parent = None;
            node.is_free = false;
            return id;
        }

        let id = BufferId(inner.nodes.len());
        inner.nodes.push(BufferNode {
            active: make_buffer(),
            working: make_buffer(),
            children: Vec::new(),
            parent: None,
            is_free: false,
        });
        id
    }

    // ── priorities ────────────────────────────────────────────────────────

    /// Re-prioritizes a top-level buffer. Unknown handles are silently
    /// ignored (the buffer may have been removed concurrently).
    pub fn update_buffer_priority(&self, buffer: BufferId, new_priority: usize) {
        let mut inner = self.lock();
        assert!(buffer.0 < inner.nodes.len(), "buffer out of range");

        let Some(entry) = inner.priorities.iter_mut().find(|(_, id)| *id == buffer) else {
            return;
        };
        entry.0 = new_priority;
        inner.priorities.sort_by_key(|&(priority, _)| priority);
    }

    /// Re-prioritizes a child buffer within its parent's list.
    ///
    /// # Panics
    /// Panics when `child` is out of range or has no parent.
    pub fn update_child_priority(&self, child: BufferId, new_priority: usize) {
        let mut inner = self.lock();
        assert!(child.0 < inner.nodes.len(), "buffer out of range");

        let parent = inner.nodes[child.0]
            .parent
            .expect("update_child_priority on a buffer with no parent");
        let children = &mut inner.nodes[parent.0].children;
        if let Some(entry) = children.iter_mut().find(|(_, id)| *id == child) {
            entry.0 = new_priority;
            children.sort_by(|a, b| b.0.cmp(&a.0));
        }
    }

    // ── removal ───────────────────────────────────────────────────────────

    /// Removes a buffer and, recursively, all of its descendants: their
    /// contents are cleared, their slots returned to the free list, and the
    /// node detached from its parent and the top-level order. Handles to any
    /// freed slot are invalid until re-registration reuses it.
    ///
    /// # Panics
    /// Panics when `idx` is out of range.
    pub fn remove_buffer(&self, idx: BufferId) {
        let mut inner = self.lock();
        assert!(idx.0 < inner.nodes.len(), "buffer out of range");

        // Detach the subtree root from whatever order held it.
        if let Some(parent) = inner.nodes[idx.0].parent.take() {
            inner.nodes[parent.0].children.retain(|&(_, id)| id != idx);
        } else {
            inner.priorities.retain(|&(_, id)| id != idx);
        }

        // Collect the subtree first, then free each node; freeing while
        // walking would mutate child lists under the traversal.
        let mut subtree = Vec::new();
        let mut stack = vec![idx];
        while let Some(id) = stack.pop() {
            subtree.push(id);
            for &(_, child) in &inner.nodes[id.0].children {
                stack.push(child);
            }
        }

        for id in subtree {
            let node = &mut inner.nodes[id.0];
            node.parent = None;
            node.children.clear();
            node.is_free = true;
            lock_buffer(&node.active).clear();
            lock_buffer(&node.working).clear();
            inner.free.push(id);
        }
    }

    // ── producer / consumer handoff ───────────────────────────────────────

    /// Working buffer of `idx`, for producer mutation. The handle stays
    /// usable across swaps (the buffer then becomes the active side); it is
    /// only orphaned when the slot is removed.
    ///
    /// # Panics
    /// Panics when `idx` is out of range.
    pub fn get_buffer(&self, idx: BufferId) -> Arc<Mutex<DrawBuffer>> {
        let inner = self.lock();
        assert!(idx.0 < inner.nodes.len(), "buffer out of range");
        Arc::clone(&inner.nodes[idx.0].working)
    }

    /// Exchanges active and working buffers for `idx` and all descendants,
    /// then clears each new working buffer for the next frame's production.
    ///
    /// # Panics
    /// Panics when `idx` is out of range.
    pub fn swap_buffers(&self, idx: BufferId) {
        let mut inner = self.lock();
        assert!(idx.0 < inner.nodes.len(), "buffer out of range");

        let mut stack = vec![idx];
        while let Some(id) = stack.pop() {
            let node = &mut inner.nodes[id.0];
            std::mem::swap(&mut node.active, &mut node.working);
            lock_buffer(&node.working).clear();
            for &(_, child) in &node.children {
                stack.push(child);
            }
        }
    }

    /// Applies [`DrawBuffer::update_matrix_translate`] to the *active*
    /// buffer of `idx` — repositioning already-swapped geometry without
    /// re-tessellating.
    ///
    /// # Panics
    /// Panics when `buffer` is out of range.
    pub fn update_matrix_translate(&self, buffer: BufferId, translate: Vec2, cmd_idx: Option<usize>) {
        let inner = self.lock();
        assert!(buffer.0 < inner.nodes.len(), "buffer out of range");
        lock_buffer(&inner.nodes[buffer.0].active).update_matrix_translate(translate, cmd_idx);
    }

    // ── render traversal ──────────────────────────────────────────────────

    /// Visits every active buffer in draw order: the top-level list in
    /// ascending priority; within each tree the node itself, then its
    /// children depth-first in descending child priority. Backends build
    /// their submission from this single traversal.
    ///
    /// The registry stays locked for the duration of the walk.
    pub fn visit_active(&self, mut visit: impl FnMut(&DrawBuffer)) {
        let inner = self.lock();
        let mut stack: Vec<BufferId> = Vec::new();

        for &(_, root) in &inner.priorities {
            stack.push(root);
            while let Some(id) = stack.pop() {
                let node = &inner.nodes[id.0];
                if node.is_free {
                    continue;
                }
                visit(&lock_buffer(&node.active));
                // Reverse push keeps the children list's descending order.
                for &(_, child) in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
    }

    /// Sum of (vertex, index) counts across every active buffer.
    pub fn active_totals(&self) -> (usize, usize) {
        let mut totals = (0, 0);
        self.visit_active(|buf| {
            let (v, i) = buf.vtx_idx_count();
            totals.0 += v;
            totals.1 += i;
        });
        totals
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().expect("draw registry mutex poisoned")
    }
}

fn lock_buffer(buf: &Arc<Mutex<DrawBuffer>>) -> MutexGuard<'_, DrawBuffer> {
    buf.lock().expect("draw buffer mutex poisoned")
}
