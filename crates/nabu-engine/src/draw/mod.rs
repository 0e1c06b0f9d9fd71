//! Draw buffer: batched geometry recording.
//!
//! Responsibilities:
//! - accumulate tessellated primitives into vertex/index arenas
//! - coalesce consecutive primitives into draw commands keyed on render state
//!   (clip rect, texture, font-ness, blur, key color)
//! - manage the clip-rect / texture / font stacks
//! - expose the reservation protocol used by shape builders and the text
//!   renderer
//!
//! Buffers are owned by the registry in [`crate::manager`] and consumed by
//! backends in [`crate::render`].

mod buffer;
mod circle;
mod circle_table;
mod cmd;
mod polyline;
mod primitives;
mod rounded;

pub use buffer::{DrawBuffer, DrawShared};
pub use circle_table::{CIRCLE_POINT_COUNT, CIRCLE_TABLE_LEN, circle_table};
pub use cmd::{ClipRect, DrawCallback, DrawCmd, DrawIndex, TextureId, Vertex};
pub use rounded::{
    CornerFlags, check_mark, rectangle_filled_rounded, rectangle_filled_rounded_multicolor,
};
