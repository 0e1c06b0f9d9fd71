//! Coordinate and geometry types shared by the tessellator and renderers.
//!
//! Canonical CPU space:
//! - Logical pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! Renderers convert to NDC in shaders using a viewport uniform.

mod color;
mod matrix;
mod rect;
mod vec2;

pub use color::Color;
pub use matrix::Mat4;
pub use rect::Rect;
pub use vec2::Vec2;
