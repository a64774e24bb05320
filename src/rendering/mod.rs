pub mod context;
pub mod resources;
pub mod scheduler;
pub mod svg;

// Re-export main types
pub use context::{CompositeOperation, RenderContext, SurfaceError};
pub use resources::{ImageHandle, ResourceCache, ResourceEntry, ResourceKey};
pub use scheduler::{Deferred, FrameHandle, FrameSlot};
pub use svg::{rasterize_svg, SvgError};
