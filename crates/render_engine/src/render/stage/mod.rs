//! Render stage graph
//!
//! A [`RenderStage`] is one render pass worth of work: named attachments,
//! subpasses that write them, and a viewport. The stage derives its
//! [`RenderPass`], depth image and [`Framebuffers`] and rebuilds them
//! whenever its render area changes.

pub mod attachment;
pub mod framebuffers;
pub mod image;
pub mod render_pass;
pub mod render_stage;

pub use attachment::{Attachment, AttachmentType, RenderArea, SubpassType, Viewport};
pub use framebuffers::Framebuffers;
pub use image::Image2d;
pub use render_pass::RenderPass;
pub use render_stage::RenderStage;
