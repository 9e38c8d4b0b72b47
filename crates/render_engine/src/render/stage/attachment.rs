//! Declarative render stage description

use ash::vk;
use nalgebra::Vector2;

/// What backs an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    /// Image owned by the stage, sampleable by later passes
    Image,
    /// The stage's shared depth image
    Depth,
    /// The presented swapchain image
    Swapchain,
}

/// One named image slot of a render stage
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Position in the stage, equal to its declaration index
    binding: u32,
    /// Name later passes sample the image by
    name: String,
    ty: AttachmentType,
    /// Use the device MSAA sample count instead of one sample
    multisampled: bool,
    format: vk::Format,
    /// Linear RGBA written at the start of the render pass
    clear_color: [f32; 4],
}

impl Attachment {
    /// Declare an attachment with the type's default format
    pub fn new(binding: u32, name: impl Into<String>, ty: AttachmentType) -> Self {
        let format = match ty {
            AttachmentType::Depth => vk::Format::D32_SFLOAT,
            AttachmentType::Image | AttachmentType::Swapchain => vk::Format::R8G8B8A8_UNORM,
        };
        Self {
            binding,
            name: name.into(),
            ty,
            multisampled: false,
            format,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn with_format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_multisampling(mut self, multisampled: bool) -> Self {
        self.multisampled = multisampled;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> AttachmentType {
        self.ty
    }

    pub fn is_multisampled(&self) -> bool {
        self.multisampled
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }
}

/// A subpass and the attachment bindings it writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpassType {
    binding: u32,
    attachment_bindings: Vec<u32>,
}

impl SubpassType {
    pub fn new(binding: u32, attachment_bindings: impl Into<Vec<u32>>) -> Self {
        Self {
            binding,
            attachment_bindings: attachment_bindings.into(),
        }
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn attachment_bindings(&self) -> &[u32] {
        &self.attachment_bindings
    }
}

/// Requested render area of a stage
///
/// The area is `scale` times either the fixed `size` or the window size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Horizontal and vertical factor applied to the base size
    pub scale: Vector2<f32>,
    /// Fixed base size; the window size when absent
    pub size: Option<vk::Extent2D>,
    /// Top-left corner of the render area
    pub offset: vk::Offset2D,
}

impl Viewport {
    /// Window-sized viewport
    pub fn new() -> Self {
        Self {
            scale: Vector2::new(1.0, 1.0),
            size: None,
            offset: vk::Offset2D::default(),
        }
    }

    /// Viewport with a fixed size regardless of the window
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            size: Some(vk::Extent2D { width, height }),
            ..Self::new()
        }
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Vector2::new(x, y);
        self
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset = vk::Offset2D { x, y };
        self
    }

    /// Compute the render area for a window of `window` pixels
    pub fn render_area(&self, window: vk::Extent2D) -> RenderArea {
        let base = self.size.unwrap_or(window);
        let scaled = |length: u32, scale: f32| ((length as f32 * scale).round() as u32).max(1);
        let extent = vk::Extent2D {
            width: scaled(base.width, self.scale.x),
            height: scaled(base.height, self.scale.y),
        };
        RenderArea {
            extent,
            offset: self.offset,
            aspect_ratio: extent.width as f32 / extent.height as f32,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

/// Computed render area of a stage
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderArea {
    pub extent: vk::Extent2D,
    pub offset: vk::Offset2D,
    pub aspect_ratio: f32,
}

impl RenderArea {
    pub fn rect(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: self.offset,
            extent: self.extent,
        }
    }
}

impl PartialEq for RenderArea {
    fn eq(&self, other: &Self) -> bool {
        self.extent.width == other.extent.width
            && self.extent.height == other.extent.height
            && self.offset.x == other.offset.x
            && self.offset.y == other.offset.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaled_window_area() {
        let viewport = Viewport::new().with_scale(0.5, 0.5);
        let area = viewport.render_area(vk::Extent2D { width: 1280, height: 720 });
        assert_eq!((area.extent.width, area.extent.height), (640, 360));
        assert_relative_eq!(area.aspect_ratio, 16.0 / 9.0, epsilon = 1e-5);
    }

    #[test]
    fn test_fixed_size_ignores_window() {
        let viewport = Viewport::fixed(4096, 4096).with_offset(8, 0);
        let small = viewport.render_area(vk::Extent2D { width: 800, height: 600 });
        let large = viewport.render_area(vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(small, large);
        assert_eq!(small.extent.width, 4096);
        assert_eq!(small.rect().offset.x, 8);
    }

    #[test]
    fn test_area_never_collapses() {
        let area = Viewport::new().render_area(vk::Extent2D { width: 0, height: 0 });
        assert_eq!((area.extent.width, area.extent.height), (1, 1));
    }
}
