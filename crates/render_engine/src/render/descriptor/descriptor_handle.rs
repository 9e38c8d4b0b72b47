//! Per-draw descriptor cache
//!
//! A [`DescriptorHandle`] maps descriptor names to the resources bound
//! under them. Pushing the resource already bound under a name (same
//! identity, same range) is a no-op, so a handle fed the same bindings
//! every frame never rewrites its descriptor set.
//!
//! The handle follows the shader of the pipeline it is updated with. When
//! that shader changes, every entry is dropped, the set is reallocated and
//! [`DescriptorHandle::update`] reports the handle as not ready for this
//! frame.

use super::{Descriptor, DescriptorSet, OffsetSize, ResourceId, StorageHandle, UniformHandle};
use crate::render::device::{GraphicsDevice, WriteDescriptor};
use crate::render::{Pipeline, RenderResult, Shader};
use ash::vk;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct DescriptorValue {
    resource: ResourceId,
    offset_size: Option<OffsetSize>,
    write: WriteDescriptor,
}

/// Named resource bindings for one draw
#[derive(Debug)]
pub struct DescriptorHandle {
    device: Arc<dyn GraphicsDevice>,
    shader: Option<Arc<Shader>>,
    push_descriptors: bool,
    descriptor_set: Option<DescriptorSet>,
    descriptors: BTreeMap<String, DescriptorValue>,
    write_descriptors: Vec<WriteDescriptor>,
    changed: bool,
}

impl DescriptorHandle {
    /// Create an unbound handle
    ///
    /// Pushes are ignored until the first [`DescriptorHandle::update`]
    /// binds the handle to a pipeline's shader.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            shader: None,
            push_descriptors: false,
            descriptor_set: None,
            descriptors: BTreeMap::new(),
            write_descriptors: Vec::new(),
            changed: false,
        }
    }

    /// Create a handle already bound to `pipeline`
    pub fn with_pipeline(device: Arc<dyn GraphicsDevice>, pipeline: &dyn Pipeline) -> RenderResult<Self> {
        let mut handle = Self::new(device);
        handle.rebind(pipeline)?;
        Ok(handle)
    }

    /// Whether bindings changed since the last update
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Persistent set, absent in push-descriptor mode
    pub fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.descriptor_set.as_ref().map(DescriptorSet::handle)
    }

    /// Number of bound names
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Bind `descriptor` under `name`
    ///
    /// Names the shader does not declare are logged once per shader and
    /// otherwise ignored.
    pub fn push(&mut self, name: &str, descriptor: &dyn Descriptor, offset_size: Option<OffsetSize>) {
        let Some(shader) = &self.shader else {
            return;
        };

        let resource = descriptor.resource_id();
        if let Some(existing) = self.descriptors.get(name) {
            if existing.resource == resource && existing.offset_size == offset_size {
                return;
            }
        }

        let Some((location, descriptor_type)) = shader
            .descriptor_location(name)
            .and_then(|location| shader.descriptor_type(location).map(|ty| (location, ty)))
        else {
            if shader.report_not_found(name) {
                log::error!("Could not find descriptor '{}' in shader '{}'", name, shader.name());
            }
            return;
        };

        let write = descriptor.write_descriptor(location, descriptor_type, offset_size);
        self.descriptors.insert(
            name.to_owned(),
            DescriptorValue {
                resource,
                offset_size,
                write,
            },
        );
        self.changed = true;
    }

    /// Bring `uniforms` in line with the block named `name` and bind its buffer
    ///
    /// A block the shader does not declare is logged once and leaves
    /// `uniforms` unbound.
    pub fn push_uniform(&mut self, name: &str, uniforms: &mut UniformHandle) -> RenderResult<()> {
        let Some(shader) = self.shader.clone() else {
            return Ok(());
        };
        let block = shader.uniform_block(name);
        if block.is_none() && shader.report_not_found(name) {
            log::error!("Could not find uniform block '{}' in shader '{}'", name, shader.name());
        }
        uniforms.update(block)?;
        if let Some(buffer) = uniforms.buffer() {
            self.push(name, buffer, None);
        }
        Ok(())
    }

    /// Bring `storage` in line with the block named `name` and bind its buffer
    pub fn push_storage(&mut self, name: &str, storage: &mut StorageHandle) -> RenderResult<()> {
        let Some(shader) = self.shader.clone() else {
            return Ok(());
        };
        let block = shader.uniform_block(name);
        if block.is_none() && shader.report_not_found(name) {
            log::error!("Could not find storage block '{}' in shader '{}'", name, shader.name());
        }
        storage.update(block)?;
        if let Some(buffer) = storage.buffer() {
            self.push(name, buffer, None);
        }
        Ok(())
    }

    /// Unbind `name`; returns whether it was bound
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.descriptors.remove(name).is_some();
        self.changed |= removed;
        removed
    }

    /// Sync with `pipeline` and flush pending writes
    ///
    /// Returns `false` when the handle was just rebound to a new shader;
    /// the caller should skip its draw this frame.
    pub fn update(&mut self, pipeline: &dyn Pipeline) -> RenderResult<bool> {
        let same_shader = self
            .shader
            .as_ref()
            .is_some_and(|shader| Arc::ptr_eq(shader, pipeline.shader()));
        if !same_shader {
            self.rebind(pipeline)?;
            return Ok(false);
        }

        if self.changed {
            self.write_descriptors = self.descriptors.values().map(|value| value.write).collect();
            if let Some(set) = &self.descriptor_set {
                set.update(&self.write_descriptors);
            }
            self.changed = false;
        }
        Ok(true)
    }

    /// Record the bind of the current bindings
    pub fn bind_descriptor(&self, cmd: vk::CommandBuffer, pipeline: &dyn Pipeline) {
        if self.push_descriptors {
            self.device.cmd_push_descriptor_set(
                cmd,
                pipeline.bind_point(),
                pipeline.pipeline_layout(),
                &self.write_descriptors,
            );
        } else if let Some(set) = &self.descriptor_set {
            set.bind(cmd);
        }
    }

    fn rebind(&mut self, pipeline: &dyn Pipeline) -> RenderResult<()> {
        let shader = Arc::clone(pipeline.shader());
        log::debug!("Descriptor handle bound to shader '{}'", shader.name());

        self.push_descriptors = pipeline.is_push_descriptors();
        self.descriptors.clear();
        self.write_descriptors.clear();
        self.descriptor_set = None;
        self.changed = false;
        self.shader = Some(shader);

        if !self.push_descriptors {
            self.descriptor_set = Some(DescriptorSet::new(Arc::clone(&self.device), pipeline)?);
        }
        Ok(())
    }
}
