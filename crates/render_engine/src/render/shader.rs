//! Shader reflection
//!
//! The shader compiler reports, per stage, the uniforms, uniform blocks
//! and vertex attributes it found. [`Shader`] merges those stage reports
//! and derives the descriptor-set layout, pool sizes, vertex input layout
//! and push constant ranges that pipelines and descriptor handles use.
//! Only names, bindings, offsets and sizes are consumed; shader source is
//! never seen here.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// GLSL-level type of a reflected uniform or attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformType {
    #[default]
    Float,
    Int,
    #[serde(rename = "uint")]
    UInt,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    #[serde(rename = "ivec4")]
    IVec4,
    Mat3,
    Mat4,
    #[serde(rename = "sampler2d")]
    Sampler2D,
    #[serde(rename = "sampler2d_array")]
    Sampler2DArray,
    #[serde(rename = "sampler3d")]
    Sampler3D,
    SamplerCube,
    #[serde(rename = "image2d")]
    Image2D,
    #[serde(rename = "image3d")]
    Image3D,
    ImageCube,
}

impl UniformType {
    /// Descriptor type for opaque uniforms, `None` for plain values
    pub fn descriptor_type(self) -> Option<vk::DescriptorType> {
        match self {
            Self::Sampler2D | Self::Sampler2DArray | Self::Sampler3D | Self::SamplerCube => {
                Some(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            }
            Self::Image2D | Self::Image3D | Self::ImageCube => Some(vk::DescriptorType::STORAGE_IMAGE),
            _ => None,
        }
    }

    /// Vertex input format for attribute types
    pub fn vertex_format(self) -> vk::Format {
        match self {
            Self::Float => vk::Format::R32_SFLOAT,
            Self::Int => vk::Format::R32_SINT,
            Self::UInt => vk::Format::R32_UINT,
            Self::Vec2 => vk::Format::R32G32_SFLOAT,
            Self::Vec3 => vk::Format::R32G32B32_SFLOAT,
            Self::Vec4 => vk::Format::R32G32B32A32_SFLOAT,
            Self::IVec4 => vk::Format::R32G32B32A32_SINT,
            _ => vk::Format::UNDEFINED,
        }
    }
}

/// A uniform, either standalone (with a binding) or a block member
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Uniform {
    /// Descriptor binding; block members have none
    pub binding: Option<u32>,
    /// Byte offset inside the owning block
    pub offset: u32,
    /// Byte size
    pub size: u32,
    #[serde(rename = "type")]
    pub ty: UniformType,
    pub read_only: bool,
    pub write_only: bool,
    #[serde(skip)]
    pub stage_flags: vk::ShaderStageFlags,
}

/// Kind of buffer backing a uniform block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformBlockType {
    #[default]
    Uniform,
    Storage,
    Push,
}

/// A reflected uniform, storage or push-constant block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformBlock {
    pub binding: u32,
    /// Total byte size
    pub size: u32,
    #[serde(rename = "type")]
    pub block_type: UniformBlockType,
    pub uniforms: BTreeMap<String, Uniform>,
    #[serde(skip)]
    pub stage_flags: vk::ShaderStageFlags,
}

impl UniformBlock {
    /// Member uniform by name
    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }
}

/// A vertex input attribute
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribute {
    pub set: u32,
    pub location: u32,
    /// Byte size
    pub size: u32,
    #[serde(rename = "type")]
    pub ty: UniformType,
}

/// What the compiler reports for a single shader stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageReflection {
    pub uniforms: BTreeMap<String, Uniform>,
    pub uniform_blocks: BTreeMap<String, UniformBlock>,
    pub attributes: BTreeMap<String, Attribute>,
    /// Compute local work-group size per axis
    pub local_size: [Option<u32>; 3],
}

impl StageReflection {
    /// Parse a JSON reflection report
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// One entry of the descriptor-set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stage_flags: vk::ShaderStageFlags,
}

/// Merged reflection of every stage of one shader program
#[derive(Debug, Default)]
pub struct Shader {
    name: String,
    stages: vk::ShaderStageFlags,
    uniforms: BTreeMap<String, Uniform>,
    uniform_blocks: BTreeMap<String, UniformBlock>,
    attributes: BTreeMap<String, Attribute>,
    local_size: [Option<u32>; 3],

    descriptor_locations: HashMap<String, u32>,
    descriptor_sizes: HashMap<String, u32>,
    descriptor_types: HashMap<u32, vk::DescriptorType>,
    layout_bindings: Vec<LayoutBinding>,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    push_constant_ranges: Vec<vk::PushConstantRange>,

    not_found: Mutex<HashSet<String>>,
}

impl Shader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a shader from stage reports and derive its layout in one go
    pub fn from_stages(name: impl Into<String>, stages: impl IntoIterator<Item = (vk::ShaderStageFlags, StageReflection)>) -> Self {
        let mut shader = Self::new(name);
        for (stage, reflection) in stages {
            shader.add_stage(stage, reflection);
        }
        shader.create_reflection();
        shader
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Union of every stage added so far
    pub fn stages(&self) -> vk::ShaderStageFlags {
        self.stages
    }

    /// Merge one stage's reflection
    ///
    /// Names shared between stages keep their first description and gain
    /// the new stage's flag.
    pub fn add_stage(&mut self, stage: vk::ShaderStageFlags, reflection: StageReflection) {
        self.stages |= stage;

        for (name, mut uniform) in reflection.uniforms {
            self.uniforms
                .entry(name)
                .and_modify(|existing| existing.stage_flags |= stage)
                .or_insert_with(|| {
                    uniform.stage_flags = stage;
                    uniform
                });
        }

        for (name, mut block) in reflection.uniform_blocks {
            self.uniform_blocks
                .entry(name)
                .and_modify(|existing| existing.stage_flags |= stage)
                .or_insert_with(|| {
                    block.stage_flags = stage;
                    block
                });
        }

        if stage.contains(vk::ShaderStageFlags::VERTEX) {
            self.attributes.extend(reflection.attributes);
        }

        if stage.contains(vk::ShaderStageFlags::COMPUTE) {
            for (axis, size) in reflection.local_size.into_iter().enumerate() {
                if size.is_some() {
                    self.local_size[axis] = size;
                }
            }
        }
    }

    /// Derive layout tables from the merged reflection
    pub fn create_reflection(&mut self) {
        self.descriptor_locations.clear();
        self.descriptor_sizes.clear();
        self.descriptor_types.clear();
        self.layout_bindings.clear();
        self.push_constant_ranges.clear();

        let mut pool_counts: BTreeMap<i32, u32> = BTreeMap::new();

        for (name, block) in &self.uniform_blocks {
            let descriptor_type = match block.block_type {
                UniformBlockType::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
                UniformBlockType::Storage => vk::DescriptorType::STORAGE_BUFFER,
                UniformBlockType::Push => {
                    self.push_constant_ranges.push(
                        vk::PushConstantRange::builder()
                            .stage_flags(block.stage_flags)
                            .offset(0)
                            .size(block.size)
                            .build(),
                    );
                    continue;
                }
            };

            self.layout_bindings.push(LayoutBinding {
                binding: block.binding,
                descriptor_type,
                count: 1,
                stage_flags: block.stage_flags,
            });
            *pool_counts.entry(descriptor_type.as_raw()).or_default() += 1;
            self.descriptor_locations.insert(name.clone(), block.binding);
            self.descriptor_sizes.insert(name.clone(), block.size);
            self.descriptor_types.insert(block.binding, descriptor_type);
        }

        for (name, uniform) in &self.uniforms {
            let (Some(binding), Some(descriptor_type)) = (uniform.binding, uniform.ty.descriptor_type()) else {
                continue;
            };

            self.layout_bindings.push(LayoutBinding {
                binding,
                descriptor_type,
                count: 1,
                stage_flags: uniform.stage_flags,
            });
            *pool_counts.entry(descriptor_type.as_raw()).or_default() += 1;
            self.descriptor_locations.insert(name.clone(), binding);
            self.descriptor_sizes.insert(name.clone(), uniform.size);
            self.descriptor_types.insert(binding, descriptor_type);
        }

        self.layout_bindings.sort_by_key(|binding| binding.binding);

        self.pool_sizes = pool_counts
            .into_iter()
            .map(|(ty, count)| vk::DescriptorPoolSize {
                ty: vk::DescriptorType::from_raw(ty),
                descriptor_count: count,
            })
            .collect();

        let mut attributes: Vec<&Attribute> = self.attributes.values().collect();
        attributes.sort_by_key(|attribute| attribute.location);
        let mut offset = 0;
        self.attribute_descriptions = attributes
            .into_iter()
            .map(|attribute| {
                let description = vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding: 0,
                    format: attribute.ty.vertex_format(),
                    offset,
                };
                offset += attribute.size;
                description
            })
            .collect();

        log::debug!(
            "Reflected shader '{}': {} bindings, {} push ranges, {} attributes",
            self.name,
            self.layout_bindings.len(),
            self.push_constant_ranges.len(),
            self.attribute_descriptions.len()
        );
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn uniform_block(&self, name: &str) -> Option<&UniformBlock> {
        self.uniform_blocks.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Binding of a named descriptor
    pub fn descriptor_location(&self, name: &str) -> Option<u32> {
        self.descriptor_locations.get(name).copied()
    }

    /// Byte size of a named descriptor's block or uniform
    pub fn descriptor_size(&self, name: &str) -> Option<u32> {
        self.descriptor_sizes.get(name).copied()
    }

    /// Descriptor type at a binding
    pub fn descriptor_type(&self, binding: u32) -> Option<vk::DescriptorType> {
        self.descriptor_types.get(&binding).copied()
    }

    /// Layout entries sorted by binding
    pub fn layout_bindings(&self) -> &[LayoutBinding] {
        &self.layout_bindings
    }

    /// Descriptor count per type for one set
    pub fn pool_sizes(&self) -> &[vk::DescriptorPoolSize] {
        &self.pool_sizes
    }

    /// Vertex attributes at binding 0, packed in location order
    pub fn attribute_descriptions(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attribute_descriptions
    }

    pub fn push_constant_ranges(&self) -> &[vk::PushConstantRange] {
        &self.push_constant_ranges
    }

    /// Compute local work-group size; unreported axes are `None`
    pub fn local_size(&self) -> [Option<u32>; 3] {
        self.local_size
    }

    /// Record a failed lookup; true only the first time `name` is seen
    pub fn report_not_found(&self, name: &str) -> bool {
        match self.not_found.lock() {
            Ok(mut names) => names.insert(name.to_owned()),
            Err(poisoned) => poisoned.into_inner().insert(name.to_owned()),
        }
    }
}
