//! Layout objects derived from shader reflection

use crate::render::shader::Shader;
use crate::render::RenderResult;
use ash::{vk, Device};

fn set_layout_bindings(shader: &Shader) -> Vec<vk::DescriptorSetLayoutBinding> {
    shader
        .layout_bindings()
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding.binding)
                .descriptor_type(binding.descriptor_type)
                .descriptor_count(binding.count)
                .stage_flags(binding.stage_flags)
                .build()
        })
        .collect()
}

/// Pool sizes for `max_sets` sets of this shader
fn scaled_pool_sizes(shader: &Shader, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    shader
        .pool_sizes()
        .iter()
        .map(|size| vk::DescriptorPoolSize {
            ty: size.ty,
            descriptor_count: size.descriptor_count * max_sets,
        })
        .collect()
}

/// Set layout for the shader's single descriptor set
///
/// With `push_descriptors` the layout is created for inline pushes and no
/// pool is needed.
pub fn create_descriptor_set_layout(
    device: &Device,
    shader: &Shader,
    push_descriptors: bool,
) -> RenderResult<vk::DescriptorSetLayout> {
    let bindings = set_layout_bindings(shader);
    let flags = if push_descriptors {
        vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR
    } else {
        vk::DescriptorSetLayoutCreateFlags::empty()
    };
    let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
        .flags(flags)
        .bindings(&bindings);
    Ok(unsafe { device.create_descriptor_set_layout(&create_info, None)? })
}

/// Pool able to hold `max_sets` sets of the shader, with per-set free
pub fn create_descriptor_pool(device: &Device, shader: &Shader, max_sets: u32) -> RenderResult<vk::DescriptorPool> {
    let pool_sizes = scaled_pool_sizes(shader, max_sets);
    let create_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(max_sets)
        .pool_sizes(&pool_sizes);
    Ok(unsafe { device.create_descriptor_pool(&create_info, None)? })
}

pub fn create_pipeline_layout(
    device: &Device,
    shader: &Shader,
    set_layout: vk::DescriptorSetLayout,
) -> RenderResult<vk::PipelineLayout> {
    let set_layouts = [set_layout];
    let create_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&set_layouts)
        .push_constant_ranges(shader.push_constant_ranges());
    Ok(unsafe { device.create_pipeline_layout(&create_info, None)? })
}
