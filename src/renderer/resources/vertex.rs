use std::mem::{offset_of, size_of};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use smallvec::SmallVec;

/// Per-vertex data as laid out in the vertex buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub texcoord: Vec2,
    pub normal: Vec3,
}

pub struct VertexInputDescription {
    pub bindings: SmallVec<[vk::VertexInputBindingDescription; 1]>,
    pub attributes: SmallVec<[vk::VertexInputAttributeDescription; 4]>,
    pub flags: vk::PipelineVertexInputStateCreateFlags,
}

impl Vertex {
    pub const BINDING: u32 = 0;

    pub fn input_description() -> VertexInputDescription {
        let bindings = SmallVec::from_buf([vk::VertexInputBindingDescription {
            binding: Self::BINDING,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]);

        let attribute = |location: u32, format: vk::Format, offset: usize| {
            vk::VertexInputAttributeDescription {
                location,
                binding: Self::BINDING,
                format,
                offset: offset as u32,
            }
        };
        let attributes = SmallVec::from_buf([
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, texcoord)),
            attribute(3, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
        ]);

        VertexInputDescription {
            bindings,
            attributes,
            flags: vk::PipelineVertexInputStateCreateFlags::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 44);
    }

    #[test]
    fn attributes_follow_the_struct_layout() {
        let description = Vertex::input_description();

        assert_eq!(description.bindings.len(), 1);
        assert_eq!(description.bindings[0].binding, 0);
        assert_eq!(description.bindings[0].stride, 44);
        assert_eq!(description.bindings[0].input_rate, vk::VertexInputRate::VERTEX);

        let layout = description
            .attributes
            .iter()
            .map(|a| (a.location, a.offset, a.format))
            .collect::<Vec<_>>();
        assert_eq!(
            layout,
            vec![
                (0, 0, vk::Format::R32G32B32_SFLOAT),
                (1, 12, vk::Format::R32G32B32_SFLOAT),
                (2, 24, vk::Format::R32G32_SFLOAT),
                (3, 32, vk::Format::R32G32B32_SFLOAT),
            ]
        );
    }
}
