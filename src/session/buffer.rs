//! Output buffers handed back by [`Video::next`](crate::session::Video::next).
//!
//! The session only needs `allocate(shape, element type)` and one write
//! pass over the returned bytes, so any tensor container can plug in through
//! [`BufferAllocator`].

use crate::core::format::ElementType;

/// A writable, fixed-shape output buffer
pub trait FrameBuffer {
    fn shape(&self) -> &[usize];

    fn element_type(&self) -> ElementType;

    /// Exactly `product(shape) * element_type().size()` bytes
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Creates [`FrameBuffer`]s
pub trait BufferAllocator {
    type Buffer: FrameBuffer;

    fn allocate(&mut self, shape: &[usize], element_type: ElementType) -> Self::Buffer;
}

/// Byte size of a buffer with this shape and element type
pub fn byte_len(shape: &[usize], element_type: ElementType) -> usize {
    shape.iter().product::<usize>() * element_type.size()
}

/// Host memory buffer
#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffer {
    shape: Vec<usize>,
    element_type: ElementType,
    data: Vec<u8>,
}

impl HostBuffer {
    pub fn zeroed(shape: &[usize], element_type: ElementType) -> Self {
        Self {
            shape: shape.to_vec(),
            element_type,
            data: vec![0; byte_len(shape, element_type)],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Elements as f32, `None` unless the buffer holds f32
    pub fn to_f32(&self) -> Option<Vec<f32>> {
        if self.element_type != ElementType::F32 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Elements as i16, `None` unless the buffer holds i16
    pub fn to_i16(&self) -> Option<Vec<i16>> {
        if self.element_type != ElementType::I16 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(2)
                .map(|b| i16::from_ne_bytes([b[0], b[1]]))
                .collect(),
        )
    }
}

impl FrameBuffer for HostBuffer {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Allocates [`HostBuffer`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HostAllocator;

impl BufferAllocator for HostAllocator {
    type Buffer = HostBuffer;

    fn allocate(&mut self, shape: &[usize], element_type: ElementType) -> HostBuffer {
        HostBuffer::zeroed(shape, element_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sizes() {
        let mut allocator = HostAllocator;
        let mut video = allocator.allocate(&[48, 64, 3], ElementType::U8);
        assert_eq!(video.bytes_mut().len(), 48 * 64 * 3);
        assert_eq!(video.shape(), &[48, 64, 3]);

        let mut audio = allocator.allocate(&[1024, 2], ElementType::F32);
        assert_eq!(audio.bytes_mut().len(), 1024 * 2 * 4);

        let mut empty = allocator.allocate(&[0], ElementType::U8);
        assert!(empty.bytes_mut().is_empty());
    }

    #[test]
    fn test_typed_views() {
        let mut buffer = HostAllocator.allocate(&[1], ElementType::F32);
        buffer.bytes_mut().copy_from_slice(&2.5f32.to_ne_bytes());
        assert_eq!(buffer.to_f32(), Some(vec![2.5]));
        assert_eq!(buffer.to_i16(), None);

        let mut buffer = HostAllocator.allocate(&[2], ElementType::I16);
        buffer.bytes_mut()[..2].copy_from_slice(&(-7i16).to_ne_bytes());
        assert_eq!(buffer.to_i16(), Some(vec![-7, 0]));
    }
}
