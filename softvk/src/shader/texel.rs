//! Texel addressing for storage images, input attachments and texel buffers.
//!
//! The byte offset of a texel is computed from integer coordinates and the pitches of a
//! [`StorageImageDescriptor`]. With [`OutOfBoundsBehavior::Nullify`], every coordinate is tested
//! against its extent, and the offset of a lane with any out-of-bounds coordinate is replaced with
//! [`OOB_OFFSET`], which no resource can contain.
//!
//! [`StorageImageDescriptor`]: crate::descriptor_set::descriptor::StorageImageDescriptor

use super::simd::{OutOfBoundsBehavior, SimdInt, SimdUInt};
use crate::memory::MAX_MEMORY_ALLOCATION_SIZE;

/// The offset given to lanes that are out of bounds.
///
/// Lane offsets are signed 32-bit, so this is the largest offset that still fits a 16-byte
/// texel.
pub const OOB_OFFSET: i32 = 0x7FFF_FFFF - 16;

const _: () = assert!(OOB_OFFSET as u64 >= MAX_MEMORY_ALLOCATION_SIZE);

/// The extent and pitches of the image being addressed. Pitches are in bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TexelLayout {
    pub width: u32,
    pub height: u32,
    /// The number of depth slices or array layers.
    pub depth: u32,
    pub row_pitch: i32,
    pub slice_pitch: i32,
    pub sample_pitch: i32,
    pub sample_count: u32,
}

/// The coordinates of a texel access, one vector per coordinate component.
#[derive(Clone, Copy, Debug)]
pub struct TexelCoordinates<'a> {
    /// The coordinate components. For arrayed images, the last component is the array layer.
    pub components: &'a [SimdInt],

    /// Whether the image type is arrayed.
    pub arrayed: bool,

    /// Whether the image type is a cube. The layer extent then counts six faces per cube.
    pub cube: bool,

    /// The sample index, unless absent or a constant zero.
    pub sample: Option<SimdInt>,

    /// For subpass data, the window-space position of every lane and the view index. The
    /// position is added to the coordinates, and the view selects the layer.
    pub subpass: Option<([SimdInt; 2], i32)>,
}

/// Computes the byte offset of a texel in every lane.
pub fn texel_offset(
    coordinates: &TexelCoordinates<'_>,
    layout: &TexelLayout,
    texel_size: i32,
    behavior: OutOfBoundsBehavior,
) -> SimdInt {
    let &TexelCoordinates {
        components,
        arrayed,
        cube,
        sample,
        subpass,
    } = coordinates;
    let dims = components.len() - usize::from(arrayed);

    let mut u = components[0];
    let mut v = if components.len() > 1 {
        components[1]
    } else {
        SimdInt::splat(0)
    };

    if let Some((window_position, _)) = subpass {
        u = u + window_position[0];
        v = v + window_position[1];
    }

    let mut offset = u * SimdInt::splat(texel_size);

    if dims > 1 {
        offset = offset + v * SimdInt::splat(layout.row_pitch);
    }

    let mut w = SimdInt::splat(0);

    if dims > 2 || arrayed {
        if dims > 2 {
            w = w + components[2];
        }

        if arrayed {
            w = w + components[dims];
        }

        offset = offset + w * SimdInt::splat(layout.slice_pitch);
    }

    if let Some((_, view_id)) = subpass {
        offset = offset + SimdInt::splat(view_id) * SimdInt::splat(layout.slice_pitch);
    }

    if let Some(n) = sample {
        offset = offset + n * SimdInt::splat(layout.sample_pitch);
    }

    if behavior == OutOfBoundsBehavior::Nullify {
        let mut oob_mask = u.as_uint().cmp_ge(SimdUInt::splat(layout.width));

        if dims > 1 {
            oob_mask = oob_mask | v.as_uint().cmp_ge(SimdUInt::splat(layout.height));
        }

        if dims > 2 || arrayed {
            let depth = if cube {
                layout.depth.wrapping_mul(6)
            } else {
                layout.depth
            };
            oob_mask = oob_mask | w.as_uint().cmp_ge(SimdUInt::splat(depth));
        }

        if let Some(n) = sample {
            oob_mask = oob_mask | n.as_uint().cmp_ge(SimdUInt::splat(layout.sample_count));
        }

        offset = (offset & !oob_mask) | (oob_mask & SimdInt::splat(OOB_OFFSET));
    }

    offset
}

#[cfg(test)]
mod tests {
    use super::{texel_offset, TexelCoordinates, TexelLayout, OOB_OFFSET};
    use crate::shader::simd::{OutOfBoundsBehavior, SimdInt};

    const LAYOUT: TexelLayout = TexelLayout {
        width: 4,
        height: 4,
        depth: 2,
        row_pitch: 16,
        slice_pitch: 64,
        sample_pitch: 128,
        sample_count: 1,
    };

    fn coordinates(components: &[SimdInt], arrayed: bool) -> TexelCoordinates<'_> {
        TexelCoordinates {
            components,
            arrayed,
            cube: false,
            sample: None,
            subpass: None,
        }
    }

    #[test]
    fn offsets_2d() {
        let components = [SimdInt([0, 1, 3, 2]), SimdInt([0, 0, 3, 1])];
        let offset = texel_offset(
            &coordinates(&components, false),
            &LAYOUT,
            4,
            OutOfBoundsBehavior::Nullify,
        );
        assert_eq!(offset, SimdInt([0, 4, 60, 24]));
    }

    #[test]
    fn nullify_per_axis() {
        // Lane 1 overflows u but would alias a texel of the next row without per-axis checks.
        let components = [SimdInt([1, 4, -1, 0]), SimdInt([0, 0, 0, 4])];

        let nullified = texel_offset(
            &coordinates(&components, false),
            &LAYOUT,
            4,
            OutOfBoundsBehavior::Nullify,
        );
        assert_eq!(nullified, SimdInt([4, OOB_OFFSET, OOB_OFFSET, OOB_OFFSET]));

        let unchecked = texel_offset(
            &coordinates(&components, false),
            &LAYOUT,
            4,
            OutOfBoundsBehavior::RobustBufferAccess,
        );
        assert_eq!(unchecked, SimdInt([4, 16, -4, 64]));
    }

    #[test]
    fn arrayed_layer() {
        let components = [SimdInt::splat(1), SimdInt::splat(1), SimdInt([0, 1, 2, 1])];
        let offset = texel_offset(
            &coordinates(&components, true),
            &LAYOUT,
            4,
            OutOfBoundsBehavior::Nullify,
        );
        assert_eq!(offset, SimdInt([20, 84, OOB_OFFSET, 84]));
    }

    #[test]
    fn cube_counts_faces() {
        let components = [SimdInt::splat(0), SimdInt::splat(0), SimdInt([5, 6, 11, 12])];
        let layout = TexelLayout { depth: 2, ..LAYOUT };
        let offset = texel_offset(
            &TexelCoordinates {
                cube: true,
                ..coordinates(&components, true)
            },
            &layout,
            4,
            OutOfBoundsBehavior::Nullify,
        );
        assert_eq!(offset, SimdInt([320, 384, 704, OOB_OFFSET]));
    }

    #[test]
    fn samples_and_subpass() {
        let components = [SimdInt::splat(0), SimdInt::splat(0)];
        let layout = TexelLayout {
            sample_count: 4,
            ..LAYOUT
        };
        let offset = texel_offset(
            &TexelCoordinates {
                sample: Some(SimdInt([0, 1, 3, 4])),
                subpass: Some(([SimdInt([1, 1, 1, 1]), SimdInt([2, 2, 2, 2])], 1)),
                ..coordinates(&components, false)
            },
            &layout,
            4,
            OutOfBoundsBehavior::Nullify,
        );
        // (1, 2) in view 1: 4 + 32 + 64.
        assert_eq!(offset, SimdInt([100, 228, 484, OOB_OFFSET]));
    }
}
