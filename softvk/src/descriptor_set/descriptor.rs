// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The records that descriptor sets hold, one per array element of a binding.
//!
//! Shader code reads these records directly from the memory of a descriptor set, at offsets
//! computed by the [`DescriptorSetLayout`]. Their layout is therefore fixed: every record is
//! `#[repr(C)]` and 16-byte aligned, so that every binding starts on a 16-byte boundary.
//!
//! [`DescriptorSetLayout`]: super::layout::DescriptorSetLayout

use crate::{
    buffer::BufferView,
    image::{
        sampler::{Sampler, MAX_TEXTURE_LOD},
        view::{ImageView, ImageViewType},
        ImageAspect, MIPMAP_LEVELS,
    },
};
use bytemuck::Zeroable;
use log::warn;
use std::ptr;

/// The geometry of one mip level of a sampled image, in the form the sampling routines use.
///
/// Most values are replicated four times so that they can be loaded as a vector.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(16))]
pub struct Mipmap {
    /// The first texel of the level, per cube face. Only the first element is used for other
    /// view types.
    pub buffer: [*const u8; 6],

    /// For float formats, the extent divided by 65536.
    pub f_width: [f32; 4],
    pub f_height: [f32; 4],
    pub f_depth: [f32; 4],

    /// Half a texel in 16-bit fixed point.
    pub u_half: [i16; 4],
    pub v_half: [i16; 4],
    pub w_half: [i16; 4],

    pub width: [i32; 4],
    pub height: [i32; 4],
    pub depth: [i32; 4],

    /// `[1, pitch_p, 1, pitch_p]`.
    pub one_pitch_p: [i32; 4],

    /// The row pitch, in texels.
    pub pitch_p: [i32; 4],

    /// The slice pitch, in texels.
    pub slice_p: [i32; 4],

    /// The distance between two samples of a texel, in texels.
    pub sample_pitch_p: [i32; 4],

    /// The index of the last sample.
    pub sample_max: [i32; 4],
}

// SAFETY: All fields are numbers, arrays of numbers or raw pointers, which are all valid when
// zeroed.
unsafe impl Zeroable for Mipmap {}

/// The state that a sampling routine receives for the image being sampled.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(16))]
pub struct Texture {
    pub mipmap: [Mipmap; MIPMAP_LEVELS],

    pub width_height_lod: [f32; 4],
    pub width_lod: [f32; 4],
    pub height_lod: [f32; 4],
    pub depth_lod: [f32; 4],

    /// The LOD range of the sampler, clamped to `[0, MAX_TEXTURE_LOD]`.
    pub min_lod: f32,
    pub max_lod: f32,
}

// SAFETY: Same as `Mipmap`.
unsafe impl Zeroable for Texture {}

/// The record of sampler, sampled image, combined image sampler and uniform texel buffer
/// descriptors.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(16))]
pub struct SampledImageDescriptor {
    /// Must stay the first field: shader code passes the address of the descriptor as the
    /// address of the texture.
    pub texture: Texture,

    /// The identifier of the sampler, or zero if none has been written.
    pub sampler_id: u32,

    /// The identifier of the image view or buffer view, or zero if none has been written.
    pub image_view_id: u32,

    pub width: i32,
    pub height: i32,

    /// The depth of a 3D view, or the number of layers of an arrayed view. Counts whole cubes
    /// for cube views.
    pub depth: i32,

    pub mip_levels: i32,
    pub array_layers: i32,
    pub sample_count: i32,
}

// SAFETY: Same as `Mipmap`.
unsafe impl Zeroable for SampledImageDescriptor {}

impl SampledImageDescriptor {
    /// Writes the identifier and the LOD range of a sampler.
    pub fn update_sampler(&mut self, sampler: &Sampler) {
        let max = MAX_TEXTURE_LOD as f32;
        let min_lod = sampler.min_lod().clamp(0.0, max);
        let max_lod = sampler.max_lod().clamp(0.0, max);

        if max_lod != sampler.max_lod() {
            warn!(
                "the maximum LOD {} of sampler {} is clamped to {}",
                sampler.max_lod(),
                sampler.id(),
                max_lod,
            );
        }

        self.sampler_id = sampler.id().get();
        self.texture.min_lod = min_lod;
        self.texture.max_lod = max_lod;
    }

    /// Writes the geometry of an image view, for every level of the mipmap pyramid.
    pub fn update_image_view(&mut self, image_view: &ImageView) {
        let aspect = image_view.primary_aspect();
        let format = image_view.format().aspect_format(aspect);
        let texel_size = format.block_size() as i32;
        let level_count = image_view.mip_level_count();
        let is_cube = image_view.view_type().is_cube();

        self.image_view_id = image_view.id().get();

        for (mipmap_level, mipmap) in self.texture.mipmap.iter_mut().enumerate() {
            let level = (mipmap_level as u32).min(level_count - 1);

            mipmap.buffer = [ptr::null(); 6];

            if is_cube {
                for (face, buffer) in mipmap.buffer.iter_mut().enumerate() {
                    *buffer = image_view
                        .texel_pointer([0; 3], aspect, level, face as u32)
                        .cast_const();
                }
            } else {
                mipmap.buffer[0] = image_view
                    .texel_pointer([0; 3], aspect, level, 0)
                    .cast_const();
            }

            let extent = image_view.mip_level_extent(level);
            let geometry = LevelGeometry {
                extent,
                pitch_p: image_view.row_pitch_bytes(aspect, level) as i32 / texel_size,
                slice_p: image_view.slice_pitch_bytes(aspect, level) as i32 / texel_size,
                sample_pitch_p: image_view.sample_pitch_bytes(aspect, level) as i32 / texel_size,
                sample_count: image_view.samples() as i32,
                is_float: format.is_float_format(),
            };
            geometry.write(mipmap);
        }

        let extent = image_view.mip_level_extent(0);
        self.write_level_zero_lod(extent);

        let layer_count = image_view.layer_count();
        self.width = extent[0] as i32;
        self.height = extent[1] as i32;
        self.depth = match image_view.view_type() {
            ImageViewType::Dim3d => extent[2],
            ImageViewType::Cube | ImageViewType::CubeArray => layer_count / 6,
            _ => layer_count,
        } as i32;
        self.mip_levels = level_count as i32;
        self.array_layers = layer_count as i32;
        self.sample_count = image_view.samples() as i32;
    }

    /// Writes the geometry of a buffer view, as a one-dimensional image with a single level.
    pub fn update_buffer_view(&mut self, buffer_view: &BufferView) {
        let element_count = buffer_view.element_count();
        let extent = [element_count, 1, 1];

        self.image_view_id = buffer_view.id().get();

        for mipmap in &mut self.texture.mipmap {
            mipmap.buffer = [ptr::null(); 6];
            mipmap.buffer[0] = buffer_view.as_ptr().cast_const();

            LevelGeometry {
                extent,
                pitch_p: element_count as i32,
                slice_p: element_count as i32,
                sample_pitch_p: 0,
                sample_count: 1,
                is_float: buffer_view.format().is_float_format(),
            }
            .write(mipmap);
        }

        self.write_level_zero_lod(extent);

        self.width = element_count as i32;
        self.height = 1;
        self.depth = 1;
        self.mip_levels = 1;
        self.array_layers = 1;
        self.sample_count = 1;
    }

    fn write_level_zero_lod(&mut self, extent: [u32; 3]) {
        let [width, height, depth] = extent.map(|dim| dim as f32);
        let texture = &mut self.texture;

        texture.width_height_lod = [width, width, height, height];
        texture.width_lod = [width; 4];
        texture.height_lod = [height; 4];
        texture.depth_lod = [depth; 4];
    }
}

struct LevelGeometry {
    extent: [u32; 3],
    pitch_p: i32,
    slice_p: i32,
    sample_pitch_p: i32,
    sample_count: i32,
    is_float: bool,
}

impl LevelGeometry {
    fn write(&self, mipmap: &mut Mipmap) {
        let [width, height, depth] = self.extent.map(|dim| dim as i32);

        if self.is_float {
            mipmap.f_width = [width as f32 / 65536.0; 4];
            mipmap.f_height = [height as f32 / 65536.0; 4];
            mipmap.f_depth = [depth as f32 / 65536.0; 4];
        }

        mipmap.u_half = [(0x8000 / width) as i16; 4];
        mipmap.v_half = [(0x8000 / height) as i16; 4];
        mipmap.w_half = [(0x8000 / depth) as i16; 4];

        mipmap.width = [width; 4];
        mipmap.height = [height; 4];
        mipmap.depth = [depth; 4];

        mipmap.one_pitch_p = [1, self.pitch_p, 1, self.pitch_p];
        mipmap.pitch_p = [self.pitch_p; 4];
        mipmap.slice_p = [self.slice_p; 4];
        mipmap.sample_pitch_p = [self.sample_pitch_p; 4];
        mipmap.sample_max = [self.sample_count - 1; 4];
    }
}

/// The record of storage image, input attachment and storage texel buffer descriptors.
///
/// Pitches and sizes are in bytes.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(16))]
pub struct StorageImageDescriptor {
    pub ptr: *mut u8,
    pub width: i32,
    pub height: i32,

    /// The depth of a 3D view, or the number of layers of an arrayed view. Counts whole cubes
    /// for cube views.
    pub depth: i32,

    pub row_pitch_bytes: i32,

    /// The distance between two depth slices, or between two layers if the view has more than
    /// one.
    pub slice_pitch_bytes: i32,

    pub sample_pitch_bytes: i32,
    pub sample_count: i32,
    pub array_layers: i32,

    /// The number of bytes addressable from `ptr`.
    pub size_in_bytes: i32,

    /// The stencil plane of combined depth/stencil images, or null.
    pub stencil_ptr: *mut u8,
    pub stencil_row_pitch_bytes: i32,
    pub stencil_slice_pitch_bytes: i32,
    pub stencil_sample_pitch_bytes: i32,
    pub stencil_size_in_bytes: i32,
}

// SAFETY: Same as `Mipmap`.
unsafe impl Zeroable for StorageImageDescriptor {}

impl StorageImageDescriptor {
    /// Builds the record of an image view.
    pub fn from_image_view(image_view: &ImageView) -> Self {
        let aspect = image_view.primary_aspect();
        let [width, height, depth] = image_view.mip_level_extent(0);
        let layer_count = image_view.layer_count();

        let slice_pitch_bytes = |aspect| {
            if layer_count > 1 {
                image_view.layer_pitch_bytes(aspect)
            } else {
                image_view.slice_pitch_bytes(aspect, 0)
            }
        };

        let mut descriptor = StorageImageDescriptor {
            ptr: image_view.texel_pointer([0; 3], aspect, 0, 0),
            width: width as i32,
            height: height as i32,
            depth: if image_view.view_type().is_cube() {
                layer_count / 6
            } else {
                depth.max(layer_count)
            } as i32,
            row_pitch_bytes: image_view.row_pitch_bytes(aspect, 0) as i32,
            slice_pitch_bytes: slice_pitch_bytes(aspect) as i32,
            sample_pitch_bytes: image_view.sample_pitch_bytes(aspect, 0) as i32,
            sample_count: image_view.samples() as i32,
            array_layers: layer_count as i32,
            size_in_bytes: image_view.size_in_bytes(aspect) as i32,
            ..Zeroable::zeroed()
        };

        if aspect == ImageAspect::Depth
            && image_view
                .format()
                .aspects()
                .contains(ImageAspect::Stencil.into())
        {
            let stencil = ImageAspect::Stencil;
            descriptor.stencil_ptr = image_view.texel_pointer([0; 3], stencil, 0, 0);
            descriptor.stencil_row_pitch_bytes = image_view.row_pitch_bytes(stencil, 0) as i32;
            descriptor.stencil_slice_pitch_bytes = slice_pitch_bytes(stencil) as i32;
            descriptor.stencil_sample_pitch_bytes =
                image_view.sample_pitch_bytes(stencil, 0) as i32;
            descriptor.stencil_size_in_bytes = image_view.size_in_bytes(stencil) as i32;
        }

        descriptor
    }

    /// Builds the record of a buffer view, as a one-dimensional image.
    pub fn from_buffer_view(buffer_view: &BufferView) -> Self {
        let range = buffer_view.range();

        StorageImageDescriptor {
            ptr: buffer_view.as_ptr(),
            width: buffer_view.element_count() as i32,
            height: 1,
            depth: 1,
            row_pitch_bytes: 0,
            slice_pitch_bytes: 0,
            sample_pitch_bytes: 0,
            sample_count: 1,
            array_layers: 1,
            size_in_bytes: (range.end - range.start) as i32,
            ..Zeroable::zeroed()
        }
    }
}

/// The record of uniform and storage buffer descriptors, dynamic or not.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(16))]
pub struct BufferDescriptor {
    /// The start of the range.
    pub ptr: *mut u8,

    /// The size of the range.
    pub size_in_bytes: i32,

    /// The number of bytes from `ptr` to the end of the buffer. Dynamic offsets are checked
    /// against this.
    pub robustness_size: i32,
}

// SAFETY: Same as `Mipmap`.
unsafe impl Zeroable for BufferDescriptor {}

#[cfg(test)]
mod tests {
    use super::{BufferDescriptor, SampledImageDescriptor, StorageImageDescriptor};
    use crate::{
        format::Format,
        image::{
            sampler::{Sampler, SamplerCreateInfo},
            view::{ImageView, ImageViewCreateInfo, ImageViewType},
            Image, ImageAspect, ImageAspects, ImageCreateInfo, ImageSubresourceRange,
        },
    };
    use bytemuck::Zeroable;
    use std::mem::{align_of, size_of};

    #[test]
    fn records_are_aligned() {
        for (size, align) in [
            (size_of::<SampledImageDescriptor>(), align_of::<SampledImageDescriptor>()),
            (size_of::<StorageImageDescriptor>(), align_of::<StorageImageDescriptor>()),
            (size_of::<BufferDescriptor>(), align_of::<BufferDescriptor>()),
        ] {
            assert_eq!(align, 16);
            assert_eq!(size % 16, 0);
        }

        // The texture is at the start of the record.
        assert_eq!(std::mem::offset_of!(SampledImageDescriptor, texture), 0);
    }

    #[test]
    fn sampler_lod_is_clamped() {
        let device = device!();
        let sampler = Sampler::new(
            device,
            SamplerCreateInfo {
                min_lod: 2.0,
                max_lod: 100.0,
                ..Default::default()
            },
        )
        .unwrap();

        let mut descriptor = SampledImageDescriptor::zeroed();
        descriptor.update_sampler(&sampler);
        assert_eq!(descriptor.sampler_id, sampler.id().get());
        assert_eq!(descriptor.texture.min_lod, 2.0);
        assert_eq!(descriptor.texture.max_lod, 13.0);
    }

    #[test]
    fn mipmap_pyramid() {
        let device = device!();
        let image = Image::new(
            device,
            ImageCreateInfo {
                format: Format::R8G8B8A8_UNORM,
                extent: [8, 4, 1],
                mip_levels: 4,
                ..Default::default()
            },
        )
        .unwrap();
        let view = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::COLOR,
                    mip_levels: 1..3,
                    array_layers: 0..1,
                },
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap();

        let mut descriptor = SampledImageDescriptor::zeroed();
        descriptor.update_image_view(&view);

        assert_eq!(descriptor.image_view_id, view.id().get());
        assert_eq!(descriptor.mip_levels, 2);
        assert_eq!([descriptor.width, descriptor.height, descriptor.depth], [4, 2, 1]);

        let mipmap = &descriptor.texture.mipmap;
        assert_eq!(mipmap[0].width, [4; 4]);
        assert_eq!(mipmap[1].width, [2; 4]);
        // Levels past the end of the view replicate its last level.
        assert_eq!(mipmap[14].width, [2; 4]);
        assert_eq!(mipmap[14].buffer[0], mipmap[1].buffer[0]);
        assert_eq!(mipmap[0].one_pitch_p, [1, 4, 1, 4]);
        assert_eq!(mipmap[0].u_half, [0x2000; 4]);
        assert_eq!(
            mipmap[0].buffer[0],
            view.texel_pointer([0; 3], ImageAspect::Color, 0, 0).cast_const(),
        );
        assert_eq!(descriptor.texture.width_height_lod, [4.0, 4.0, 2.0, 2.0]);
        // Not a float format.
        assert_eq!(mipmap[0].f_width, [0.0; 4]);
    }

    #[test]
    fn arrayed_storage_image() {
        let device = device!();
        let image = Image::new(
            device,
            ImageCreateInfo {
                format: Format::R32_UINT,
                extent: [4, 4, 1],
                array_layers: 3,
                ..Default::default()
            },
        )
        .unwrap();
        let view = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                view_type: ImageViewType::Dim2dArray,
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap();

        let descriptor = StorageImageDescriptor::from_image_view(&view);
        assert_eq!(descriptor.depth, 3);
        assert_eq!(descriptor.array_layers, 3);
        assert_eq!(descriptor.row_pitch_bytes, 16);
        assert_eq!(descriptor.slice_pitch_bytes, 64);
        assert_eq!(descriptor.size_in_bytes, 192);
        assert!(descriptor.stencil_ptr.is_null());
    }

    #[test]
    fn depth_stencil_planes() {
        let device = device!();
        let image = Image::new(
            device,
            ImageCreateInfo {
                format: Format::D32_SFLOAT_S8_UINT,
                extent: [4, 4, 1],
                ..Default::default()
            },
        )
        .unwrap();
        let view = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::DEPTH | ImageAspects::STENCIL,
                    ..ImageSubresourceRange::from_image(&image)
                },
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap();

        let descriptor = StorageImageDescriptor::from_image_view(&view);
        assert_eq!(descriptor.row_pitch_bytes, 16);
        assert_eq!(descriptor.stencil_row_pitch_bytes, 4);
        assert_eq!(descriptor.stencil_size_in_bytes, 16);
        assert_eq!(descriptor.stencil_ptr as usize - descriptor.ptr as usize, 64);
    }
}
