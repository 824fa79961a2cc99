//! Image instructions.
//!
//! Sampling instructions and `OpImageQueryLod` are executed by calling a sampling routine, which
//! is looked up through the per-call-site cache of the shader routine. Queries read the extent,
//! the level count and the sample count from the descriptor. Reads, writes and texel pointers
//! address the memory of storage images directly.

use super::{
    codec::{decode_texel, encode_texel},
    simd::{OutOfBoundsBehavior, SimdFloat, SimdInt, SimdPointer, SimdUInt},
    spirv::{Dim, Id, Instruction, Op},
    texel::{texel_offset, TexelCoordinates, TexelLayout},
    texel_behavior, EmitResult, EmitState, ImageType, Operand, Pointer, SpirvShader,
    SAMPLER_INPUT_LANES,
};
use crate::{
    descriptor_set::{
        descriptor::{SampledImageDescriptor, StorageImageDescriptor, Texture},
        layout::DescriptorType,
    },
    device::{Constants, DeviceOwned},
    format::Format,
    image::{ImageAspect, ImageAspects},
};
use smallvec::SmallVec;

/// Describes what a sampling routine has to do. Sampling routines are specialized for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageInstructionSignature {
    pub variant: Variant,
    pub sampler_method: SamplerMethod,

    /// The component returned by gather operations. Zero for other methods.
    pub gather_component: u32,
}

/// Whether the coordinates are projective and whether a depth reference is compared against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    None,
    Dref,
    Proj,
    ProjDref,
}

impl Variant {
    #[inline]
    pub fn is_dref(self) -> bool {
        matches!(self, Variant::Dref | Variant::ProjDref)
    }

    #[inline]
    pub fn is_proj(self) -> bool {
        matches!(self, Variant::Proj | Variant::ProjDref)
    }
}

/// How the level of detail is determined, or which non-filtering operation is performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerMethod {
    /// The level of detail is computed from implicit derivatives.
    Implicit,

    /// Like `Implicit`, with a bias added.
    Bias,

    /// The level of detail is given explicitly.
    Lod,

    /// The level of detail is computed from explicit gradients.
    Grad,

    /// Four texels are gathered.
    Gather,

    /// A single texel is fetched with integer coordinates.
    Fetch,

    /// The level of detail is returned instead of a texel.
    Query,
}

/// The optional operands of an image instruction.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ImageOperands {
    /// The mask of operands that are present, without `ZERO_EXTEND` and `SIGN_EXTEND`.
    pub(crate) mask: u32,
    pub(crate) bias: Option<Id>,
    pub(crate) lod: Option<Id>,
    pub(crate) grad: Option<(Id, Id)>,
    pub(crate) const_offset: Option<Id>,
    pub(crate) sample: Option<Id>,
}

impl ImageOperands {
    pub(crate) const BIAS: u32 = 0x1;
    pub(crate) const LOD: u32 = 0x2;
    pub(crate) const GRAD: u32 = 0x4;
    pub(crate) const CONST_OFFSET: u32 = 0x8;
    pub(crate) const SAMPLE: u32 = 0x40;
    pub(crate) const ZERO_EXTEND: u32 = 0x1000;
    pub(crate) const SIGN_EXTEND: u32 = 0x2000;

    /// Parses the operands of `insn`, whose mask is at word `mask_index` if present.
    ///
    /// # Panics
    ///
    /// - Panics if an operand other than the ones above is present.
    pub(crate) fn parse(insn: Instruction<'_>, mask_index: u32) -> Self {
        if insn.word_count() <= mask_index {
            return ImageOperands::default();
        }

        let mask = insn.word(mask_index) & !(Self::ZERO_EXTEND | Self::SIGN_EXTEND);
        let mut operands = ImageOperands {
            mask,
            ..Default::default()
        };
        let mut cursor = mask_index + 1;
        let mut next = || {
            let id = insn.id(cursor);
            cursor += 1;

            id
        };

        if mask & Self::BIAS != 0 {
            operands.bias = Some(next());
        }

        if mask & Self::LOD != 0 {
            operands.lod = Some(next());
        }

        if mask & Self::GRAD != 0 {
            let dx = next();
            let dy = next();
            operands.grad = Some((dx, dy));
        }

        if mask & Self::CONST_OFFSET != 0 {
            operands.const_offset = Some(next());
        }

        if mask & Self::SAMPLE != 0 {
            operands.sample = Some(next());
        }

        let unsupported =
            mask & !(Self::BIAS | Self::LOD | Self::GRAD | Self::CONST_OFFSET | Self::SAMPLE);
        assert!(unsupported == 0, "unsupported image operands {:#010x}", unsupported);

        operands
    }

    /// Returns the sample operand, for instructions that can have no other operand.
    fn sample_only(self) -> Option<Id> {
        assert!(
            self.mask & !Self::SAMPLE == 0,
            "unsupported image operands {:#010x}",
            self.mask & !Self::SAMPLE,
        );

        self.sample
    }
}

/// Determines the variant and the sampler method of a sampling instruction.
///
/// # Panics
///
/// - Panics if `op` is not a sampling instruction.
pub(crate) fn classify(op: Op, operands: &ImageOperands) -> (Variant, SamplerMethod) {
    let implicit = |variant| {
        if operands.bias.is_some() {
            (variant, SamplerMethod::Bias)
        } else {
            (variant, SamplerMethod::Implicit)
        }
    };
    let explicit = |variant| {
        if operands.grad.is_some() {
            (variant, SamplerMethod::Grad)
        } else {
            (variant, SamplerMethod::Lod)
        }
    };

    match op {
        Op::ImageSampleImplicitLod => implicit(Variant::None),
        Op::ImageSampleExplicitLod => explicit(Variant::None),
        Op::ImageSampleDrefImplicitLod => implicit(Variant::Dref),
        Op::ImageSampleDrefExplicitLod => explicit(Variant::Dref),
        Op::ImageSampleProjImplicitLod => implicit(Variant::Proj),
        Op::ImageSampleProjExplicitLod => explicit(Variant::Proj),
        Op::ImageSampleProjDrefImplicitLod => implicit(Variant::ProjDref),
        Op::ImageSampleProjDrefExplicitLod => explicit(Variant::ProjDref),
        Op::ImageGather => (Variant::None, SamplerMethod::Gather),
        Op::ImageDrefGather => (Variant::Dref, SamplerMethod::Gather),
        Op::ImageFetch => (Variant::None, SamplerMethod::Fetch),
        Op::ImageQueryLod => (Variant::None, SamplerMethod::Query),
        _ => panic!("{:?} is not an image sampling instruction", op),
    }
}

/// A decoded sampling instruction.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ImageInstruction {
    pub(crate) signature: ImageInstructionSignature,
    pub(crate) call_site: usize,
    pub(crate) result_type: Id,
    pub(crate) result_id: Id,
    pub(crate) sampled_image: Id,
    pub(crate) coordinate: Id,
    pub(crate) dref: Option<Id>,
    pub(crate) operands: ImageOperands,
}

impl ImageInstruction {
    pub(crate) fn new(insn: Instruction<'_>, shader: &SpirvShader) -> Self {
        let op = insn
            .op()
            .unwrap_or_else(|| panic!("unsupported SPIR-V opcode {}", insn.opcode()));

        let has_dref = matches!(
            op,
            Op::ImageSampleDrefImplicitLod
                | Op::ImageSampleDrefExplicitLod
                | Op::ImageSampleProjDrefImplicitLod
                | Op::ImageSampleProjDrefExplicitLod
                | Op::ImageDrefGather
        );

        let operands = if op == Op::ImageQueryLod {
            assert!(
                insn.word_count() == 5,
                "OpImageQueryLod can't have image operands",
            );
            ImageOperands::default()
        } else if has_dref || op == Op::ImageGather {
            ImageOperands::parse(insn, 6)
        } else {
            ImageOperands::parse(insn, 5)
        };

        let (variant, sampler_method) = classify(op, &operands);
        let gather_component = if op == Op::ImageGather {
            shader.constant(insn.id(5))[0]
        } else {
            0
        };

        let call_site = *shader
            .call_sites
            .get(&insn.offset())
            .unwrap_or_else(|| panic!("no call site at word {}", insn.offset()));

        ImageInstruction {
            signature: ImageInstructionSignature {
                variant,
                sampler_method,
                gather_component,
            },
            call_site,
            result_type: insn.id(1),
            result_id: insn.id(2),
            sampled_image: insn.id(3),
            coordinate: insn.id(4),
            dref: has_dref.then(|| insn.id(5)),
            operands,
        }
    }
}

impl SpirvShader {
    pub(super) fn emit_image_sample(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let instruction = ImageInstruction::new(insn, self);
        let component_count = self.ty(instruction.result_type).component_count as usize;
        let mut output = [SimdFloat::default(); 4];

        if state.active_lane_mask().any_true() {
            self.emit_image_sample_unconditional(&instruction, &mut output, state);
        }

        state.create_intermediate(
            instruction.result_id,
            output[..component_count.min(4)]
                .iter()
                .map(|component| component.as_uint()),
        );

        EmitResult::Continue
    }

    fn emit_image_sample_unconditional(
        &self,
        instruction: &ImageInstruction,
        output: &mut [SimdFloat; 4],
        state: &mut EmitState<'_>,
    ) {
        let image_descriptor = self
            .descriptor_address(instruction.sampled_image, state)
            .cast_const()
            .cast::<SampledImageDescriptor>();

        // Image operands of `OpImageFetch` have no sampler.
        let sampled_image = self.object(instruction.sampled_image);
        let sampler_id = if self.ty(sampled_image.ty).op == Op::TypeSampledImage {
            let definition = self.definition(sampled_image.offset);
            let sampler_descriptor = if definition.op() == Some(Op::SampledImage) {
                self.descriptor_address(definition.id(4), state)
                    .cast_const()
                    .cast::<SampledImageDescriptor>()
            } else {
                image_descriptor
            };

            // SAFETY: Descriptor pointers address records within a bound descriptor set.
            unsafe { (*sampler_descriptor).sampler_id }
        } else {
            0
        };

        // SAFETY: Same as above.
        let function = unsafe {
            state.routine.image_sampler(
                instruction.call_site,
                instruction.signature,
                image_descriptor,
                sampler_id,
            )
        };

        let input = self.sampler_input(instruction, state);
        let constants: *const Constants = state.routine.device().constants();

        // SAFETY: The texture is the first field of the descriptor, and the input holds
        // `SAMPLER_INPUT_LANES` vectors.
        unsafe {
            function(
                image_descriptor.cast::<Texture>(),
                input.as_ptr(),
                output.as_mut_ptr(),
                constants,
            )
        };
    }

    /// Assembles the input vectors of a sampling routine.
    fn sampler_input(
        &self,
        instruction: &ImageInstruction,
        state: &EmitState<'_>,
    ) -> SmallVec<[SimdFloat; SAMPLER_INPUT_LANES]> {
        let variant = instruction.signature.variant;
        let operands = &instruction.operands;
        let coordinate = self.operand(instruction.coordinate, state);
        let coordinates = coordinate.component_count() - u32::from(variant.is_proj());

        let mut input = SmallVec::new();

        for i in 0..coordinates {
            if variant.is_proj() {
                input.push(coordinate.float(i) / coordinate.float(coordinates));
            } else {
                input.push(coordinate.float(i));
            }
        }

        if let Some(dref) = instruction.dref {
            let dref = self.operand(dref, state).float(0);

            if variant.is_proj() {
                input.push(dref / coordinate.float(coordinates));
            } else {
                input.push(dref);
            }
        }

        if let Some(lod_or_bias) = operands.lod.or(operands.bias) {
            input.push(self.operand(lod_or_bias, state).float(0));
        } else if let Some((dx, dy)) = operands.grad {
            let dx = self.operand(dx, state);
            let dy = self.operand(dy, state);
            input.extend((0..dx.component_count()).map(|j| dx.float(j)));
            input.extend((0..dy.component_count()).map(|j| dy.float(j)));
        } else if instruction.signature.sampler_method == SamplerMethod::Fetch {
            // Fetches without a level of detail read level zero.
            input.push(SimdInt::splat(0).as_float());
        }

        if let Some(offset) = operands.const_offset {
            let offset = self.operand(offset, state);
            input.extend((0..offset.component_count()).map(|j| offset.int(j).as_float()));
        }

        if let Some(sample) = operands.sample {
            input.push(self.operand(sample, state).int(0).as_float());
        }

        assert!(
            input.len() <= SAMPLER_INPUT_LANES,
            "image instruction has {} input components",
            input.len(),
        );
        input.resize(SAMPLER_INPUT_LANES, SimdFloat::default());

        input
    }

    pub(super) fn emit_image_query_size_lod(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        self.emit_image_dimensions(insn, Some(insn.id(4)), state)
    }

    pub(super) fn emit_image_query_size(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        self.emit_image_dimensions(insn, None, state)
    }

    fn emit_image_dimensions(
        &self,
        insn: Instruction<'_>,
        lod: Option<Id>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let result_type = self.ty(insn.id(1));
        let image = insn.id(3);
        let image_type = self.image_type(self.object(image).ty);
        let dimensions = result_type.component_count - u32::from(image_type.arrayed);
        let extent = self.image_extent(image, state);
        let lod = lod.map(|lod| self.operand(lod, state).int(0));

        let mut components: SmallVec<[SimdUInt; 4]> = (0..dimensions as usize)
            .map(|axis| {
                let size = match lod {
                    Some(lod) => SimdInt(std::array::from_fn(|lane| {
                        let size = extent[axis].checked_shr(lod.0[lane] as u32).unwrap_or(0);
                        size.max(1)
                    })),
                    None => SimdInt::splat(extent[axis]),
                };

                size.as_uint()
            })
            .collect();

        if image_type.arrayed {
            components.push(SimdInt::splat(extent[2]).as_uint());
        }

        state.create_intermediate(insn.id(2), components);

        EmitResult::Continue
    }

    pub(super) fn emit_image_query_levels(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let image = insn.id(3);
        let descriptor = self.descriptor_address(image, state);

        let mip_levels = match self.image_descriptor_type(image, state) {
            DescriptorType::CombinedImageSampler
            | DescriptorType::SampledImage
            | DescriptorType::UniformTexelBuffer => {
                // SAFETY: The descriptor type says which record the descriptor holds.
                unsafe { (*descriptor.cast::<SampledImageDescriptor>()).mip_levels }
            }
            ty => panic!("the levels of {:?} descriptors can't be queried", ty),
        };

        state.create_intermediate(insn.id(2), [SimdInt::splat(mip_levels).as_uint()]);

        EmitResult::Continue
    }

    pub(super) fn emit_image_query_samples(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let image = insn.id(3);
        let image_type = self.image_type(self.object(image).ty);
        assert!(
            image_type.dim == Dim::Dim2D && image_type.multisampled,
            "only multisampled 2D images have a sample count",
        );

        let descriptor = self.descriptor_address(image, state);

        // SAFETY: The descriptor type says which record the descriptor holds.
        let sample_count = match self.image_descriptor_type(image, state) {
            DescriptorType::StorageImage => unsafe {
                (*descriptor.cast::<StorageImageDescriptor>()).sample_count
            },
            DescriptorType::CombinedImageSampler
            | DescriptorType::SampledImage
            | DescriptorType::UniformTexelBuffer => unsafe {
                (*descriptor.cast::<SampledImageDescriptor>()).sample_count
            },
            ty => panic!("the samples of {:?} descriptors can't be queried", ty),
        };

        state.create_intermediate(insn.id(2), [SimdInt::splat(sample_count).as_uint()]);

        EmitResult::Continue
    }

    pub(super) fn emit_image_read(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let result_type = self.ty(insn.id(1));
        let image = insn.id(3);
        let image_type = self.image_type(self.object(image).ty);
        let coordinate = self.operand(insn.id(4), state);
        let sample = ImageOperands::parse(insn, 5).sample_only();

        // Subpass data declares no format, it comes from the render pass instead.
        let format = if image_type.dim == Dim::SubpassData {
            let index = self.input_attachment_index(image);
            state
                .routine
                .input_attachment_formats
                .get(index as usize)
                .copied()
                .unwrap_or_else(|| panic!("no format was given for input attachment {}", index))
        } else {
            Option::<Format>::from(image_type.format)
                .unwrap_or_else(|| panic!("storage images read by shader code must have a format"))
        };

        // The sampled type selects the aspect of combined depth/stencil formats.
        let aspects = format.aspects();
        let use_stencil = aspects.contains(ImageAspects::DEPTH | ImageAspects::STENCIL)
            && self.ty(image_type.sampled_type).op == Op::TypeInt;
        let texel_format = if use_stencil {
            Format::S8_UINT
        } else if aspects.contains(ImageAspects::DEPTH) {
            format.aspect_format(ImageAspect::Depth)
        } else {
            format
        };
        let texel_size = texel_format.block_size() as i32;

        let behavior = texel_behavior(state);
        let pointer = self.texel_address(
            image,
            &image_type,
            &coordinate,
            sample,
            texel_size,
            use_stencil,
            behavior,
            state,
        );
        let lane_mask = state.active_lane_mask();
        let mut packed = [SimdInt::default(); 4];

        // SAFETY: The pointer is limited to the memory of the image.
        unsafe {
            match texel_size {
                4 | 8 | 16 => {
                    for (i, word) in packed.iter_mut().take(texel_size as usize / 4).enumerate() {
                        let pointer = pointer.offset_by(SimdInt::splat(4 * i as i32));
                        *word = pointer.load(lane_mask, behavior).as_int();
                    }
                }
                2 => packed[0] = pointer.load_narrow::<2>(lane_mask, behavior).as_int(),
                1 => packed[0] = pointer.load_narrow::<1>(lane_mask, behavior).as_int(),
                _ => panic!("unsupported texel size {}", texel_size),
            }
        }

        let texel = decode_texel(texel_format, packed);
        let component_count = (result_type.component_count as usize).min(4);
        state.create_intermediate(insn.id(2), texel[..component_count].iter().copied());

        EmitResult::Continue
    }

    pub(super) fn emit_image_write(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let image = insn.id(1);
        let image_type = self.image_type(self.object(image).ty);
        let coordinate = self.operand(insn.id(2), state);
        let texel = self.operand(insn.id(3), state);
        let sample = ImageOperands::parse(insn, 4).sample_only();

        let format = Option::<Format>::from(image_type.format)
            .unwrap_or_else(|| panic!("storage images written by shader code must have a format"));
        let components = std::array::from_fn(|i| {
            if (i as u32) < texel.component_count() {
                texel.uint(i as u32)
            } else {
                SimdUInt::default()
            }
        });
        let (packed, texel_size) = encode_texel(format, components);

        let behavior = texel_behavior(state);
        let pointer = self.texel_address(
            image,
            &image_type,
            &coordinate,
            sample,
            texel_size as i32,
            false,
            behavior,
            state,
        );
        let lane_mask = state.stores_and_atomics_mask();

        // SAFETY: The pointer is limited to the memory of the image.
        unsafe {
            match texel_size {
                4 | 8 | 16 => {
                    for (i, &word) in packed.iter().take(texel_size / 4).enumerate() {
                        let pointer = pointer.offset_by(SimdInt::splat(4 * i as i32));
                        pointer.store(word, lane_mask, behavior);
                    }
                }
                2 => pointer.store_narrow::<2>(packed[0], lane_mask, behavior),
                1 => pointer.store_narrow::<1>(packed[0], lane_mask, behavior),
                _ => panic!("unsupported texel size {}", texel_size),
            }
        }

        EmitResult::Continue
    }

    pub(super) fn emit_image_texel_pointer(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        // The image operand is a pointer to the image.
        let image = insn.id(3);
        let pointee = self.object_type(image).element.unwrap_or_default();
        let image_type = self.image_type(pointee);
        let coordinate = self.operand(insn.id(4), state);

        let pointer = self.texel_address(
            image,
            &image_type,
            &coordinate,
            Some(insn.id(5)),
            4,
            false,
            OutOfBoundsBehavior::Nullify,
            state,
        );
        state.create_pointer(insn.id(2), Pointer::Texel(pointer));

        EmitResult::Continue
    }

    pub(super) fn emit_sampled_image_combine_or_split(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        // Both forward the image descriptor. Samplers are found through the definition of
        // `OpSampledImage` results.
        let pointer = state.pointer(insn.id(3));
        state.create_pointer(insn.id(2), pointer);

        EmitResult::Continue
    }

    #[allow(clippy::too_many_arguments)]
    fn texel_address(
        &self,
        image: Id,
        image_type: &ImageType,
        coordinate: &Operand,
        sample: Option<Id>,
        texel_size: i32,
        use_stencil: bool,
        behavior: OutOfBoundsBehavior,
        state: &EmitState<'_>,
    ) -> SimdPointer {
        let descriptor = self.descriptor_address(image, state);

        // SAFETY: Storage images, texel buffers and input attachments have this record.
        let descriptor = unsafe { &*descriptor.cast::<StorageImageDescriptor>() };

        let (base, size, row_pitch, slice_pitch, sample_pitch) = if use_stencil {
            (
                descriptor.stencil_ptr,
                descriptor.stencil_size_in_bytes,
                descriptor.stencil_row_pitch_bytes,
                descriptor.stencil_slice_pitch_bytes,
                descriptor.stencil_sample_pitch_bytes,
            )
        } else {
            (
                descriptor.ptr,
                descriptor.size_in_bytes,
                descriptor.row_pitch_bytes,
                descriptor.slice_pitch_bytes,
                descriptor.sample_pitch_bytes,
            )
        };

        let layout = TexelLayout {
            width: descriptor.width as u32,
            height: descriptor.height as u32,
            depth: descriptor.depth as u32,
            row_pitch,
            slice_pitch,
            sample_pitch,
            sample_count: descriptor.sample_count as u32,
        };

        let components: SmallVec<[SimdInt; 4]> = (0..coordinate.component_count())
            .map(|i| coordinate.int(i))
            .collect();
        let sample = sample
            .map(|sample| self.operand(sample, state))
            .filter(|sample| !sample.is_constant_zero())
            .map(|sample| sample.int(0));
        let subpass = (image_type.dim == Dim::SubpassData)
            .then(|| (state.routine.window_space_position, state.routine.view_id as i32));

        let coordinates = TexelCoordinates {
            components: &components,
            arrayed: image_type.arrayed,
            cube: image_type.dim == Dim::Cube,
            sample,
            subpass,
        };
        let offsets = texel_offset(&coordinates, &layout, texel_size, behavior);

        SimdPointer::new(base, size.max(0) as usize).offset_by(offsets)
    }

    fn descriptor_address(&self, id: Id, state: &EmitState<'_>) -> *mut u8 {
        match state.pointer(id) {
            Pointer::Descriptor(pointer) => pointer,
            _ => panic!("{} does not refer to a descriptor", id),
        }
    }

    fn image_descriptor_type(&self, image: Id, state: &EmitState<'_>) -> DescriptorType {
        let decorations = self.descriptor_decorations(image);

        state
            .routine
            .pipeline_layout
            .descriptor_type(decorations.set, decorations.binding)
    }

    /// Returns the width, height and depth of an image, from its descriptor.
    fn image_extent(&self, image: Id, state: &EmitState<'_>) -> [i32; 3] {
        let descriptor = self.descriptor_address(image, state);

        match self.image_descriptor_type(image, state) {
            DescriptorType::StorageImage
            | DescriptorType::StorageTexelBuffer
            | DescriptorType::InputAttachment => {
                // SAFETY: The descriptor type says which record the descriptor holds.
                let descriptor = unsafe { &*descriptor.cast::<StorageImageDescriptor>() };
                [descriptor.width, descriptor.height, descriptor.depth]
            }
            DescriptorType::CombinedImageSampler
            | DescriptorType::SampledImage
            | DescriptorType::UniformTexelBuffer => {
                // SAFETY: Same as above.
                let descriptor = unsafe { &*descriptor.cast::<SampledImageDescriptor>() };
                [descriptor.width, descriptor.height, descriptor.depth]
            }
            ty => panic!("the size of {:?} descriptors can't be queried", ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, ImageOperands, SamplerMethod, Variant};
    use crate::{
        shader::spirv::{Id, Op},
        tests::SpirvBuilder,
    };

    /// Parses the operands of an `OpImageSampleExplicitLod` whose operand mask is `mask`.
    fn sample_operands(mask: u32, operands: &[u32]) -> ImageOperands {
        let mut b = SpirvBuilder::new();
        let mut words = vec![b.id(), b.id(), b.id(), b.id(), mask];
        words.extend_from_slice(operands);
        b.code(Op::ImageSampleExplicitLod, &words);

        let spirv = b.build();
        let insn = spirv
            .instructions()
            .find(|insn| insn.op() == Some(Op::ImageSampleExplicitLod))
            .unwrap();

        ImageOperands::parse(insn, 5)
    }

    #[test]
    fn operand_parsing() {
        let lod = sample_operands(ImageOperands::LOD | ImageOperands::SIGN_EXTEND, &[7]);
        assert_eq!(lod.mask, ImageOperands::LOD);
        assert_eq!(lod.lod, Some(Id::new(7)));
        assert_eq!(lod.bias, None);

        let mixed = sample_operands(
            ImageOperands::BIAS
                | ImageOperands::CONST_OFFSET
                | ImageOperands::SAMPLE
                | ImageOperands::ZERO_EXTEND,
            &[3, 4, 5],
        );
        assert_eq!(
            mixed.mask,
            ImageOperands::BIAS | ImageOperands::CONST_OFFSET | ImageOperands::SAMPLE,
        );
        assert_eq!(mixed.bias, Some(Id::new(3)));
        assert_eq!(mixed.const_offset, Some(Id::new(4)));
        assert_eq!(mixed.sample, Some(Id::new(5)));

        let grad = sample_operands(ImageOperands::GRAD | ImageOperands::CONST_OFFSET, &[8, 9, 10]);
        assert_eq!(grad.grad, Some((Id::new(8), Id::new(9))));
        assert_eq!(grad.const_offset, Some(Id::new(10)));
        assert_eq!(grad.lod, None);
    }

    #[test]
    fn unsupported_operands() {
        // Offset
        assert_should_panic!("unsupported image operands 0x00000010", {
            sample_operands(0x10, &[1]);
        });

        // MinLod, after a supported operand.
        assert_should_panic!("unsupported image operands 0x00000080", {
            sample_operands(ImageOperands::LOD | 0x80, &[1, 2]);
        });
    }

    #[test]
    fn classification() {
        let none = ImageOperands::default();
        let bias = ImageOperands {
            mask: ImageOperands::BIAS,
            bias: Some(Id::new(9)),
            ..Default::default()
        };
        let grad = ImageOperands {
            mask: ImageOperands::GRAD,
            grad: Some((Id::new(9), Id::new(10))),
            ..Default::default()
        };

        assert_eq!(
            classify(Op::ImageSampleImplicitLod, &none),
            (Variant::None, SamplerMethod::Implicit),
        );
        assert_eq!(
            classify(Op::ImageSampleImplicitLod, &bias),
            (Variant::None, SamplerMethod::Bias),
        );
        assert_eq!(
            classify(Op::ImageSampleDrefExplicitLod, &none),
            (Variant::Dref, SamplerMethod::Lod),
        );
        assert_eq!(
            classify(Op::ImageSampleProjDrefExplicitLod, &grad),
            (Variant::ProjDref, SamplerMethod::Grad),
        );
        assert_eq!(
            classify(Op::ImageDrefGather, &none),
            (Variant::Dref, SamplerMethod::Gather),
        );
        assert_eq!(
            classify(Op::ImageFetch, &none),
            (Variant::None, SamplerMethod::Fetch),
        );
        assert_eq!(
            classify(Op::ImageQueryLod, &none),
            (Variant::None, SamplerMethod::Query),
        );

        assert_should_panic!("is not an image sampling instruction", {
            classify(Op::ImageRead, &none);
        });
    }

    #[test]
    fn variants() {
        assert!(!Variant::None.is_dref() && !Variant::None.is_proj());
        assert!(Variant::Dref.is_dref() && !Variant::Dref.is_proj());
        assert!(Variant::ProjDref.is_dref() && Variant::ProjDref.is_proj());
    }
}
