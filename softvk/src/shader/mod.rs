//! Analysis and execution of SPIR-V shader modules.
//!
//! A [`SpirvShader`] is created once per module. Creating it walks the module and records its
//! types, constants, decorations and variables, and numbers every image sampling instruction as
//! a *call site*. A [`ShaderRoutine`] then executes the entry point one instruction at a time, on
//! [`WIDTH`] lanes at once.
//!
//! # Values
//!
//! Every result of an instruction is either an intermediate value, made of one lane vector per
//! scalar component, or a pointer. Pointers address descriptors inside bound descriptor sets,
//! components of variables, or texels of storage images.
//!
//! # Image sampling
//!
//! Sampling instructions are not executed by this crate. Each one calls a native
//! [`ImageSamplerFn`] that is specialized for the sampler and the image view being used, and that
//! is obtained from an [`ImageSamplerResolver`]. A routine remembers the last function used at
//! every call site, so that the resolver is only called again when the image descriptor or the
//! sampler changes.
//!
//! [`ImageSamplerResolver`]: crate::device::ImageSamplerResolver

pub use self::routine::{
    InterfaceValues, SamplerCacheEntry, ShaderRoutine, ShaderRoutineCreateInfo,
};
use self::{
    simd::{SimdFloat, SimdInt, SimdPointer, SimdUInt, WIDTH},
    spirv::{BuiltIn, Decoration, Dim, Id, ImageFormat, Instruction, Op, Spirv, StorageClass},
};
use crate::{
    descriptor_set::descriptor::Texture,
    device::{Constants, Device, DeviceOwned},
    macros::impl_id_counter,
};
use foldhash::HashMap;
use log::debug;
use smallvec::SmallVec;
use std::{
    num::NonZero,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

pub mod codec;
pub mod image;
pub mod routine;
pub mod simd;
pub mod spirv;
pub mod texel;

/// The number of input vectors of an [`ImageSamplerFn`].
pub const SAMPLER_INPUT_LANES: usize = 16;

/// A native function that executes an image sampling instruction.
///
/// The arguments are the texture of the sampled image descriptor, [`SAMPLER_INPUT_LANES`] input
/// vectors, four output vectors, and the constant tables of the device. Integer inputs such as
/// offsets and sample indices are passed as their bit patterns.
pub type ImageSamplerFn = unsafe extern "C" fn(
    texture: *const Texture,
    input: *const SimdFloat,
    output: *mut SimdFloat,
    constants: *const Constants,
);

/// A SPIR-V module that has been analysed for execution.
#[derive(Debug)]
pub struct SpirvShader {
    device: Arc<Device>,
    id: NonZero<u32>,
    spirv: Arc<Spirv>,

    entry_point_name: String,
    entry_block: usize,

    types: HashMap<Id, Type>,
    objects: HashMap<Id, Object>,
    decorations: HashMap<Id, Decorations>,
    descriptor_decorations: HashMap<Id, DescriptorDecorations>,
    global_variables: Vec<Id>,

    // Label of every block, to the word offset of the label.
    blocks: HashMap<Id, usize>,

    // Word offset of every sampling instruction, to its call site.
    call_sites: HashMap<usize, usize>,
}

impl SpirvShader {
    /// Analyses a module, for execution of its first entry point.
    ///
    /// # Panics
    ///
    /// - Panics if the module has no entry point, or if the entry point has no body.
    /// - Panics if a type or a decoration that is used by the module is not supported.
    pub fn new(device: Arc<Device>, spirv: Spirv) -> Arc<SpirvShader> {
        let spirv = Arc::new(spirv);
        let mut shader = SpirvShader {
            device,
            id: Self::next_id(),
            spirv: spirv.clone(),
            entry_point_name: String::new(),
            entry_block: 0,
            types: HashMap::default(),
            objects: HashMap::default(),
            decorations: HashMap::default(),
            descriptor_decorations: HashMap::default(),
            global_variables: Vec::new(),
            blocks: HashMap::default(),
            call_sites: HashMap::default(),
        };

        let mut entry_function = None;
        let mut current_function = None;
        let mut entry_block = None;

        for insn in spirv.instructions() {
            match insn.op() {
                Some(Op::EntryPoint) => {
                    if entry_function.is_none() {
                        entry_function = Some(insn.id(2));
                        shader.entry_point_name = insn.string(3);
                    }
                }
                Some(Op::Function) => current_function = Some(insn.id(2)),
                Some(Op::FunctionEnd) => current_function = None,
                Some(Op::Label) => {
                    shader.blocks.insert(insn.id(1), insn.offset());

                    if entry_block.is_none() && current_function == entry_function {
                        entry_block = Some(insn.offset());
                    }
                }
                Some(Op::Variable) => {
                    shader.analyse_variable(insn);

                    if current_function.is_none() {
                        shader.global_variables.push(insn.id(2));
                    }
                }
                _ => shader.analyse(insn),
            }
        }

        assert!(entry_function.is_some(), "the module has no entry point");
        shader.entry_block = entry_block
            .unwrap_or_else(|| panic!("the entry point `{}` has no body", shader.entry_point_name));

        debug!(
            "analysed shader {} with entry point `{}`: {} image call sites, {} descriptors",
            shader.id,
            shader.entry_point_name,
            shader.call_sites.len(),
            shader.descriptor_decorations.len(),
        );

        Arc::new(shader)
    }

    /// Returns the name of the entry point that is executed.
    #[inline]
    pub fn entry_point_name(&self) -> &str {
        &self.entry_point_name
    }

    /// Returns the number of image sampling instructions of the module.
    #[inline]
    pub fn image_call_site_count(&self) -> usize {
        self.call_sites.len()
    }

    /// Returns the `(set, binding)` pairs of the descriptors that the module declares.
    pub fn descriptor_bindings(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.global_variables.iter().filter_map(|id| {
            self.descriptor_decorations
                .get(id)
                .map(|decorations| (decorations.set, decorations.binding))
        })
    }

    fn analyse(&mut self, insn: Instruction<'_>) {
        let Some(op) = insn.op() else {
            return;
        };

        match op {
            Op::Decorate => self.analyse_decoration(insn),
            Op::TypeVoid | Op::TypeFunction => self.declare_type(insn, 0, None, None),
            Op::TypeBool
            | Op::TypeInt
            | Op::TypeFloat
            | Op::TypeImage
            | Op::TypeSampler => self.declare_type(insn, 1, None, None),
            Op::TypeSampledImage => self.declare_type(insn, 1, Some(insn.id(2)), None),
            Op::TypeVector | Op::TypeMatrix => {
                let count = insn.word(3) * self.ty(insn.id(2)).component_count;
                self.declare_type(insn, count, Some(insn.id(2)), None);
            }
            Op::TypeArray => {
                let length = self.constant(insn.id(3))[0];
                let count = length * self.ty(insn.id(2)).component_count;
                self.declare_type(insn, count, Some(insn.id(2)), None);
            }
            Op::TypeRuntimeArray => self.declare_type(insn, 0, Some(insn.id(2)), None),
            Op::TypeStruct => {
                let count = (2..insn.word_count())
                    .map(|index| self.ty(insn.id(index)).component_count)
                    .sum();
                self.declare_type(insn, count, None, None);
            }
            Op::TypePointer => {
                let storage_class = StorageClass::from_num(insn.word(2))
                    .unwrap_or_else(|| panic!("unsupported storage class {}", insn.word(2)));
                self.declare_type(insn, 1, Some(insn.id(3)), Some(storage_class));
            }
            Op::Constant => {
                let values = insn.words()[3..].iter().copied().collect();
                self.declare_constant(insn, values);
            }
            Op::ConstantTrue => self.declare_constant(insn, SmallVec::from_slice(&[u32::MAX])),
            Op::ConstantFalse => self.declare_constant(insn, SmallVec::from_slice(&[0])),
            Op::ConstantNull => {
                let count = self.ty(insn.id(1)).component_count as usize;
                self.declare_constant(insn, SmallVec::from_elem(0, count));
            }
            Op::ConstantComposite => {
                let values = (3..insn.word_count())
                    .flat_map(|index| self.constant(insn.id(index)).iter().copied())
                    .collect();
                self.declare_constant(insn, values);
            }
            Op::ImageSampleImplicitLod
            | Op::ImageSampleExplicitLod
            | Op::ImageSampleDrefImplicitLod
            | Op::ImageSampleDrefExplicitLod
            | Op::ImageSampleProjImplicitLod
            | Op::ImageSampleProjExplicitLod
            | Op::ImageSampleProjDrefImplicitLod
            | Op::ImageSampleProjDrefExplicitLod
            | Op::ImageFetch
            | Op::ImageGather
            | Op::ImageDrefGather
            | Op::ImageQueryLod => {
                let call_site = self.call_sites.len();
                self.call_sites.insert(insn.offset(), call_site);
                self.declare_result(insn, ObjectKind::Intermediate);
            }
            Op::Load => {
                let kind = match self.ty(insn.id(1)).op {
                    Op::TypeImage | Op::TypeSampler | Op::TypeSampledImage | Op::TypePointer => {
                        ObjectKind::Pointer
                    }
                    _ => ObjectKind::Intermediate,
                };
                self.declare_result(insn, kind);
                self.propagate_descriptor_decorations(insn.id(3), insn.id(2));
            }
            Op::AccessChain | Op::InBoundsAccessChain | Op::SampledImage | Op::Image => {
                self.declare_result(insn, ObjectKind::Pointer);
                self.propagate_descriptor_decorations(insn.id(3), insn.id(2));
            }
            Op::ImageTexelPointer => self.declare_result(insn, ObjectKind::Pointer),
            Op::Undef
            | Op::VectorShuffle
            | Op::CompositeConstruct
            | Op::CompositeExtract
            | Op::ImageRead
            | Op::ImageQueryFormat
            | Op::ImageQueryOrder
            | Op::ImageQuerySizeLod
            | Op::ImageQuerySize
            | Op::ImageQueryLevels
            | Op::ImageQuerySamples
            | Op::ConvertFToU
            | Op::ConvertFToS
            | Op::ConvertSToF
            | Op::ConvertUToF
            | Op::Bitcast
            | Op::IAdd
            | Op::FAdd
            | Op::ISub
            | Op::FSub
            | Op::IMul
            | Op::FMul
            | Op::AtomicIAdd
            | Op::Phi
            | Op::FunctionParameter => self.declare_result(insn, ObjectKind::Intermediate),
            _ => {}
        }
    }

    fn analyse_decoration(&mut self, insn: Instruction<'_>) {
        let decorations = self.decorations.entry(insn.id(1)).or_default();

        match Decoration::from_num(insn.word(2)) {
            Some(Decoration::Location) => decorations.location = Some(insn.word(3)),
            Some(Decoration::DescriptorSet) => decorations.descriptor_set = Some(insn.word(3)),
            Some(Decoration::Binding) => decorations.binding = Some(insn.word(3)),
            Some(Decoration::InputAttachmentIndex) => {
                decorations.input_attachment_index = Some(insn.word(3))
            }
            Some(Decoration::BuiltIn) => decorations.built_in = BuiltIn::from_num(insn.word(3)),
            _ => {}
        }
    }

    fn analyse_variable(&mut self, insn: Instruction<'_>) {
        let id = insn.id(2);
        let storage_class = StorageClass::from_num(insn.word(3))
            .unwrap_or_else(|| panic!("unsupported storage class {}", insn.word(3)));

        self.declare_result(insn, ObjectKind::Variable(storage_class));

        if matches!(
            storage_class,
            StorageClass::UniformConstant | StorageClass::Uniform | StorageClass::StorageBuffer
        ) {
            let Some(decorations) = self.decorations.get(&id) else {
                return;
            };

            if let (Some(set), Some(binding)) = (decorations.descriptor_set, decorations.binding) {
                let descriptor_decorations = DescriptorDecorations {
                    set,
                    binding,
                    input_attachment_index: decorations.input_attachment_index,
                };
                self.descriptor_decorations.insert(id, descriptor_decorations);
            }
        }
    }

    fn declare_type(
        &mut self,
        insn: Instruction<'_>,
        component_count: u32,
        element: Option<Id>,
        storage_class: Option<StorageClass>,
    ) {
        let ty = Type {
            op: insn.op().unwrap_or(Op::Nop),
            offset: insn.offset(),
            component_count,
            element,
            storage_class,
        };
        self.types.insert(insn.id(1), ty);
    }

    fn declare_constant(&mut self, insn: Instruction<'_>, values: SmallVec<[u32; 4]>) {
        let object = Object {
            ty: insn.id(1),
            offset: insn.offset(),
            kind: ObjectKind::Constant(values),
        };
        self.objects.insert(insn.id(2), object);
    }

    fn declare_result(&mut self, insn: Instruction<'_>, kind: ObjectKind) {
        let object = Object {
            ty: insn.id(1),
            offset: insn.offset(),
            kind,
        };
        self.objects.insert(insn.id(2), object);
    }

    fn propagate_descriptor_decorations(&mut self, from: Id, to: Id) {
        if let Some(&decorations) = self.descriptor_decorations.get(&from) {
            self.descriptor_decorations.insert(to, decorations);
        }
    }

    #[track_caller]
    pub(crate) fn ty(&self, id: Id) -> &Type {
        self.types
            .get(&id)
            .unwrap_or_else(|| panic!("{} is not a type", id))
    }

    #[track_caller]
    pub(crate) fn object(&self, id: Id) -> &Object {
        self.objects
            .get(&id)
            .unwrap_or_else(|| panic!("{} is not an object", id))
    }

    #[track_caller]
    pub(crate) fn object_type(&self, id: Id) -> &Type {
        self.ty(self.object(id).ty)
    }

    #[track_caller]
    pub(crate) fn constant(&self, id: Id) -> &[u32] {
        match &self.object(id).kind {
            ObjectKind::Constant(values) => values,
            _ => panic!("{} is not a constant", id),
        }
    }

    /// Returns the instruction that defines a type or an object.
    pub(crate) fn definition(&self, offset: usize) -> Instruction<'_> {
        self.spirv.instruction_at(offset)
    }

    /// Returns the description of an image type. Sampled image types are looked through.
    pub(crate) fn image_type(&self, id: Id) -> ImageType {
        let ty = self.ty(id);

        if ty.op == Op::TypeSampledImage {
            return self.image_type(ty.element.unwrap_or_default());
        }

        assert!(ty.op == Op::TypeImage, "{} is not an image type", id);
        let definition = self.definition(ty.offset);

        ImageType {
            sampled_type: definition.id(2),
            dim: Dim::from_num(definition.word(3)).unwrap_or_else(|| {
                panic!("unsupported image dimensionality {}", definition.word(3))
            }),
            arrayed: definition.word(5) != 0,
            multisampled: definition.word(6) != 0,
            format: ImageFormat::from_num(definition.word(8))
                .unwrap_or_else(|| panic!("unsupported image format {}", definition.word(8))),
        }
    }

    pub(crate) fn descriptor_decorations(&self, id: Id) -> DescriptorDecorations {
        self.descriptor_decorations
            .get(&id)
            .copied()
            .unwrap_or_else(|| panic!("{} does not refer to a descriptor", id))
    }

    pub(crate) fn input_attachment_index(&self, id: Id) -> u32 {
        self.descriptor_decorations(id)
            .input_attachment_index
            .unwrap_or_else(|| panic!("{} has no input attachment index", id))
    }

    pub(crate) fn operand(&self, id: Id, state: &EmitState<'_>) -> Operand {
        match &self.object(id).kind {
            ObjectKind::Constant(values) => Operand {
                components: values.iter().map(|&value| SimdUInt::splat(value)).collect(),
                is_constant: true,
            },
            _ => Operand {
                components: state.intermediate(id).iter().copied().collect(),
                is_constant: false,
            },
        }
    }

    /// Executes the entry point with `routine` as its context.
    pub(crate) fn execute(
        &self,
        routine: &mut ShaderRoutine,
        inputs: &InterfaceValues,
    ) -> InterfaceValues {
        let mut state = EmitState::new(routine);

        for &variable in &self.global_variables {
            self.initialize_global_variable(variable, inputs, &mut state);
        }

        let mut offset = self.entry_block;

        loop {
            let insn = self.spirv.instruction_at(offset);
            offset += insn.word_count() as usize;

            match self.emit(insn, &mut state) {
                EmitResult::Continue => {}
                EmitResult::Branch(label) => {
                    offset = *self
                        .blocks
                        .get(&label)
                        .unwrap_or_else(|| panic!("branch to unknown block {}", label));
                }
                EmitResult::Return => break,
            }
        }

        let mut outputs = InterfaceValues::new();

        for variable in &self.global_variables {
            let object = &self.objects[variable];

            if !matches!(object.kind, ObjectKind::Variable(StorageClass::Output)) {
                continue;
            }

            let location = self
                .decorations
                .get(variable)
                .and_then(|decorations| decorations.location);

            if let (Some(location), Some(storage)) = (location, state.variables.get(variable)) {
                outputs.set(location, storage.iter().copied());
            }
        }

        outputs
    }

    fn initialize_global_variable(
        &self,
        id: Id,
        inputs: &InterfaceValues,
        state: &mut EmitState<'_>,
    ) {
        let object = self.object(id);
        let ObjectKind::Variable(storage_class) = object.kind else {
            return;
        };

        match storage_class {
            StorageClass::UniformConstant | StorageClass::Uniform | StorageClass::StorageBuffer => {
                if let Some(decorations) = self.descriptor_decorations.get(&id) {
                    let pointer = state
                        .routine
                        .descriptor_pointer(decorations.set, decorations.binding);
                    state.create_pointer(id, Pointer::Descriptor(pointer));
                }
            }
            _ => {
                let mut storage = self.variable_storage(id);
                let decorations = self.decorations.get(&id);

                if storage_class == StorageClass::Input {
                    if let Some(built_in) = decorations.and_then(|d| d.built_in) {
                        self.built_in_input(built_in, &mut storage, state);
                    } else if let Some(values) = decorations
                        .and_then(|d| d.location)
                        .and_then(|location| inputs.get(location))
                    {
                        for (component, &value) in storage.iter_mut().zip(values) {
                            *component = value;
                        }
                    }
                }

                state.variables.insert(id, storage);
                state.create_pointer(
                    id,
                    Pointer::Variable {
                        variable: id,
                        offsets: SimdInt::splat(0),
                    },
                );
            }
        }
    }

    /// Returns zeroed or initialized storage for a variable.
    fn variable_storage(&self, id: Id) -> Vec<SimdUInt> {
        let object = self.object(id);
        let pointee = self.ty(object.ty).element.unwrap_or_default();
        let mut storage = vec![SimdUInt::default(); self.ty(pointee).component_count as usize];

        let definition = self.definition(object.offset);

        if definition.word_count() > 4 {
            for (component, &value) in storage.iter_mut().zip(self.constant(definition.id(4))) {
                *component = SimdUInt::splat(value);
            }
        }

        storage
    }

    fn built_in_input(&self, built_in: BuiltIn, storage: &mut [SimdUInt], state: &EmitState<'_>) {
        let routine = &*state.routine;

        match built_in {
            BuiltIn::FragCoord => {
                let [x, y] = routine.window_space_position;
                let values = [
                    x.to_float().map(|x| x + 0.5),
                    y.to_float().map(|y| y + 0.5),
                    SimdFloat::splat(0.0),
                    SimdFloat::splat(1.0),
                ];

                for (component, value) in storage.iter_mut().zip(values) {
                    *component = value.as_uint();
                }
            }
            BuiltIn::ViewIndex => storage[0] = SimdUInt::splat(routine.view_id),
            BuiltIn::HelperInvocation => storage[0] = routine.helper_lane_mask.as_uint(),
            BuiltIn::LocalInvocationIndex => {
                storage[0] = SimdUInt(std::array::from_fn(|lane| lane as u32));
            }
            _ => {}
        }
    }

    fn emit(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let op = insn
            .op()
            .unwrap_or_else(|| panic!("unsupported SPIR-V opcode {}", insn.opcode()));

        match op {
            Op::Nop | Op::Line | Op::Label | Op::SelectionMerge | Op::LoopMerge => {
                EmitResult::Continue
            }
            Op::Variable => self.emit_variable(insn, state),
            Op::Undef => {
                let count = self.ty(insn.id(1)).component_count as usize;
                state.create_intermediate(insn.id(2), vec![SimdUInt::default(); count]);

                EmitResult::Continue
            }
            Op::Load => self.emit_load(insn, state),
            Op::Store => self.emit_store(insn, state),
            Op::AccessChain | Op::InBoundsAccessChain => self.emit_access_chain(insn, state),
            Op::CompositeConstruct => self.emit_composite_construct(insn, state),
            Op::CompositeExtract => self.emit_composite_extract(insn, state),
            Op::VectorShuffle => self.emit_vector_shuffle(insn, state),
            Op::IAdd | Op::ISub | Op::IMul | Op::FAdd | Op::FSub | Op::FMul => {
                self.emit_binary_op(op, insn, state)
            }
            Op::ConvertFToU | Op::ConvertFToS | Op::ConvertSToF | Op::ConvertUToF | Op::Bitcast => {
                self.emit_unary_op(op, insn, state)
            }
            Op::ImageSampleImplicitLod
            | Op::ImageSampleExplicitLod
            | Op::ImageSampleDrefImplicitLod
            | Op::ImageSampleDrefExplicitLod
            | Op::ImageSampleProjImplicitLod
            | Op::ImageSampleProjExplicitLod
            | Op::ImageSampleProjDrefImplicitLod
            | Op::ImageSampleProjDrefExplicitLod
            | Op::ImageFetch
            | Op::ImageGather
            | Op::ImageDrefGather
            | Op::ImageQueryLod => self.emit_image_sample(insn, state),
            Op::ImageQuerySizeLod => self.emit_image_query_size_lod(insn, state),
            Op::ImageQuerySize => self.emit_image_query_size(insn, state),
            Op::ImageQueryLevels => self.emit_image_query_levels(insn, state),
            Op::ImageQuerySamples => self.emit_image_query_samples(insn, state),
            Op::ImageRead => self.emit_image_read(insn, state),
            Op::ImageWrite => self.emit_image_write(insn, state),
            Op::ImageTexelPointer => self.emit_image_texel_pointer(insn, state),
            Op::SampledImage | Op::Image => self.emit_sampled_image_combine_or_split(insn, state),
            Op::AtomicIAdd => self.emit_atomic_iadd(insn, state),
            Op::Branch => EmitResult::Branch(insn.id(1)),
            Op::Return | Op::ReturnValue => EmitResult::Return,
            _ => panic!("unsupported SPIR-V instruction {:?}", op),
        }
    }

    fn emit_variable(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let id = insn.id(2);
        let storage = self.variable_storage(id);

        state.variables.insert(id, storage);
        state.create_pointer(
            id,
            Pointer::Variable {
                variable: id,
                offsets: SimdInt::splat(0),
            },
        );

        EmitResult::Continue
    }

    fn emit_load(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let result_type = self.ty(insn.id(1));
        let result_id = insn.id(2);
        let pointer = state.pointer(insn.id(3));

        match pointer {
            Pointer::Descriptor(_) => {
                assert!(
                    matches!(
                        result_type.op,
                        Op::TypeImage | Op::TypeSampler | Op::TypeSampledImage
                    ),
                    "loading a {:?} from a descriptor is not supported",
                    result_type.op,
                );
                state.create_pointer(result_id, pointer);
            }
            Pointer::Variable { variable, offsets } => {
                let components =
                    state.load_variable(variable, offsets, result_type.component_count);
                state.create_intermediate(result_id, components);
            }
            Pointer::Texel(texel) => {
                // SAFETY: Texel pointers are limited to the memory of the image, which the bound
                // descriptor set keeps alive. Both behaviors check every lane against the limit.
                let value = unsafe { texel.load(state.active_lane_mask(), texel_behavior(state)) };
                state.create_intermediate(result_id, [value]);
            }
        }

        EmitResult::Continue
    }

    fn emit_store(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let pointer = state.pointer(insn.id(1));
        let value = self.operand(insn.id(2), state);

        match pointer {
            Pointer::Descriptor(_) => panic!("descriptors can't be stored to"),
            Pointer::Variable { variable, offsets } => {
                let lane_mask = state.active_lane_mask();
                state.store_variable(variable, offsets, &value.components, lane_mask);
            }
            Pointer::Texel(texel) => {
                let lane_mask = state.stores_and_atomics_mask();
                // SAFETY: Same as for loads.
                unsafe { texel.store(value.uint(0), lane_mask, texel_behavior(state)) };
            }
        }

        EmitResult::Continue
    }

    fn emit_access_chain(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let result_id = insn.id(2);
        let base_id = insn.id(3);

        match state.pointer(base_id) {
            Pointer::Descriptor(pointer) => {
                assert!(
                    insn.word_count() == 5,
                    "access chains into descriptors must have exactly one index",
                );

                let decorations = self.descriptor_decorations(base_id);
                let set_layout = state.routine.pipeline_layout.set_layout(decorations.set);
                let binding = set_layout.binding(decorations.binding);
                let index = self.uniform_index(insn.id(4), state);

                assert!(
                    index < binding.descriptor_count,
                    "descriptor {} is out of range for binding {} of set {}",
                    index,
                    decorations.binding,
                    decorations.set,
                );

                let stride = set_layout.binding_stride(decorations.binding);
                let pointer = pointer.wrapping_add(stride * index as usize);
                state.create_pointer(result_id, Pointer::Descriptor(pointer));
            }
            Pointer::Variable { variable, offsets } => {
                let pointee = self.object_type(base_id).element.unwrap_or_default();
                let indices: SmallVec<[ChainIndex; 4]> = (4..insn.word_count())
                    .map(|index| self.chain_index(insn.id(index), state))
                    .collect();
                let (_, offset) = self.walk_composite(pointee, &indices);

                state.create_pointer(
                    result_id,
                    Pointer::Variable {
                        variable,
                        offsets: offsets + offset,
                    },
                );
            }
            Pointer::Texel(_) => panic!("texel pointers can't be indexed"),
        }

        EmitResult::Continue
    }

    fn emit_composite_construct(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let components: SmallVec<[SimdUInt; 4]> = (3..insn.word_count())
            .flat_map(|index| self.operand(insn.id(index), state).components)
            .collect();
        state.create_intermediate(insn.id(2), components);

        EmitResult::Continue
    }

    fn emit_composite_extract(
        &self,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let count = self.ty(insn.id(1)).component_count as usize;
        let composite_id = insn.id(3);
        let indices: SmallVec<[ChainIndex; 4]> = (4..insn.word_count())
            .map(|index| ChainIndex::Literal(insn.word(index)))
            .collect();
        let (_, offset) = self.walk_composite(self.object(composite_id).ty, &indices);
        let start = offset.0[0] as usize;

        let composite = self.operand(composite_id, state);
        state.create_intermediate(
            insn.id(2),
            composite.components[start..start + count].iter().copied(),
        );

        EmitResult::Continue
    }

    fn emit_vector_shuffle(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let first = self.operand(insn.id(3), state);
        let second = self.operand(insn.id(4), state);
        let first_count = first.components.len();

        let components: SmallVec<[SimdUInt; 4]> = (5..insn.word_count())
            .map(|index| match insn.word(index) {
                u32::MAX => SimdUInt::default(),
                selector if (selector as usize) < first_count => {
                    first.components[selector as usize]
                }
                selector => second.components[selector as usize - first_count],
            })
            .collect();
        state.create_intermediate(insn.id(2), components);

        EmitResult::Continue
    }

    fn emit_binary_op(
        &self,
        op: Op,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let lhs = self.operand(insn.id(3), state);
        let rhs = self.operand(insn.id(4), state);

        let components: SmallVec<[SimdUInt; 4]> = (0..lhs.component_count())
            .map(|i| match op {
                Op::IAdd => (lhs.int(i) + rhs.int(i)).as_uint(),
                Op::ISub => (lhs.int(i) - rhs.int(i)).as_uint(),
                Op::IMul => (lhs.int(i) * rhs.int(i)).as_uint(),
                Op::FAdd => (lhs.float(i) + rhs.float(i)).as_uint(),
                Op::FSub => (lhs.float(i) - rhs.float(i)).as_uint(),
                Op::FMul => (lhs.float(i) * rhs.float(i)).as_uint(),
                _ => unreachable!(),
            })
            .collect();
        state.create_intermediate(insn.id(2), components);

        EmitResult::Continue
    }

    fn emit_unary_op(
        &self,
        op: Op,
        insn: Instruction<'_>,
        state: &mut EmitState<'_>,
    ) -> EmitResult {
        let value = self.operand(insn.id(3), state);

        let components: SmallVec<[SimdUInt; 4]> = (0..value.component_count())
            .map(|i| match op {
                Op::ConvertFToU => value.float(i).to_uint(),
                Op::ConvertFToS => value.float(i).to_int().as_uint(),
                Op::ConvertSToF => value.int(i).to_float().as_uint(),
                Op::ConvertUToF => value.uint(i).to_float().as_uint(),
                Op::Bitcast => value.uint(i),
                _ => unreachable!(),
            })
            .collect();
        state.create_intermediate(insn.id(2), components);

        EmitResult::Continue
    }

    fn emit_atomic_iadd(&self, insn: Instruction<'_>, state: &mut EmitState<'_>) -> EmitResult {
        let result_id = insn.id(2);
        let pointer = state.pointer(insn.id(3));
        let value = self.operand(insn.id(6), state).uint(0);

        let previous = match pointer {
            Pointer::Texel(texel) => {
                let enabled = state.stores_and_atomics_mask() & texel.is_in_bounds(4);

                SimdUInt(std::array::from_fn(|lane| {
                    if enabled.0[lane] == 0 {
                        return 0;
                    }

                    // SAFETY: The lane is within the image memory, and 4-byte texels are 4-byte
                    // aligned.
                    let atomic = unsafe { AtomicU32::from_ptr(texel.lane_address(lane).cast()) };
                    atomic.fetch_add(value.0[lane], Ordering::SeqCst)
                }))
            }
            Pointer::Variable { variable, offsets } => {
                let previous = state.load_variable(variable, offsets, 1)[0];
                let sum = previous + value;
                let lane_mask = state.active_lane_mask();
                state.store_variable(variable, offsets, &[sum], lane_mask);

                previous
            }
            Pointer::Descriptor(_) => panic!("atomic operations on descriptors are not supported"),
        };

        state.create_intermediate(result_id, [previous]);

        EmitResult::Continue
    }

    fn chain_index(&self, id: Id, state: &EmitState<'_>) -> ChainIndex {
        match &self.object(id).kind {
            ObjectKind::Constant(values) => ChainIndex::Literal(values[0]),
            _ => ChainIndex::Lanes(state.intermediate(id)[0].as_int()),
        }
    }

    /// Returns the value of an index that must be the same in all active lanes.
    fn uniform_index(&self, id: Id, state: &EmitState<'_>) -> u32 {
        match self.chain_index(id, state) {
            ChainIndex::Literal(index) => index,
            ChainIndex::Lanes(lanes) => {
                let lane = state.active_lane_mask().bits().trailing_zeros() as usize;
                lanes.0[lane.min(WIDTH - 1)] as u32
            }
        }
    }

    /// Returns the type reached by applying `indices` to a composite type, and the offset in
    /// components of the element that is reached.
    fn walk_composite(&self, mut ty: Id, indices: &[ChainIndex]) -> (Id, SimdInt) {
        let mut offset = SimdInt::splat(0);

        for index in indices {
            let composite = self.ty(ty);

            match composite.op {
                Op::TypeStruct => {
                    let member = index.literal() + 2;
                    let definition = self.definition(composite.offset);

                    for previous in 2..member {
                        let count = self.ty(definition.id(previous)).component_count;
                        offset = offset + SimdInt::splat(count as i32);
                    }

                    ty = definition.id(member);
                }
                Op::TypeVector | Op::TypeMatrix | Op::TypeArray | Op::TypeRuntimeArray => {
                    let element = composite.element.unwrap_or_default();
                    let stride = self.ty(element).component_count as i32;
                    offset = offset + index.lanes() * SimdInt::splat(stride);
                    ty = element;
                }
                op => panic!("a {:?} can't be indexed", op),
            }
        }

        (ty, offset)
    }
}

unsafe impl DeviceOwned for SpirvShader {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(SpirvShader);

fn texel_behavior(state: &EmitState<'_>) -> simd::OutOfBoundsBehavior {
    if state.routine.device().robust_image_access() {
        simd::OutOfBoundsBehavior::Nullify
    } else {
        simd::OutOfBoundsBehavior::RobustBufferAccess
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Type {
    pub(crate) op: Op,
    pub(crate) offset: usize,
    pub(crate) component_count: u32,

    /// The component type of vectors and arrays, the image type of sampled images, or the
    /// pointee type of pointers.
    pub(crate) element: Option<Id>,

    pub(crate) storage_class: Option<StorageClass>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ImageType {
    pub(crate) sampled_type: Id,
    pub(crate) dim: Dim,
    pub(crate) arrayed: bool,
    pub(crate) multisampled: bool,
    pub(crate) format: ImageFormat,
}

#[derive(Clone, Debug)]
pub(crate) struct Object {
    pub(crate) ty: Id,
    pub(crate) offset: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Clone, Debug)]
pub(crate) enum ObjectKind {
    Constant(SmallVec<[u32; 4]>),
    Variable(StorageClass),
    Intermediate,
    Pointer,
}

#[derive(Clone, Copy, Debug, Default)]
struct Decorations {
    location: Option<u32>,
    descriptor_set: Option<u32>,
    binding: Option<u32>,
    input_attachment_index: Option<u32>,
    built_in: Option<BuiltIn>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct DescriptorDecorations {
    pub(crate) set: u32,
    pub(crate) binding: u32,
    pub(crate) input_attachment_index: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
enum ChainIndex {
    Literal(u32),
    Lanes(SimdInt),
}

impl ChainIndex {
    fn literal(self) -> u32 {
        match self {
            ChainIndex::Literal(index) => index,
            ChainIndex::Lanes(_) => panic!("struct members must be indexed by constants"),
        }
    }

    fn lanes(self) -> SimdInt {
        match self {
            ChainIndex::Literal(index) => SimdInt::splat(index as i32),
            ChainIndex::Lanes(lanes) => lanes,
        }
    }
}

/// What to do after an instruction has been executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EmitResult {
    Continue,
    Branch(Id),
    Return,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Pointer {
    /// The first descriptor of an array, in the memory of a bound descriptor set.
    Descriptor(*mut u8),

    /// Components of a variable, from the first component of the variable.
    Variable { variable: Id, offsets: SimdInt },

    /// Texels of a storage image.
    Texel(SimdPointer),
}

#[derive(Clone, Debug)]
enum Value {
    Intermediate(SmallVec<[SimdUInt; 4]>),
    Pointer(Pointer),
}

/// An operand of an instruction, one vector per scalar component.
#[derive(Clone, Debug)]
pub(crate) struct Operand {
    components: SmallVec<[SimdUInt; 4]>,
    is_constant: bool,
}

impl Operand {
    #[inline]
    pub(crate) fn component_count(&self) -> u32 {
        self.components.len() as u32
    }

    #[inline]
    pub(crate) fn uint(&self, i: u32) -> SimdUInt {
        self.components[i as usize]
    }

    #[inline]
    pub(crate) fn int(&self, i: u32) -> SimdInt {
        self.uint(i).as_int()
    }

    #[inline]
    pub(crate) fn float(&self, i: u32) -> SimdFloat {
        self.uint(i).as_float()
    }

    pub(crate) fn is_constant_zero(&self) -> bool {
        self.is_constant
            && self
                .components
                .iter()
                .all(|component| *component == SimdUInt::splat(0))
    }
}

/// The values computed so far by one execution of an entry point.
pub(crate) struct EmitState<'a> {
    pub(crate) routine: &'a mut ShaderRoutine,
    values: HashMap<Id, Value>,
    variables: HashMap<Id, Vec<SimdUInt>>,
}

impl<'a> EmitState<'a> {
    fn new(routine: &'a mut ShaderRoutine) -> Self {
        EmitState {
            routine,
            values: HashMap::default(),
            variables: HashMap::default(),
        }
    }

    #[inline]
    pub(crate) fn active_lane_mask(&self) -> SimdInt {
        self.routine.active_lane_mask
    }

    /// The lanes whose memory writes and atomic operations take effect.
    #[inline]
    pub(crate) fn stores_and_atomics_mask(&self) -> SimdInt {
        self.routine.active_lane_mask & !self.routine.helper_lane_mask
    }

    pub(crate) fn create_intermediate(
        &mut self,
        id: Id,
        components: impl IntoIterator<Item = SimdUInt>,
    ) {
        let value = Value::Intermediate(components.into_iter().collect());
        let previous = self.values.insert(id, value);
        debug_assert!(previous.is_none(), "{} is defined twice", id);
    }

    pub(crate) fn create_pointer(&mut self, id: Id, pointer: Pointer) {
        let previous = self.values.insert(id, Value::Pointer(pointer));
        debug_assert!(previous.is_none(), "{} is defined twice", id);
    }

    #[track_caller]
    pub(crate) fn intermediate(&self, id: Id) -> &[SimdUInt] {
        match self.values.get(&id) {
            Some(Value::Intermediate(components)) => components,
            Some(Value::Pointer(_)) => panic!("{} is a pointer", id),
            None => panic!("{} has not been computed", id),
        }
    }

    #[track_caller]
    pub(crate) fn pointer(&self, id: Id) -> Pointer {
        match self.values.get(&id) {
            Some(&Value::Pointer(pointer)) => pointer,
            Some(Value::Intermediate(_)) => panic!("{} is not a pointer", id),
            None => panic!("{} has not been computed", id),
        }
    }

    fn load_variable(&self, variable: Id, offsets: SimdInt, count: u32) -> SmallVec<[SimdUInt; 4]> {
        let storage = &self.variables[&variable];

        (0..count as usize)
            .map(|i| {
                SimdUInt(std::array::from_fn(|lane| {
                    usize::try_from(offsets.0[lane])
                        .ok()
                        .and_then(|offset| storage.get(offset + i))
                        .map_or(0, |component| component.0[lane])
                }))
            })
            .collect()
    }

    fn store_variable(
        &mut self,
        variable: Id,
        offsets: SimdInt,
        components: &[SimdUInt],
        lane_mask: SimdInt,
    ) {
        let storage = self
            .variables
            .get_mut(&variable)
            .unwrap_or_else(|| panic!("{} is not a variable", variable));

        for (i, component) in components.iter().enumerate() {
            for lane in 0..WIDTH {
                if lane_mask.0[lane] == 0 {
                    continue;
                }

                let target = usize::try_from(offsets.0[lane])
                    .ok()
                    .and_then(|offset| storage.get_mut(offset + i));

                if let Some(target) = target {
                    target.0[lane] = component.0[lane];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        simd::{SimdFloat, SimdInt, SimdUInt},
        spirv::{BuiltIn, Decoration, Dim, ImageFormat, Op, Spirv, StorageClass},
        ImageSamplerFn, InterfaceValues, ShaderRoutine, ShaderRoutineCreateInfo, SpirvShader,
    };
    use crate::{
        descriptor_set::{
            DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding,
            DescriptorSetLayoutCreateInfo, DescriptorType, WriteDescriptorSet,
        },
        device::{Device, DeviceCreateInfo, ImageSamplerResolver},
        format::Format,
        image::{
            sampler::{Sampler, SamplerCreateInfo},
            view::ImageView,
            Image, ImageAspect, ImageCreateInfo,
        },
        pipeline::layout::{PipelineLayout, PipelineLayoutCreateInfo},
        shader::image::{ImageInstructionSignature, SamplerMethod, Variant},
        tests::{echo_routine, SpirvBuilder},
    };
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Types {
        boolean: u32,
        float: u32,
        int: u32,
        uint: u32,
        v2int: u32,
        v2float: u32,
        v3float: u32,
        v4float: u32,
        v4uint: u32,
    }

    fn types(b: &mut SpirvBuilder) -> Types {
        let float = b.type_(Op::TypeFloat, &[32]);
        let int = b.type_(Op::TypeInt, &[32, 1]);
        let uint = b.type_(Op::TypeInt, &[32, 0]);

        Types {
            boolean: b.type_(Op::TypeBool, &[]),
            float,
            int,
            uint,
            v2int: b.type_(Op::TypeVector, &[int, 2]),
            v2float: b.type_(Op::TypeVector, &[float, 2]),
            v3float: b.type_(Op::TypeVector, &[float, 3]),
            v4float: b.type_(Op::TypeVector, &[float, 4]),
            v4uint: b.type_(Op::TypeVector, &[uint, 4]),
        }
    }

    fn output(b: &mut SpirvBuilder, ty: u32, location: u32) -> u32 {
        let pointer = b.pointer_type(StorageClass::Output, ty);
        let variable = b.variable(pointer, StorageClass::Output);
        b.decorate(variable, Decoration::Location, &[location]);

        variable
    }

    fn image_type(
        b: &mut SpirvBuilder,
        sampled_type: u32,
        sampled: u32,
        format: ImageFormat,
    ) -> u32 {
        b.type_(
            Op::TypeImage,
            &[sampled_type, Dim::Dim2D as u32, 0, 0, 0, sampled, format as u32],
        )
    }

    fn set_layout(device: &Arc<Device>, bindings: &[DescriptorType]) -> Arc<DescriptorSetLayout> {
        DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: bindings
                    .iter()
                    .enumerate()
                    .map(|(binding, &ty)| DescriptorSetLayoutBinding::new(binding as u32, ty))
                    .collect(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn pipeline_layout(
        device: &Arc<Device>,
        set_layout: &Arc<DescriptorSetLayout>,
    ) -> Arc<PipelineLayout> {
        PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                set_layouts: vec![set_layout.clone()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn image_view(device: &Arc<Device>, format: Format, mip_levels: u32) -> Arc<ImageView> {
        let image = Image::new(
            device.clone(),
            ImageCreateInfo {
                format,
                extent: [4, 4, 1],
                mip_levels,
                ..Default::default()
            },
        )
        .unwrap();

        ImageView::new_default(image).unwrap()
    }

    /// Creates a routine for `spirv` with a single set, and binds `writes` to it.
    fn routine(
        device: &Arc<Device>,
        spirv: Spirv,
        bindings: &[DescriptorType],
        writes: &[WriteDescriptorSet],
        create_info: ShaderRoutineCreateInfo,
    ) -> (ShaderRoutine, Arc<DescriptorSet>) {
        let shader = SpirvShader::new(device.clone(), spirv);
        let set_layout = set_layout(device, bindings);
        let layout = pipeline_layout(device, &set_layout);
        let set = DescriptorSet::new(set_layout).unwrap();
        unsafe { set.update(writes, &[]) }.unwrap();

        let mut routine = ShaderRoutine::new(shader, layout, create_info).unwrap();
        routine.bind_descriptor_set(0, set.clone()).unwrap();

        (routine, set)
    }

    /// A shader that samples a combined image sampler at projective coordinates `(2, 4, 8)`.
    fn projective_sample_shader() -> Spirv {
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.float, 1, ImageFormat::Unknown);
        let sampled_image_type = b.type_(Op::TypeSampledImage, &[image_type]);
        let pointer = b.pointer_type(StorageClass::UniformConstant, sampled_image_type);
        let sampled_image = b.descriptor(pointer, 0, 0);
        let color = output(&mut b, t.v4float, 0);

        let components = [2.0f32, 4.0, 8.0].map(|c| b.constant(t.float, c.to_bits()));
        let coordinate = b.constant_composite(t.v3float, &components);

        let loaded = b.result(Op::Load, sampled_image_type, &[sampled_image]);
        let sampled = b.result(
            Op::ImageSampleProjImplicitLod,
            t.v4float,
            &[loaded, coordinate],
        );
        b.code(Op::Store, &[color, sampled]);

        b.build()
    }

    fn float_vector(b: &mut SpirvBuilder, t: &Types, ty: u32, components: &[f32]) -> u32 {
        let components: Vec<_> = components
            .iter()
            .map(|c| b.constant(t.float, c.to_bits()))
            .collect();

        b.constant_composite(ty, &components)
    }

    /// A shader that stores the result of the sampling instruction emitted by `sample`, which is
    /// given the loaded combined image sampler.
    fn combined_sample_shader(sample: impl FnOnce(&mut SpirvBuilder, &Types, u32) -> u32) -> Spirv {
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.float, 1, ImageFormat::Unknown);
        let sampled_image_type = b.type_(Op::TypeSampledImage, &[image_type]);
        let pointer = b.pointer_type(StorageClass::UniformConstant, sampled_image_type);
        let sampled_image = b.descriptor(pointer, 0, 0);
        let color = output(&mut b, t.v4float, 0);

        let loaded = b.result(Op::Load, sampled_image_type, &[sampled_image]);
        let sampled = sample(&mut b, &t, loaded);
        b.code(Op::Store, &[color, sampled]);

        b.build()
    }

    /// Runs `spirv` with a combined image sampler bound, and returns the first output.
    fn sample_combined(
        device: &Arc<Device>,
        spirv: Spirv,
        create_info: ShaderRoutineCreateInfo,
    ) -> Vec<SimdFloat> {
        let view = image_view(device, Format::R8G8B8A8_UNORM, 1);
        let sampler = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();
        let (mut routine, _set) = routine(
            device,
            spirv,
            &[DescriptorType::CombinedImageSampler],
            &[WriteDescriptorSet::image_view_sampler(0, view, sampler)],
            create_info,
        );
        let outputs = routine.run(&InterfaceValues::new());

        outputs.get(0).unwrap().iter().map(|c| c.as_float()).collect()
    }

    #[test]
    fn storage_image_write_then_read() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.float, 2, ImageFormat::Rgba8);
        let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
        let image = b.descriptor(pointer, 0, 0);
        let color = output(&mut b, t.v4float, 0);

        let one_int = b.constant(t.int, 1);
        let coordinate = b.constant_composite(t.v2int, &[one_int, one_int]);
        let texel = [1.0f32, 128.0 / 255.0, 0.0, 1.0].map(|c| b.constant(t.float, c.to_bits()));
        let texel = b.constant_composite(t.v4float, &texel);

        let loaded = b.result(Op::Load, image_type, &[image]);
        b.code(Op::ImageWrite, &[loaded, coordinate, texel]);
        let loaded = b.result(Op::Load, image_type, &[image]);
        let read = b.result(Op::ImageRead, t.v4float, &[loaded, coordinate]);
        b.code(Op::Store, &[color, read]);

        let view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::StorageImage],
            &[WriteDescriptorSet::image_view(0, view.clone())],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        let texel = unsafe {
            view.texel_pointer([1, 1, 0], ImageAspect::Color, 0, 0)
                .cast::<[u8; 4]>()
                .read()
        };
        assert_eq!(texel, [255, 128, 0, 255]);

        let color = outputs.get(0).unwrap();
        let expected = [1.0, 128.0 / 255.0, 0.0, 1.0];

        for (component, expected) in color.iter().zip(expected) {
            for lane in component.as_float().0 {
                assert!((lane - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn fetch_passes_lod_zero_and_offsets() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.float, 1, ImageFormat::Unknown);
        let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
        let image = b.descriptor(pointer, 0, 0);
        let color = output(&mut b, t.v4float, 0);

        let [three, two, one, minus_one] = [3, 2, 1, -1i32].map(|c| b.constant(t.int, c as u32));
        let coordinate = b.constant_composite(t.v2int, &[three, two]);
        let offset = b.constant_composite(t.v2int, &[one, minus_one]);

        let loaded = b.result(Op::Load, image_type, &[image]);
        // ConstOffset
        let fetched = b.result(Op::ImageFetch, t.v4float, &[loaded, coordinate, 0x8, offset]);
        b.code(Op::Store, &[color, fetched]);

        let view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::SampledImage],
            &[WriteDescriptorSet::image_view(0, view)],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        assert_eq!(
            outputs.get(0).unwrap(),
            &[
                SimdUInt::splat(3),
                SimdUInt::splat(2),
                SimdUInt::splat(0),
                SimdUInt::splat(1),
            ],
        );
    }

    #[test]
    fn projective_coordinates_are_divided() {
        let device = device!();
        let view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let sampler = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();
        let (mut routine, _set) = routine(
            &device,
            projective_sample_shader(),
            &[DescriptorType::CombinedImageSampler],
            &[WriteDescriptorSet::image_view_sampler(0, view, sampler)],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        let color = outputs.get(0).unwrap();
        assert_eq!(color[0].as_float(), SimdFloat::splat(0.25));
        assert_eq!(color[1].as_float(), SimdFloat::splat(0.5));
        assert_eq!(color[2], SimdUInt::splat(0));
        assert_eq!(device.sampling_routine_count(), 1);
    }

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl ImageSamplerResolver for CountingResolver {
        fn image_sampler(
            &self,
            _signature: ImageInstructionSignature,
            _sampler_id: u32,
            _image_view_id: u32,
        ) -> ImageSamplerFn {
            self.calls.fetch_add(1, Ordering::Relaxed);

            echo_routine
        }
    }

    #[test]
    fn sampler_cache() {
        let device = device!();
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let sampler_a = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();
        let sampler_b = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();

        let (mut routine, set_a) = routine(
            &device,
            projective_sample_shader(),
            &[DescriptorType::CombinedImageSampler],
            &[WriteDescriptorSet::image_view_sampler(0, view.clone(), sampler_a.clone())],
            ShaderRoutineCreateInfo {
                image_sampler_resolver: Some(resolver.clone() as Arc<dyn ImageSamplerResolver>),
                ..Default::default()
            },
        );
        let calls = || resolver.calls.load(Ordering::Relaxed);

        routine.run(&InterfaceValues::new());
        routine.run(&InterfaceValues::new());
        assert_eq!(calls(), 1);
        assert_eq!(routine.sampler_cache()[0].sampler_id, sampler_a.id().get());

        // Same descriptor, different sampler.
        unsafe {
            set_a.update(
                &[WriteDescriptorSet::image_view_sampler(0, view.clone(), sampler_b.clone())],
                &[],
            )
        }
        .unwrap();
        routine.run(&InterfaceValues::new());
        assert_eq!(calls(), 2);

        // Different descriptor, same sampler.
        let set_b = DescriptorSet::new(set_a.layout().clone()).unwrap();
        unsafe {
            set_b.update(
                &[WriteDescriptorSet::image_view_sampler(0, view, sampler_b.clone())],
                &[],
            )
        }
        .unwrap();
        routine.bind_descriptor_set(0, set_b).unwrap();
        routine.run(&InterfaceValues::new());
        routine.run(&InterfaceValues::new());
        assert_eq!(calls(), 3);
        assert_eq!(routine.sampler_cache()[0].sampler_id, sampler_b.id().get());

        // The device cache is bypassed by the custom resolver.
        assert_eq!(device.sampling_routine_count(), 0);
    }

    #[test]
    fn no_active_lanes_skip_sampling() {
        let device = device!();
        let view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let sampler = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();
        let (mut routine, _set) = routine(
            &device,
            projective_sample_shader(),
            &[DescriptorType::CombinedImageSampler],
            &[WriteDescriptorSet::image_view_sampler(0, view, sampler)],
            ShaderRoutineCreateInfo::default(),
        );

        routine.set_active_lane_mask(SimdInt::splat(0));
        let outputs = routine.run(&InterfaceValues::new());

        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt::splat(0); 4]);
        assert!(routine.sampler_cache()[0].function.is_none());
        assert_eq!(device.sampling_routine_count(), 0);
    }

    #[test]
    fn proj_dref_with_explicit_lod() {
        let device = device!();
        let spirv = combined_sample_shader(|b, t, loaded| {
            let coordinate = float_vector(b, t, t.v3float, &[2.0, 4.0, 8.0]);
            let [dref, lod] = [16.0f32, 3.0].map(|c| b.constant(t.float, c.to_bits()));
            // Lod
            b.result(
                Op::ImageSampleProjDrefExplicitLod,
                t.v4float,
                &[loaded, coordinate, dref, 0x2, lod],
            )
        });
        let color = sample_combined(&device, spirv, ShaderRoutineCreateInfo::default());

        assert_eq!(color, [0.25, 0.5, 2.0, 3.0].map(SimdFloat::splat));
    }

    #[derive(Default)]
    struct RecordingResolver {
        signatures: Mutex<Vec<ImageInstructionSignature>>,
    }

    impl ImageSamplerResolver for RecordingResolver {
        fn image_sampler(
            &self,
            signature: ImageInstructionSignature,
            _sampler_id: u32,
            _image_view_id: u32,
        ) -> ImageSamplerFn {
            self.signatures.lock().push(signature);

            echo_routine
        }
    }

    #[test]
    fn gather_component_and_offset() {
        let device = device!();
        let resolver = Arc::new(RecordingResolver::default());
        let spirv = combined_sample_shader(|b, t, loaded| {
            let coordinate = float_vector(b, t, t.v2float, &[0.5, 0.25]);
            let component = b.constant(t.uint, 2);
            let seven = b.constant(t.int, 7);
            let offset = b.constant_composite(t.v2int, &[seven, seven]);
            // ConstOffset
            b.result(
                Op::ImageGather,
                t.v4float,
                &[loaded, coordinate, component, 0x8, offset],
            )
        });
        let color = sample_combined(
            &device,
            spirv,
            ShaderRoutineCreateInfo {
                image_sampler_resolver: Some(resolver.clone() as Arc<dyn ImageSamplerResolver>),
                ..Default::default()
            },
        );

        assert_eq!(color[0], SimdFloat::splat(0.5));
        assert_eq!(color[1], SimdFloat::splat(0.25));
        // Offsets are passed as integer bit patterns.
        assert_eq!(color[2].as_uint(), SimdUInt::splat(7));
        assert_eq!(color[3].as_uint(), SimdUInt::splat(7));
        assert_eq!(
            *resolver.signatures.lock(),
            [ImageInstructionSignature {
                variant: Variant::None,
                sampler_method: SamplerMethod::Gather,
                gather_component: 2,
            }],
        );
    }

    #[test]
    fn gradients_follow_coordinates() {
        let device = device!();
        let spirv = combined_sample_shader(|b, t, loaded| {
            let coordinate = float_vector(b, t, t.v2float, &[2.0, 4.0]);
            let dx = float_vector(b, t, t.v2float, &[8.0, 5.0]);
            let dy = float_vector(b, t, t.v2float, &[1.0, 1.0]);
            // Grad
            b.result(
                Op::ImageSampleExplicitLod,
                t.v4float,
                &[loaded, coordinate, 0x4, dx, dy],
            )
        });
        let color = sample_combined(&device, spirv, ShaderRoutineCreateInfo::default());

        assert_eq!(color, [2.0, 4.0, 8.0, 5.0].map(SimdFloat::splat));
    }

    #[test]
    fn bias_follows_coordinates() {
        let device = device!();
        let spirv = combined_sample_shader(|b, t, loaded| {
            let coordinate = float_vector(b, t, t.v2float, &[2.0, 4.0]);
            let bias = b.constant(t.float, 1.5f32.to_bits());
            // Bias
            b.result(
                Op::ImageSampleImplicitLod,
                t.v4float,
                &[loaded, coordinate, 0x1, bias],
            )
        });
        let color = sample_combined(&device, spirv, ShaderRoutineCreateInfo::default());

        assert_eq!(color, [2.0, 4.0, 1.5, 0.0].map(SimdFloat::splat));
    }

    #[test]
    fn out_of_bounds_reads() {
        let robust = device!();
        let non_robust = Device::new(DeviceCreateInfo {
            robust_image_access: false,
            ..Default::default()
        });

        // Without robust image access, only the whole image is bounds checked, so a
        // coordinate past the end of a row reads the start of the next one.
        for (device, expected) in [(robust, 0), (non_robust, 42)] {
            let mut b = SpirvBuilder::new();
            let t = types(&mut b);
            let image_type = image_type(&mut b, t.uint, 2, ImageFormat::R32ui);
            let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
            let image = b.descriptor(pointer, 0, 0);
            let texel_output = output(&mut b, t.v4uint, 0);

            let [four, zero] = [4, 0].map(|c| b.constant(t.int, c));
            let coordinate = b.constant_composite(t.v2int, &[four, zero]);
            let loaded = b.result(Op::Load, image_type, &[image]);
            let texel = b.result(Op::ImageRead, t.v4uint, &[loaded, coordinate]);
            b.code(Op::Store, &[texel_output, texel]);

            let view = image_view(&device, Format::R32_UINT, 1);
            unsafe {
                view.texel_pointer([0, 1, 0], ImageAspect::Color, 0, 0)
                    .cast::<u32>()
                    .write_unaligned(42)
            };
            let (mut routine, _set) = routine(
                &device,
                b.build(),
                &[DescriptorType::StorageImage],
                &[WriteDescriptorSet::image_view(0, view)],
                ShaderRoutineCreateInfo::default(),
            );
            let outputs = routine.run(&InterfaceValues::new());

            assert_eq!(outputs.get(0).unwrap()[0], SimdUInt::splat(expected));
        }
    }

    #[test]
    fn image_queries() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let storage_type = image_type(&mut b, t.float, 2, ImageFormat::Rgba8);
        let sampled_type = image_type(&mut b, t.float, 1, ImageFormat::Unknown);
        let storage_pointer = b.pointer_type(StorageClass::UniformConstant, storage_type);
        let sampled_pointer = b.pointer_type(StorageClass::UniformConstant, sampled_type);
        let storage = b.descriptor(storage_pointer, 0, 0);
        let sampled = b.descriptor(sampled_pointer, 0, 1);
        let size_output = output(&mut b, t.v2int, 0);
        let size_lod_output = output(&mut b, t.v2int, 1);
        let levels_output = output(&mut b, t.int, 2);
        let one = b.constant(t.int, 1);

        let loaded_storage = b.result(Op::Load, storage_type, &[storage]);
        let loaded_sampled = b.result(Op::Load, sampled_type, &[sampled]);
        let size = b.result(Op::ImageQuerySize, t.v2int, &[loaded_storage]);
        let size_lod = b.result(Op::ImageQuerySizeLod, t.v2int, &[loaded_sampled, one]);
        let levels = b.result(Op::ImageQueryLevels, t.int, &[loaded_sampled]);
        b.code(Op::Store, &[size_output, size]);
        b.code(Op::Store, &[size_lod_output, size_lod]);
        b.code(Op::Store, &[levels_output, levels]);

        let storage_view = image_view(&device, Format::R8G8B8A8_UNORM, 1);
        let sampled_view = image_view(&device, Format::R8G8B8A8_UNORM, 3);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::StorageImage, DescriptorType::SampledImage],
            &[
                WriteDescriptorSet::image_view(0, storage_view),
                WriteDescriptorSet::image_view(1, sampled_view),
            ],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt::splat(4); 2]);
        assert_eq!(outputs.get(1).unwrap(), &[SimdUInt::splat(2); 2]);
        assert_eq!(outputs.get(2).unwrap(), &[SimdUInt::splat(3)]);
    }

    #[test]
    fn atomic_add_through_texel_pointer() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.uint, 2, ImageFormat::R32ui);
        let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
        let image = b.descriptor(pointer, 0, 0);
        let texel_pointer_type = b.pointer_type(StorageClass::Image, t.uint);
        let previous_output = output(&mut b, t.uint, 0);
        let texel_output = output(&mut b, t.v4uint, 1);

        let zero_int = b.constant(t.int, 0);
        let coordinate = b.constant_composite(t.v2int, &[zero_int, zero_int]);
        let zero = b.constant(t.uint, 0);
        let one = b.constant(t.uint, 1);

        let texel_pointer = b.result(
            Op::ImageTexelPointer,
            texel_pointer_type,
            &[image, coordinate, zero],
        );
        // Device scope, relaxed semantics.
        let previous = b.result(Op::AtomicIAdd, t.uint, &[texel_pointer, one, zero, one]);
        b.code(Op::Store, &[previous_output, previous]);
        let loaded = b.result(Op::Load, image_type, &[image]);
        let texel = b.result(Op::ImageRead, t.v4uint, &[loaded, coordinate]);
        b.code(Op::Store, &[texel_output, texel]);

        let view = image_view(&device, Format::R32_UINT, 1);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::StorageImage],
            &[WriteDescriptorSet::image_view(0, view)],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt([0, 1, 2, 3])]);
        assert_eq!(
            outputs.get(1).unwrap(),
            &[
                SimdUInt::splat(4),
                SimdUInt::splat(0),
                SimdUInt::splat(0),
                SimdUInt::splat(1),
            ],
        );
    }

    #[test]
    fn texel_pointer_load_and_store() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.uint, 2, ImageFormat::R32ui);
        let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
        let image = b.descriptor(pointer, 0, 0);
        let texel_pointer_type = b.pointer_type(StorageClass::Image, t.uint);
        let inside_output = output(&mut b, t.uint, 0);
        let outside_output = output(&mut b, t.uint, 1);

        let [one, two, five, zero_int] = [1, 2, 5, 0].map(|c| b.constant(t.int, c));
        let inside = b.constant_composite(t.v2int, &[one, two]);
        // Would alias texel (1, 1) if only the whole image was bounds checked.
        let outside = b.constant_composite(t.v2int, &[five, zero_int]);
        let [zero, seven, nine] = [0, 7, 9].map(|c| b.constant(t.uint, c));

        let inside = b.result(
            Op::ImageTexelPointer,
            texel_pointer_type,
            &[image, inside, zero],
        );
        let outside = b.result(
            Op::ImageTexelPointer,
            texel_pointer_type,
            &[image, outside, zero],
        );
        b.code(Op::Store, &[inside, nine]);
        b.code(Op::Store, &[outside, seven]);
        let inside = b.result(Op::Load, t.uint, &[inside]);
        let outside = b.result(Op::Load, t.uint, &[outside]);
        b.code(Op::Store, &[inside_output, inside]);
        b.code(Op::Store, &[outside_output, outside]);

        let view = image_view(&device, Format::R32_UINT, 1);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::StorageImage],
            &[WriteDescriptorSet::image_view(0, view.clone())],
            ShaderRoutineCreateInfo::default(),
        );
        let outputs = routine.run(&InterfaceValues::new());

        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt::splat(9)]);
        assert_eq!(outputs.get(1).unwrap(), &[SimdUInt::splat(0)]);

        let texel = |x, y| unsafe {
            view.texel_pointer([x, y, 0], ImageAspect::Color, 0, 0)
                .cast::<u32>()
                .read_unaligned()
        };
        assert_eq!(texel(1, 2), 9);
        assert_eq!(texel(1, 1), 0);
    }

    #[test]
    fn helper_lanes_skip_stores_and_atomics() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let image_type = image_type(&mut b, t.uint, 2, ImageFormat::R32ui);
        let pointer = b.pointer_type(StorageClass::UniformConstant, image_type);
        let image = b.descriptor(pointer, 0, 0);
        let texel_pointer_type = b.pointer_type(StorageClass::Image, t.uint);
        let helper_pointer = b.pointer_type(StorageClass::Input, t.boolean);
        let helper = b.variable(helper_pointer, StorageClass::Input);
        b.decorate(helper, Decoration::BuiltIn, &[BuiltIn::HelperInvocation as u32]);
        let previous_output = output(&mut b, t.uint, 0);
        let helper_output = output(&mut b, t.boolean, 1);

        let [zero_int, one_int, two_int] = [0, 1, 2].map(|c| b.constant(t.int, c));
        let counter = b.constant_composite(t.v2int, &[zero_int, zero_int]);
        let written = b.constant_composite(t.v2int, &[one_int, zero_int]);
        let stored = b.constant_composite(t.v2int, &[two_int, zero_int]);
        let [zero, one, five, six] = [0, 1, 5, 6].map(|c| b.constant(t.uint, c));
        let texel = b.constant_composite(t.v4uint, &[five, five, five, five]);

        let counter = b.result(
            Op::ImageTexelPointer,
            texel_pointer_type,
            &[image, counter, zero],
        );
        // Device scope, relaxed semantics.
        let previous = b.result(Op::AtomicIAdd, t.uint, &[counter, one, zero, one]);
        b.code(Op::Store, &[previous_output, previous]);
        let loaded = b.result(Op::Load, image_type, &[image]);
        b.code(Op::ImageWrite, &[loaded, written, texel]);
        let stored = b.result(
            Op::ImageTexelPointer,
            texel_pointer_type,
            &[image, stored, zero],
        );
        b.code(Op::Store, &[stored, six]);
        let is_helper = b.result(Op::Load, t.boolean, &[helper]);
        b.code(Op::Store, &[helper_output, is_helper]);

        let view = image_view(&device, Format::R32_UINT, 1);
        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[DescriptorType::StorageImage],
            &[WriteDescriptorSet::image_view(0, view.clone())],
            ShaderRoutineCreateInfo::default(),
        );
        let texel = |x| unsafe {
            view.texel_pointer([x, 0, 0], ImageAspect::Color, 0, 0)
                .cast::<u32>()
                .read_unaligned()
        };

        routine.set_helper_lane_mask(SimdInt([0, -1, 0, 0]));
        let outputs = routine.run(&InterfaceValues::new());
        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt([0, 0, 1, 2])]);
        assert_eq!(outputs.get(1).unwrap(), &[SimdUInt([0, !0, 0, 0])]);
        assert_eq!(texel(0), 3);

        // Lanes that are all helpers write nothing.
        unsafe { view.texel_pointer([1, 0, 0], ImageAspect::Color, 0, 0).write_bytes(0, 8) };
        routine.set_helper_lane_mask(SimdInt::splat(-1));
        let outputs = routine.run(&InterfaceValues::new());
        assert_eq!(outputs.get(0).unwrap(), &[SimdUInt::splat(0)]);
        assert_eq!([texel(0), texel(1), texel(2)], [3, 0, 0]);

        routine.set_helper_lane_mask(SimdInt::splat(0));
        routine.run(&InterfaceValues::new());
        assert_eq!([texel(0), texel(1), texel(2)], [7, 5, 6]);
    }

    #[test]
    fn frag_coord_and_inputs() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let frag_coord_pointer = b.pointer_type(StorageClass::Input, t.v4float);
        let frag_coord = b.variable(frag_coord_pointer, StorageClass::Input);
        b.decorate(frag_coord, Decoration::BuiltIn, &[BuiltIn::FragCoord as u32]);
        let input_pointer = b.pointer_type(StorageClass::Input, t.float);
        let input = b.variable(input_pointer, StorageClass::Input);
        b.decorate(input, Decoration::Location, &[0]);
        let result = output(&mut b, t.float, 0);

        let position = b.result(Op::Load, t.v4float, &[frag_coord]);
        let x = b.result(Op::CompositeExtract, t.float, &[position, 0]);
        let value = b.result(Op::Load, t.float, &[input]);
        let sum = b.result(Op::FAdd, t.float, &[x, value]);
        b.code(Op::Store, &[result, sum]);

        let (mut routine, _set) = routine(
            &device,
            b.build(),
            &[],
            &[],
            ShaderRoutineCreateInfo {
                window_space_position: [SimdInt([0, 1, 2, 3]), SimdInt::splat(7)],
                ..Default::default()
            },
        );

        let mut inputs = InterfaceValues::new();
        inputs.set(0, [SimdFloat::splat(1.0).as_uint()]);
        let outputs = routine.run(&inputs);

        assert_eq!(
            outputs.get(0).unwrap()[0].as_float(),
            SimdFloat([1.5, 2.5, 3.5, 4.5]),
        );
    }

    #[test]
    fn unbound_descriptor_set() {
        let device = device!();
        let spirv = projective_sample_shader();
        let shader = SpirvShader::new(device.clone(), spirv);
        let set_layout = set_layout(&device, &[DescriptorType::CombinedImageSampler]);
        let layout = pipeline_layout(&device, &set_layout);
        let mut routine = ShaderRoutine::new(shader, layout, Default::default()).unwrap();

        assert_should_panic!("descriptor set 0 is not bound", {
            routine.run(&InterfaceValues::new());
        });
    }

    #[test]
    fn validation() {
        let device = device!();
        let shader = SpirvShader::new(device.clone(), projective_sample_shader());
        assert_eq!(shader.image_call_site_count(), 1);
        assert_eq!(shader.entry_point_name(), "main");
        assert_eq!(shader.descriptor_bindings().collect::<Vec<_>>(), [(0, 0)]);

        // The layout lacks binding 0.
        let other_layout = set_layout(&device, &[]);
        assert!(ShaderRoutine::new(
            shader.clone(),
            pipeline_layout(&device, &other_layout),
            Default::default(),
        )
        .is_err());

        let set_layout_a = set_layout(&device, &[DescriptorType::CombinedImageSampler]);
        let set_layout_b = set_layout(&device, &[DescriptorType::CombinedImageSampler]);
        let mut routine = ShaderRoutine::new(
            shader,
            pipeline_layout(&device, &set_layout_a),
            Default::default(),
        )
        .unwrap();

        let set = DescriptorSet::new(set_layout_b).unwrap();
        assert!(routine.bind_descriptor_set(0, set.clone()).is_err());
        assert!(routine.bind_descriptor_set(1, set).is_err());
    }

    #[test]
    fn unsupported_instruction() {
        let device = device!();
        let mut b = SpirvBuilder::new();
        let t = types(&mut b);
        let selector = b.constant(t.int, 0);
        let label = b.id();
        b.code(Op::Switch, &[selector, label]);

        let shader = SpirvShader::new(device.clone(), b.build());
        let set_layout = set_layout(&device, &[]);
        let layout = pipeline_layout(&device, &set_layout);
        let mut routine = ShaderRoutine::new(shader, layout, Default::default()).unwrap();

        assert_should_panic!("unsupported SPIR-V instruction", {
            routine.run(&InterfaceValues::new());
        });
    }
}
