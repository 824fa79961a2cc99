//! Parsing of SPIR-V modules.
//!
//! A module is kept as its array of words. Instructions are views into that array, and their
//! operands are addressed by word index, with word 0 holding the opcode and the word count.

use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
};

const MAGIC: u32 = 0x0723_0203;
const HEADER_WORDS: usize = 5;

/// A parsed SPIR-V module.
#[derive(Clone, Debug)]
pub struct Spirv {
    version: (u8, u8),
    bound: u32,
    words: Vec<u32>,
    instructions: Vec<usize>,
}

impl Spirv {
    /// Parses a module from its words. The words may be in either byte order.
    pub fn new(words: &[u32]) -> Result<Spirv, SpirvError> {
        if words.len() < HEADER_WORDS {
            return Err(SpirvError::MissingHeader);
        }

        let words: Vec<u32> = match words[0] {
            MAGIC => words.to_vec(),
            magic if magic.swap_bytes() == MAGIC => {
                words.iter().map(|word| word.swap_bytes()).collect()
            }
            _ => return Err(SpirvError::WrongHeader),
        };

        let version = (
            ((words[1] & 0x00ff_0000) >> 16) as u8,
            ((words[1] & 0x0000_ff00) >> 8) as u8,
        );
        let bound = words[3];

        let mut instructions = Vec::new();
        let mut offset = HEADER_WORDS;

        while offset < words.len() {
            let word_count = (words[offset] >> 16) as usize;

            if word_count == 0 {
                return Err(SpirvError::ZeroWordCount { offset });
            }

            if offset + word_count > words.len() {
                return Err(SpirvError::IncompleteInstruction { offset });
            }

            instructions.push(offset);
            offset += word_count;
        }

        Ok(Spirv {
            version,
            bound,
            words,
            instructions,
        })
    }

    /// Parses a module from bytes. The length must be a multiple of 4.
    pub fn from_bytes(bytes: &[u8]) -> Result<Spirv, SpirvError> {
        if bytes.len() % 4 != 0 {
            return Err(SpirvError::IncompleteInstruction { offset: bytes.len() / 4 });
        }

        let words: Vec<u32> = bytemuck::pod_collect_to_vec(bytes);

        Self::new(&words)
    }

    /// Returns the SPIR-V version of the module, as `(major, minor)`.
    #[inline]
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Returns the upper bound of the result ids of the module.
    #[inline]
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// Returns an iterator over the instructions of the module, in order.
    pub fn instructions(&self) -> impl ExactSizeIterator<Item = Instruction<'_>> + '_ {
        self.instructions
            .iter()
            .map(move |&offset| Instruction::at(&self.words, offset))
    }

    /// Returns the instruction at the given word offset.
    #[inline]
    pub fn instruction_at(&self, offset: usize) -> Instruction<'_> {
        Instruction::at(&self.words, offset)
    }
}

/// A single instruction of a module.
#[derive(Clone, Copy)]
pub struct Instruction<'a> {
    words: &'a [u32],
    offset: usize,
}

impl<'a> Instruction<'a> {
    fn at(module: &'a [u32], offset: usize) -> Self {
        let word_count = (module[offset] >> 16) as usize;

        Instruction {
            words: &module[offset..offset + word_count],
            offset,
        }
    }

    /// Returns the word offset of the instruction within its module.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the raw opcode.
    #[inline]
    pub fn opcode(&self) -> u16 {
        (self.words[0] & 0xffff) as u16
    }

    /// Returns the opcode, or `None` if it is not one that this crate knows.
    #[inline]
    pub fn op(&self) -> Option<Op> {
        Op::from_num(self.opcode() as u32)
    }

    /// Returns the number of words of the instruction, including the first one.
    #[inline]
    pub fn word_count(&self) -> u32 {
        self.words.len() as u32
    }

    /// Returns a word of the instruction.
    ///
    /// # Panics
    ///
    /// - Panics if `index` is not less than the word count.
    #[inline]
    #[track_caller]
    pub fn word(&self, index: u32) -> u32 {
        match self.words.get(index as usize) {
            Some(&word) => word,
            None => panic!(
                "word {} of an instruction with opcode {} and {} words is out of range",
                index,
                self.opcode(),
                self.words.len(),
            ),
        }
    }

    /// Returns a word of the instruction as an id.
    #[inline]
    #[track_caller]
    pub fn id(&self, index: u32) -> Id {
        Id(self.word(index))
    }

    /// Returns all words of the instruction.
    #[inline]
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Decodes a nul-terminated literal string starting at word `index`.
    pub fn string(&self, index: u32) -> String {
        let bytes: Vec<u8> = self.words[index as usize..]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take_while(|&byte| byte != 0)
            .collect();

        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for Instruction<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self.op() {
            Some(op) => write!(f, "{:?}{:?}", op, &self.words[1..]),
            None => write!(f, "Op{}{:?}", self.opcode(), &self.words[1..]),
        }
    }
}

/// The result id of an instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(u32);

impl Id {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Id(id)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl From<Id> for u32 {
    #[inline]
    fn from(id: Id) -> u32 {
        id.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "%{}", self.0)
    }
}

/// Error that can happen when parsing a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpirvError {
    /// The module is shorter than its header.
    MissingHeader,

    /// The first word is not the SPIR-V magic number, in either byte order.
    WrongHeader,

    /// An instruction extends past the end of the module.
    IncompleteInstruction { offset: usize },

    /// An instruction has a word count of zero.
    ZeroWordCount { offset: usize },
}

impl Error for SpirvError {}

impl Display for SpirvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::MissingHeader => write!(f, "the module is shorter than its header"),
            Self::WrongHeader => write!(f, "the module does not start with the magic number"),
            Self::IncompleteInstruction { offset } => write!(
                f,
                "the instruction at word {} extends past the end of the module",
                offset,
            ),
            Self::ZeroWordCount { offset } => {
                write!(f, "the instruction at word {} has a word count of zero", offset)
            }
        }
    }
}

macro_rules! spirv_enum {
    ($(#[doc = $doc:literal])* $name:ident { $($elem:ident = $value:literal,)+ }) => {
        $(#[doc = $doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($elem = $value,)+
        }

        impl $name {
            /// Converts a SPIR-V constant to the enum, or returns `None` if it's unknown.
            #[inline]
            pub fn from_num(num: u32) -> Option<Self> {
                match num {
                    $($value => Some(Self::$elem),)+
                    _ => None,
                }
            }
        }
    };
}

spirv_enum! {
    /// The opcodes that shader analysis and execution know about.
    Op {
        Nop = 0,
        Undef = 1,
        SourceContinued = 2,
        Source = 3,
        SourceExtension = 4,
        Name = 5,
        MemberName = 6,
        String = 7,
        Line = 8,
        Extension = 10,
        ExtInstImport = 11,
        MemoryModel = 14,
        EntryPoint = 15,
        ExecutionMode = 16,
        Capability = 17,
        TypeVoid = 19,
        TypeBool = 20,
        TypeInt = 21,
        TypeFloat = 22,
        TypeVector = 23,
        TypeMatrix = 24,
        TypeImage = 25,
        TypeSampler = 26,
        TypeSampledImage = 27,
        TypeArray = 28,
        TypeRuntimeArray = 29,
        TypeStruct = 30,
        TypePointer = 32,
        TypeFunction = 33,
        ConstantTrue = 41,
        ConstantFalse = 42,
        Constant = 43,
        ConstantComposite = 44,
        ConstantNull = 46,
        Function = 54,
        FunctionParameter = 55,
        FunctionEnd = 56,
        Variable = 59,
        ImageTexelPointer = 60,
        Load = 61,
        Store = 62,
        AccessChain = 65,
        InBoundsAccessChain = 66,
        Decorate = 71,
        MemberDecorate = 72,
        VectorShuffle = 79,
        CompositeConstruct = 80,
        CompositeExtract = 81,
        SampledImage = 86,
        ImageSampleImplicitLod = 87,
        ImageSampleExplicitLod = 88,
        ImageSampleDrefImplicitLod = 89,
        ImageSampleDrefExplicitLod = 90,
        ImageSampleProjImplicitLod = 91,
        ImageSampleProjExplicitLod = 92,
        ImageSampleProjDrefImplicitLod = 93,
        ImageSampleProjDrefExplicitLod = 94,
        ImageFetch = 95,
        ImageGather = 96,
        ImageDrefGather = 97,
        ImageRead = 98,
        ImageWrite = 99,
        Image = 100,
        ImageQueryFormat = 101,
        ImageQueryOrder = 102,
        ImageQuerySizeLod = 103,
        ImageQuerySize = 104,
        ImageQueryLod = 105,
        ImageQueryLevels = 106,
        ImageQuerySamples = 107,
        ConvertFToU = 109,
        ConvertFToS = 110,
        ConvertSToF = 111,
        ConvertUToF = 112,
        Bitcast = 124,
        IAdd = 128,
        FAdd = 129,
        ISub = 130,
        FSub = 131,
        IMul = 132,
        FMul = 133,
        AtomicIAdd = 234,
        Phi = 245,
        LoopMerge = 246,
        SelectionMerge = 247,
        Label = 248,
        Branch = 249,
        BranchConditional = 250,
        Switch = 251,
        Return = 253,
        ReturnValue = 254,
        ModuleProcessed = 330,
    }
}

spirv_enum! {
    /// The dimensionality of an image type.
    Dim {
        Dim1D = 0,
        Dim2D = 1,
        Dim3D = 2,
        Cube = 3,
        Rect = 4,
        Buffer = 5,
        SubpassData = 6,
    }
}

spirv_enum! {
    /// The format declared by an image type.
    ImageFormat {
        Unknown = 0,
        Rgba32f = 1,
        Rgba16f = 2,
        R32f = 3,
        Rgba8 = 4,
        Rgba8Snorm = 5,
        Rg32f = 6,
        Rg16f = 7,
        R11fG11fB10f = 8,
        R16f = 9,
        Rgba16 = 10,
        Rgb10A2 = 11,
        Rg16 = 12,
        Rg8 = 13,
        R16 = 14,
        R8 = 15,
        Rgba16Snorm = 16,
        Rg16Snorm = 17,
        Rg8Snorm = 18,
        R16Snorm = 19,
        R8Snorm = 20,
        Rgba32i = 21,
        Rgba16i = 22,
        Rgba8i = 23,
        R32i = 24,
        Rg32i = 25,
        Rg16i = 26,
        Rg8i = 27,
        R16i = 28,
        R8i = 29,
        Rgba32ui = 30,
        Rgba16ui = 31,
        Rgba8ui = 32,
        R32ui = 33,
        Rgb10a2ui = 34,
        Rg32ui = 35,
        Rg16ui = 36,
        Rg8ui = 37,
        R16ui = 38,
        R8ui = 39,
        R64ui = 40,
        R64i = 41,
    }
}

spirv_enum! {
    /// Where a variable lives.
    StorageClass {
        UniformConstant = 0,
        Input = 1,
        Uniform = 2,
        Output = 3,
        Workgroup = 4,
        CrossWorkgroup = 5,
        Private = 6,
        Function = 7,
        Generic = 8,
        PushConstant = 9,
        AtomicCounter = 10,
        Image = 11,
        StorageBuffer = 12,
    }
}

spirv_enum! {
    /// The decorations that shader analysis records.
    Decoration {
        SpecId = 1,
        Block = 2,
        BuiltIn = 11,
        Flat = 14,
        NonWritable = 24,
        NonReadable = 25,
        Location = 30,
        Component = 31,
        Binding = 33,
        DescriptorSet = 34,
        Offset = 35,
        InputAttachmentIndex = 43,
    }
}

spirv_enum! {
    /// The built-in variables that shader execution provides.
    BuiltIn {
        Position = 0,
        FragCoord = 15,
        SampleId = 18,
        GlobalInvocationId = 28,
        LocalInvocationIndex = 29,
        HelperInvocation = 4424,
        ViewIndex = 4440,
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, Op, Spirv, SpirvError};

    #[test]
    fn parse_header_and_instructions() {
        let words = [
            0x0723_0203,
            0x0001_0300,
            0,
            4,
            0,
            // OpCapability Shader
            (2 << 16) | 17,
            1,
            // OpTypeInt %1 32 1
            (4 << 16) | 21,
            1,
            32,
            1,
        ];

        let spirv = Spirv::new(&words).unwrap();
        assert_eq!(spirv.version(), (1, 3));
        assert_eq!(spirv.bound(), 4);

        let instructions: Vec<_> = spirv.instructions().collect();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].op(), Some(Op::Capability));
        assert_eq!(instructions[1].op(), Some(Op::TypeInt));
        assert_eq!(instructions[1].word_count(), 4);
        assert_eq!(instructions[1].id(1), Id::new(1));
        assert_eq!(instructions[1].offset(), 7);
    }

    #[test]
    fn swapped_byte_order() {
        let words = [0x0723_0203u32, 0x0001_0000, 0, 1, 0, 1 << 16];
        let swapped: Vec<u32> = words.iter().map(|word| word.swap_bytes()).collect();

        let spirv = Spirv::new(&swapped).unwrap();
        assert_eq!(spirv.instructions().next().unwrap().op(), Some(Op::Nop));
    }

    #[test]
    fn malformed_modules() {
        assert_eq!(Spirv::new(&[0x0723_0203]).unwrap_err(), SpirvError::MissingHeader);
        assert_eq!(Spirv::new(&[1, 2, 3, 4, 5]).unwrap_err(), SpirvError::WrongHeader);
        assert_eq!(
            Spirv::new(&[0x0723_0203, 0, 0, 1, 0, 0]).unwrap_err(),
            SpirvError::ZeroWordCount { offset: 5 },
        );
        assert_eq!(
            Spirv::new(&[0x0723_0203, 0, 0, 1, 0, (3 << 16) | 21, 1]).unwrap_err(),
            SpirvError::IncompleteInstruction { offset: 5 },
        );
    }

    #[test]
    fn literal_string() {
        // OpName %1 "main"
        let words = [
            0x0723_0203,
            0,
            0,
            2,
            0,
            (4 << 16) | 5,
            1,
            u32::from_le_bytes(*b"main"),
            0,
        ];

        let spirv = Spirv::new(&words).unwrap();
        let name = spirv.instructions().next().unwrap();
        assert_eq!(name.string(2), "main");
    }

    #[test]
    fn out_of_range_word() {
        let words = [0x0723_0203, 0, 0, 1, 0, 1 << 16];
        let spirv = Spirv::new(&words).unwrap();
        let nop = spirv.instructions().next().unwrap();

        assert_should_panic!("out of range", {
            nop.word(1);
        });
    }
}
