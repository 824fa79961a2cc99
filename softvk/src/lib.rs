// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! CPU implementation of the Vulkan image instruction path and resource binding model.
//!
//! # Brief summary
//!
//! - A [`Device`](crate::device::Device) owns the state shared by every object: the robustness
//!   settings, the native sampling routines that have been built so far, and the constant tables
//!   handed to those routines.
//!
//! - [*Images*](crate::image) and [*buffers*](crate::buffer) live in host memory. They are exposed
//!   to shaders through [image views](crate::image::view), [buffer views](crate::buffer::view) and
//!   [samplers](crate::image::sampler).
//!
//! - A [`DescriptorSetLayout`](crate::descriptor_set::layout::DescriptorSetLayout) computes where
//!   each binding lives inside a descriptor set's memory blob. A
//!   [`DescriptorSet`](crate::descriptor_set::DescriptorSet) is that blob, filled in by
//!   [`WriteDescriptorSet`](crate::descriptor_set::WriteDescriptorSet) and
//!   [`CopyDescriptorSet`](crate::descriptor_set::CopyDescriptorSet) operations with fixed-layout
//!   records that shader code reads directly.
//!
//! - A [`SpirvShader`](crate::shader::SpirvShader) is a decoded and analysed SPIR-V module. A
//!   [`ShaderRoutine`](crate::shader::ShaderRoutine) executes its entry point on a group of
//!   [`WIDTH`](crate::shader::simd::WIDTH) lanes at once, against a set of bound descriptor sets.
//!
//! - Image sampling is delegated to native functions obtained from a
//!   [`SamplingRoutineBuilder`](crate::device::SamplingRoutineBuilder), cached by the device and
//!   by every call site of a routine.
//!
//! # Errors
//!
//! Malformed or unsupported shader code, unknown descriptor types and unknown formats are
//! programming errors and cause a panic. Out-of-bounds texel accesses computed by shader code are
//! not errors: the lanes concerned read zero and their writes are dropped. Host operations that
//! can run out of resources return [`Validated<VulkanError>`].

pub use half;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
};

pub mod buffer;
pub mod descriptor_set;
pub mod device;
pub mod format;
pub mod image;
mod macros;
pub mod memory;
pub mod pipeline;
pub mod shader;

/// Represents memory size and offset values on a Vulkan device.
/// Analogous to the Rust `usize` type on the host.
pub use ash::vk::DeviceSize;

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());

/// An error that can happen when the implementation runs out of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VulkanError {
    /// A host memory allocation has failed.
    OutOfHostMemory,

    /// A device memory allocation has failed.
    OutOfDeviceMemory,

    /// A pool allocation has failed because the pool has no memory left for it.
    OutOfPoolMemory,

    /// A pool allocation has failed because its memory is too fragmented, even though enough
    /// memory is free in total.
    FragmentedPool,
}

impl Error for VulkanError {}

impl Display for VulkanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let msg = match self {
            VulkanError::OutOfHostMemory => "a host memory allocation has failed",
            VulkanError::OutOfDeviceMemory => "a device memory allocation has failed",
            VulkanError::OutOfPoolMemory => "a pool memory allocation has failed",
            VulkanError::FragmentedPool => {
                "a pool allocation has failed due to fragmentation of the pool's memory"
            }
        };

        write!(f, "{msg}")
    }
}

impl From<VulkanError> for Validated<VulkanError> {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::Error(err)
    }
}

/// A wrapper for error types of functions that can return validation errors.
#[derive(Clone)]
pub enum Validated<E> {
    /// A non-validation error occurred.
    Error(E),

    /// A validation error occurred.
    ValidationError(Box<ValidationError>),
}

impl<E> Validated<E> {
    /// Maps the inner `Error` value using the provided function, or does nothing if the value is
    /// `ValidationError`.
    #[inline]
    pub fn map<F>(self, op: impl FnOnce(E) -> F) -> Validated<F> {
        match self {
            Self::Error(err) => Validated::Error(op(err)),
            Self::ValidationError(err) => Validated::ValidationError(err),
        }
    }

    /// Returns the inner `Error` value, or panics if it contains `ValidationError`.
    #[inline(always)]
    #[track_caller]
    pub fn unwrap(self) -> E {
        match self {
            Self::Error(err) => err,
            Self::ValidationError(err) => {
                panic!(
                    "called `Validated::unwrap` on a `ValidationError` value: {:?}",
                    err
                )
            }
        }
    }
}

impl<E> Error for Validated<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Error(err) => Some(err),
            Self::ValidationError(err) => Some(err),
        }
    }
}

impl<E> Display for Validated<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(_) => write!(f, "a non-validation error occurred"),
            Self::ValidationError(_) => write!(f, "a validation error occurred"),
        }
    }
}

impl<E> std::fmt::Debug for Validated<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(err) => write!(f, "a non-validation error occurred: {err}"),
            Self::ValidationError(err) => {
                write!(f, "a validation error occurred\n\nCaused by:\n    {err:?}")
            }
        }
    }
}

impl<E> From<Box<ValidationError>> for Validated<E> {
    #[inline]
    fn from(validation_error: Box<ValidationError>) -> Self {
        Self::ValidationError(validation_error)
    }
}

/// The arguments or other context of a call do not meet the requirements of the function.
#[derive(Clone, Default)]
pub struct ValidationError {
    /// The context in which the problem exists (e.g. a specific parameter).
    pub context: Cow<'static, str>,

    /// A description of the problem.
    pub problem: Cow<'static, str>,

    /// Identifiers of the Vulkan valid usage rules that the problem relates to.
    pub vuids: &'static [&'static str],
}

impl ValidationError {
    pub(crate) fn add_context(
        mut self: Box<Self>,
        context: impl Into<Cow<'static, str>>,
    ) -> Box<Self> {
        if self.context.is_empty() {
            self.context = context.into();
        } else {
            self.context = format!("{}.{}", context.into(), self.context).into();
        }

        self
    }
}

impl std::fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)?;
        } else {
            write!(f, "{}: {}", self.context, self.problem)?;
        }

        if !self.vuids.is_empty() {
            write!(f, "\n\nVulkan VUIDs:")?;

            for vuid in self.vuids {
                write!(f, "\n    {}", vuid)?;
            }
        }

        Ok(())
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)
        } else {
            write!(f, "{}: {}", self.context, self.problem)
        }
    }
}

impl Error for ValidationError {}
