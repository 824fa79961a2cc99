// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describes the resources that the shader routines of a pipeline can access.

pub use self::layout::{PipelineLayout, PipelineLayoutCreateInfo, MAX_BOUND_DESCRIPTOR_SETS};

pub mod layout;
