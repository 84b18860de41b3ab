// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Ember Measured
//!
//! Loaders for measured BSDF data in Radiance's `WindowElement` XML
//! envelope: the Klems hemisphere discretization and the Shirley-Chiu
//! tensor-tree variant. Both loaders build sampling metadata (CDFs,
//! projected solid angles) and export an aligned binary blob the
//! JIT-compiled kernels map directly.

mod error;
mod klems;
mod tensor_tree;
mod xml;

pub use error::MeasuredError;
pub use klems::{
    Klems, KlemsBasis, KlemsComponent, KlemsComponentSpecification, KlemsSpecification,
    KlemsThetaBasis,
};
pub use tensor_tree::{
    TensorTree, TensorTreeComponent, TensorTreeComponentSpecification, TensorTreeSpecification,
};
