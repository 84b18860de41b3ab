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

//! The aligned binary serialization contract.
//!
//! Every exported resource (measured-BSDF buffers, the light hierarchy,
//! embedded light tables) goes through a [`Serializer`]: a sequential,
//! mode-flagged stream with a raw byte channel and typed helpers on top.
//! All multi-byte values are little-endian regardless of host.

mod error;
mod file;
mod stream;
mod vector;

pub use error::SerializerError;
pub use file::FileSerializer;
pub use stream::{Serializer, Transferable};
pub use vector::VectorSerializer;
