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

//! The CPU tonemap pass.

use crate::options::TonemapSettings;

const INV_GAMMA: f32 = 1.0 / 2.2;

/// Tonemaps a `width * height * 3` HDR buffer into a caller-provided
/// RGBA8 buffer of `width * height` pixels.
pub fn tonemap_into(input: &[f32], output: &mut [u32], settings: &TonemapSettings) {
    debug_assert_eq!(input.len(), output.len() * 3);

    for (pixel, rgb) in output.iter_mut().zip(input.chunks_exact(3)) {
        let mut channels = [0u32; 3];
        for (slot, &value) in channels.iter_mut().zip(rgb) {
            let exposed = value * settings.scale * settings.exposure_factor
                + settings.exposure_offset;
            let mapped = apply_operator(exposed.max(0.0), settings.method);
            let graded = if settings.use_gamma {
                mapped.powf(INV_GAMMA)
            } else {
                mapped
            };
            *slot = (graded.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        }
        *pixel = channels[0] | (channels[1] << 8) | (channels[2] << 16) | 0xFF00_0000;
    }
}

fn apply_operator(value: f32, method: u32) -> f32 {
    match method {
        1 => value / (1.0 + value),
        2 => {
            // Reinhard with a soft white point of 4.
            let white2 = 16.0;
            value * (1.0 + value / white2) / (1.0 + value)
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_stays_black_and_alpha_is_opaque() {
        let input = [0.0f32; 3];
        let mut output = [0u32; 1];
        tonemap_into(&input, &mut output, &TonemapSettings::default());
        assert_eq!(output[0], 0xFF00_0000);
    }

    #[test]
    fn bright_values_saturate() {
        let input = [10.0f32, 10.0, 10.0];
        let mut output = [0u32; 1];
        tonemap_into(&input, &mut output, &TonemapSettings::default());
        assert_eq!(output[0], 0xFFFF_FFFF);
    }

    #[test]
    fn scale_divides_accumulation() {
        let input = [4.0f32, 0.0, 0.0];
        let mut output = [0u32; 1];
        let settings = TonemapSettings {
            scale: 0.25,
            use_gamma: false,
            ..Default::default()
        };
        tonemap_into(&input, &mut output, &settings);
        assert_eq!(output[0] & 0xFF, 255);
        assert_eq!((output[0] >> 8) & 0xFF, 0);
    }

    #[test]
    fn reinhard_compresses_highlights() {
        let input = [3.0f32, 3.0, 3.0];
        let mut output = [0u32; 1];
        let settings = TonemapSettings {
            method: 1,
            use_gamma: false,
            ..Default::default()
        };
        tonemap_into(&input, &mut output, &settings);
        let r = output[0] & 0xFF;
        assert_eq!(r, (0.75f32 * 255.0 + 0.5) as u32);
    }
}
