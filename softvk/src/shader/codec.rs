//! Conversion between packed texel data and the four 32-bit components seen by shader code.
//!
//! Components are carried as raw bits in [`SimdUInt`] lanes. Whether a component is a float or an
//! integer depends on the numeric format. Components that a format lacks are filled with zero for
//! red, green and blue, and with one (of the format's numeric type) for alpha.

use super::simd::{SimdFloat, SimdInt, SimdUInt};
use crate::format::Format;
use half::f16;

const ZERO: SimdFloat = SimdFloat::splat(0.0);
const ONE: SimdFloat = SimdFloat::splat(1.0);

/// Converts an sRGB encoded value to linear.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Unpacks texels read from memory into four components.
///
/// `packed` holds the texel data, four bytes per element. For texels smaller than four bytes, only
/// the low bits of `packed[0]` are meaningful.
///
/// # Panics
///
/// - Panics if `format` can't be read by shader code.
pub fn decode_texel(format: Format, packed: [SimdInt; 4]) -> [SimdUInt; 4] {
    let p = packed[0];

    match format {
        Format::R32G32B32A32_SFLOAT | Format::R32G32B32A32_SINT | Format::R32G32B32A32_UINT => {
            packed.map(SimdInt::as_uint)
        }
        Format::R32_SINT | Format::R32_UINT => {
            int4(p, SimdInt::splat(0), SimdInt::splat(0), SimdInt::splat(1))
        }
        Format::R32_SFLOAT | Format::D32_SFLOAT | Format::D32_SFLOAT_S8_UINT => {
            [p.as_uint(), zero_f(), zero_f(), one_f()]
        }
        Format::D16_UNORM => float4(unorm(p, 0, 0xFFFF), ZERO, ZERO, ONE),
        Format::R16G16B16A16_UNORM => float4(
            unorm(p, 0, 0xFFFF),
            unorm(p, 16, 0xFFFF),
            unorm(packed[1], 0, 0xFFFF),
            unorm(packed[1], 16, 0xFFFF),
        ),
        Format::R16G16B16A16_SNORM => float4(
            snorm16(p << 16),
            snorm16(p),
            snorm16(packed[1] << 16),
            snorm16(packed[1]),
        ),
        Format::R16G16B16A16_SINT => int4(
            (p << 16) >> 16,
            p >> 16,
            (packed[1] << 16) >> 16,
            packed[1] >> 16,
        ),
        Format::R16G16B16A16_UINT => int4(
            p & SimdInt::splat(0xFFFF),
            (p >> 16) & SimdInt::splat(0xFFFF),
            packed[1] & SimdInt::splat(0xFFFF),
            (packed[1] >> 16) & SimdInt::splat(0xFFFF),
        ),
        Format::R16G16B16A16_SFLOAT => [
            half_to_float_bits(p.as_uint()),
            half_to_float_bits(p.as_uint() >> 16),
            half_to_float_bits(packed[1].as_uint()),
            half_to_float_bits(packed[1].as_uint() >> 16),
        ],
        Format::R8G8B8A8_SNORM | Format::A8B8G8R8_SNORM_PACK32 => {
            float4(snorm8(p << 24), snorm8(p << 16), snorm8(p << 8), snorm8(p))
        }
        Format::R8G8B8A8_UNORM | Format::A8B8G8R8_UNORM_PACK32 => float4(
            unorm(p, 0, 0xFF),
            unorm(p, 8, 0xFF),
            unorm(p, 16, 0xFF),
            unorm(p, 24, 0xFF),
        ),
        Format::R8G8B8A8_SRGB | Format::A8B8G8R8_SRGB_PACK32 => float4(
            unorm(p, 0, 0xFF).map(srgb_to_linear),
            unorm(p, 8, 0xFF).map(srgb_to_linear),
            unorm(p, 16, 0xFF).map(srgb_to_linear),
            unorm(p, 24, 0xFF),
        ),
        Format::B8G8R8A8_UNORM => float4(
            unorm(p, 16, 0xFF),
            unorm(p, 8, 0xFF),
            unorm(p, 0, 0xFF),
            unorm(p, 24, 0xFF),
        ),
        Format::B8G8R8A8_SRGB => float4(
            unorm(p, 16, 0xFF).map(srgb_to_linear),
            unorm(p, 8, 0xFF).map(srgb_to_linear),
            unorm(p, 0, 0xFF).map(srgb_to_linear),
            unorm(p, 24, 0xFF),
        ),
        Format::R8G8B8A8_UINT | Format::A8B8G8R8_UINT_PACK32 => {
            let p = p.as_uint();
            [
                p & SimdUInt::splat(0xFF),
                (p >> 8) & SimdUInt::splat(0xFF),
                (p >> 16) & SimdUInt::splat(0xFF),
                (p >> 24) & SimdUInt::splat(0xFF),
            ]
        }
        Format::R8G8B8A8_SINT | Format::A8B8G8R8_SINT_PACK32 => {
            int4((p << 24) >> 24, (p << 16) >> 24, (p << 8) >> 24, p >> 24)
        }
        Format::R8_UNORM => float4(unorm(p, 0, 0xFF), ZERO, ZERO, ONE),
        Format::R8_SNORM => float4(snorm8(p << 24), ZERO, ZERO, ONE),
        Format::R8_UINT | Format::S8_UINT => [
            p.as_uint() & SimdUInt::splat(0xFF),
            SimdUInt::splat(0),
            SimdUInt::splat(0),
            SimdUInt::splat(1),
        ],
        Format::R8_SINT => int4(
            (p << 24) >> 24,
            SimdInt::splat(0),
            SimdInt::splat(0),
            SimdInt::splat(1),
        ),
        Format::R8G8_UNORM => float4(unorm(p, 0, 0xFF), unorm(p, 8, 0xFF), ZERO, ONE),
        Format::R8G8_SNORM => float4(snorm8(p << 24), snorm8(p << 16), ZERO, ONE),
        Format::R8G8_UINT => [
            p.as_uint() & SimdUInt::splat(0xFF),
            (p.as_uint() >> 8) & SimdUInt::splat(0xFF),
            SimdUInt::splat(0),
            SimdUInt::splat(1),
        ],
        Format::R8G8_SINT => int4(
            (p << 24) >> 24,
            (p << 16) >> 24,
            SimdInt::splat(0),
            SimdInt::splat(1),
        ),
        Format::R16_SFLOAT => [half_to_float_bits(p.as_uint()), zero_f(), zero_f(), one_f()],
        Format::R16_UNORM => float4(unorm(p, 0, 0xFFFF), ZERO, ZERO, ONE),
        Format::R16_SNORM => float4(snorm16(p << 16), ZERO, ZERO, ONE),
        Format::R16_UINT => int4(
            p & SimdInt::splat(0xFFFF),
            SimdInt::splat(0),
            SimdInt::splat(0),
            SimdInt::splat(1),
        ),
        Format::R16_SINT => int4(
            (p << 16) >> 16,
            SimdInt::splat(0),
            SimdInt::splat(0),
            SimdInt::splat(1),
        ),
        Format::R16G16_SFLOAT => [
            half_to_float_bits(p.as_uint()),
            half_to_float_bits(p.as_uint() >> 16),
            zero_f(),
            one_f(),
        ],
        Format::R16G16_UNORM => {
            float4(unorm(p, 0, 0xFFFF), unorm(p, 16, 0xFFFF), ZERO, ONE)
        }
        Format::R16G16_SNORM => {
            float4(snorm16(p << 16), snorm16(p), ZERO, ONE)
        }
        Format::R16G16_UINT => int4(
            p & SimdInt::splat(0xFFFF),
            (p >> 16) & SimdInt::splat(0xFFFF),
            SimdInt::splat(0),
            SimdInt::splat(1),
        ),
        Format::R16G16_SINT => int4((p << 16) >> 16, p >> 16, SimdInt::splat(0), SimdInt::splat(1)),
        Format::R32G32_SINT | Format::R32G32_UINT => {
            int4(p, packed[1], SimdInt::splat(0), SimdInt::splat(1))
        }
        Format::R32G32_SFLOAT => [p.as_uint(), packed[1].as_uint(), zero_f(), one_f()],
        Format::A2B10G10R10_UINT_PACK32 => int4(
            p & SimdInt::splat(0x3FF),
            (p >> 10) & SimdInt::splat(0x3FF),
            (p >> 20) & SimdInt::splat(0x3FF),
            (p >> 30) & SimdInt::splat(0x3),
        ),
        Format::A2R10G10B10_UINT_PACK32 => int4(
            (p >> 20) & SimdInt::splat(0x3FF),
            (p >> 10) & SimdInt::splat(0x3FF),
            p & SimdInt::splat(0x3FF),
            (p >> 30) & SimdInt::splat(0x3),
        ),
        Format::A2B10G10R10_UNORM_PACK32 => float4(
            unorm(p, 0, 0x3FF),
            unorm(p, 10, 0x3FF),
            unorm(p, 20, 0x3FF),
            unorm(p, 30, 0x3),
        ),
        Format::A2R10G10B10_UNORM_PACK32 => float4(
            unorm(p, 20, 0x3FF),
            unorm(p, 10, 0x3FF),
            unorm(p, 0, 0x3FF),
            unorm(p, 30, 0x3),
        ),
        Format::R4G4B4A4_UNORM_PACK16 => float4(
            unorm(p, 12, 0xF),
            unorm(p, 8, 0xF),
            unorm(p, 4, 0xF),
            unorm(p, 0, 0xF),
        ),
        Format::B4G4R4A4_UNORM_PACK16 => float4(
            unorm(p, 4, 0xF),
            unorm(p, 8, 0xF),
            unorm(p, 12, 0xF),
            unorm(p, 0, 0xF),
        ),
        Format::A4R4G4B4_UNORM_PACK16 => float4(
            unorm(p, 8, 0xF),
            unorm(p, 4, 0xF),
            unorm(p, 0, 0xF),
            unorm(p, 12, 0xF),
        ),
        Format::A4B4G4R4_UNORM_PACK16 => float4(
            unorm(p, 0, 0xF),
            unorm(p, 4, 0xF),
            unorm(p, 8, 0xF),
            unorm(p, 12, 0xF),
        ),
        Format::R5G6B5_UNORM_PACK16 => float4(
            unorm(p, 11, 0x1F),
            unorm(p, 5, 0x3F),
            unorm(p, 0, 0x1F),
            ONE,
        ),
        Format::B5G6R5_UNORM_PACK16 => float4(
            unorm(p, 0, 0x1F),
            unorm(p, 5, 0x3F),
            unorm(p, 11, 0x1F),
            ONE,
        ),
        Format::R5G5B5A1_UNORM_PACK16 => float4(
            unorm(p, 11, 0x1F),
            unorm(p, 6, 0x1F),
            unorm(p, 1, 0x1F),
            unorm(p, 0, 0x1),
        ),
        Format::B5G5R5A1_UNORM_PACK16 => float4(
            unorm(p, 1, 0x1F),
            unorm(p, 6, 0x1F),
            unorm(p, 11, 0x1F),
            unorm(p, 0, 0x1),
        ),
        Format::A1R5G5B5_UNORM_PACK16 => float4(
            unorm(p, 10, 0x1F),
            unorm(p, 5, 0x1F),
            unorm(p, 0, 0x1F),
            unorm(p, 15, 0x1),
        ),
        Format::B10G11R11_UFLOAT_PACK32 => [
            half_to_float_bits(((p << 4) & SimdInt::splat(0x7FF0)).as_uint()),
            half_to_float_bits(((p >> 7) & SimdInt::splat(0x7FF0)).as_uint()),
            half_to_float_bits(((p >> 17) & SimdInt::splat(0x7FE0)).as_uint()),
            one_f(),
        ],
        _ => panic!("reading texels of format {:?} is not supported", format),
    }
}

/// Packs four components into texel data to be written to memory.
///
/// Returns the packed data, four bytes per element, and the size of the texel in bytes.
///
/// # Panics
///
/// - Panics if `format` can't be written by shader code.
pub fn encode_texel(format: Format, texel: [SimdUInt; 4]) -> ([SimdUInt; 4], usize) {
    let float = |i: usize| texel[i].as_float();
    let zero = SimdUInt::splat(0);

    let to_unorm = |i: usize, scale: f32| {
        float(i)
            .clamp(0.0, 1.0)
            .map(|x| x * scale)
            .round()
            .to_uint()
    };
    let to_snorm = |i: usize, scale: f32| {
        float(i)
            .clamp(-1.0, 1.0)
            .map(|x| x * scale)
            .round_int()
            .as_uint()
    };
    let bits = |i: usize, mask: u32| texel[i] & SimdUInt::splat(mask);

    match format {
        Format::R32G32B32A32_SFLOAT | Format::R32G32B32A32_SINT | Format::R32G32B32A32_UINT => {
            (texel, 16)
        }
        Format::R32_SFLOAT | Format::R32_SINT | Format::R32_UINT => {
            ([texel[0], zero, zero, zero], 4)
        }
        Format::R8G8B8A8_UNORM => (
            [
                to_unorm(0, 255.0)
                    | (to_unorm(1, 255.0) << 8)
                    | (to_unorm(2, 255.0) << 16)
                    | (to_unorm(3, 255.0) << 24),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        Format::R8G8B8A8_SNORM => {
            let byte = |i| to_snorm(i, 127.0) & SimdUInt::splat(0xFF);
            ([byte(0) | (byte(1) << 8) | (byte(2) << 16) | (byte(3) << 24), zero, zero, zero], 4)
        }
        Format::R8G8B8A8_SINT | Format::R8G8B8A8_UINT => (
            [
                bits(0, 0xFF)
                    | (bits(1, 0xFF) << 8)
                    | (bits(2, 0xFF) << 16)
                    | (bits(3, 0xFF) << 24),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        Format::R16G16B16A16_SFLOAT => (
            [
                float_to_half_bits(texel[0]) | (float_to_half_bits(texel[1]) << 16),
                float_to_half_bits(texel[2]) | (float_to_half_bits(texel[3]) << 16),
                zero,
                zero,
            ],
            8,
        ),
        Format::R16G16B16A16_SINT | Format::R16G16B16A16_UINT => (
            [
                bits(0, 0xFFFF) | (bits(1, 0xFFFF) << 16),
                bits(2, 0xFFFF) | (bits(3, 0xFFFF) << 16),
                zero,
                zero,
            ],
            8,
        ),
        Format::R32G32_SFLOAT | Format::R32G32_SINT | Format::R32G32_UINT => {
            ([texel[0], texel[1], zero, zero], 8)
        }
        Format::R16G16_SFLOAT => (
            [
                float_to_half_bits(texel[0]) | (float_to_half_bits(texel[1]) << 16),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        Format::R16G16_SINT | Format::R16G16_UINT => {
            ([bits(0, 0xFFFF) | (bits(1, 0xFFFF) << 16), zero, zero, zero], 4)
        }
        Format::B10G11R11_UFLOAT_PACK32 => {
            // Truncates instead of rounding.
            let half = |i: usize| float_to_half_bits(float(i).max(SimdFloat::splat(0.0)).as_uint());
            (
                [
                    ((half(0) & SimdUInt::splat(0x7FF0)) >> 4)
                        | ((half(1) & SimdUInt::splat(0x7FF0)) << 7)
                        | ((half(2) & SimdUInt::splat(0x7FE0)) << 17),
                    zero,
                    zero,
                    zero,
                ],
                4,
            )
        }
        Format::R16_SFLOAT => ([float_to_half_bits(texel[0]), zero, zero, zero], 2),
        Format::R16G16B16A16_UNORM => (
            [
                to_unorm(0, 65535.0) | (to_unorm(1, 65535.0) << 16),
                to_unorm(2, 65535.0) | (to_unorm(3, 65535.0) << 16),
                zero,
                zero,
            ],
            8,
        ),
        Format::A2B10G10R10_UNORM_PACK32 => (
            [
                to_unorm(0, 1023.0)
                    | (to_unorm(1, 1023.0) << 10)
                    | (to_unorm(2, 1023.0) << 20)
                    | (to_unorm(3, 3.0) << 30),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        Format::R16G16_UNORM => {
            let packed = to_unorm(0, 65535.0) | (to_unorm(1, 65535.0) << 16);
            ([packed, zero, zero, zero], 4)
        }
        Format::R8G8_UNORM => {
            let packed = to_unorm(0, 255.0) | (to_unorm(1, 255.0) << 8);
            ([packed, zero, zero, zero], 2)
        }
        Format::R16_UNORM => ([to_unorm(0, 65535.0), zero, zero, zero], 2),
        Format::R8_UNORM => ([to_unorm(0, 255.0), zero, zero, zero], 1),
        Format::R16G16B16A16_SNORM => (
            [
                (to_snorm(0, 32767.0) & SimdUInt::splat(0xFFFF)) | (to_snorm(1, 32767.0) << 16),
                (to_snorm(2, 32767.0) & SimdUInt::splat(0xFFFF)) | (to_snorm(3, 32767.0) << 16),
                zero,
                zero,
            ],
            8,
        ),
        Format::R16G16_SNORM => (
            [
                (to_snorm(0, 32767.0) & SimdUInt::splat(0xFFFF)) | (to_snorm(1, 32767.0) << 16),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        Format::R8G8_SNORM => (
            [
                (to_snorm(0, 127.0) & SimdUInt::splat(0xFF)) | (to_snorm(1, 127.0) << 8),
                zero,
                zero,
                zero,
            ],
            2,
        ),
        Format::R16_SNORM => ([to_snorm(0, 32767.0), zero, zero, zero], 2),
        Format::R8_SNORM => ([to_snorm(0, 127.0), zero, zero, zero], 1),
        Format::R8G8_SINT | Format::R8G8_UINT => {
            ([bits(0, 0xFF) | (bits(1, 0xFF) << 8), zero, zero, zero], 2)
        }
        Format::R16_SINT | Format::R16_UINT => ([bits(0, 0xFFFF), zero, zero, zero], 2),
        Format::R8_SINT | Format::R8_UINT => ([bits(0, 0xFF), zero, zero, zero], 1),
        Format::A2B10G10R10_UINT_PACK32 => (
            [
                bits(0, 0x3FF)
                    | (bits(1, 0x3FF) << 10)
                    | (bits(2, 0x3FF) << 20)
                    | (bits(3, 0x3) << 30),
                zero,
                zero,
                zero,
            ],
            4,
        ),
        _ => panic!("writing texels of format {:?} is not supported", format),
    }
}

fn unorm(packed: SimdInt, shift: u32, mask: i32) -> SimdFloat {
    ((packed >> shift) & SimdInt::splat(mask))
        .to_float()
        .map(|x| x * (1.0 / mask as f32))
}

/// The component must be in the top 8 bits.
fn snorm8(packed: SimdInt) -> SimdFloat {
    (packed & SimdInt::splat(0xFF00_0000_u32 as i32))
        .to_float()
        .map(|x| (x * (1.0 / 0x7F00_0000 as f32)).max(-1.0))
}

/// The component must be in the top 16 bits.
fn snorm16(packed: SimdInt) -> SimdFloat {
    (packed & SimdInt::splat(0xFFFF_0000_u32 as i32))
        .to_float()
        .map(|x| (x * (1.0 / 0x7FFF_0000 as f32)).max(-1.0))
}

fn half_to_float_bits(bits: SimdUInt) -> SimdUInt {
    bits.map(|x| f16::from_bits(x as u16).to_f32().to_bits())
}

fn float_to_half_bits(bits: SimdUInt) -> SimdUInt {
    bits.map(|x| u32::from(f16::from_f32(f32::from_bits(x)).to_bits()))
}

fn float4(r: SimdFloat, g: SimdFloat, b: SimdFloat, a: SimdFloat) -> [SimdUInt; 4] {
    [r.as_uint(), g.as_uint(), b.as_uint(), a.as_uint()]
}

fn int4(r: SimdInt, g: SimdInt, b: SimdInt, a: SimdInt) -> [SimdUInt; 4] {
    [r.as_uint(), g.as_uint(), b.as_uint(), a.as_uint()]
}

fn zero_f() -> SimdUInt {
    ZERO.as_uint()
}

fn one_f() -> SimdUInt {
    ONE.as_uint()
}

#[cfg(test)]
mod tests {
    use super::{decode_texel, encode_texel, srgb_to_linear};
    use crate::{
        format::Format,
        shader::simd::{SimdFloat, SimdInt, SimdUInt},
    };

    fn floats(components: [SimdUInt; 4]) -> [f32; 4] {
        components.map(|c| c.as_float().0[0])
    }

    fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
        for (a, e) in actual.into_iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    fn packed(word: u32) -> [SimdInt; 4] {
        [SimdInt::splat(word as i32), SimdInt::splat(0), SimdInt::splat(0), SimdInt::splat(0)]
    }

    fn texel(values: [f32; 4]) -> [SimdUInt; 4] {
        values.map(|v| SimdFloat::splat(v).as_uint())
    }

    #[test]
    fn missing_components_default() {
        assert_close(floats(decode_texel(Format::R8_UNORM, packed(0xFF))), [1.0, 0.0, 0.0, 1.0]);

        let ints = decode_texel(Format::R32_UINT, packed(7));
        assert_eq!(ints.map(|c| c.0[0]), [7, 0, 0, 1]);

        let stencil = decode_texel(Format::S8_UINT, packed(0x1_23));
        assert_eq!(stencil.map(|c| c.0[0]), [0x23, 0, 0, 1]);
    }

    #[test]
    fn srgb_decode() {
        let [r, g, b, a] = floats(decode_texel(Format::R8G8B8A8_SRGB, packed(0x80FF_0080)));
        assert!((r - 0.21586).abs() < 1e-4);
        assert_eq!(g, 0.0);
        assert!((b - 1.0).abs() < 1e-6);
        assert!((a - 128.0 / 255.0).abs() < 1e-6);
        assert!((srgb_to_linear(0.02) - 0.02 / 12.92).abs() < 1e-7);
    }

    #[test]
    fn swizzled_formats() {
        let bgra = decode_texel(Format::B8G8R8A8_UNORM, packed(0xFF00_00FF));
        assert_close(floats(bgra), [0.0, 0.0, 1.0, 1.0]);

        let r5g6b5 = decode_texel(Format::R5G6B5_UNORM_PACK16, packed(0xF800));
        assert_close(floats(r5g6b5), [1.0, 0.0, 0.0, 1.0]);

        let [r, _, _, a] = floats(decode_texel(Format::A1R5G5B5_UNORM_PACK16, packed(0xFC00)));
        assert!((r - 1.0).abs() < 1e-6);
        assert_eq!(a, 1.0);

        let a4b4g4r4 = decode_texel(Format::A4B4G4R4_UNORM_PACK16, packed(0xF00F));
        assert_close(floats(a4b4g4r4), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn snorm_clamps_to_minus_one() {
        let [r, g, _, _] = floats(decode_texel(Format::R8G8_SNORM, packed(0x7F80)));
        assert_eq!(r, -1.0);
        assert!((g - 1.0).abs() < 1e-6);
    }

    #[test]
    fn signed_integers_are_sign_extended() {
        let components = decode_texel(
            Format::R16G16B16A16_SINT,
            [
                SimdInt::splat(0x0002_FFFF),
                SimdInt::splat(0x8000_0001_u32 as i32),
                SimdInt::splat(0),
                SimdInt::splat(0),
            ],
        );
        assert_eq!(components.map(|c| c.as_int().0[0]), [-1, 2, 1, -32768]);
    }

    #[test]
    fn unorm8_round_trip() {
        let (packed_texel, size) =
            encode_texel(Format::R8G8B8A8_UNORM, texel([1.0, 128.0 / 255.0, -0.5, 2.0]));
        assert_eq!(size, 4);
        assert_eq!(packed_texel[0].0[0], 0xFF00_80FF);

        let decoded = decode_texel(Format::R8G8B8A8_UNORM, packed(packed_texel[0].0[0]));
        let [r, g, b, a] = floats(decoded);
        assert!((g - 0.50196).abs() < 1e-5);
        assert_close([r, 0.0, b, a], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn b10g11r11_truncates() {
        let (packed_texel, size) =
            encode_texel(Format::B10G11R11_UFLOAT_PACK32, texel([1.01171875, -3.0, 0.5, 0.0]));
        assert_eq!(size, 4);

        let [r, g, b, a] =
            floats(decode_texel(Format::B10G11R11_UFLOAT_PACK32, packed(packed_texel[0].0[0])));
        assert_eq!([r, g, b, a], [1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn half_float_packing() {
        let (packed_texel, size) =
            encode_texel(Format::R16G16B16A16_SFLOAT, texel([1.0, -2.0, 0.5, 0.0]));
        assert_eq!(size, 8);
        assert_eq!(packed_texel[0].0[0], 0xC000_3C00);
        assert_eq!(packed_texel[1].0[0], 0x0000_3800);
    }

    #[test]
    fn narrow_snorm() {
        let (packed_texel, size) = encode_texel(Format::R8G8_SNORM, texel([-1.0, 0.5, 0.0, 0.0]));
        assert_eq!(size, 2);
        assert_eq!(packed_texel[0].0[0] & 0xFFFF, 0x4081);
    }

    #[test]
    fn unsupported_formats() {
        assert_should_panic!("not supported", {
            decode_texel(Format::E5B9G9R9_UFLOAT_PACK32, packed(0));
        });
        assert_should_panic!("not supported", {
            encode_texel(Format::B8G8R8A8_UNORM, texel([0.0; 4]));
        });
    }
}
