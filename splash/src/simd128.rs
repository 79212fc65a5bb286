//! Minimal 4 x u32 vector type for the vectorized probe
//!
//! Wraps the platform's 128-bit integer vector with just the operations the
//! probe needs. On x86 some of these are SSE4.1 instructions, so callers must
//! confirm [`is_supported()`] before running any of this code.

#[cfg(target_arch = "aarch64")]
use core::arch::aarch64::{
    uint32x4_t, vandq_u32, vceqq_u32, vdupq_n_s32, vdupq_n_u32, vget_high_u32, vget_lane_u32,
    vget_low_u32, vgetq_lane_u32, vld1q_u32, vmulq_u32, vorr_u32, vorrq_u32, vshlq_u32,
};
#[cfg(target_arch = "x86")]
use std::arch::x86::{
    __m128i, _mm_and_si128, _mm_cmpeq_epi32, _mm_cvtsi128_si32, _mm_cvtsi32_si128,
    _mm_extract_epi32, _mm_loadu_si128, _mm_mullo_epi32, _mm_or_si128, _mm_set1_epi32,
    _mm_srl_epi32, _mm_srli_epi64, _mm_unpackhi_epi64,
};
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    __m128i, _mm_and_si128, _mm_cmpeq_epi32, _mm_cvtsi128_si32, _mm_cvtsi32_si128,
    _mm_extract_epi32, _mm_loadu_si128, _mm_mullo_epi32, _mm_or_si128, _mm_set1_epi32,
    _mm_srl_epi32, _mm_srli_epi64, _mm_unpackhi_epi64,
};

/// Check whether this CPU can run [`Simd128`] code.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) fn is_supported() -> bool {
    is_x86_feature_detected!("sse4.1")
}

/// Check whether this CPU can run [`Simd128`] code.
#[cfg(target_arch = "aarch64")]
pub(crate) fn is_supported() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

/// Four 32-bit unsigned lanes
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Clone, Copy)]
pub(crate) struct Simd128(__m128i);

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl Simd128 {
    /// Copy one value into all four lanes.
    #[inline(always)]
    pub(crate) fn splat(x: u32) -> Self {
        unsafe { Self(_mm_set1_epi32(x as i32)) }
    }

    /// Read from array pointer (potentially unaligned)
    #[inline(always)]
    pub(crate) fn read(src: &[u32; 4]) -> Self {
        unsafe { Self(_mm_loadu_si128(src.as_ptr() as *const __m128i)) }
    }

    /// Lane-wise wrapping multiply, keeping the low 32 bits of each product.
    #[inline(always)]
    pub(crate) fn mul(self, rhs: Self) -> Self {
        unsafe { Self(_mm_mullo_epi32(self.0, rhs.0)) }
    }

    /// Logical right shift of every lane by the same runtime amount.
    ///
    /// Shifts of 32 or more clear the lane.
    #[inline(always)]
    pub(crate) fn shr(self, count: u32) -> Self {
        unsafe { Self(_mm_srl_epi32(self.0, _mm_cvtsi32_si128(count as i32))) }
    }

    /// Lane-wise equality, all ones where equal and zero elsewhere.
    #[inline(always)]
    pub(crate) fn cmpeq(self, rhs: Self) -> Self {
        unsafe { Self(_mm_cmpeq_epi32(self.0, rhs.0)) }
    }

    /// Bitwise AND
    #[inline(always)]
    pub(crate) fn and(self, rhs: Self) -> Self {
        unsafe { Self(_mm_and_si128(self.0, rhs.0)) }
    }

    /// Bitwise OR
    #[inline(always)]
    pub(crate) fn or(self, rhs: Self) -> Self {
        unsafe { Self(_mm_or_si128(self.0, rhs.0)) }
    }

    /// Extract lane `N`.
    #[inline(always)]
    pub(crate) fn lane<const N: i32>(self) -> u32 {
        unsafe { _mm_extract_epi32::<N>(self.0) as u32 }
    }

    /// OR all four lanes together: upper and lower 64-bit halves first,
    /// then the two remaining 32-bit lanes.
    #[inline(always)]
    pub(crate) fn fold_or(self) -> u32 {
        unsafe {
            let x = _mm_or_si128(self.0, _mm_unpackhi_epi64(self.0, self.0));
            let x = _mm_or_si128(x, _mm_srli_epi64::<32>(x));
            _mm_cvtsi128_si32(x) as u32
        }
    }
}

/// Four 32-bit unsigned lanes
#[cfg(target_arch = "aarch64")]
#[derive(Clone, Copy)]
pub(crate) struct Simd128(uint32x4_t);

#[cfg(target_arch = "aarch64")]
impl Simd128 {
    /// Copy one value into all four lanes.
    #[inline(always)]
    pub(crate) fn splat(x: u32) -> Self {
        unsafe { Self(vdupq_n_u32(x)) }
    }

    /// Read from array pointer (potentially unaligned)
    #[inline(always)]
    pub(crate) fn read(src: &[u32; 4]) -> Self {
        unsafe { Self(vld1q_u32(src.as_ptr())) }
    }

    /// Lane-wise wrapping multiply, keeping the low 32 bits of each product.
    #[inline(always)]
    pub(crate) fn mul(self, rhs: Self) -> Self {
        unsafe { Self(vmulq_u32(self.0, rhs.0)) }
    }

    /// Logical right shift of every lane by the same runtime amount.
    ///
    /// Shifts of 32 or more clear the lane.
    #[inline(always)]
    pub(crate) fn shr(self, count: u32) -> Self {
        // USHL with a negative count shifts right
        unsafe { Self(vshlq_u32(self.0, vdupq_n_s32(-(count as i32)))) }
    }

    /// Lane-wise equality, all ones where equal and zero elsewhere.
    #[inline(always)]
    pub(crate) fn cmpeq(self, rhs: Self) -> Self {
        unsafe { Self(vceqq_u32(self.0, rhs.0)) }
    }

    /// Bitwise AND
    #[inline(always)]
    pub(crate) fn and(self, rhs: Self) -> Self {
        unsafe { Self(vandq_u32(self.0, rhs.0)) }
    }

    /// Bitwise OR
    #[inline(always)]
    pub(crate) fn or(self, rhs: Self) -> Self {
        unsafe { Self(vorrq_u32(self.0, rhs.0)) }
    }

    /// Extract lane `N`.
    #[inline(always)]
    pub(crate) fn lane<const N: i32>(self) -> u32 {
        unsafe { vgetq_lane_u32::<N>(self.0) }
    }

    /// OR all four lanes together: upper and lower 64-bit halves first,
    /// then the two remaining 32-bit lanes.
    #[inline(always)]
    pub(crate) fn fold_or(self) -> u32 {
        unsafe {
            let x = vorr_u32(vget_low_u32(self.0), vget_high_u32(self.0));
            vget_lane_u32::<0>(x) | vget_lane_u32::<1>(x)
        }
    }
}
