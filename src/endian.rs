//! Fixed-width integers and byte-order conversion.
//!
//! Rust's `u8..u64` and `i8..i64` are the exact-width types; this module
//! only adds the swap and host/wire conversions storage formats need.

/// Reverse the byte order of a 16-bit value
#[inline]
pub const fn byteswap16(x: u16) -> u16 {
    x.swap_bytes()
}

/// Reverse the byte order of a 32-bit value
#[inline]
pub const fn byteswap32(x: u32) -> u32 {
    x.swap_bytes()
}

/// Reverse the byte order of a 64-bit value
#[inline]
pub const fn byteswap64(x: u64) -> u64 {
    x.swap_bytes()
}

/// True when the host stores the most significant byte first
#[inline]
pub const fn host_is_big_endian() -> bool {
    cfg!(target_endian = "big")
}

macro_rules! host_order {
    ($to_be:ident, $from_be:ident, $to_le:ident, $from_le:ident, $ty:ty, $swap:ident) => {
        /// Host order to big-endian
        #[inline]
        pub const fn $to_be(x: $ty) -> $ty {
            if host_is_big_endian() {
                x
            } else {
                $swap(x)
            }
        }

        /// Big-endian to host order
        #[inline]
        pub const fn $from_be(x: $ty) -> $ty {
            $to_be(x)
        }

        /// Host order to little-endian
        #[inline]
        pub const fn $to_le(x: $ty) -> $ty {
            if host_is_big_endian() {
                $swap(x)
            } else {
                x
            }
        }

        /// Little-endian to host order
        #[inline]
        pub const fn $from_le(x: $ty) -> $ty {
            $to_le(x)
        }
    };
}

host_order!(host_to_be16, be16_to_host, host_to_le16, le16_to_host, u16, byteswap16);
host_order!(host_to_be32, be32_to_host, host_to_le32, le32_to_host, u32, byteswap32);
host_order!(host_to_be64, be64_to_host, host_to_le64, le64_to_host, u64, byteswap64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byteswap_whole_bytes() {
        assert_eq!(byteswap16(0x1122), 0x2211);
        assert_eq!(byteswap32(0x1122_3344), 0x4433_2211);
        assert_eq!(byteswap64(0x0102_0304_0506_0708), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_byteswap_involution() {
        for x in [0u32, 1, 0xdead_beef, u32::MAX, 0x8000_0000, 0x00ff_00ff] {
            assert_eq!(byteswap32(byteswap32(x)), x);
        }
        let mut x: u32 = 0x9e37_79b9;
        for _ in 0..1000 {
            assert_eq!(byteswap32(byteswap32(x)), x);
            x = x.wrapping_mul(0x0100_0193).wrapping_add(7);
        }
    }

    #[test]
    fn test_big_endian_matches_wire_bytes() {
        let x = 0x0a0b_0c0du32;
        assert_eq!(host_to_be32(x).to_ne_bytes(), [0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(be32_to_host(host_to_be32(x)), x);
        assert_eq!(host_to_le64(1).to_ne_bytes()[0], 1);
        assert_eq!(le16_to_host(host_to_le16(0xabcd)), 0xabcd);
    }
}
