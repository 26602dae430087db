//! Flow identity for per-packet inspection
//!
//! The key is the raw 5-tuple as the capture layer delivered it. There is no
//! src/dst canonicalization: the caller labels direction explicitly on every
//! packet, so a flow and its reply are distinct keys unless the caller folds
//! them together with `reverse()`.

use serde::{Deserialize, Serialize};

/// 5-tuple flow key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct FlowKey {
    /// Source IP (IPv4 as u32)
    pub src_ip: u32,
    /// Destination IP
    pub dst_ip: u32,
    /// Source port
    pub src_port: u16,
    /// Destination port
    pub dst_port: u16,
    /// IP protocol (TCP=6, UDP=17)
    pub protocol: u8,
}

impl FlowKey {
    /// Create new flow key
    #[inline(always)]
    pub const fn new(
        src_ip: u32,
        dst_ip: u32,
        src_port: u16,
        dst_port: u16,
        protocol: u8,
    ) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Compute hash using FNV-1a (fast, good distribution)
    #[inline(always)]
    pub fn fnv_hash(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;

        let mut h = FNV_OFFSET;

        for byte in self.src_ip.to_ne_bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        for byte in self.dst_ip.to_ne_bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        for byte in self.src_port.to_ne_bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        for byte in self.dst_port.to_ne_bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h ^= self.protocol as u64;
        h = h.wrapping_mul(FNV_PRIME);

        h
    }

    /// Create reverse (reply) flow key
    #[inline(always)]
    pub const fn reverse(&self) -> Self {
        Self::new(
            self.dst_ip,
            self.src_ip,
            self.dst_port,
            self.src_port,
            self.protocol,
        )
    }

    /// Zero the host octet of both addresses (alert anonymization)
    #[inline(always)]
    pub const fn anonymized(&self) -> Self {
        Self::new(
            self.src_ip & 0xFFFF_FF00,
            self.dst_ip & 0xFFFF_FF00,
            self.src_port,
            self.dst_port,
            self.protocol,
        )
    }
}

/// Table lookups hash through FNV-1a over all five fields
impl std::hash::Hash for FlowKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.fnv_hash());
    }
}
