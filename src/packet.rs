// memory request/response packets and address ranges

use std::fmt;

pub type Addr = u64;

/// Round `addr` down to the start of its block.
pub fn block_align(addr: Addr, block_size: u64) -> Addr {
    addr & !(block_size - 1)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemCmd {
    ReadReq,
    WriteReq,
    ReadResp,
    WriteResp,
}

/// Request classification. The first three mark a packet non-cacheable,
/// `inst_fetch` routes responses in the pass-through proxy.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ReqFlags {
    pub atomic: bool,
    pub locked: bool,
    pub swap: bool,
    pub inst_fetch: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Packet {
    pub cmd: MemCmd,
    pub addr: Addr,
    pub size: usize,
    pub data: Vec<u8>,
    pub flags: ReqFlags,
}

impl Packet {
    pub fn read(addr: Addr, size: usize) -> Packet {
        Packet {
            cmd: MemCmd::ReadReq,
            addr,
            size,
            data: vec![0; size],
            flags: ReqFlags::default(),
        }
    }

    pub fn write(addr: Addr, data: Vec<u8>) -> Packet {
        Packet {
            cmd: MemCmd::WriteReq,
            addr,
            size: data.len(),
            data,
            flags: ReqFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: ReqFlags) -> Packet {
        self.flags = flags;
        self
    }

    pub fn is_read(&self) -> bool {
        matches!(self.cmd, MemCmd::ReadReq | MemCmd::ReadResp)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.cmd, MemCmd::WriteReq | MemCmd::WriteResp)
    }

    pub fn is_response(&self) -> bool {
        matches!(self.cmd, MemCmd::ReadResp | MemCmd::WriteResp)
    }

    pub fn is_cacheable(&self) -> bool {
        !(self.flags.atomic || self.flags.locked || self.flags.swap)
    }

    /// Turn this request into its response in place.
    pub fn make_response(&mut self) {
        self.cmd = match self.cmd {
            MemCmd::ReadReq => MemCmd::ReadResp,
            MemCmd::WriteReq => MemCmd::WriteResp,
            _ => panic!("cannot make a response out of {}", self),
        };
    }

    pub fn block_addr(&self, block_size: u64) -> Addr {
        block_align(self.addr, block_size)
    }

    fn block_offset(&self, block_size: u64) -> usize {
        let off = (self.addr - self.block_addr(block_size)) as usize;
        assert!(
            off + self.size <= block_size as usize,
            "access crosses a block boundary: {}",
            self
        );
        off
    }

    /// Copy this packet's payload into an aligned block buffer.
    pub fn copy_to_block(&self, block: &mut [u8], block_size: u64) {
        let off = self.block_offset(block_size);
        block[off..off + self.size].copy_from_slice(&self.data);
    }

    /// Fill this packet's payload from an aligned block buffer.
    pub fn copy_from_block(&mut self, block: &[u8], block_size: u64) {
        let off = self.block_offset(block_size);
        self.data.copy_from_slice(&block[off..off + self.size]);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} addr=0x{:x} size={}", self.cmd, self.addr, self.size)?;
        if self.flags != ReqFlags::default() {
            let ReqFlags { atomic, locked, swap, inst_fetch } = self.flags;
            for (set, name) in [
                (atomic, "atomic"),
                (locked, "locked"),
                (swap, "swap"),
                (inst_fetch, "ifetch"),
            ] {
                if set {
                    write!(f, " {}", name)?;
                }
            }
        }
        Ok(())
    }
}

// address ranges

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddrRange {
    pub start: Addr,
    pub end: Addr, // exclusive
}

impl AddrRange {
    pub fn contains(&self, addr: Addr) -> bool {
        self.start <= addr && addr < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_alignment() {
        assert_eq!(block_align(0x0, 64), 0x0);
        assert_eq!(block_align(0x42, 64), 0x40);
        assert_eq!(block_align(0x7f, 64), 0x40);
        assert_eq!(block_align(0x80, 64), 0x80);
    }

    #[test]
    fn response_flips_command() {
        let mut pkt = Packet::read(0x10, 4);
        pkt.make_response();
        assert_eq!(pkt.cmd, MemCmd::ReadResp);
        assert!(pkt.is_response());

        let mut pkt = Packet::write(0x10, vec![1, 2]);
        pkt.make_response();
        assert_eq!(pkt.cmd, MemCmd::WriteResp);
    }

    #[test]
    #[should_panic]
    fn response_of_response_is_fatal() {
        let mut pkt = Packet::read(0x10, 4);
        pkt.make_response();
        pkt.make_response();
    }

    #[test]
    fn block_copies_honor_offset() {
        let mut block = [0u8; 64];
        let wr = Packet::write(0x42, vec![0xaa, 0xbb]);
        wr.copy_to_block(&mut block, 64);
        assert_eq!(block[2], 0xaa);
        assert_eq!(block[3], 0xbb);

        let mut rd = Packet::read(0x43, 1);
        rd.copy_from_block(&block, 64);
        assert_eq!(rd.data, vec![0xbb]);
    }

    #[test]
    fn flags_decide_cacheability() {
        assert!(Packet::read(0, 4).is_cacheable());
        for flags in [
            ReqFlags { atomic: true, ..Default::default() },
            ReqFlags { locked: true, ..Default::default() },
            ReqFlags { swap: true, ..Default::default() },
        ] {
            assert!(!Packet::read(0, 4).with_flags(flags).is_cacheable());
        }
        let ifetch = ReqFlags { inst_fetch: true, ..Default::default() };
        assert!(Packet::read(0, 4).with_flags(ifetch).is_cacheable());
    }
}
