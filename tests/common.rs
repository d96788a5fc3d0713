#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use flexnvm_store::RegionMap;
use flexnvm_store::layout::{ERASE_BLOCK_SIZE, FLEX_NVM_BASE};
use flexnvm_store::platform::Ready;
use std::cell::RefCell;
use std::rc::Rc;

// Program granularity of the Kinetis FTFL (one longword)
pub const WORD_SIZE: usize = 4;

/// A map large enough for the logging design target: 80 KiB of log at 0x1001_0000.
pub const LARGE_MAP: RegionMap = RegionMap::new(FLEX_NVM_BASE, 0x2_8000, 0x800, 0xF800, 0x1_4000);

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,

    /// Number of `is_ready` polls the flash stays busy after each erase or write.
    pub busy_polls: usize,
    pub stuck_busy: bool,
    /// An injected fault leaves the flash stuck busy.
    pub busy_after_fault: bool,
    pending_polls: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    pub fn new(blocks: usize) -> Self {
        Self {
            buf: vec![0xffu8; ERASE_BLOCK_SIZE * blocks],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    /// A flash sized for `map`.
    pub fn for_map(map: &RegionMap) -> Self {
        Self::new(map.size() / ERASE_BLOCK_SIZE)
    }

    pub fn new_with_fault(blocks: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; ERASE_BLOCK_SIZE * blocks],
            fail_after_operation,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Bytes at an absolute address of `map`.
    pub fn peek(&self, map: &RegionMap, address: u32, len: usize) -> &[u8] {
        let offset = (address - map.base()) as usize;
        &self.buf[offset..offset + len]
    }

    /// Programs bytes at an absolute address of `map` behind the store's back, the way the image
    /// writer or a corrupted write would.
    pub fn poke(&mut self, map: &RegionMap, address: u32, bytes: &[u8]) {
        let offset = (address - map.base()) as usize;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .cloned()
            .collect()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl Ready for Flash {
    fn is_ready(&mut self) -> bool {
        if self.stuck_busy {
            return false;
        }
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            return false;
        }
        true
    }
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert_eq!(self.pending_polls, 0, "read while busy");

        println!(
            "    flash: read:  0x{offset:05X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            self.stuck_busy |= self.busy_after_fault;
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = ERASE_BLOCK_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert_eq!(self.pending_polls, 0, "erase while busy");

        println!(
            "    flash: erase: {from:05X} - {to:05X} #{:>2}",
            self.operations.len()
        );

        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            self.stuck_busy |= self.busy_after_fault;
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        self.pending_polls = self.busy_polls;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        assert_eq!(self.pending_polls, 0, "write while busy");

        println!(
            "    flash: write: 0x{offset:05X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            self.stuck_busy |= self.busy_after_fault;
            return Err(FlashError);
        }
        assert!(bytes.len() > 0);

        let offset = offset as usize;
        // a longword can only be programmed once between erases
        assert!(
            self.buf[offset..offset + bytes.len()]
                .iter()
                .all(|&b| b == 0xff),
            "program over non-erased flash at 0x{offset:05X}"
        );

        self.operations.push(Operation::Write {
            offset: offset as u32,
            len: bytes.len(),
        });

        for (i, &val) in bytes.iter().enumerate() {
            // flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        self.pending_polls = self.busy_polls;
        Ok(())
    }
}

/// A flash shared between the store and another writer, such as the image writer.
#[derive(Clone)]
pub struct SharedFlash(pub Rc<RefCell<Flash>>);

impl SharedFlash {
    pub fn new(flash: Flash) -> Self {
        Self(Rc::new(RefCell::new(flash)))
    }
}

impl ErrorType for SharedFlash {
    type Error = FlashError;
}

impl Ready for SharedFlash {
    fn is_ready(&mut self) -> bool {
        self.0.borrow_mut().is_ready()
    }
}

impl ReadNorFlash for SharedFlash {
    const READ_SIZE: usize = Flash::READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.borrow().capacity()
    }
}

impl NorFlash for SharedFlash {
    const WRITE_SIZE: usize = Flash::WRITE_SIZE;

    const ERASE_SIZE: usize = Flash::ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.borrow_mut().erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().write(offset, bytes)
    }
}
