//! An in-memory stand-in transport, used by the test suite and the CLI
//! demo to drive the codec and checker without real hardware.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{ReadFn, WriteFn};

/// A `reg_num`-word buffer shared between a [`ReadFn`]/[`WriteFn`] pair
/// and the caller, so tests can inspect what the transport actually saw
/// independently of the device context's own software buffer.
pub struct MemoryTransport {
    words: Rc<RefCell<Vec<u32>>>,
}

impl MemoryTransport {
    /// Creates a transport backed by `reg_num` words, all initially zero.
    pub fn new(reg_num: usize) -> Self {
        Self {
            words: Rc::new(RefCell::new(vec![0u32; reg_num])),
        }
    }

    /// The current contents of the backing buffer.
    pub fn words(&self) -> Vec<u32> {
        self.words.borrow().clone()
    }

    /// Builds the `read_fn`/`write_fn` pair for installation via
    /// [`crate::context::DeviceContext::with_transport`].
    pub fn callbacks(&self) -> (ReadFn, WriteFn) {
        let read_words = self.words.clone();
        let write_words = self.words.clone();
        let read_fn: ReadFn = Box::new(move |reg| Ok(read_words.borrow()[reg]));
        let write_fn: WriteFn = Box::new(move |reg, val| {
            write_words.borrow_mut()[reg] = val;
            Ok(())
        });
        (read_fn, write_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeviceContext;

    #[test]
    fn round_trips_through_the_shared_buffer() {
        let transport = MemoryTransport::new(2);
        let (read_fn, write_fn) = transport.callbacks();
        let mut ctx = DeviceContext::new(32, 2).with_transport(read_fn, write_fn);

        ctx.write(0, 0xDEAD_BEEF).unwrap();
        assert_eq!(transport.words(), vec![0xDEAD_BEEF, 0]);
        assert_eq!(ctx.read(0), 0xDEAD_BEEF);
    }
}
