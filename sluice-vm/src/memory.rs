//! Abstract memory: blocks behind copy-on-write cells and the per-frame
//! state the interpreter threads through the program.

mod block;
mod offset;
mod state;

pub use block::{Block, BlockKind};
pub use offset::byte_offset;
pub use state::State;
