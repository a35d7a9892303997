mod batch;
mod cursor;

pub use batch::{L2Action, L2Opcode, L2Transaction, SIGNATURE_LENGTH, decode_batch};
pub use cursor::ReverseCursor;
