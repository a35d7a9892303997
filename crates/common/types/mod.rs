mod diff;
mod event;
mod point;

pub use diff::*;
pub use event::*;
pub use point::*;
