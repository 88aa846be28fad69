mod account;
mod sync;

pub use account::*;
pub use sync::*;
