mod theme;
mod transcript;

pub use theme::*;
pub use transcript::*;
