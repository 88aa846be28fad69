mod compose;
mod events;
mod session_id;
mod store;
mod types;

pub use compose::*;
pub use events::*;
pub use session_id::*;
pub use store::*;
pub use types::*;
