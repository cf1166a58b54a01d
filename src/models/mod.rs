pub mod enums;
pub mod inputs;
pub mod record;

pub use enums::*;
pub use inputs::*;
pub use record::*;
