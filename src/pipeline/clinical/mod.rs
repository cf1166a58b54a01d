pub mod formulas;
pub mod reference;

pub use formulas::*;
pub use reference::*;
