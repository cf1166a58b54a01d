pub mod clinical;
pub mod extraction;
pub mod structuring;
