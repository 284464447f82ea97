pub mod scheduling;

pub use scheduling::*;
