pub mod collected;
pub mod handoff;
pub mod step;

// Re-export key types for easier access from other sluice modules (and lib.rs)
pub use collected::Collected;
pub use handoff::{Emitter, Input};
pub use step::{Producer, Transform};
