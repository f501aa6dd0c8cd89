//! Generic Access Profile ([Vol 3] Part C).

pub use {adv::*, uuid::*};

mod adv;
mod uuid;
