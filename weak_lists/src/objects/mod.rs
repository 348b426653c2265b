//! The heap objects that take part in weak lists.

mod allocation_site;
mod code;
mod context;

pub use allocation_site::AllocationSite;
pub use code::{Code, CodeDataContainer};
pub use context::{CodeList, Context};

#[cfg(test)]
mod tests;
