mod local;
mod memory;
mod remote;
#[cfg(test)]
mod tests;

pub use local::*;
pub use memory::*;
pub use remote::*;
