mod device;
mod health;
mod readings;
pub mod response;
mod sim;

pub use device::*;
pub use health::*;
pub use readings::*;
pub use sim::*;
