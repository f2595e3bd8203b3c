//! Application layer: transport adapter, session runtime, and fleet supervisor.

pub mod events;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use supervisor::Supervisor;
