pub mod network;

pub use network::{MapShape, NetworkOutput, PoseNetwork};
