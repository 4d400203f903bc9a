//! Temporal-difference learning agents implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! * [`dqn::Dqn`]: a deep Q-network with a soft-tracking target network.
//! * [`ac::ActorCritic`]: a Gaussian policy trained with a state-value baseline
//!   from one episode of experience.
pub mod ac;
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
mod tensor_batch;
pub mod util;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
pub use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}
