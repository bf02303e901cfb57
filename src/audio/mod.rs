// Audio module
// Device identity, the output-stream boundary, and the cpal/Symphonia backend

pub mod decoder;
pub mod device;
pub mod output;
pub mod resampler;
pub mod stream;

pub use device::{default_output_device, list_output_devices, AudioDevice, DeviceTarget};
pub use output::CpalStreamFactory;
pub use stream::{CompletionCallback, OutputHandle, OutputStreamFactory, StreamRequest};
