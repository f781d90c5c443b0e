pub mod descriptor;
pub mod executor;
pub mod payload;

pub(crate) mod transport;

pub use descriptor::RequestDescriptor;
pub use executor::RequestExecutor;
pub use payload::{Blob, Payload};
