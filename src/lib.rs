pub mod cache;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod failure;
pub mod key;
pub mod link;
pub mod transport;

pub use cache::{ReadCache, SensorValue};
pub use config::{DeviceProfile, LinkSettings, ResolvedSettings};
pub use device::{Finch, FinchOrientation, Hummingbird, HummingbirdBit};
pub use dispatch::{OutputDispatcher, Submission};
pub use error::{LinkError, LinkResult};
pub use failure::{Failure, FailureOrigin};
pub use key::{DeviceId, OutputKind, OutputValue, QueryKey, Sensor, TargetKey};
pub use link::{Link, Protocol};
pub use transport::{HttpTransport, Transport};
