pub mod config;
pub mod cursor;
pub mod deadline;
pub mod digest;
pub mod error;
pub mod schedule;
pub mod transfer;

pub use config::Config;
pub use cursor::FileCursor;
pub use deadline::{DeadlineRead, DeadlineWrite, IoOutcome, Transferred};
pub use digest::{reference_digest, verify, Digest, RollingHasher};
pub use error::TransferError;
pub use schedule::{Schedule, ScheduleBounds, Scheduler, TransferWindow};
pub use transfer::{ReceiveSession, ReceiveSummary, SendSession, SendSummary, TransferStats};
