pub mod chunk;
pub mod reader;
pub mod recovery;
pub mod store;
pub mod typed;
pub mod writer;


pub use reader::{Reader, Record, ScanData, ScanState};
pub use recovery::{RecoveryReport, Tail};
pub use runlog_common::{CorruptReason, LogError, LogOptions};
pub use store::LogStore;
pub use typed::{TypedReader, TypedWriter};
pub use writer::{WriteResult, Writer};
