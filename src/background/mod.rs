//! Module `background`
//!
//! Work that continues after the originating command has replied, such as
//! committing a staged upload. A single worker runs queued transfers in order.

pub mod entry;
pub mod worker;

pub use entry::{
    BackgroundTransfer, BackgroundTransferEntry, BackgroundTransferInfo, BackgroundTransferStatus,
    ProgressReporter,
};
pub use worker::BackgroundTransferWorker;
