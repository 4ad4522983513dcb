//! Transfer module for FTP server
//!
//! Data channel setup (PORT/EPRT/PASV/EPSV), protection, establishment of
//! the data connection and the byte pump used by transfers.

pub mod address;
pub mod copy;
pub mod data_connection;
pub mod modes;
pub mod passive;

pub use address::{
    extended_passive_reply, parse_eprt_argument, parse_port_argument, passive_reply,
    validate_active_target,
};
pub use copy::copy_cancellable;
pub use data_connection::{
    DataConnection, DataConnectionFeature, DataConnectionRequest, validate_passive_peer,
};
pub use modes::{DataType, ProtectionLevel, TransferMode};
pub use passive::PassivePortAllocator;
