//! RFID Relay Protocol Library
//!
//! This crate holds the device-independent vocabulary shared by the relay:
//!
//! - **Tags**: `TagRecord` observations and the deduplicated `TagSet`
//! - **Device configuration**: `Region`, `TagProtocol`, `ReadPlan` and the
//!   parameter paths used to get and set them
//! - **Interrogator traits**: the blocking capability surface an RFID SDK
//!   exposes (`Interrogator`, `InterrogatorFactory`) and typed fault
//!   classification (`ReaderError`)
//! - **Outbound messages**: the bracketed, quoted-identifier text sent to the
//!   downstream microcontroller
//!
//! # Example
//!
//! ```rust
//! use rfid_protocol::{message, TagRecord, TagSet};
//!
//! let tags: TagSet = vec![TagRecord::new("E1"), TagRecord::new("E1")]
//!     .into_iter()
//!     .collect();
//!
//! assert_eq!(tags.len(), 1);
//! assert_eq!(message::encode_tags(&tags), r#"["E1"]"#);
//! ```

pub mod error;
pub mod message;
pub mod param;
pub mod plan;
pub mod reader;
pub mod region;
pub mod tag;
pub mod uri;

pub use error::{ParseError, ReaderError};
pub use param::ParamValue;
pub use plan::{ReadPlan, TagProtocol};
pub use reader::{
    ExceptionListener, Interrogator, InterrogatorFactory, ListenerId, ListenerSet, ReadListener,
    TransportDirection, TransportListener,
};
pub use region::Region;
pub use tag::{TagRecord, TagSet};
pub use uri::{port_from_uri, reader_uri};
