//! Capture-side collaborators
//!
//! Encoder capability probing and the capture consent gateway.

pub mod permissions;
pub mod traits;

pub use permissions::{
    ConsentBroker, ConsentDelivery, ConsentHost, PermissionGateway, PermissionOutcome,
    PermissionToken, RESULT_OK, SCREEN_RECORD_REQUEST_CODE,
};
pub use traits::{select_encoder, CapabilityProbe, CodecInfo, CodecList, VideoEncoder};
