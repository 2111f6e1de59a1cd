mod additional_sense_code;
mod device_type;
mod page_code;
mod page_control;
mod response_code;
mod scsi_version;
mod sense_key;
mod status;

pub use additional_sense_code::*;
pub use device_type::*;
pub use page_code::*;
pub use page_control::*;
pub use response_code::*;
pub use scsi_version::*;
pub use sense_key::*;
pub use status::*;
