mod inquiry;
mod mode_parameter;
mod read_capacity;
mod request_sense;

pub use inquiry::*;
pub use mode_parameter::*;
pub use read_capacity::*;
pub use request_sense::*;
