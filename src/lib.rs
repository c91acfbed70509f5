pub mod driver;
pub mod error;
pub mod generator;
pub mod qr;
pub mod sss;

pub use driver::*;
pub use error::*;
pub use generator::*;
pub use qr::{decode, decode_value, encode, encode_value, ErrorCorrection, QrOptions, SymbolVersion};
pub use sss::*;
