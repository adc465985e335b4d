pub mod enums;
pub mod name;
pub mod rr;

pub use enums::{DNSResourceClass, DNSResourceType, ResponseCode};
pub use name::Name;
pub use rr::{Rdata, RRSet, RrSig, RrSigSet};
