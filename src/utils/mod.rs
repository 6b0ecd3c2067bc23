pub mod lib;
pub mod response;
