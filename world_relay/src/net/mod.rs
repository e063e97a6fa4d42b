pub mod framing;
pub mod tcp;
