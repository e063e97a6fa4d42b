pub mod packets;
pub mod record;
