mod envelope;

pub use envelope::{decode, encode, Envelope, DEFAULT_MAX_FRAME_LEN, MAX_CLIENT_ID_LEN};
