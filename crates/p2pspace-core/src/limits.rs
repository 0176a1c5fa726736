//! Local-policy size caps applied by the acceptance pipeline and sync layer.

/// Max length of `space_id`, `room_id`, `kind`, and `event_id` strings.
pub const MAX_ID_LEN: usize = 256;

/// Max length of a base64 SPKI public key string.
pub const MAX_KEY_LEN: usize = 4096;

/// Max length of a base64 signature string.
pub const MAX_SIG_LEN: usize = 2048;

/// Max `prev` entries accepted on an inbound event.
pub const MAX_PREV: usize = 64;

/// Max scopes on a delegation.
pub const MAX_SCOPES: usize = 64;

/// Max characters in `MSG_POST` body text.
pub const MAX_TEXT_CHARS: usize = 2000;

/// Max total wire frame size in bytes.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;
