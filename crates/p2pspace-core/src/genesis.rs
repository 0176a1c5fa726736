//! Space genesis record.
//!
//! A Space is rooted at its Space Root Ed25519 key; the genesis record binds
//! the derived `space_id` to that key and optionally names the Space.

use serde::{Deserialize, Serialize};

use crate::canonical::{domain, SigInput};
use crate::crypto::{verify_b64, Keypair};
use crate::error::VerifyError;
use crate::ids::id_from_spki_b64;

/// Genesis schema version.
pub const GENESIS_VERSION: i64 = 1;

/// The Space Root's self-signed genesis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceGenesis {
    pub v: i64,
    pub space_id: String,
    pub space_root_pub: String,
    pub created_ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sig: String,
}

impl SpaceGenesis {
    /// Create and sign a genesis record with the Space Root key.
    pub fn create(space_root: &Keypair, created_ts: i64, name: Option<String>) -> Self {
        let mut genesis = Self {
            v: GENESIS_VERSION,
            space_id: space_root.id(),
            space_root_pub: space_root.public_spki_b64(),
            created_ts,
            name,
            sig: String::new(),
        };
        genesis.sig = space_root.sign_b64(&genesis.sig_input());
        genesis
    }

    /// Signature input bytes in normative field order.
    pub fn sig_input(&self) -> Vec<u8> {
        let mut w = SigInput::new(domain::SPACE_GENESIS);
        w.int(self.v)
            .str(&self.space_id)
            .str(&self.space_root_pub)
            .int(self.created_ts)
            .str(self.name.as_deref().unwrap_or(""));
        w.finish()
    }

    /// Verify the id derivation and root signature.
    pub fn verify(&self) -> Result<(), VerifyError> {
        if id_from_spki_b64(&self.space_root_pub)? != self.space_id {
            return Err(VerifyError::IdMismatch("genesis space_id"));
        }
        verify_b64(&self.space_root_pub, &self.sig_input(), &self.sig)
            .map_err(|_| VerifyError::SignatureInvalid)?;
        Ok(())
    }
}
