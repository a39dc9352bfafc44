//! Session key material.
//!
//! One agreement keypair and one derived secret for the whole process,
//! shared by every live connection. Deriving against a new peer overwrites
//! the previous secret, so a room converges on whichever pairwise exchange
//! completed last. The material is wiped when the last connection closes.

use mc_crypto::{AgreementKeyPair, AgreementPublicKey, CryptoError, SecureChannel};

#[derive(Default)]
pub struct SessionKeyMaterial {
    keys: Option<AgreementKeyPair>,
    channel: SecureChannel,
    /// Exchange timestamp of our latest outbound key-exchange envelope,
    /// millis.
    sent_ts: Option<i64>,
}

impl SessionKeyMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the keypair if absent. Returns true when a fresh pair was
    /// created, in which case the caller owes the peer its public key.
    pub fn ensure_keypair(&mut self) -> bool {
        if self.keys.is_none() {
            self.keys = Some(AgreementKeyPair::generate());
            return true;
        }
        false
    }

    pub fn public_key(&self) -> Option<AgreementPublicKey> {
        self.keys.as_ref().map(|k| k.public().clone())
    }

    /// Record the timestamp of our outbound key-exchange envelope. The
    /// latest one wins: it is the value the peer of the exchange now in
    /// flight will see, so it is the one the salt must be computed from.
    pub fn record_sent(&mut self, ts: i64) {
        self.sent_ts = Some(ts);
    }

    /// Derive the shared secret from a received public key and bind it to
    /// the channel. Returns the verification fingerprint.
    ///
    /// The fingerprint is salted with the earlier of the two exchange
    /// timestamps, which both ends observe identically, so both ends render
    /// the same string.
    pub fn derive(
        &mut self,
        peer_key: &AgreementPublicKey,
        peer_ts: i64,
    ) -> Result<String, CryptoError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| CryptoError::KeyExchange("no local keypair".into()))?;

        let key = keys.derive_session_key(peer_key)?;

        let salt_ts = match self.sent_ts {
            Some(sent) => sent.min(peer_ts),
            None => peer_ts,
        };
        let fingerprint = key.fingerprint(&salt_ts.to_le_bytes());

        self.channel.bind(key);
        Ok(fingerprint)
    }

    pub fn channel(&self) -> &SecureChannel {
        &self.channel
    }

    pub fn has_secret(&self) -> bool {
        self.channel.is_ready()
    }

    /// Wipe the keypair, the derived secret, and the exchange timestamp.
    pub fn clear(&mut self) {
        self.keys = None;
        self.channel.clear();
        self.sent_ts = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_produces_matching_fingerprints() {
        let mut a = SessionKeyMaterial::new();
        let mut b = SessionKeyMaterial::new();

        // A opens the exchange.
        assert!(a.ensure_keypair());
        a.record_sent(100);
        let a_pub = a.public_key().unwrap();

        // B sees A's key, replies with its own, then derives.
        assert!(b.ensure_keypair());
        b.record_sent(200);
        let b_pub = b.public_key().unwrap();
        let fp_b = b.derive(&a_pub, 100).unwrap();

        // A receives B's reply and derives in turn.
        let fp_a = a.derive(&b_pub, 200).unwrap();

        assert_eq!(fp_a, fp_b);
        assert!(a.has_secret());
        assert!(b.has_secret());
    }

    #[test]
    fn derive_without_keypair_fails() {
        let mut a = SessionKeyMaterial::new();
        a.ensure_keypair();
        let a_pub = a.public_key().unwrap();

        let mut b = SessionKeyMaterial::new();
        assert!(b.derive(&a_pub, 1).is_err());
        assert!(!b.has_secret());
    }

    #[test]
    fn ensure_keypair_is_idempotent() {
        let mut a = SessionKeyMaterial::new();
        assert!(a.ensure_keypair());
        let first = a.public_key().unwrap();
        assert!(!a.ensure_keypair());
        assert_eq!(a.public_key().unwrap(), first);
    }

    #[test]
    fn clear_wipes_everything() {
        let mut a = SessionKeyMaterial::new();
        let mut b = SessionKeyMaterial::new();
        a.ensure_keypair();
        b.ensure_keypair();
        a.record_sent(1);
        a.derive(&b.public_key().unwrap(), 2).unwrap();
        assert!(a.has_secret());

        a.clear();
        assert!(!a.has_secret());
        assert!(a.public_key().is_none());
        // A later session starts from a fresh pair.
        assert!(a.ensure_keypair());
    }

    #[test]
    fn later_derivation_replaces_the_secret() {
        let mut a = SessionKeyMaterial::new();
        let mut b = SessionKeyMaterial::new();
        let mut c = SessionKeyMaterial::new();
        a.ensure_keypair();
        b.ensure_keypair();
        c.ensure_keypair();

        a.record_sent(10);
        let fp_ab = a.derive(&b.public_key().unwrap(), 20).unwrap();
        let fp_ac = a.derive(&c.public_key().unwrap(), 30).unwrap();
        assert_ne!(fp_ab, fp_ac);
        assert!(a.has_secret());
    }

    #[test]
    fn fingerprints_agree_for_each_exchange_in_turn() {
        let mut host = SessionKeyMaterial::new();
        let mut early = SessionKeyMaterial::new();
        let mut late = SessionKeyMaterial::new();
        host.ensure_keypair();
        early.ensure_keypair();
        late.ensure_keypair();

        host.record_sent(100);
        early.record_sent(150);
        let fp_host = host.derive(&early.public_key().unwrap(), 150).unwrap();
        let fp_early = early.derive(&host.public_key().unwrap(), 100).unwrap();
        assert_eq!(fp_host, fp_early);

        // The host re-sends its key when a later peer appears; both sides
        // of the new exchange must salt from the re-send, not from the
        // host's first send.
        host.record_sent(300);
        late.record_sent(400);
        let fp_host = host.derive(&late.public_key().unwrap(), 400).unwrap();
        let fp_late = late.derive(&host.public_key().unwrap(), 300).unwrap();
        assert_eq!(fp_host, fp_late);
    }
}
