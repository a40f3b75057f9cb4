use sha2::{Digest, Sha256};

// bytes of media that take part in the key
pub const FINGERPRINT_PREFIX_LEN: usize = 100;

// Create a cache key (hash of media prefix + prompt + style)
//
// Only the first FINGERPRINT_PREFIX_LEN bytes of the media are sampled, so two
// uploads that share that prefix and the same prompt/style map to one key.
pub fn fingerprint(media: &[u8], prompt: &str, style: &str) -> String {
    let prefix = &media[..media.len().min(FINGERPRINT_PREFIX_LEN)];

    let mut hasher = Sha256::new();
    for field in [prefix, prompt.as_bytes(), style.as_bytes()] {
        // length-delimit each field so ("ab", "c") != ("a", "bc")
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
    }
    format!("{:x}", hasher.finalize())
}
