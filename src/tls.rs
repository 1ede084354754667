use std::sync::OnceLock;

/// Installs the process-wide rustls CryptoProvider exactly once.
///
/// rustls 0.23 refuses to pick a default when a build enables more than one
/// provider, and the first TLS config built after that panics. Selecting
/// `ring` up front keeps wss:// connects working regardless of what else the
/// host process links.
pub fn install_rustls_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        // An Err means some other component installed a provider before us;
        // either way one is in place.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
