//! Trust anchors and protocol floor for HTTPS fetches.

/// Lowest TLS version a connection may negotiate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    #[default]
    V1_2,
    V1_3,
}

/// Which trust anchors verify server certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Embedded Mozilla/WebPKI roots only.
    WebPkiOnly,
    /// WebPKI roots plus the operating-system store.
    #[default]
    WebPkiAndOs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsPolicy {
    pub minimum_version: TlsVersion,
    pub trust_store: TrustStoreMode,
}

impl TlsPolicy {
    /// Versions to offer, newest first.
    pub fn offered_versions(&self) -> Vec<TlsVersion> {
        [TlsVersion::V1_3, TlsVersion::V1_2]
            .into_iter()
            .filter(|version| *version >= self.minimum_version)
            .collect()
    }
}
