//! Resolves algorithms to provider instances.
//!
//! This is the only place in the crate that maps an [`Algorithm`] to behavior. Adding an
//! algorithm means adding a provider and a registration here; the key store manager is untouched.

use crate::asymmetric::systems::traditional::rsa::RsaCryptoSystem;
use crate::common::algorithm::Algorithm;
use crate::common::config::CryptoConfig;
use crate::error::{KmsError, KmsResult};
use crate::provider::{AsymmetricProvider, CryptographyProvider, SymmetricProvider};
use crate::symmetric::systems::aes_gcm::AesGcmSystem;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

type ProviderMap = HashMap<Algorithm, Arc<dyn CryptographyProvider>>;

/// Maps each algorithm to exactly one shared, stateless provider.
///
/// Lookups read an [`ArcSwap`] snapshot and never block; [`register`](Self::register) swaps in a
/// new map.
pub struct ProviderFactory {
    providers: ArcSwap<ProviderMap>,
}

impl ProviderFactory {
    /// A factory with every provider compiled into the crate.
    pub fn new(config: &CryptoConfig) -> Self {
        let factory = Self::empty();
        factory.register(Arc::new(SymmetricProvider::<AesGcmSystem>::new()));
        #[cfg(feature = "chacha")]
        factory.register(Arc::new(SymmetricProvider::<
            crate::symmetric::systems::chacha20_poly1305::ChaCha20Poly1305System,
        >::new()));
        factory.register(Arc::new(AsymmetricProvider::<RsaCryptoSystem>::new(
            config.clone(),
        )));
        factory
    }

    pub fn empty() -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Installs a provider for its algorithm, returning the one it replaced.
    pub fn register(
        &self,
        provider: Arc<dyn CryptographyProvider>,
    ) -> Option<Arc<dyn CryptographyProvider>> {
        let algorithm = provider.algorithm();
        let previous = self.providers.rcu(|current| {
            let mut next = ProviderMap::clone(current);
            next.insert(algorithm, Arc::clone(&provider));
            next
        });
        tracing::debug!(%algorithm, "registered cryptography provider");
        previous.get(&algorithm).cloned()
    }

    pub fn resolve(&self, algorithm: Algorithm) -> KmsResult<Arc<dyn CryptographyProvider>> {
        self.providers
            .load()
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| KmsError::UnsupportedAlgorithm(algorithm.to_string()))
    }

    /// Resolves a caller-supplied algorithm tag such as `"aes-256-gcm"`.
    pub fn resolve_tag(&self, tag: &str) -> KmsResult<Arc<dyn CryptographyProvider>> {
        self.resolve(tag.parse()?)
    }

    /// Algorithms that currently have a provider, in a stable order.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms: Vec<Algorithm> = self.providers.load().keys().copied().collect();
        algorithms.sort();
        algorithms
    }
}
