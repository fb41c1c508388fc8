//! Ordered fallback chains of named data providers.

use tracing::{debug, info};

use crate::error::{Result, TimesliceError};

/// A named source of per-ISO input data.
///
/// `Ok(None)` means "this source has nothing for the ISO" and lets the
/// chain move on; `Err` is reserved for genuine read or parse failures.
pub trait DataProvider<T>: Send + Sync {
    /// Short name reported when this provider supplies the data.
    fn name(&self) -> &str;

    /// Returns the data for `iso`, if this provider has it.
    fn provide(&self, iso: &str) -> Result<Option<T>>;
}

/// Data together with the provider that supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct Provided<T> {
    pub value: T,
    pub provider: String,
}

/// Providers consulted in declaration order until one has data.
pub struct ProviderChain<T> {
    what: String,
    providers: Vec<Box<dyn DataProvider<T>>>,
}

impl<T> std::fmt::Debug for ProviderChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("what", &self.what)
            .field("providers", &self.names())
            .finish()
    }
}

impl<T> ProviderChain<T> {
    /// Creates an empty chain for the input described by `what`.
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            providers: Vec::new(),
        }
    }

    /// Appends a provider with lower priority than those already present.
    pub fn with(mut self, provider: impl DataProvider<T> + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push(&mut self, provider: impl DataProvider<T> + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Provider names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn what(&self) -> &str {
        &self.what
    }

    /// Returns the first provider's data for `iso`, or `None` when every
    /// provider comes up empty.
    pub fn resolve(&self, iso: &str) -> Result<Option<Provided<T>>> {
        for (rank, provider) in self.providers.iter().enumerate() {
            match provider.provide(iso)? {
                Some(value) => {
                    if rank > 0 {
                        info!(
                            iso,
                            what = %self.what,
                            provider = provider.name(),
                            "using fallback provider"
                        );
                    }
                    return Ok(Some(Provided {
                        value,
                        provider: provider.name().to_string(),
                    }));
                }
                None => {
                    debug!(iso, what = %self.what, provider = provider.name(), "not available");
                }
            }
        }
        Ok(None)
    }

    /// Like [`resolve`](Self::resolve), but an exhausted chain is a
    /// `DataUnavailable` error.
    pub fn require(&self, iso: &str) -> Result<Provided<T>> {
        self.resolve(iso)?.ok_or_else(|| {
            TimesliceError::unavailable(
                iso,
                format!(
                    "no {} from providers [{}]",
                    self.what,
                    self.names().join(", ")
                ),
            )
        })
    }
}
