//! Ordered provider chain with per-attempt outcome reporting.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use tape_core::{
    ALL_PROVIDERS, Credential, FetchOutcome, FetchStatus, OutcomeSink, QueryResult,
    SeriesProvider, Symbol, TracingSink,
};

/// Environment variable holding the Alpha Vantage key.
const ALPHAVANTAGE_KEY_VAR: &str = "ALPHAVANTAGE_KEY";

/// Environment variable holding the Finnhub key.
const FINNHUB_KEY_VAR: &str = "FINNHUB_KEY";

/// Keys for the providers that need one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    /// Alpha Vantage API key.
    pub alphavantage: Credential,
    /// Finnhub API token.
    pub finnhub: Credential,
}

impl ProviderCredentials {
    /// Reads `ALPHAVANTAGE_KEY` and `FINNHUB_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            alphavantage: Credential::from_env(ALPHAVANTAGE_KEY_VAR),
            finnhub: Credential::from_env(FINNHUB_KEY_VAR),
        }
    }
}

/// Providers tried strictly in registration order.
///
/// The first provider that returns a non-empty series wins. Each attempt
/// reports one [`FetchOutcome`] to the configured sink: `fallback` for every
/// empty answer, `success` for the winner, and a single `failure` tagged
/// [`ALL_PROVIDERS`] when nobody had data.
///
/// # Example
///
/// ```rust,ignore
/// use tape::{FallbackChain, ProviderCredentials, Symbol};
///
/// let chain = FallbackChain::standard(reqwest::Client::new(), &ProviderCredentials::from_env());
/// let result = chain.query(&Symbol::new("ETHUSD")).await;
/// ```
#[derive(Clone)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn SeriesProvider>>,
    sink: Arc<dyn OutcomeSink>,
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .field("sink", &self.sink)
            .finish()
    }
}

impl FallbackChain {
    /// Creates an empty chain reporting to [`TracingSink`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The production order: Binance, Binance US, Alpha Vantage, Finnhub.
    ///
    /// Providers whose feature is disabled are left out.
    #[must_use]
    #[cfg_attr(
        not(any(feature = "binance", feature = "alphavantage", feature = "finnhub")),
        allow(unused_variables, unused_mut)
    )]
    pub fn standard(client: Client, credentials: &ProviderCredentials) -> Self {
        let mut chain = Self::new();

        #[cfg(feature = "binance")]
        {
            use tape_binance::{BinanceEndpoint, BinanceProvider};
            chain.register(Arc::new(BinanceProvider::with_client(
                client.clone(),
                BinanceEndpoint::Global,
            )));
            chain.register(Arc::new(BinanceProvider::with_client(
                client.clone(),
                BinanceEndpoint::Us,
            )));
        }

        #[cfg(feature = "alphavantage")]
        chain.register(Arc::new(tape_alphavantage::AlphaVantageProvider::with_client(
            client.clone(),
            credentials.alphavantage.clone(),
        )));

        #[cfg(feature = "finnhub")]
        chain.register(Arc::new(tape_finnhub::FinnhubProvider::with_client(
            client,
            credentials.finnhub.clone(),
        )));

        chain
    }

    /// Replaces the outcome sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Appends a provider and returns the chain.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn SeriesProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Appends a provider to the end of the chain.
    pub fn register(&mut self, provider: Arc<dyn SeriesProvider>) {
        debug!(provider = provider.name(), "Registering series provider");
        self.providers.push(provider);
    }

    /// Provider names in query order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Asks each provider in turn, stopping at the first non-empty series.
    ///
    /// Never fails: an exhausted chain yields [`QueryResult::no_data`].
    pub async fn query(&self, symbol: &Symbol) -> QueryResult {
        for provider in &self.providers {
            debug!(provider = provider.name(), symbol = %symbol, "Querying provider");

            let series = provider.fetch(symbol).await;
            if series.is_empty() {
                self.report(symbol, provider.name(), FetchStatus::Fallback);
                continue;
            }

            self.report(symbol, provider.name(), FetchStatus::Success);
            return QueryResult::new(series, provider.display_name());
        }

        warn!(
            symbol = %symbol,
            providers = self.providers.len(),
            "All providers returned no data"
        );
        self.report(symbol, ALL_PROVIDERS, FetchStatus::Failure);
        QueryResult::no_data()
    }

    fn report(&self, symbol: &Symbol, provider: &str, status: FetchStatus) {
        self.sink.record(&FetchOutcome::now(symbol, provider, status));
    }
}
