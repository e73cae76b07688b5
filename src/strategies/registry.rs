use super::amazon::AmazonStrategy;
use super::generic::GenericStrategy;
use super::traits::ExtractionStrategy;

pub type StrategyBox = Box<dyn ExtractionStrategy>;

/// Ordered retailer strategies plus the generic fallback.
///
/// Built once at startup and shared behind an `Arc`; the first registered
/// strategy whose `can_handle` matches wins.
pub struct StrategyRegistry {
    strategies: Vec<StrategyBox>,
    fallback: GenericStrategy,
}

impl StrategyRegistry {
    /// An empty registry: every URL resolves to the generic fallback.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            fallback: GenericStrategy::new(),
        }
    }

    /// Registry with every built-in retailer strategy.
    pub fn with_defaults() -> Self {
        Self::new().register(Box::new(AmazonStrategy::new()))
    }

    /// Append a strategy; earlier registrations take precedence.
    pub fn register(mut self, strategy: StrategyBox) -> Self {
        tracing::debug!("Registered extraction strategy '{}'", strategy.name());
        self.strategies.push(strategy);
        self
    }

    pub fn find_strategy_for(&self, url: &str) -> Option<&dyn ExtractionStrategy> {
        self.strategies
            .iter()
            .find(|s| s.can_handle(url))
            .map(|s| s.as_ref())
    }

    /// The matching strategy, or the generic fallback.
    pub fn resolve(&self, url: &str) -> &dyn ExtractionStrategy {
        match self.find_strategy_for(url) {
            Some(strategy) => {
                tracing::debug!("Using {} strategy for {}", strategy.name(), url);
                strategy
            }
            None => {
                tracing::debug!("No specific strategy for {}, using generic extraction", url);
                &self.fallback
            }
        }
    }

    /// Every registered strategy that claims the URL, in registration order.
    pub fn handlers_for<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a dyn ExtractionStrategy> + 'a {
        self.strategies
            .iter()
            .filter(move |s| s.can_handle(url))
            .map(|s| s.as_ref())
    }

    pub fn list_strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
