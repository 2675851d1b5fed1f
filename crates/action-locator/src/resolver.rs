//! Strategy chains per target

use std::sync::Arc;

use cdp_adapter::HostDocument;
use dropclick_config_center::LocatorPolicy;
use tracing::{debug, trace};

use crate::control::Control;
use crate::errors::LocatorError;
use crate::interactivity::is_interactive;
use crate::strategies::{KeywordStrategy, SelectorStrategy, Strategy};
use crate::types::Target;

/// Locates the controls of the purchase flow in one host document.
#[derive(Clone)]
pub struct Locator {
    host: Arc<dyn HostDocument>,
    add_to_cart: Arc<Vec<Box<dyn Strategy>>>,
    checkout: Arc<Vec<Box<dyn Strategy>>>,
}

impl Locator {
    /// Selector chain followed by keyword scan for both targets.
    pub fn from_policy(
        host: Arc<dyn HostDocument>,
        policy: &LocatorPolicy,
    ) -> Result<Self, LocatorError> {
        let add_to_cart: Vec<Box<dyn Strategy>> = vec![
            Box::new(SelectorStrategy::new(policy.add_to_cart_selectors.clone())?),
            Box::new(KeywordStrategy::new(
                policy.clickable_selector.clone(),
                policy.add_to_cart_keywords.clone(),
            )?),
        ];
        let checkout: Vec<Box<dyn Strategy>> = vec![
            Box::new(SelectorStrategy::new(policy.checkout_selectors.clone())?),
            Box::new(KeywordStrategy::new(
                policy.clickable_selector.clone(),
                policy.checkout_keywords.clone(),
            )?),
        ];
        Self::with_chains(host, add_to_cart, checkout)
    }

    pub fn with_chains(
        host: Arc<dyn HostDocument>,
        add_to_cart: Vec<Box<dyn Strategy>>,
        checkout: Vec<Box<dyn Strategy>>,
    ) -> Result<Self, LocatorError> {
        if add_to_cart.is_empty() {
            return Err(LocatorError::EmptyChain(Target::AddToCart.name()));
        }
        if checkout.is_empty() {
            return Err(LocatorError::EmptyChain(Target::Checkout.name()));
        }
        Ok(Self {
            host,
            add_to_cart: Arc::new(add_to_cart),
            checkout: Arc::new(checkout),
        })
    }

    pub fn host(&self) -> &Arc<dyn HostDocument> {
        &self.host
    }

    pub async fn locate_add_to_cart(&self) -> Option<Control> {
        self.locate(Target::AddToCart).await
    }

    pub async fn locate_checkout(&self) -> Option<Control> {
        self.locate(Target::Checkout).await
    }

    /// First strategy to produce an interactive element wins. A miss is the
    /// normal pre-drop state and only traced.
    pub async fn locate(&self, target: Target) -> Option<Control> {
        let chain = match target {
            Target::AddToCart => &self.add_to_cart,
            Target::Checkout => &self.checkout,
        };
        for strategy in chain.iter() {
            match strategy.locate(self.host.as_ref()).await {
                Ok(Some(element)) if is_interactive(&element) => {
                    debug!(
                        %target,
                        strategy = strategy.name(),
                        element = %element.id,
                        text = %element.text.trim(),
                        "control located"
                    );
                    return Some(Control::new(
                        target,
                        strategy.name(),
                        element,
                        Arc::clone(&self.host),
                    ));
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(%target, strategy = strategy.name(), %err, "strategy failed");
                }
            }
        }
        trace!(%target, "control not found");
        None
    }
}
