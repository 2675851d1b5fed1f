//! Element locator for the acquisition agent
//!
//! Finds the current add-to-cart and checkout controls in a page whose markup
//! shifts under us:
//! - structural selectors known to match the target shop, most specific first
//! - keyword scan over every clickable element as the fallback
//! - an interactivity filter every candidate must pass, so inert pre-drop
//!   buttons are never reported as found

pub mod control;
pub mod errors;
pub mod interactivity;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use control::Control;
pub use errors::LocatorError;
pub use interactivity::{has_disabled_class, is_interactive};
pub use resolver::Locator;
pub use strategies::{KeywordStrategy, SelectorStrategy, Strategy};
pub use types::Target;
