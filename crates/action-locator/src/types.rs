use serde::{Deserialize, Serialize};

/// Which control of the two-step purchase flow is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    AddToCart,
    Checkout,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::AddToCart => "add_to_cart",
            Target::Checkout => "checkout",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
