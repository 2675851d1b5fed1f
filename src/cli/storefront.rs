//! Simulated shop used by `dropclick demo`.

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{ElementSpec, MemoryDocument};
use chrono::NaiveDateTime;
use dropclick_scheduler::Clock;
use tracing::debug;

pub const PRODUCT_URL: &str = "https://demo.dropclick.local/catalog/limited-354";
pub const THANKS_URL: &str = "https://demo.dropclick.local/order/complete";

/// Product page whose buy button stays disabled until `drop_at`.
///
/// Adding to cart reveals the checkout link after `checkout_lag`; checking out
/// lands on a confirmation page. Reloads re-render from the clock, and with
/// `live_open` the page also unlocks itself at the drop moment.
pub struct Storefront {
    pub drop_at: NaiveDateTime,
    pub checkout_lag: Duration,
    pub live_open: bool,
}

impl Storefront {
    pub fn open(&self, clock: Arc<dyn Clock>) -> Arc<MemoryDocument> {
        let drop_at = self.drop_at;
        let doc = MemoryDocument::new(PRODUCT_URL, product_page(clock.now() < drop_at));

        let render_clock = Arc::clone(&clock);
        doc.set_renderer(move |url| {
            if url == THANKS_URL {
                thanks_page()
            } else {
                product_page(render_clock.now() < drop_at)
            }
        });

        let lag = self.checkout_lag;
        doc.on_click("buy", move |doc| {
            tokio::spawn(async move {
                tokio::time::sleep(lag).await;
                if doc.id_of("checkout").is_none() {
                    debug!("storefront: cart updated, checkout shown");
                    doc.insert(Some("cart"), checkout_link());
                }
            });
        });
        doc.on_click("checkout", |doc| doc.navigate(THANKS_URL, thanks_page()));

        if self.live_open {
            let live = Arc::clone(&doc);
            let wait = (drop_at - clock.now()).to_std().unwrap_or(Duration::ZERO);
            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                debug!("storefront: drop is live");
                live.set_disabled("buy", false);
                live.toggle_class("buy", "disabled", false);
            });
        }
        doc
    }
}

fn product_page(locked: bool) -> Vec<ElementSpec> {
    let mut buy = ElementSpec::new("button")
        .key("buy")
        .class("btn")
        .text("В корзину")
        .disabled(locked);
    if locked {
        buy = buy.class("disabled");
    }
    vec![
        ElementSpec::new("h1").text("Limited sneaker, drop edition"),
        ElementSpec::new("div")
            .key("card")
            .class("product-card")
            .attr("data-add-to-basket", "354")
            .child(ElementSpec::new("span").class("price").text("12 990 ₽"))
            .child(buy),
        ElementSpec::new("aside").key("cart").class("mini-cart"),
    ]
}

fn checkout_link() -> ElementSpec {
    ElementSpec::new("a")
        .key("checkout")
        .class("btn")
        .attr("href", "/order/")
        .text("Оформить заказ")
}

fn thanks_page() -> Vec<ElementSpec> {
    vec![
        ElementSpec::new("h1").text("Спасибо за заказ!"),
        ElementSpec::new("div")
            .attr("data-order-confirmed", "1")
            .text("Заказ сформирован"),
    ]
}
