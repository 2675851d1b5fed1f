use crate::model::{
    AgentPolicy, CadencePolicy, ControllerPolicy, ExecutorPolicy, HostPolicy, LocatorPolicy,
    SuccessPolicy,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn default_policy() -> AgentPolicy {
    AgentPolicy {
        executor: ExecutorPolicy {
            checkout_poll_ms: 50,
            // ~3s of checkout monitoring
            checkout_max_attempts: 60,
            reclick_guard_ms: 150,
            success_check_delay_ms: 1000,
        },
        success: SuccessPolicy {
            settle_ms: 1500,
            reload_after_back_ms: 2000,
            phrases: strings(&[
                "заявка принята",
                "спасибо за заказ",
                "заказ сформирован",
                "успешно",
                "thank you for your order",
                "order confirmed",
                "order has been placed",
            ]),
            url_signals: strings(&["success", "confirm", "thank-you", "thankyou"]),
            marker_selector: "[data-order-confirmed], .order-success, .js-order-success".into(),
        },
        cadence: CadencePolicy {
            grace_window_ms: 3_000,
            far_delay_ms: 10_000,
            prep_threshold_ms: 30_000,
            prep_delay_ms: 3_500,
            hot_threshold_ms: 10_000,
            hot_lead_ms: 150,
            hot_min_delay_ms: 1_000,
            hot_max_delay_ms: 1_200,
            turbo_delay_ms: 1_000,
        },
        controller: ControllerPolicy {
            backstop_poll_ms: 1_000,
        },
        locator: LocatorPolicy {
            add_to_cart_selectors: strings(&[
                "[data-add-to-basket] button",
                "button[data-add-to-basket]",
                ".js-add-to-basket",
                "button.buy",
                ".btn-buy",
                ".to_basket",
                ".add_to_cart",
            ]),
            add_to_cart_keywords: strings(&[
                "в корзину",
                "купить",
                "add to cart",
                "add to basket",
                "buy",
            ]),
            checkout_selectors: strings(&[
                "[data-checkout]",
                ".js-checkout",
                ".btn-checkout",
                "a.checkout",
            ]),
            checkout_keywords: strings(&[
                "оформить",
                "перейти",
                "чек",
                "оплата",
                "checkout",
                "proceed",
                "place order",
            ]),
            clickable_selector:
                "button, a, [role=button], div.btn, div.button, span.btn, input[type=submit]"
                    .into(),
        },
        host: HostPolicy {
            mutation_poll_ms: 25,
        },
    }
}
