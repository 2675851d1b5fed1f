//! Pure confirmation predicates

use cdp_adapter::normalize_text;

use crate::types::SuccessSignal;

/// First configured phrase contained in the page text.
pub fn phrase_signal(page_text: &str, phrases: &[String]) -> Option<SuccessSignal> {
    let text = normalize_text(page_text);
    phrases
        .iter()
        .map(|phrase| normalize_text(phrase))
        .find(|phrase| !phrase.is_empty() && text.contains(phrase.as_str()))
        .map(SuccessSignal::Phrase)
}

/// First configured fragment contained in the URL, compared case-insensitively.
pub fn url_signal(url: &str, fragments: &[String]) -> Option<SuccessSignal> {
    let url = url.to_lowercase();
    fragments
        .iter()
        .map(|fragment| fragment.to_lowercase())
        .find(|fragment| !fragment.is_empty() && url.contains(fragment.as_str()))
        .map(SuccessSignal::Url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn phrases_match_across_case_and_whitespace() {
        let phrases = strings(&["спасибо за заказ", "thank you for your order"]);
        assert_eq!(
            phrase_signal("  СПАСИБО   за\nзаказ!  ", &phrases),
            Some(SuccessSignal::Phrase("спасибо за заказ".into()))
        );
        assert_eq!(phrase_signal("Добавить в корзину", &phrases), None);
    }

    #[test]
    fn url_fragments_match_case_insensitively() {
        let fragments = strings(&["success", "confirm"]);
        assert_eq!(
            url_signal("https://shop.test/order/Confirm?id=9", &fragments),
            Some(SuccessSignal::Url("confirm".into()))
        );
        assert_eq!(url_signal("https://shop.test/catalog/1", &fragments), None);
        assert_eq!(url_signal("https://shop.test/", &strings(&[""])), None);
    }
}
