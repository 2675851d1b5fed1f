use cdp_adapter::ElementSnapshot;

/// Whether clicking `element` can make progress.
///
/// Structural and keyword matches regularly hit elements that exist but are
/// inert, such as a greyed-out button before the drop; those fail here.
pub fn is_interactive(element: &ElementSnapshot) -> bool {
    element.attached
        && element.rendered
        && !element.hidden
        && !element.disabled
        && !has_disabled_class(element)
}

/// Styling classes shops use to grey out a control (`disabled`, `is-disabled`,
/// `btn--disabled`, ...).
pub fn has_disabled_class(element: &ElementSnapshot) -> bool {
    element
        .classes
        .iter()
        .any(|class| class.to_ascii_lowercase().contains("disabled"))
}
