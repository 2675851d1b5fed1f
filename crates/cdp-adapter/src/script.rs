//! Page-side snippets evaluated by [`ChromiumDocument`](crate::ChromiumDocument).
//!
//! Element handles are `data-dropclick-id` attributes stamped on first sight.
//! The id embeds a per-document epoch so a handle issued before a reload can
//! never alias an element of the new document.

const DESCRIBE_FN: &str = r#"
const __dcDescribe = (el) => {
  if (!window.__dropclickEpoch) {
    window.__dropclickEpoch = Math.random().toString(36).slice(2, 10);
    window.__dropclickSeq = 0;
  }
  if (!el.dataset.dropclickId) {
    window.__dropclickSeq += 1;
    el.dataset.dropclickId = window.__dropclickEpoch + '-' + window.__dropclickSeq;
  }
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return {
    id: el.dataset.dropclickId,
    tag: el.tagName.toLowerCase(),
    text: el.textContent || '',
    classes: Array.from(el.classList),
    role: el.getAttribute('role'),
    disabled: el.disabled === true || el.getAttribute('aria-disabled') === 'true',
    attached: el.isConnected,
    rendered: el.isConnected && el.getClientRects().length > 0
      && rect.width > 0 && rect.height > 0 && style.display !== 'none',
    hidden: style.visibility === 'hidden' || style.visibility === 'collapse',
  };
};
const __dcFind = (id) => Array.from(document.querySelectorAll('[data-dropclick-id]'))
  .find((el) => el.dataset.dropclickId === id) || null;
"#;

fn quoted(raw: &str) -> String {
    // a JSON string literal is a valid JS string literal
    serde_json::Value::String(raw.to_string()).to_string()
}

pub(crate) fn query_all(selector: &str) -> String {
    format!(
        r#"(() => {{
{DESCRIBE_FN}
  let nodes;
  try {{ nodes = Array.from(document.querySelectorAll({sel})); }}
  catch (e) {{ return {{ error: String(e), items: [] }}; }}
  return {{ error: null, items: nodes.map(__dcDescribe) }};
}})()"#,
        sel = quoted(selector)
    )
}

pub(crate) fn inspect(id: &str) -> String {
    format!(
        r#"(() => {{
{DESCRIBE_FN}
  const el = __dcFind({id});
  return {{ found: el !== null, item: el && el.isConnected ? __dcDescribe(el) : null }};
}})()"#,
        id = quoted(id)
    )
}

pub(crate) fn click(id: &str) -> String {
    format!(
        r#"(() => {{
{DESCRIBE_FN}
  const el = __dcFind({id});
  if (!el || !el.isConnected) return false;
  el.click();
  return true;
}})()"#,
        id = quoted(id)
    )
}

pub(crate) const PAGE_TEXT: &str =
    "(() => (document.body && document.body.textContent) || '')()";

pub(crate) const HISTORY_BACK: &str = "(() => { window.history.back(); return true; })()";

/// Installs the change observer when missing and reports `[counter, href]`.
/// A counter of `-1` means the observer was just (re)installed on a fresh document.
pub(crate) const OBSERVE: &str = r#"(() => {
  if (!window.__dropclickObserver) {
    window.__dropclickMutations = 0;
    const obs = new MutationObserver(() => { window.__dropclickMutations += 1; });
    obs.observe(document.documentElement, {
      childList: true,
      subtree: true,
      attributes: true,
      attributeFilter: ['disabled', 'class', 'style'],
    });
    window.__dropclickObserver = obs;
    return [-1, location.href];
  }
  return [window.__dropclickMutations, location.href];
})()"#;
