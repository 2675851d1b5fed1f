//! CSS selector subset understood by [`MemoryDocument`](crate::MemoryDocument).
//!
//! Supported: selector lists (`a, b`), descendant combinators (`a b`), type
//! selectors, `*`, `.class`, `#id`, `[attr]` and `[attr=value]` with optional
//! quotes. That covers every structural selector the locator ships with.

use crate::errors::HostError;

/// Element view the matcher walks.
pub trait SelectorTarget: Copy {
    fn tag(&self) -> &str;
    fn has_class(&self, class: &str) -> bool;
    fn attr(&self, name: &str) -> Option<&str>;
    fn parent(&self) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    // outermost ancestor first
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrFilter {
    name: String,
    value: Option<String>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, HostError> {
        let fail = |reason: &str| HostError::InvalidSelector {
            selector: input.to_string(),
            reason: reason.to_string(),
        };

        let mut selectors = Vec::new();
        for part in split_top_level(input, ',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(fail("empty selector in list"));
            }
            let mut compounds = Vec::new();
            for token in split_top_level(part, ' ') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                compounds.push(parse_compound(token).map_err(|reason| fail(&reason))?);
            }
            selectors.push(ComplexSelector { compounds });
        }
        if selectors.is_empty() {
            return Err(fail("empty selector"));
        }
        Ok(Self { selectors })
    }

    pub fn matches<T: SelectorTarget>(&self, target: T) -> bool {
        self.selectors.iter().any(|complex| complex.matches(target))
    }
}

impl ComplexSelector {
    fn matches<T: SelectorTarget>(&self, target: T) -> bool {
        let Some((last, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(target) {
            return false;
        }
        // greedy walk up the ancestor chain for the remaining compounds
        let mut cursor = target.parent();
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(node) if compound.matches(node) => {
                        cursor = node.parent();
                        break;
                    }
                    Some(node) => cursor = node.parent(),
                    None => return false,
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches<T: SelectorTarget>(&self, target: T) -> bool {
        if let Some(tag) = &self.tag {
            if !target.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| target.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|filter| match target.attr(&filter.name) {
            Some(actual) => filter.value.as_deref().map_or(true, |want| actual == want),
            None => false,
        })
    }
}

fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_compound(token: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let chars: Vec<char> = token.chars().collect();
    let mut pos = 0;

    let ident = |pos: &mut usize| -> String {
        let start = *pos;
        while *pos < chars.len() && is_ident_char(chars[*pos]) {
            *pos += 1;
        }
        chars[start..*pos].iter().collect()
    };

    if pos < chars.len() && chars[pos] == '*' {
        pos += 1;
    } else if pos < chars.len() && is_ident_char(chars[pos]) {
        compound.tag = Some(ident(&mut pos).to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                let class = ident(&mut pos);
                if class.is_empty() {
                    return Err("empty class name".into());
                }
                compound.classes.push(class);
            }
            '#' => {
                pos += 1;
                let id = ident(&mut pos);
                if id.is_empty() {
                    return Err("empty id".into());
                }
                compound.attrs.push(AttrFilter {
                    name: "id".into(),
                    value: Some(id),
                });
            }
            '[' => {
                pos += 1;
                let name = ident(&mut pos).to_ascii_lowercase();
                if name.is_empty() {
                    return Err("empty attribute name".into());
                }
                let value = match chars.get(pos).copied() {
                    Some(']') => None,
                    Some('=') => {
                        pos += 1;
                        let raw = match chars.get(pos).copied() {
                            Some(q) if q == '"' || q == '\'' => {
                                pos += 1;
                                let start = pos;
                                while pos < chars.len() && chars[pos] != q {
                                    pos += 1;
                                }
                                if pos >= chars.len() {
                                    return Err("unterminated quoted value".into());
                                }
                                let value: String = chars[start..pos].iter().collect();
                                pos += 1;
                                value
                            }
                            _ => ident(&mut pos),
                        };
                        Some(raw)
                    }
                    _ => return Err(format!("unsupported attribute operator in '{}'", token)),
                };
                if chars.get(pos) != Some(&']') {
                    return Err("missing ']'".into());
                }
                pos += 1;
                compound.attrs.push(AttrFilter { name, value });
            }
            other => return Err(format!("unexpected '{}'", other)),
        }
    }
    Ok(compound)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Clone, Copy)]
    struct Fake<'a> {
        nodes: &'a [(&'a str, &'a [&'a str], BTreeMap<&'a str, &'a str>, Option<usize>)],
        idx: usize,
    }

    impl<'a> SelectorTarget for Fake<'a> {
        fn tag(&self) -> &str {
            self.nodes[self.idx].0
        }
        fn has_class(&self, class: &str) -> bool {
            self.nodes[self.idx].1.contains(&class)
        }
        fn attr(&self, name: &str) -> Option<&str> {
            self.nodes[self.idx].2.get(name).copied()
        }
        fn parent(&self) -> Option<Self> {
            self.nodes[self.idx].3.map(|idx| Fake {
                nodes: self.nodes,
                idx,
            })
        }
    }

    #[test]
    fn matches_compound_and_descendant_selectors() {
        let nodes = [
            ("div", &["card"][..], BTreeMap::from([("data-add-to-basket", "")]), None),
            ("span", &[][..], BTreeMap::new(), Some(0)),
            ("button", &["buy"][..], BTreeMap::from([("type", "submit")]), Some(1)),
        ];
        let button = Fake {
            nodes: &nodes,
            idx: 2,
        };

        assert!(SelectorList::parse("button.buy").unwrap().matches(button));
        assert!(SelectorList::parse("[data-add-to-basket] button")
            .unwrap()
            .matches(button));
        assert!(SelectorList::parse("a, input[type=submit], button[type=\"submit\"]")
            .unwrap()
            .matches(button));
        assert!(SelectorList::parse(".card > button").is_err());
        assert!(!SelectorList::parse("div.card button.other")
            .unwrap()
            .matches(button));
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("a,,b").is_err());
        assert!(SelectorList::parse("[data-x").is_err());
        assert!(SelectorList::parse("a.").is_err());
    }
}
