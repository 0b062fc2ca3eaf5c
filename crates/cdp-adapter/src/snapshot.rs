//! Page snapshotting: indexed interactive elements for the LLM.
//!
//! A single injected script walks the DOM, collects visible interactive
//! elements, and returns for each one an index, tag, trimmed text, and a
//! CSS selector the adapter can use to act on it later.

use serde::Deserialize;

/// One indexed element as reported by the injected script.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexedElement {
    pub index: u32,
    pub tag: String,
    pub text: String,
    pub selector: String,
}

/// Injected script: returns a JSON-serializable array of interactive
/// elements. `MAX` is substituted before evaluation.
pub const SNAPSHOT_JS: &str = r#"
(() => {
    const MAX = __MAX__;
    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) return false;
        const style = window.getComputedStyle(el);
        return style.visibility !== 'hidden' && style.display !== 'none';
    };
    const cssPath = (el) => {
        if (el.id) return '#' + CSS.escape(el.id);
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1 && parts.length < 6) {
            let part = node.localName;
            const parent = node.parentElement;
            if (parent) {
                const siblings = Array.from(parent.children).filter(c => c.localName === node.localName);
                if (siblings.length > 1) {
                    part += ':nth-of-type(' + (siblings.indexOf(node) + 1) + ')';
                }
            }
            parts.unshift(part);
            if (node.id) { parts[0] = '#' + CSS.escape(node.id); break; }
            node = parent;
        }
        return parts.join(' > ');
    };
    const selectors = 'a, button, input, select, textarea, [role="button"], [role="link"], [onclick]';
    const elements = [];
    let index = 0;
    for (const el of document.querySelectorAll(selectors)) {
        if (index >= MAX) break;
        if (!isVisible(el)) continue;
        const text = (el.innerText || el.value || el.getAttribute('placeholder') || el.getAttribute('aria-label') || '')
            .trim().replace(/\s+/g, ' ').slice(0, 100);
        elements.push({ index: index, tag: el.localName, text: text, selector: cssPath(el) });
        index += 1;
    }
    return elements;
})()
"#;

/// Render the script with the element cap substituted in.
pub fn snapshot_script(max_elements: u32) -> String {
    SNAPSHOT_JS.replace("__MAX__", &max_elements.to_string())
}

/// Render the indexed elements as the one-line-per-element tree the
/// prompt format expects.
pub fn render_tree(elements: &[IndexedElement]) -> String {
    elements
        .iter()
        .map(|el| format!("[{}]<{}>{}</{}>", el.index, el.tag, el.text, el.tag))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_substitutes_element_cap() {
        let script = snapshot_script(42);
        assert!(script.contains("const MAX = 42;"));
        assert!(!script.contains("__MAX__"));
    }

    #[test]
    fn tree_renders_one_line_per_element() {
        let elements = vec![
            IndexedElement {
                index: 0,
                tag: "button".into(),
                text: "Submit".into(),
                selector: "#submit".into(),
            },
            IndexedElement {
                index: 1,
                tag: "a".into(),
                text: "About".into(),
                selector: "nav > a:nth-of-type(2)".into(),
            },
        ];
        let tree = render_tree(&elements);
        assert_eq!(tree, "[0]<button>Submit</button>\n[1]<a>About</a>");
    }
}
