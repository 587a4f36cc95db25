//! Render the top levels of a tree as a nested HTML list.
//!
//! ```text
//! a/b/c, a/x, d   levels = 2
//!
//! <ul>
//! <li>a
//! <ul>
//! <li>b
//! </li>
//! <li>x
//! </li></ul></li>
//! <li>d
//! </li>
//! </ul>
//! ```
//!
//! Rows arrive in path order, so nesting is driven purely by the change in
//! depth between consecutive rows. Labels are each node's own name, escaped.

use crate::TopicTree;

/// Nested `<ul>`/`<li>` markup for the first `levels` levels of `tree`.
///
/// Returns an empty string when there is nothing to show.
pub fn render_trunk(tree: &TopicTree, levels: usize) -> String {
    let mut pieces = vec![String::from("<ul>")];
    let mut current = 0usize;
    let mut first = true;

    for topic in tree.iter().filter(|t| t.depth() <= levels) {
        let level = topic.depth() - 1;
        let label = html_escape(topic.name());
        if level == current {
            if first {
                first = false;
            } else {
                pieces.push("</li>".into());
            }
            pieces.push(format!("<li>{label}"));
        } else if level > current {
            // Pre-order never skips a level on the way down.
            pieces.push(format!("<ul>\n<li>{label}"));
            current += 1;
        } else {
            let mut close = String::new();
            while current > level {
                close.push_str("</li></ul>");
                current -= 1;
            }
            pieces.push(format!("{close}</li>\n<li>{label}"));
        }
    }

    if pieces.len() == 1 {
        return String::new();
    }
    while current > 0 {
        pieces.push("</li></ul>".into());
        current -= 1;
    }
    pieces.push("</li>\n</ul>".into());
    pieces.join("\n")
}

impl TopicTree {
    /// See [`render_trunk`].
    pub fn render_trunk(&self, levels: usize) -> String {
        render_trunk(self, levels)
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
