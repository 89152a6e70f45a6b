//! The small subset of Markdown the assistant writes in: `##` and
//! `###` headings, deeper headings shown as bold lines, `-`/`*`
//! bullet lists, `**bold**`, and paragraphs.
use std::sync::LazyLock;

use regex::Regex;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("Invalid regex"));

/// Render a reply as an HTML fragment. All text is escaped.
pub fn render_html(text: &str) -> String {
    let mut html = Vec::new();
    let mut list: Vec<String> = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("### ") {
            flush_list(&mut html, &mut list);
            html.push(format!("<h3>{}</h3>", inline(rest)));
        } else if let Some(rest) = line.strip_prefix("## ") {
            flush_list(&mut html, &mut list);
            html.push(format!("<h2>{}</h2>", inline(rest)));
        } else if let Some(rest) = line
            .strip_prefix("#### ")
            .or_else(|| line.strip_prefix("##### "))
        {
            flush_list(&mut html, &mut list);
            html.push(format!("<p><strong>{}</strong></p>", inline(rest)));
        } else if let Some(rest) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
        {
            list.push(format!("<li>{}</li>", inline(rest)));
        } else {
            // Blank lines only end a list
            flush_list(&mut html, &mut list);
            if !line.trim().is_empty() {
                html.push(format!("<p>{}</p>", inline(line)));
            }
        }
    }
    flush_list(&mut html, &mut list);

    html.join("\n")
}

fn flush_list(html: &mut Vec<String>, list: &mut Vec<String>) {
    if !list.is_empty() {
        html.push(format!("<ul>{}</ul>", list.join("")));
        list.clear();
    }
}

fn inline(text: &str) -> String {
    BOLD.replace_all(&escape(text), "<strong>$1</strong>")
        .into_owned()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Strip markup that a speech synthesizer would read out loud.
pub fn clean_for_speech(text: &str) -> String {
    text.replace(['*', '#'], "").replace("- ", "").trim().to_string()
}

/// Plain text for an exported transcript. Bullets become `•`.
pub fn clean_for_export(text: &str) -> String {
    text.replace("**", "").replace("###", "").replace('-', "•")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_welcome_message() {
        let html = render_html(crate::chat::WELCOME_MESSAGE);
        assert_eq!(
            html,
            [
                "<h3>Bonjour !</h3>",
                "<p>Je suis <strong>ADA</strong>, votre assistante juridique spécialisée en Contentieux International.</p>",
                "<p>Je peux vous aider sur :</p>",
                "<ul><li><strong>La CIJ</strong> et sa compétence</li><li><strong>La responsabilité internationale</strong></li><li><strong>La procédure</strong> (arrêts, avis)</li></ul>",
                "<p>Utilisez les boutons ci-dessous pour vous entraîner !</p>",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_headings() {
        assert_eq!(render_html("## Titre"), "<h2>Titre</h2>");
        assert_eq!(render_html("#### Sous-titre"), "<p><strong>Sous-titre</strong></p>");
        assert_eq!(render_html("##### Détail"), "<p><strong>Détail</strong></p>");
        // Not a heading without the space
        assert_eq!(render_html("###Titre"), "<p>###Titre</p>");
    }

    #[test]
    fn test_lists_are_split_by_blank_lines() {
        let html = render_html("- un\n* deux\n\n- trois");
        assert_eq!(
            html,
            "<ul><li>un</li><li>deux</li></ul>\n<ul><li>trois</li></ul>"
        );
    }

    #[test]
    fn test_escapes_html() {
        assert_eq!(
            render_html("<script>alert('x')</script> & **<b>**"),
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; <strong>&lt;b&gt;</strong></p>"
        );
    }

    #[test]
    fn test_clean_for_speech() {
        assert_eq!(
            clean_for_speech("### Titre\n- **La CIJ** et sa compétence\n"),
            "Titre\nLa CIJ et sa compétence"
        );
    }

    #[test]
    fn test_clean_for_export() {
        assert_eq!(
            clean_for_export("### Points clés\n- **Arrêt** ci-dessous"),
            " Points clés\n• Arrêt ci•dessous"
        );
    }
}
