/// Escape text for Telegram's HTML parse mode.
///
/// Telegram only recognises `&lt;`, `&gt;`, `&amp;` and `&quot;`, so nothing
/// else is touched.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Caption attached to a delivered meme.
pub fn meme_caption(top_text: &str, bottom_text: &str, trigger: &str) -> String {
    format!(
        "🤡 <b>{}</b>\n{}\n\n<i>(generated by {})</i>",
        escape_html(top_text),
        escape_html(bottom_text),
        escape_html(trigger)
    )
}

/// Readable plain-text rendition of an HTML notice: tags dropped, entities
/// decoded. Used when Telegram rejects the markup.
pub fn html_to_plain(html: &str) -> String {
    let mut stripped = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }

    // `&amp;` last, so an escaped entity like `&amp;lt;` stays literal.
    stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
