use std::fmt::Write as _;

use gsearch_store::SearchResponse;

/// Renders a response as the markdown text handed to MCP clients.
#[must_use]
pub fn render_markdown(response: &SearchResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Search results for \"{}\"", response.query);
    out.push('\n');

    if response.results.is_empty() {
        out.push_str("No results found.\n");
        return out;
    }

    let noun = if response.total_results == 1 { "result" } else { "results" };
    let source = if response.cached { " (cached)" } else { "" };
    let _ = writeln!(out, "{} {noun}{source}", response.total_results);
    out.push('\n');

    for (rank, result) in response.results.iter().enumerate() {
        let title = escape_link_text(&result.title);
        let _ = writeln!(out, "{}. [{title}]({})", rank + 1, result.url);
        if let Some(description) = result.description.as_deref().filter(|text| !text.is_empty()) {
            let _ = writeln!(out, "   {description}");
        }
    }
    out
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
