//! Compact human-formatted rendering of an extraction record for direct
//! model consumption (spec §4.6): URL + short metadata + first ~200 words +
//! first 10 links, capped at a character budget.

use super::content::ExtractionRecord;
use crate::utils::string_utils::safe_truncate_chars;

const WORD_BUDGET: usize = 200;
const LINK_BUDGET: usize = 10;
const CHAR_BUDGET: usize = 4_000;

#[must_use]
pub fn format_compact(record: &ExtractionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("URL: {}\n", record.url));
    out.push_str(&format!("Title: {}\n", record.title));

    if let Some(price) = &record.metadata.price {
        let currency = record.metadata.currency.as_deref().unwrap_or("");
        out.push_str(&format!("Price: {currency} {price}\n"));
    }
    if let Some(author) = &record.metadata.author {
        out.push_str(&format!("Author: {author}\n"));
    }
    if let Some(date) = &record.metadata.date {
        out.push_str(&format!("Date: {date}\n"));
    }

    out.push('\n');
    let words: Vec<&str> = record.main_text.split_whitespace().take(WORD_BUDGET).collect();
    out.push_str(&words.join(" "));

    if !record.links.is_empty() {
        out.push_str("\n\nLinks:\n");
        for link in record.links.iter().take(LINK_BUDGET) {
            out.push_str(&format!("- {} ({})\n", link.text, link.href));
        }
        if record.links.len() > LINK_BUDGET {
            out.push_str(&format!("... and {} more links\n", record.links.len() - LINK_BUDGET));
        }
    }

    safe_truncate_chars(&out, CHAR_BUDGET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::content::LinkRef;

    #[test]
    fn caps_links_at_ten_with_overflow_note() {
        let mut record = ExtractionRecord::new("https://e.com", "T", "hello world", "universal");
        record.links = (0..15)
            .map(|i| LinkRef {
                href: format!("https://e.com/{i}"),
                text: format!("link{i}"),
            })
            .collect();
        let out = format_compact(&record);
        assert!(out.contains("and 5 more links"));
    }

    #[test]
    fn never_exceeds_char_budget() {
        let record = ExtractionRecord::new("https://e.com", "T", "word ".repeat(10_000), "universal");
        let out = format_compact(&record);
        assert!(out.chars().count() <= CHAR_BUDGET);
    }
}
