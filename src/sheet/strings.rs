//! On-demand shared-string resolution.
//!
//! The shared-string table is never decoded into an array. It stays a byte
//! range; resolution is a single forward scan that counts `<si>` items and
//! decodes only the wanted indices. The table in these exports is routinely
//! far larger than the subset one column references, so the scan cost is paid
//! proportional to the need, not to the table size: it stops as soon as the
//! running index passes the highest wanted one, or every wanted index has
//! been resolved.

use std::collections::{BTreeSet, HashMap};

/// Resolve the strings at `wanted` zero-based indices from the inflated
/// shared-string table bytes.
///
/// A rich-text item contributes the concatenation of all its `<t>` run
/// fragments. Wanted indices past the end of the table are simply absent from
/// the result. An empty wanted set returns without touching the table.
pub fn resolve_shared_strings(table: &[u8], wanted: &BTreeSet<u32>) -> HashMap<u32, String> {
    let mut resolved = HashMap::with_capacity(wanted.len());
    let Some(&max_wanted) = wanted.last() else {
        return resolved;
    };

    let mut pos = 0usize;
    let mut index = 0u32;

    while let Some(open) = find_tag(table, pos, b"<si") {
        let current = index;
        index += 1;
        if current > max_wanted {
            break;
        }

        let Some(tag_end) = find_bytes(table, open, b">") else {
            break;
        };
        let body_start = tag_end + 1;

        if !wanted.contains(&current) {
            pos = body_start;
            continue;
        }

        if table[tag_end - 1] == b'/' {
            // <si/> - an empty item
            resolved.insert(current, String::new());
            pos = body_start;
        } else {
            let body_end = find_bytes(table, body_start, b"</si>").unwrap_or(table.len());
            resolved.insert(current, collect_text_runs(&table[body_start..body_end]));
            pos = body_end;
        }

        if resolved.len() == wanted.len() {
            break;
        }
    }

    resolved
}

/// Concatenate the text content of every `<t>...</t>` fragment in one item's
/// body. Plain items have a single fragment; rich-text items have one per run.
fn collect_text_runs(body: &[u8]) -> String {
    let mut text = String::new();
    let mut pos = 0usize;

    while let Some(open) = find_tag(body, pos, b"<t") {
        let Some(tag_end) = find_bytes(body, open, b">") else {
            break;
        };
        if body[tag_end - 1] == b'/' {
            // <t/> - empty run
            pos = tag_end + 1;
            continue;
        }
        let start = tag_end + 1;
        let Some(end) = find_bytes(body, start, b"</t>") else {
            break;
        };
        text.push_str(&unescape_xml(&body[start..end]));
        pos = end + 4;
    }

    text
}

/// First occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find_bytes(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|p| p + from)
}

/// Like [`find_bytes`], but the match must be a complete tag name: the byte
/// after `open` has to terminate the name (whitespace, `>`, or `/`), so
/// `<si` does not match `<sst` content and `<t` does not match `<table`.
pub(crate) fn find_tag(haystack: &[u8], mut from: usize, open: &[u8]) -> Option<usize> {
    while let Some(i) = find_bytes(haystack, from, open) {
        match haystack.get(i + open.len()) {
            Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/') => return Some(i),
            Some(_) => from = i + open.len(),
            None => return None,
        }
    }
    None
}

/// Decode the five predefined XML entities and numeric character references.
/// Unrecognized entities are kept verbatim.
pub(crate) fn unescape_xml(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if !text.contains('&') {
        return text.into_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest: &str = &text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest.find(';') else {
            break;
        };
        match &rest[1..semi] {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            entity => {
                let code = entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push_str(&rest[..=semi]),
                }
            }
        }
        rest = &rest[semi + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wanted(indices: &[u32]) -> BTreeSet<u32> {
        indices.iter().copied().collect()
    }

    #[test]
    fn empty_wanted_set_skips_the_scan() {
        // Would blow up on any attempt to interpret it
        let garbage = b"\xFF\xFE not xml at all";
        let resolved = resolve_shared_strings(garbage, &BTreeSet::new());
        assert!(resolved.is_empty());
    }

    #[test]
    fn resolves_plain_items_by_index() {
        let table = br#"<sst count="3" uniqueCount="3">
            <si><t>alpha.com</t></si>
            <si><t>beta.org</t></si>
            <si><t>gamma.net</t></si>
        </sst>"#;

        let resolved = resolve_shared_strings(table, &wanted(&[0, 2]));
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&0], "alpha.com");
        assert_eq!(resolved[&2], "gamma.net");
        assert!(!resolved.contains_key(&1));
    }

    #[test]
    fn rich_text_runs_concatenate() {
        let table = br#"<sst>
            <si><r><rPr><b/></rPr><t>exa</t></r><r><t>mple.com</t></r></si>
        </sst>"#;

        let resolved = resolve_shared_strings(table, &wanted(&[0]));
        assert_eq!(resolved[&0], "example.com");
    }

    #[test]
    fn preserved_whitespace_and_entities_decode() {
        let table = br#"<sst>
            <si><t xml:space="preserve"> a&amp;b.com </t></si>
            <si><t>&#x68;i&#105;</t></si>
        </sst>"#;

        let resolved = resolve_shared_strings(table, &wanted(&[0, 1]));
        assert_eq!(resolved[&0], " a&b.com ");
        assert_eq!(resolved[&1], "hii");
    }

    #[test]
    fn empty_items_resolve_to_empty_strings() {
        let table = b"<sst><si/><si><t/></si><si><t>real.com</t></si></sst>";
        let resolved = resolve_shared_strings(table, &wanted(&[0, 1, 2]));
        assert_eq!(resolved[&0], "");
        assert_eq!(resolved[&1], "");
        assert_eq!(resolved[&2], "real.com");
    }

    #[test]
    fn scan_stops_at_the_highest_wanted_index() {
        // Everything past item 1 is deliberately mangled; a scan that kept
        // going would pick up nonsense for index 2
        let table = b"<sst>\
            <si><t>first.com</t></si>\
            <si><t>second.com</t></si>\
            <si><t>GARBAGE \xFF\xFF";

        let resolved = resolve_shared_strings(table, &wanted(&[0, 1]));
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&0], "first.com");
        assert_eq!(resolved[&1], "second.com");
    }

    #[test]
    fn wanted_index_past_table_end_is_simply_absent() {
        let table = b"<sst><si><t>only.com</t></si></sst>";
        let resolved = resolve_shared_strings(table, &wanted(&[0, 7]));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[&0], "only.com");
    }

    #[test]
    fn tag_matching_requires_a_name_boundary() {
        // <sid> must not be mistaken for an <si> item
        let table = b"<sst><sid>x</sid><si><t>real.com</t></si></sst>";
        let resolved = resolve_shared_strings(table, &wanted(&[0]));
        assert_eq!(resolved[&0], "real.com");
    }

    #[test]
    fn unescape_handles_all_predefined_entities() {
        assert_eq!(
            unescape_xml(b"&lt;a&gt; &amp; &quot;b&quot; &apos;c&apos;"),
            "<a> & \"b\" 'c'"
        );
        assert_eq!(unescape_xml(b"no entities"), "no entities");
        assert_eq!(unescape_xml(b"&bogus; stays"), "&bogus; stays");
    }
}
