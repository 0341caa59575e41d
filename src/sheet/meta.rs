//! Workbook manifest and relationship resolution.
//!
//! Two small, fully-inflated documents are consulted: `xl/workbook.xml` names
//! the sheets and ties each to a relationship id, and
//! `xl/_rels/workbook.xml.rels` maps that id to the part's path inside the
//! container.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{ExtractError, Result};

/// Resolve the ZIP entry name of the first sheet whose name starts with
/// `prefix` (case-sensitive, document order).
pub fn resolve_sheet_path(workbook_xml: &[u8], rels_xml: &[u8], prefix: &str) -> Result<String> {
    let rel_id = find_sheet_rel_id(workbook_xml, prefix)?;
    let target = find_relationship_target(rels_xml, &rel_id)?;
    Ok(normalize_target(&target))
}

/// Scan `<sheet>` declarations for the first name matching the prefix and
/// return its relationship id. The `name` and `r:id` attributes may appear in
/// either order within the tag.
fn find_sheet_rel_id(workbook_xml: &[u8], prefix: &str) -> Result<String> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = String::new();
                    let mut rel_id = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => {
                                name = std::str::from_utf8(&attr.value).unwrap_or("").to_string();
                            }
                            b"r:id" => {
                                rel_id = std::str::from_utf8(&attr.value).unwrap_or("").to_string();
                            }
                            _ => {}
                        }
                    }

                    if name.starts_with(prefix) {
                        if rel_id.is_empty() {
                            return Err(ExtractError::MalformedArchive(format!(
                                "sheet '{name}' declares no relationship id"
                            )));
                        }
                        return Ok(rel_id);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Err(ExtractError::SheetNotFound(prefix.to_string()))
}

/// Look up a relationship id in the relationships document and return its
/// `Target` path.
fn find_relationship_target(rels_xml: &[u8], rel_id: &str) -> Result<String> {
    let mut reader = Reader::from_reader(rels_xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = String::new();
                    let mut target = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => {
                                id = std::str::from_utf8(&attr.value).unwrap_or("").to_string();
                            }
                            b"Target" => {
                                target = std::str::from_utf8(&attr.value).unwrap_or("").to_string();
                            }
                            _ => {}
                        }
                    }

                    if id == rel_id && !target.is_empty() {
                        return Ok(target);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Err(ExtractError::RelationshipNotFound(rel_id.to_string()))
}

/// Resolve a relationship target to a full entry name: strip a leading slash,
/// prefix `xl/` when not already present.
fn normalize_target(target: &str) -> String {
    let target = target.strip_prefix('/').unwrap_or(target);
    if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{target}")
    }
}
