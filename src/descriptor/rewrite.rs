//! Line-oriented rewriting of version fields in a `pom.xml`.
//!
//! The document is never parsed as XML. Each line updates a small
//! [LineContext] and, depending on it, may have a version literal replaced
//! in place; every other byte of the file is kept.

use super::DescriptorKind;

/// A top-level `<version>` is only rewritten while at most this many
/// element-opening lines have been seen under `<project>`.
pub const DIRECT_CHILD_LIMIT: usize = 4;

/// Which field of the descriptor was rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    ProjectVersion,
    ParentVersion,
    Property(String),
}

/// One rewritten field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// 1-based line number
    pub line: usize,
    pub field: FieldKind,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Default)]
struct LineContext {
    in_project: bool,
    in_parent: bool,
    in_properties: bool,
    /// Element-opening lines seen directly under `<project>`
    children_seen: usize,
    project_version_done: bool,
    parent_version_done: bool,
}

impl LineContext {
    fn observe(&mut self, line: &str) {
        let trimmed = line.trim();

        if opens_project(line) {
            self.in_project = true;
            self.children_seen = 0;
        }

        if line.contains("<parent>") {
            self.in_parent = true;
        } else if line.contains("</parent>") {
            self.in_parent = false;
        }

        if line.contains("<properties>") {
            self.in_properties = true;
        } else if line.contains("</properties>") {
            self.in_properties = false;
        }

        if self.in_top_level()
            && trimmed.contains('<')
            && !trimmed.contains("</")
            && !trimmed.contains("<version>")
        {
            self.children_seen += 1;
        }
    }

    fn in_top_level(&self) -> bool {
        self.in_project && !self.in_parent && !self.in_properties
    }

    fn at_direct_child(&self) -> bool {
        self.in_top_level() && self.children_seen <= DIRECT_CHILD_LIMIT
    }
}

/// `<project` followed by whitespace, `>` or end of line (not `<projectName>`)
fn opens_project(line: &str) -> bool {
    line.match_indices("<project").any(|(at, tag)| {
        line[at + tag.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '>')
    })
}

/// Text of a single-line `<version>X</version>`, if non-empty
fn single_line_version(trimmed: &str) -> Option<&str> {
    let start = trimmed.find("<version>")? + "<version>".len();
    let end = trimmed.find("</version>")?;
    if end > start {
        Some(&trimmed[start..end])
    } else {
        None
    }
}

/// Name and text of a simple property element whose tag name contains
/// `pattern`. Closing tags, comments and empty values are rejected.
fn matching_property<'a>(trimmed: &'a str, pattern: &str) -> Option<(&'a str, &'a str)> {
    if !trimmed.contains(pattern) {
        return None;
    }

    let start_tag = trimmed.find('<')?;
    let end_tag = trimmed.find('>')?;
    if end_tag <= start_tag {
        return None;
    }

    let tag_content = &trimmed[start_tag + 1..end_tag];
    if tag_content.starts_with('/') || tag_content.starts_with('!') || tag_content.starts_with('?')
    {
        return None;
    }
    let name = tag_content.split_whitespace().next()?;
    if !name.contains(pattern) {
        return None;
    }

    let value_start = end_tag + 1;
    let value_len = trimmed[value_start..].find('<')?;
    if value_len == 0 {
        return None;
    }
    Some((name, &trimmed[value_start..value_start + value_len]))
}

/// Replace the first occurrence of `from` in `line`
fn replace_first(line: &mut Vec<u8>, from: &[u8], to: &[u8]) -> bool {
    match line.windows(from.len()).position(|window| window == from) {
        Some(at) => {
            line.splice(at..at + from.len(), to.iter().copied());
            true
        }
        None => false,
    }
}

/// Rewrite the version fields of one descriptor's content.
///
/// The content is taken as raw bytes: a descriptor may declare any
/// encoding, and every marker the rules look for is ASCII. Lines are
/// decoded lossily for matching only; splices are made on the original
/// bytes.
///
/// Returns the new content (byte-identical when nothing changed) and the
/// fields whose value actually changed. A field already at `version` still
/// consumes its one-shot guard.
pub fn rewrite_content(
    content: &[u8],
    kind: DescriptorKind,
    version: &str,
    property_pattern: Option<&str>,
) -> (Vec<u8>, Vec<FieldChange>) {
    let mut ctx = LineContext::default();
    let mut changes = Vec::new();
    let mut lines: Vec<Vec<u8>> = content.split(|b| *b == b'\n').map(<[u8]>::to_vec).collect();

    for (index, line) in lines.iter_mut().enumerate() {
        let text = String::from_utf8_lossy(line).into_owned();
        ctx.observe(&text);

        if let Some(current) = single_line_version(text.trim()) {
            let mut target = None;

            if kind == DescriptorKind::Submodule && ctx.in_parent && !ctx.parent_version_done {
                ctx.parent_version_done = true;
                target = Some(FieldKind::ParentVersion);
            } else if ctx.at_direct_child() && !ctx.project_version_done {
                ctx.project_version_done = true;
                target = Some(FieldKind::ProjectVersion);
            }

            if let Some(field) = target {
                if current != version
                    && replace_first(
                        line,
                        format!("<version>{}</version>", current).as_bytes(),
                        format!("<version>{}</version>", version).as_bytes(),
                    )
                {
                    changes.push(FieldChange {
                        line: index + 1,
                        field,
                        old: current.to_string(),
                        new: version.to_string(),
                    });
                }
            }
        }

        if ctx.in_properties {
            if let Some(pattern) = property_pattern {
                if let Some((name, value)) = matching_property(text.trim(), pattern) {
                    if value != version
                        && replace_first(
                            line,
                            format!(">{}<", value).as_bytes(),
                            format!(">{}<", version).as_bytes(),
                        )
                    {
                        changes.push(FieldChange {
                            line: index + 1,
                            field: FieldKind::Property(name.to_string()),
                            old: value.to_string(),
                            new: version.to_string(),
                        });
                    }
                }
            }
        }
    }

    (lines.join(&b'\n'), changes)
}
