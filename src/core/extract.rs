//! Action extraction from raw assistant output
//!
//! Recognizes the XML-like action protocol:
//!
//! ```text
//! <edit><path>P</path><search>S</search><replace>R</replace></edit>
//! <create><path>P</path><content>C</content></create>
//! ```
//!
//! Each block is found first, then every child field is pulled out with its
//! own pattern, so child order inside a block does not matter. Payloads may
//! be wrapped in `<![CDATA[ ... ]]>`. Blocks missing a field, or with an empty
//! path, are dropped without error. Actions come back in the order their
//! opening tags appear, edits and creates interleaved.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::edit::{AgentAction, FileCreate, FileEdit};

/// Block openers and closers, plus whole CDATA sections so tag text inside a
/// payload is stepped over rather than read as structure.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>|<(/?)(edit|create)>").expect("block token regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Edit,
    Create,
}

impl BlockKind {
    fn from_tag(tag: &str) -> Self {
        if tag == "edit" { Self::Edit } else { Self::Create }
    }
}

/// A closed `<edit>` / `<create>` block: opener offset, kind, inner body
#[derive(Debug)]
struct Block<'a> {
    start: usize,
    kind: BlockKind,
    body: &'a str,
}

/// Split `response` into closed blocks, in order.
///
/// An opener seen before the current block closes means the current block
/// was never terminated: it is dropped and scanning resumes at the new
/// opener. Unterminated trailing blocks are dropped too.
fn blocks(response: &str) -> Vec<Block<'_>> {
    let mut out = Vec::new();
    let mut open: Option<(usize, usize, BlockKind)> = None;
    let mut pos = 0;

    while let Some(caps) = TOKEN.captures_at(response, pos) {
        let Some(whole) = caps.get(0) else { break };
        pos = whole.end();
        let Some(tag) = caps.get(2) else {
            // CDATA section
            continue;
        };
        let kind = BlockKind::from_tag(tag.as_str());
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());

        match (open, closing) {
            (None, false) => open = Some((whole.start(), whole.end(), kind)),
            (Some((start, body_start, open_kind)), true) if open_kind == kind => {
                out.push(Block { start, kind, body: &response[body_start..whole.start()] });
                open = None;
            }
            (Some((start, _, _)), false) => {
                tracing::debug!(offset = start, "unterminated block; restarting at next opener");
                open = Some((whole.start(), whole.end(), kind));
            }
            // Stray closer
            _ => {}
        }
    }

    if let Some((start, _, _)) = open {
        tracing::debug!(offset = start, "unterminated trailing block dropped");
    }
    out
}

/// Field pattern; the CDATA alternative is tried first so a payload may
/// contain its own closing tag text.
fn field_regex(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)<{tag}>\s*(?:<!\[CDATA\[(.*?)\]\]>\s*</{tag}>|(.*?)</{tag}>)"
    ))
    .expect("field regex")
}

static PATH: LazyLock<Regex> = LazyLock::new(|| field_regex("path"));
static SEARCH: LazyLock<Regex> = LazyLock::new(|| field_regex("search"));
static REPLACE: LazyLock<Regex> = LazyLock::new(|| field_regex("replace"));
static CONTENT: LazyLock<Regex> = LazyLock::new(|| field_regex("content"));

/// Pull one field out of a block body, CDATA-unwrapped and trimmed
fn field(re: &Regex, body: &str) -> Option<String> {
    let caps = re.captures(body)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(unwrap_cdata(raw))
}

/// Strip an optional CDATA envelope, then trim
pub fn unwrap_cdata(raw: &str) -> String {
    let t = raw.trim();
    let t = t.strip_prefix("<![CDATA[").unwrap_or(t);
    let t = t.strip_suffix("]]>").unwrap_or(t);
    t.trim().to_string()
}

fn parse_edit(body: &str) -> Option<AgentAction> {
    let file_path = field(&PATH, body).filter(|p| !p.is_empty())?;
    let search = field(&SEARCH, body)?;
    let replace = field(&REPLACE, body)?;
    Some(AgentAction::edit(FileEdit {
        file_path,
        search,
        replace,
    }))
}

fn parse_create(body: &str) -> Option<AgentAction> {
    let path = field(&PATH, body).filter(|p| !p.is_empty())?;
    let content = field(&CONTENT, body)?;
    Some(AgentAction::create(FileCreate { path, content }))
}

/// Extract every well-formed action from `response`, in the order their
/// opening tags appear.
pub fn extract(response: &str) -> Vec<AgentAction> {
    blocks(response)
        .into_iter()
        .filter_map(|block| {
            let parsed = match block.kind {
                BlockKind::Edit => parse_edit(block.body),
                BlockKind::Create => parse_create(block.body),
            };
            if parsed.is_none() {
                tracing::debug!(offset = block.start, kind = ?block.kind, "skipping malformed block");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::edit::ActionKind;

    fn only_edit(actions: &[AgentAction]) -> &FileEdit {
        assert_eq!(actions.len(), 1);
        match &actions[0].kind {
            ActionKind::Edit(e) => e,
            other => panic!("expected edit, got {other:?}"),
        }
    }

    #[test]
    fn cdata_payloads_are_unwrapped() {
        let text = "<edit><path>a.ts</path><search><![CDATA[foo\nbar]]></search>\
                    <replace><![CDATA[  baz  ]]></replace></edit>";
        let actions = extract(text);
        let e = only_edit(&actions);
        assert_eq!(e.file_path, "a.ts");
        assert_eq!(e.search, "foo\nbar");
        assert_eq!(e.replace, "baz");
        assert!(!actions[0].applied);
    }

    #[test]
    fn plain_payloads_are_trimmed() {
        let text = "<edit>\n  <path> a.ts </path>\n  <search>\n foo \n</search>\n  <replace>bar</replace>\n</edit>";
        let actions = extract(text);
        let e = only_edit(&actions);
        assert_eq!(e.file_path, "a.ts");
        assert_eq!(e.search, "foo");
        assert_eq!(e.replace, "bar");
    }

    #[test]
    fn child_order_does_not_matter() {
        let text = "<edit><replace>R</replace><search>S</search><path>p.rs</path></edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!((e.file_path.as_str(), e.search.as_str(), e.replace.as_str()), ("p.rs", "S", "R"));
    }

    #[test]
    fn cdata_may_contain_closing_tags() {
        let text = "<edit><path>x.xml</path><search><![CDATA[<a></search></a>]]></search>\
                    <replace><![CDATA[<b/>]]></replace></edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!(e.search, "<a></search></a>");
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let text = "\
            <edit><path>a.ts</path><search>x</search></edit>\
            <create><content>orphan</content></create>\
            <edit><path></path><search>x</search><replace>y</replace></edit>\
            <create><path>ok.txt</path><content>hi</content></create>\
            <edit><path>unterminated.ts</path><search>x</search><replace>y</replace>";
        let actions = extract(text);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0].kind, ActionKind::Create(c) if c.path == "ok.txt"));
    }

    #[test]
    fn actions_interleave_by_position() {
        let text = "<create><path>one.txt</path><content>1</content></create>\
                    <edit><path>two.txt</path><search>a</search><replace>b</replace></edit>\
                    <create><path>three.txt</path><content>3</content></create>";
        let targets: Vec<_> = extract(text).iter().map(|a| a.target().to_string()).collect();
        assert_eq!(targets, ["one.txt", "two.txt", "three.txt"]);
    }

    #[test]
    fn empty_replace_is_allowed() {
        let text = "<edit><path>a</path><search>gone</search><replace><![CDATA[]]></replace></edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!(e.replace, "");
    }

    #[test]
    fn unterminated_edit_does_not_swallow_the_next_one() {
        let text = "<edit><path>a.ts</path><search>AAA</search>\n\
                    <edit><path>b.ts</path><search>BBB</search><replace>ZZZ</replace></edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!((e.file_path.as_str(), e.search.as_str(), e.replace.as_str()), ("b.ts", "BBB", "ZZZ"));
    }

    #[test]
    fn unterminated_create_before_an_edit_is_dropped() {
        let text = "<create><path>half.txt</path><content>x\n\
                    <edit><path>b.ts</path><search>s</search><replace>r</replace></edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!(e.file_path, "b.ts");
    }

    #[test]
    fn cdata_may_contain_block_tags() {
        let text = "<edit><path>gen.ts</path>\
                    <search><![CDATA[const tpl = '</edit>';]]></search>\
                    <replace><![CDATA[const tpl = '<create><path>x</path><content>y</content></create>';]]></replace>\
                    </edit>";
        let e = only_edit(&extract(text)).clone();
        assert_eq!(e.search, "const tpl = '</edit>';");
        assert!(e.replace.contains("<create>"));
    }

    #[test]
    fn no_actions_in_prose() {
        assert!(extract("Just an explanation, nothing to apply.").is_empty());
    }
}
