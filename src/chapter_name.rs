//! Folder-name grammar for staged chapters.
//!
//! ```text
//! <title> [<lang>] - <chapter> (v<volume>) (<chapter title>) {<publish date>} [<group>+<group>]
//! ```
//!
//! Everything after the chapter token is optional. A chapter token of `c`
//! followed by a digit is a numbered chapter; any other token is a oneshot.

use regex::Regex;

/// Escape tokens for characters that cannot appear in filesystem names.
/// Restored inside chapter titles only.
const SPECIAL_CHAR_MAP: &[(&str, &str)] = &[
    ("{asterisk}", "*"),
    ("{backslash}", "\\"),
    ("{slash}", "/"),
    ("{colon}", ":"),
    ("{greater}", ">"),
    ("{less}", "<"),
    ("{question}", "?"),
    ("{quote}", "\""),
    ("{pipe}", "|"),
];

const DEFAULT_LANGUAGE: &str = "en";

/// Metadata recovered from a chapter folder name. Names here are the human
/// names from the folder; ID resolution happens in [`crate::name_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChapterName {
    pub title: String,
    pub language: String,
    /// Chapter number, digits-first token with the leading `c` stripped.
    /// `None` for oneshots.
    pub chapter: Option<String>,
    pub volume: Option<String>,
    pub chapter_title: Option<String>,
    pub publish_date: Option<String>,
    pub groups: Vec<String>,
    pub is_oneshot: bool,
}

/// Restore escape tokens to their literal filesystem-unsafe characters
fn restore_special_chars(input: &str) -> String {
    SPECIAL_CHAR_MAP
        .iter()
        .fold(input.to_string(), |s, (token, literal)| {
            s.replace(token, literal)
        })
}

/// Parse a chapter folder name. `None` means the name does not match the
/// grammar — callers skip the folder, it is not an error.
pub fn parse_chapter_name(name: &str) -> Option<ParsedChapterName> {
    let grammar = Regex::new(
        r"^(.+?)\s+(?:\[(\w{2})\]\s+)?-\s+(.+?)(?:\s+\(v(\d+)\))?(?:\s+\((.+?)\))?(?:\s+\{(.+?)\})?(?:\s+\[(.+?)\])?$",
    )
    .unwrap();

    let caps = grammar.captures(name)?;

    let title = caps.get(1)?.as_str().trim().to_string();
    let language = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let chapter_token = caps.get(3)?.as_str().trim();
    let numbered = chapter_token.starts_with('c')
        && chapter_token
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit());
    let (chapter, is_oneshot) = if numbered {
        (Some(chapter_token[1..].to_string()), false)
    } else {
        (None, true)
    };

    let volume = caps.get(4).map(|m| m.as_str().trim().to_string());
    let chapter_title = caps
        .get(5)
        .map(|m| restore_special_chars(m.as_str().trim()));
    let publish_date = caps.get(6).map(|m| m.as_str().trim().to_string());
    let groups = caps
        .get(7)
        .map(|m| {
            m.as_str()
                .split('+')
                .map(|g| g.trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Some(ParsedChapterName {
        title,
        language,
        chapter,
        volume,
        chapter_title,
        publish_date,
        groups,
        is_oneshot,
    })
}
