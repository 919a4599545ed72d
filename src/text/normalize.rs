// Subtitle text normalization.
//
// Turns raw subtitle text (cue numbers, timing lines, HTML/ASS markup,
// entities) into the canonical comparison text that fingerprints are built
// from. Every variant is computed by repeating a single pass until the text
// stops changing, which makes normalize(normalize(x)) == normalize(x) hold
// even for inputs like "&amp;lt;i&amp;gt;" that only reveal markup after
// decoding.
//
// Line structure is kept until the per-line passes settle: timing and
// sequence patterns only ever see one subtitle line, never the joined text.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

static PATTERNS: OnceLock<SubtitlePatterns> = OnceLock::new();

/// Pre-compiled patterns for subtitle cleanup.
struct SubtitlePatterns {
    /// SRT / WebVTT cue timing line, with optional trailing `key:value`
    /// cue settings (`align:start`, `X1:40`).
    timecode: Regex,
    /// A line holding nothing but a cue sequence number.
    sequence: Regex,
    /// The WebVTT file header.
    webvtt_header: Regex,
    /// HTML-style tags: <i>, </font>, <c.yellow>
    angle_tag: Regex,
    /// ASS/SSA override blocks: {\i1}, {\an8}
    brace_block: Regex,
    /// Bracketed annotations: [music], [DOOR SLAMS]
    bracket_block: Regex,
}

impl SubtitlePatterns {
    fn new() -> Self {
        Self {
            timecode: Regex::new(
                r"^\s*(?:\d{1,2}:)?\d{2}:\d{2}[,.]\d{1,3}\s*-->\s*(?:\d{1,2}:)?\d{2}:\d{2}[,.]\d{1,3}(?:\s+[\w-]+:\S+)*\s*$",
            )
            .expect("timecode regex must compile"),
            sequence: Regex::new(r"^\s*\d+\s*$").expect("sequence regex must compile"),
            webvtt_header: Regex::new(r"^\s*WEBVTT\b.*$").expect("webvtt regex must compile"),
            angle_tag: Regex::new(r"<[^<>]*>").expect("angle tag regex must compile"),
            brace_block: Regex::new(r"\{[^{}]*\}").expect("brace regex must compile"),
            bracket_block: Regex::new(r"\[[^\[\]]*\]").expect("bracket regex must compile"),
        }
    }
}

fn patterns() -> &'static SubtitlePatterns {
    PATTERNS.get_or_init(SubtitlePatterns::new)
}

/// The minimal entity set decoded during markup stripping.
/// `&amp;` is decoded last so "&amp;lt;" becomes "&lt;" on one pass.
const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
];

/// All normalized renditions of one piece of subtitle text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedVariants {
    /// The input with surrounding whitespace removed, otherwise untouched.
    pub original: String,
    /// Markup and entities removed, whitespace collapsed.
    pub markup_stripped: String,
    /// Timing and sequence-number lines removed, whitespace collapsed.
    pub timecode_stripped: String,
    /// Both of the above. This is the canonical comparison text.
    pub both_stripped: String,
}

impl NormalizedVariants {
    /// The variant fingerprints are built from.
    pub fn canonical(&self) -> &str {
        &self.both_stripped
    }

    /// (name, text) pairs in a fixed order, for display.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("original", self.original.as_str()),
            ("markup-stripped", self.markup_stripped.as_str()),
            ("timecode-stripped", self.timecode_stripped.as_str()),
            ("both-stripped", self.both_stripped.as_str()),
        ]
        .into_iter()
    }
}

/// Canonical normalization: strip timing lines and markup, decode entities,
/// collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    normalize_with(text, |s| strip_markup(&strip_timecodes(s)))
}

/// Compute every normalized variant of `text`.
pub fn variants(text: &str) -> NormalizedVariants {
    NormalizedVariants {
        original: text.trim().to_string(),
        markup_stripped: normalize_with(text, strip_markup),
        timecode_stripped: normalize_with(text, strip_timecodes),
        both_stripped: normalize(text),
    }
}

/// Run `pass` line by line to a fixpoint, join the surviving lines with
/// single spaces, and repeat until the joined text is stable.
fn normalize_with(text: &str, pass: impl Fn(&str) -> String) -> String {
    to_fixpoint(text, |joined| {
        to_fixpoint(joined, |s| tidy_lines(&pass(s)))
            .lines()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// Apply `pass` until its output equals its input.
///
/// After the first pass each change strictly shortens the text, so this
/// terminates.
fn to_fixpoint(text: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(text);
    loop {
        let next = pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Drop cue timing lines, sequence-number lines and the WebVTT header.
fn strip_timecodes(text: &str) -> String {
    let p = patterns();
    text.lines()
        .filter(|line| {
            !p.timecode.is_match(line) && !p.sequence.is_match(line) && !p.webvtt_header.is_match(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode entities, then remove tags, override blocks and bracketed notes.
fn strip_markup(text: &str) -> String {
    let p = patterns();

    // ASS hard line breaks and hard spaces
    let mut out = text.replace("\\N", " ").replace("\\n", " ").replace("\\h", " ");
    for (entity, decoded) in ENTITIES {
        out = out.replace(entity, decoded);
    }

    let out = p.angle_tag.replace_all(&out, "");
    let out = p.brace_block.replace_all(&out, "");
    p.bracket_block.replace_all(&out, "").into_owned()
}

/// Collapse whitespace inside each line and drop lines left empty.
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
