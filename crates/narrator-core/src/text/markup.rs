//! Plain text to SSML conversion
//!
//! The transformer is an ordered list of [`MarkupStage`]s. Each stage is a
//! pure rewrite over the output of the previous one, and the order in
//! [`MarkupStage::ORDER`] is load-bearing: quotes must be wrapped before any
//! stage emits tags whose attribute values are themselves quoted.
//!
//! Rewrites never touch text that sits inside a markup tag or `<emphasis>`
//! element, and a pause stage leaves a marker alone when its own break
//! already precedes it, so running the transformer over its own output
//! changes nothing.

use fancy_regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::config::{HeadingConfig, NarratorConfig, QuoteConfig};
use crate::error::{Error, Result};

static AMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?![a-zA-Z]{2,6};|#[0-9]{2,4};)").unwrap());

static LT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?!/?(?:break|emphasis|speak)\b)").unwrap());

static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""(.*?)""#).unwrap());

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(=+)\s(.*?)\s\1").unwrap());

static ELLIPSIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?<!\.)\.\.\.").unwrap());

static DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"—").unwrap());

static NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\r?\n)+").unwrap());

static PROTECTED_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"<emphasis\b[^>]*>.*?</emphasis>|</?(?:break|emphasis|speak)\b[^<>]*>")
        .unwrap()
});

const SPEAK_OPEN: &str = "<speak>";
const SPEAK_CLOSE: &str = "</speak>";

/// Spoken cue inserted in front of every heading title
pub const HEADING_CUE: &str = "Topic";

/// One rewrite rule of the transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupStage {
    /// Escape bare `&` and `<` so the document stays well formed
    Escape,
    /// Pause around quoted speech and emphasise it
    Quote,
    /// Replace `== title ==` markers with a pause and a spoken cue
    Heading,
    /// Pause before `...`
    Ellipsis,
    /// Pause before an em-dash
    Dash,
    /// Collapse line break runs into one pause
    Newline,
}

impl MarkupStage {
    /// Application order. Changing it changes the output.
    pub const ORDER: [MarkupStage; 6] = [
        MarkupStage::Escape,
        MarkupStage::Quote,
        MarkupStage::Heading,
        MarkupStage::Ellipsis,
        MarkupStage::Dash,
        MarkupStage::Newline,
    ];

    /// Apply this stage alone.
    pub fn apply(self, text: &str, markup: &MarkupTransformer) -> Result<String> {
        match self {
            MarkupStage::Escape => {
                let text = rewrite(text, &AMP_RE, |_, _| Some("&amp;".to_string()))?;
                rewrite(&text, &LT_RE, |_, _| Some("&lt;".to_string()))
            }
            MarkupStage::Quote => rewrite(text, &QUOTE_RE, |_, caps| {
                let quote = &markup.quote;
                let brk = pause(quote.pause_ms);
                Some(format!(
                    "{brk}<emphasis level=\"{}\">\"{}\"</emphasis>{brk}",
                    quote.emphasis,
                    group(caps, 1)
                ))
            }),
            MarkupStage::Heading => rewrite(text, &HEADING_RE, |_, caps| {
                let heading = &markup.heading;
                let brk = pause(heading.pause_for_depth(group(caps, 1).len()));
                Some(format!(
                    "{brk}{HEADING_CUE} <emphasis level=\"{}\">{}</emphasis>{brk}",
                    heading.emphasis,
                    group(caps, 2)
                ))
            }),
            MarkupStage::Ellipsis => prefix_pause(text, &ELLIPSIS_RE, markup.ellipsis_ms, "..."),
            MarkupStage::Dash => prefix_pause(text, &DASH_RE, markup.dash_ms, "—"),
            MarkupStage::Newline => prefix_pause(text, &NEWLINE_RE, markup.newline_ms, "\n"),
        }
    }
}

/// Converts plain text spans into speech markup
#[derive(Debug, Clone)]
pub struct MarkupTransformer {
    quote: QuoteConfig,
    heading: HeadingConfig,
    ellipsis_ms: f64,
    dash_ms: f64,
    newline_ms: f64,
}

impl MarkupTransformer {
    pub fn new(config: &NarratorConfig) -> Self {
        Self {
            quote: config.quote.clone(),
            heading: config.heading.clone(),
            ellipsis_ms: config.ellipsis.pause_ms,
            dash_ms: config.dash.pause_ms,
            newline_ms: config.newline.pause_ms,
        }
    }

    /// Transform `text` into a complete `<speak>` document.
    pub fn transform(&self, text: &str) -> Result<String> {
        let body = text
            .strip_prefix(SPEAK_OPEN)
            .and_then(|rest| rest.strip_suffix(SPEAK_CLOSE))
            .unwrap_or(text);

        let mut body = body.to_string();
        for stage in MarkupStage::ORDER {
            body = stage.apply(&body, self)?;
        }

        Ok(format!("{SPEAK_OPEN}{body}{SPEAK_CLOSE}"))
    }
}

/// Break tag for a pause; non-positive durations produce no tag.
fn pause(ms: f64) -> String {
    if ms > 0.0 {
        format!("<break time=\"{ms}ms\"/>")
    } else {
        String::new()
    }
}

/// Replace every match with `marker` preceded by a pause of `ms`, unless
/// that same pause already sits right in front of it.
fn prefix_pause(text: &str, re: &Regex, ms: f64, marker: &str) -> Result<String> {
    let brk = pause(ms);
    rewrite(text, re, |before, _| {
        if !brk.is_empty() && before.ends_with(&brk) {
            None
        } else {
            Some(format!("{brk}{marker}"))
        }
    })
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map(|m| m.as_str()).unwrap_or_default()
}

/// Byte ranges of existing tags and emphasis elements.
fn protected_spans(text: &str) -> Vec<(usize, usize)> {
    PROTECTED_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

fn straddles(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|&(start, end)| start < pos && pos < end)
}

/// Replace every match of `re` whose boundaries are not inside protected
/// markup. `replace` sees the text before the match and may return `None`
/// to keep the match as is.
fn rewrite<F>(text: &str, re: &Regex, mut replace: F) -> Result<String>
where
    F: FnMut(&str, &Captures) -> Option<String>,
{
    let protected = protected_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let caps = caps.map_err(|e| Error::Pattern(e.to_string()))?;
        let Some(m) = caps.get(0) else {
            continue;
        };
        if straddles(&protected, m.start()) || straddles(&protected, m.end()) {
            continue;
        }
        let Some(replacement) = replace(&text[..m.start()], &caps) else {
            continue;
        };
        out.push_str(&text[last..m.start()]);
        out.push_str(&replacement);
        last = m.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> MarkupTransformer {
        MarkupTransformer::new(&NarratorConfig::default())
    }

    #[test]
    fn test_quote_wrapped_with_pauses() {
        let ssml = transformer().transform(r#"He said "hi""#).unwrap();
        assert_eq!(
            ssml,
            r#"<speak>He said <break time="250ms"/><emphasis level="moderate">"hi"</emphasis><break time="250ms"/></speak>"#
        );
    }

    #[test]
    fn test_quotes_are_non_greedy() {
        let out = MarkupStage::Quote.apply(r#""a" and "b""#, &transformer()).unwrap();
        assert_eq!(out.matches("<emphasis").count(), 2);
        assert!(out.contains(r#">"a"</emphasis>"#));
        assert!(out.contains(r#">"b"</emphasis>"#));
    }

    #[test]
    fn test_heading_pause_scales_with_depth() {
        let ssml = transformer().transform("== Intro ==").unwrap();
        assert_eq!(
            ssml,
            r#"<speak><break time="3500ms"/>Topic <emphasis level="strong">Intro</emphasis><break time="3500ms"/></speak>"#
        );

        let deeper = MarkupStage::Heading.apply("=== Details ===", &transformer()).unwrap();
        assert!(deeper.starts_with(r#"<break time="3250ms"/>Topic "#));
        assert!(!deeper.contains("=="));
    }

    #[test]
    fn test_negative_heading_pause_is_omitted() {
        let mut config = NarratorConfig::default();
        config.heading.pause_ms = 100.0;
        let markup = MarkupTransformer::new(&config);
        let out = MarkupStage::Heading.apply("== Intro ==", &markup).unwrap();
        assert_eq!(out, r#"Topic <emphasis level="strong">Intro</emphasis>"#);
    }

    #[test]
    fn test_ellipsis_and_dash_keep_literals() {
        let markup = transformer();
        assert_eq!(
            MarkupStage::Ellipsis.apply("wait... what", &markup).unwrap(),
            r#"wait<break time="1500ms"/>... what"#
        );
        assert_eq!(
            MarkupStage::Dash.apply("this—that", &markup).unwrap(),
            r#"this<break time="500ms"/>—that"#
        );
    }

    #[test]
    fn test_newline_runs_collapse() {
        let out = MarkupStage::Newline.apply("one\n\n\r\ntwo\nthree", &transformer()).unwrap();
        assert_eq!(
            out,
            "one<break time=\"1000ms\"/>\ntwo<break time=\"1000ms\"/>\nthree"
        );
    }

    #[test]
    fn test_ampersand_escaped_once() {
        let out = MarkupStage::Escape.apply("Tom & Jerry &amp; Co &#38;", &transformer()).unwrap();
        assert_eq!(out, "Tom &amp; Jerry &amp; Co &#38;");
    }

    #[test]
    fn test_angle_bracket_in_prose_is_escaped() {
        let ssml = transformer().transform(r#"a < "b" > c"#).unwrap();
        assert_eq!(
            ssml,
            r#"<speak>a &lt; <break time="250ms"/><emphasis level="moderate">"b"</emphasis><break time="250ms"/> > c</speak>"#
        );
        assert_eq!(transformer().transform(&ssml).unwrap(), ssml);
    }

    #[test]
    fn test_newline_after_heading_keeps_its_pause() {
        let ssml = transformer().transform("== Intro ==\nbody").unwrap();
        assert_eq!(
            ssml,
            r#"<speak><break time="3500ms"/>Topic <emphasis level="strong">Intro</emphasis><break time="3500ms"/><break time="1000ms"/>"#
                .to_string()
                + "\nbody</speak>"
        );
        assert_eq!(transformer().transform(&ssml).unwrap(), ssml);
    }

    #[test]
    fn test_newline_after_quote_keeps_its_pause() {
        let ssml = transformer().transform("\"hi\"\nthere").unwrap();
        assert_eq!(
            ssml,
            r#"<speak><break time="250ms"/><emphasis level="moderate">"hi"</emphasis><break time="250ms"/><break time="1000ms"/>"#
                .to_string()
                + "\nthere</speak>"
        );
        assert_eq!(transformer().transform(&ssml).unwrap(), ssml);
    }

    #[test]
    fn test_ellipsis_and_dash_after_quote_keep_their_pauses() {
        let markup = transformer();
        let ellipsis = markup.transform(r#""hi"... then"#).unwrap();
        assert_eq!(
            ellipsis,
            r#"<speak><break time="250ms"/><emphasis level="moderate">"hi"</emphasis><break time="250ms"/><break time="1500ms"/>... then</speak>"#
        );
        assert_eq!(markup.transform(&ellipsis).unwrap(), ellipsis);

        let dash = markup.transform(r#""hi"—then"#).unwrap();
        assert_eq!(
            dash,
            r#"<speak><break time="250ms"/><emphasis level="moderate">"hi"</emphasis><break time="250ms"/><break time="500ms"/>—then</speak>"#
        );
        assert_eq!(markup.transform(&dash).unwrap(), dash);
    }

    #[test]
    fn test_marker_after_its_own_pause_is_left_alone() {
        let markup = transformer();
        let text = r#"wait<break time="1500ms"/>... what"#;
        assert_eq!(MarkupStage::Ellipsis.apply(text, &markup).unwrap(), text);
    }

    #[test]
    fn test_heading_tags_not_rematched_by_quote_rule() {
        let ssml = transformer().transform("== Intro ==\nbody").unwrap();
        assert_eq!(ssml.matches("<emphasis").count(), 1);
        assert!(!ssml.contains(r#"level="moderate""#));
    }

    #[test]
    fn test_heading_with_quoted_title() {
        let ssml = transformer().transform(r#"== The "Big" One =="#).unwrap();
        assert!(ssml.contains("Topic <emphasis level=\"strong\">"));
        assert!(!ssml.contains("=="));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let markup = transformer();
        let input = "Preface & notes\n\n== Intro ==\nHe said \"hi\"... then—left.\r\n=== Part ===\nEnd...";
        let once = markup.transform(input).unwrap();
        let twice = markup.transform(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_match_failure_is_reported() {
        let re = fancy_regex::RegexBuilder::new(r"((?=a)a+)+b")
            .backtrack_limit(100)
            .build()
            .unwrap();
        let err = rewrite(&"a".repeat(30), &re, |_, _| Some(String::new())).unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(MarkupStage::ORDER[0], MarkupStage::Escape);
        assert_eq!(MarkupStage::ORDER[1], MarkupStage::Quote);
        assert_eq!(MarkupStage::ORDER[2], MarkupStage::Heading);
        assert_eq!(MarkupStage::ORDER[5], MarkupStage::Newline);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(transformer().transform("").unwrap(), "<speak></speak>");
    }
}
