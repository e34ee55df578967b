//! Streaming scan of a document head for image-declaring tags.
//!
//! This is not an HTML parser. It tokenizes just enough markup to see start
//! and end tags with their attributes, skips comments, doctypes and the raw
//! text of `script`/`style`/`title`/`textarea`, and stops as soon as the head
//! is over. Nothing after that point is looked at.
//!
//! The head is over at the first of:
//! - a `</head>` end tag
//! - a `<body>` start tag
//! - end of input
//!
//! Only a `</head>` end tag yields a candidate. A head cut short by `<body>`
//! or by the end of input yields none, not even the `favicon.ico` default.

pub mod tags;

use std::borrow::Cow;

pub use tags::{CandidateSet, DEFAULT_CANDIDATE, TagCategory};

/// Elements whose content is text, not markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "title", "textarea"];

/// Why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    HeadClosed,
    BodyOpened,
    EndOfInput,
}

/// Result of scanning one document.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub candidates: CandidateSet,
    pub stop: StopReason,
    /// Byte offset where scanning stopped.
    pub consumed: usize,
}

impl ScanOutcome {
    /// The chosen candidate before normalization, if the head was closed.
    pub fn candidate(&self) -> Option<&str> {
        (self.stop == StopReason::HeadClosed).then(|| self.candidates.candidate())
    }
}

/// A start tag with lowercased name and attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: String,
    /// Attributes in document order; `None` for a bare attribute.
    pub attrs: Vec<(String, Option<String>)>,
}

impl StartTag {
    /// Value of the named attribute; the last duplicate wins.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v.as_deref().unwrap_or(""))
    }
}

#[derive(Debug)]
enum Token {
    Start(StartTag),
    End(String),
}

/// Scan `html` from the start until the head closes.
pub fn scan_head(html: &str) -> ScanOutcome {
    let mut candidates = CandidateSet::new();
    let mut tokenizer = Tokenizer::new(html);

    let stop = loop {
        match tokenizer.next_token() {
            None => break StopReason::EndOfInput,
            Some(Token::End(name)) if name == "head" => break StopReason::HeadClosed,
            Some(Token::End(_)) => {}
            Some(Token::Start(tag)) if tag.name == "body" => break StopReason::BodyOpened,
            Some(Token::Start(tag)) => {
                if let Some((category, url)) = tags::classify(&tag) {
                    tracing::trace!("{} tag: {:?}", category.name(), url);
                    candidates.observe(category, url);
                }
                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                    tokenizer.skip_raw_text(&tag.name);
                }
            }
        }
    };

    ScanOutcome { candidates, stop, consumed: tokenizer.pos }
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Move past the next occurrence of `needle`, or to the end of input.
    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(idx) => self.pos += idx + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_at(0)
            && b.is_ascii_whitespace()
        {
            self.pos += 1;
        }
    }

    /// Consume bytes until one satisfies `stop`, returning the consumed text.
    fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek_at(0)
            && !stop(b)
        {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_past_text()?;

            // positioned on '<'
            match self.peek_at(1) {
                Some(b'!') if self.rest().starts_with("<!--") => {
                    self.pos += 4;
                    self.skip_past("-->");
                }
                Some(b'!') | Some(b'?') => {
                    self.pos += 2;
                    self.skip_past(">");
                }
                Some(b'/') => match self.peek_at(2) {
                    Some(b) if b.is_ascii_alphabetic() => {
                        self.pos += 2;
                        let name = self.take_until(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>');
                        let name = name.to_ascii_lowercase();
                        self.skip_past(">");
                        return Some(Token::End(name));
                    }
                    _ => {
                        self.pos += 2;
                        self.skip_past(">");
                    }
                },
                Some(b) if b.is_ascii_alphabetic() => {
                    self.pos += 1;
                    return self.start_tag().map(Token::Start);
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Advance to the next `<`; `None` at end of input.
    fn skip_past_text(&mut self) -> Option<()> {
        let idx = self.rest().find('<')?;
        self.pos += idx;
        Some(())
    }

    /// Parse a start tag after its `<`. A tag cut off by end of input yields
    /// `None`.
    fn start_tag(&mut self) -> Option<StartTag> {
        let name = self.take_until(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>');
        let mut tag = StartTag { name: name.to_ascii_lowercase(), attrs: Vec::new() };

        loop {
            while let Some(b) = self.peek_at(0)
                && (b.is_ascii_whitespace() || b == b'/')
            {
                self.pos += 1;
            }

            match self.peek_at(0)? {
                b'>' => {
                    self.pos += 1;
                    return Some(tag);
                }
                first => {
                    let start = self.pos;
                    // an attribute name may begin with '='
                    if first == b'=' {
                        self.pos += 1;
                    }
                    self.take_until(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>' || b == b'=');
                    let attr_name = self.input[start..self.pos].to_ascii_lowercase();

                    self.skip_whitespace();
                    let value = if self.peek_at(0) == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        Some(self.attr_value()?)
                    } else {
                        None
                    };
                    tag.attrs.push((attr_name, value));
                }
            }
        }
    }

    fn attr_value(&mut self) -> Option<String> {
        let raw = match self.peek_at(0)? {
            quote @ (b'"' | b'\'') => {
                self.pos += 1;
                let raw = self.take_until(|b| b == quote);
                if self.at_end() {
                    return None;
                }
                self.pos += 1;
                raw
            }
            _ => self.take_until(|b| b.is_ascii_whitespace() || b == b'>'),
        };
        Some(decode_entities(raw).into_owned())
    }

    /// Skip the content of a raw text element up to and including its end tag.
    fn skip_raw_text(&mut self, name: &str) {
        let bytes = self.bytes();
        while let Some(idx) = self.rest().find("</") {
            let name_start = self.pos + idx + 2;
            let name_end = name_start + name.len();
            let closes = bytes.get(name_start..name_end).is_some_and(|n| n.eq_ignore_ascii_case(name.as_bytes()))
                && bytes.get(name_end).is_none_or(|&b| b.is_ascii_whitespace() || b == b'/' || b == b'>');
            if closes {
                self.pos = name_end;
                self.skip_past(">");
                return;
            }
            self.pos += idx + 2;
        }
        self.pos = self.input.len();
    }
}

/// Decode the character references that matter in attribute values.
///
/// Named references are limited to `&amp;`, `&lt;`, `&gt;`, `&quot;` and
/// `&apos;`; numeric references are decimal or hex. Anything else is kept as
/// written.
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        match decode_reference(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Decode one reference at the start of `text`, returning the character and
/// the number of bytes it spans.
fn decode_reference(text: &str) -> Option<(char, usize)> {
    const NAMED: [(&str, char); 5] = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&quot;", '"'), ("&apos;", '\'')];

    if let Some((entity, ch)) = NAMED.iter().find(|(entity, _)| text.starts_with(entity)) {
        return Some((*ch, entity.len()));
    }

    let body = text.strip_prefix("&#")?;
    let (digits, radix, prefix_len) = match body.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };
    let end = digits.find(';')?;
    let code = u32::from_str_radix(&digits[..end], radix).ok()?;
    let ch = char::from_u32(code).filter(|&c| c != '\0').unwrap_or(char::REPLACEMENT_CHARACTER);
    Some((ch, prefix_len + end + 1))
}
