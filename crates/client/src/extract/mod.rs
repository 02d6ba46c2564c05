//! Streaming OpenGraph metadata extraction.
//!
//! ### Algorithm
//! - Single forward pass over tokens from the `html5ever` tokenizer; no
//!   tree construction.
//! - An ancestry stack of open tags answers "inside `<title>`", "inside
//!   `<a>`", and "inside `<body>`".
//! - `<meta>` maps `og:*` properties (and `name=description`) onto
//!   [`SiteMetadata`]; `<base href>` sets the join base for `<img src>`.
//!
//! ### Early Exit
//! Input stops being consumed once the parser is inside `<body>` with a
//! title and at least one image candidate. Later metadata is not seen.

use std::cell::RefCell;
use std::fmt;
use std::io::Read;
use std::ops::ControlFlow;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use html5ever::{Attribute, TokenizerResult};
use mediaserver_core::{Error, SiteMetadata};
use url::Url;

/// Elements that never have content and so never open a scope.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Open elements the extractor asks ancestry questions about.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    A,
    Body,
    Title,
    Other(String),
}

impl Scope {
    fn from_name(name: &str) -> Self {
        match name {
            "a" => Scope::A,
            "body" => Scope::Body,
            "title" => Scope::Title,
            other => Scope::Other(other.to_string()),
        }
    }
}

/// Tokenizer state for elements whose content is not markup.
///
/// The bare tokenizer has no tree builder to switch these states for it.
fn raw_kind(name: &str) -> Option<RawKind> {
    match name {
        "title" | "textarea" => Some(RawKind::Rcdata),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
        "script" => Some(RawKind::ScriptData),
        _ => None,
    }
}

/// Metadata accumulated so far.
#[derive(Debug, Default)]
struct Scan {
    site: SiteMetadata,
    base: Option<String>,
    parents: Vec<Scope>,
    /// Text of the `<title>` currently open in the head.
    title_text: Option<String>,
}

impl Scan {
    fn has_parent(&self, scope: &Scope) -> bool {
        self.parents.iter().any(|s| s == scope)
    }

    fn done(&self) -> bool {
        self.has_parent(&Scope::Body) && !self.site.title.is_empty() && !self.site.image_candidates.is_empty()
    }

    fn start(&mut self, tag: &Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;
        match name {
            "meta" => self.meta(&tag.attrs),
            "img" => self.img(&tag.attrs),
            "base" => self.base = attr(&tag.attrs, "href").map(str::to_string),
            _ => {}
        }

        let opens = !tag.self_closing && !VOID_ELEMENTS.contains(&name);
        if opens {
            if name == "title" && !self.has_parent(&Scope::Body) {
                self.title_text = Some(String::new());
            }
            self.parents.push(Scope::from_name(name));
        }

        if self.done() {
            return TokenSinkResult::Script(());
        }
        match raw_kind(name) {
            Some(kind) if opens => TokenSinkResult::RawData(kind),
            _ => TokenSinkResult::Continue,
        }
    }

    fn end(&mut self, name: &str) {
        if name == "title" {
            self.claim_title();
        }
        let scope = Scope::from_name(name);
        if let Some(pos) = self.parents.iter().rposition(|s| *s == scope) {
            self.parents.truncate(pos);
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(title) = &mut self.title_text {
            title.push_str(text);
        }
    }

    /// The first non-blank `<title>` wins unless something already set the
    /// title.
    fn claim_title(&mut self) {
        let Some(text) = self.title_text.take() else {
            return;
        };
        let text = text.trim();
        if self.site.title.is_empty() && !text.is_empty() {
            self.site.title = text.to_string();
        }
    }

    fn meta(&mut self, attrs: &[Attribute]) {
        let mut property = attr(attrs, "property");
        if self.site.description.is_empty() && attr(attrs, "name").is_some_and(|n| n.eq_ignore_ascii_case("description")) {
            property = Some("og:description");
        }

        let (Some(property), Some(content)) = (property, attr(attrs, "content")) else {
            return;
        };
        if content.is_empty() {
            return;
        }

        match property {
            "og:description" => self.site.description = content.to_string(),
            "og:type" => self.site.kind = content.to_string(),
            "og:title" => self.site.title = content.to_string(),
            "og:url" => self.site.canonical_url = content.to_string(),
            "og:image" | "og:image:url" => self.site.image_candidates.push(content.to_string()),
            _ => {}
        }
    }

    fn img(&mut self, attrs: &[Attribute]) {
        if self.has_parent(&Scope::A) {
            return;
        }
        let src = attr(attrs, "src").unwrap_or_default().trim();
        if src.is_empty() || src.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")) {
            return;
        }

        let src = match &self.base {
            Some(base) if !is_absolute(src) => join_base(base, src),
            _ => src.to_string(),
        };
        self.site.image_candidates.push(src);
    }
}

/// Token consumer that accumulates [`SiteMetadata`].
///
/// Asks the tokenizer to pause (via `Script`) once extraction is complete.
#[derive(Debug, Default)]
struct MetadataSink {
    scan: RefCell<Scan>,
}

impl MetadataSink {
    fn take_site(&self) -> SiteMetadata {
        let mut scan = self.scan.take();
        scan.claim_title();
        scan.site
    }
}

impl TokenSink for MetadataSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let mut scan = self.scan.borrow_mut();
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => scan.start(&tag),
                TagKind::EndTag => {
                    scan.end(&tag.name);
                    TokenSinkResult::Continue
                }
            },
            Token::CharacterTokens(text) => {
                scan.text(&text);
                TokenSinkResult::Continue
            }
            _ => TokenSinkResult::Continue,
        }
    }
}

fn attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs.iter().find(|a| &*a.name.local == name).map(|a| &*a.value)
}

fn is_absolute(src: &str) -> bool {
    src.contains("://") || src.starts_with("//")
}

/// Join an image path onto the document's `<base href>`.
fn join_base(base: &str, src: &str) -> String {
    if let Ok(base) = Url::parse(base)
        && let Ok(joined) = base.join(src)
    {
        return joined.to_string();
    }
    if src.starts_with('/') || base.is_empty() {
        return src.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), src)
}

/// Length of `bytes` without a trailing incomplete UTF-8 sequence.
fn complete_prefix(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let i = bytes.len() - back;
        let b = bytes[i];
        if b & 0xC0 != 0x80 {
            let width = match b {
                0xF0.. => 4,
                0xE0.. => 3,
                0xC0.. => 2,
                _ => 1,
            };
            return if width > back { i } else { bytes.len() };
        }
    }
    bytes.len()
}

/// Incremental metadata extractor for one HTML document.
pub struct SiteInfoExtractor {
    tokenizer: Tokenizer<MetadataSink>,
    input: BufferQueue,
    /// Bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    stopped: bool,
}

impl fmt::Debug for SiteInfoExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteInfoExtractor")
            .field("pending", &self.pending.len())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Default for SiteInfoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteInfoExtractor {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(MetadataSink::default(), TokenizerOpts::default()),
            input: BufferQueue::default(),
            pending: Vec::new(),
            stopped: false,
        }
    }

    /// Feed the next chunk of the document.
    ///
    /// Returns `Break` once enough metadata has been seen; further input is
    /// ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> ControlFlow<()> {
        if self.stopped {
            return ControlFlow::Break(());
        }
        self.pending.extend_from_slice(chunk);
        let complete = complete_prefix(&self.pending);
        if complete == 0 {
            return ControlFlow::Continue(());
        }
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        self.push(&text)
    }

    fn push(&mut self, text: &str) -> ControlFlow<()> {
        self.input.push_back(StrTendril::from_slice(text));
        if let TokenizerResult::Script(()) = self.tokenizer.feed(&self.input) {
            self.stopped = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    pub fn finish(mut self) -> SiteMetadata {
        if !self.stopped && !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            let _ = self.push(&text);
        }
        if !self.stopped {
            self.tokenizer.end();
        }
        self.tokenizer.sink.take_site()
    }
}

/// Extract metadata from a blocking reader.
///
/// Malformed markup never fails; only read errors do.
pub fn extract<R: Read>(mut reader: R) -> Result<SiteMetadata, Error> {
    let mut extractor = SiteInfoExtractor::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::ParseFailed(format!("reading document: {e}"))),
        };
        if extractor.feed(&buf[..n]).is_break() {
            break;
        }
    }
    Ok(extractor.finish())
}

pub fn extract_str(html: &str) -> SiteMetadata {
    let mut extractor = SiteInfoExtractor::new();
    let _ = extractor.feed(html.as_bytes());
    extractor.finish()
}

/// Resolve every image candidate to an absolute URL against the page URL.
///
/// Candidates that cannot be resolved are left as they are.
pub fn resolve_image_urls(site: &mut SiteMetadata, page: &Url) {
    for image in &mut site.image_candidates {
        if let Ok(resolved) = page.join(image) {
            *image = resolved.to_string();
        }
    }
}
