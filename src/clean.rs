use regex::Regex;

use lazy_static::lazy_static;

lazy_static! {
    static ref RE_SCRIPT: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref RE_STYLE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref RE_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref RE_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();

    /// Banners of scanned books and of the archive's own toolbar.
    static ref RE_BANNERS: [Regex; 3] = [
        Regex::new(r"(?s)Internet Archive.*?Book Digitized.*?Google").unwrap(),
        Regex::new(r"Digitized by.*?Internet Archive").unwrap(),
        Regex::new(r"The Wayback Machine - \S+").unwrap(),
    ];

    static ref RE_BLANK_LINES: Regex = Regex::new(r"\n\s*\n").unwrap();
    static ref RE_SPACES: Regex = Regex::new(r"[ \t]+").unwrap();
}

/// Entities that are decoded after the tags were removed, in this order.
pub const HTML_ENTITIES: [(&str, &str); 8] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&copy;", "©"),
    ("&reg;", "®"),
];

/// Lines with at most this many chars are considered markup residue.
pub const MIN_LINE_LEN: usize = 20;

/// Extract the readable text from raw html.
///
/// Scripts, styles and comments are dropped entirely, all other tags are
/// replaced with whitespace so that adjacent text nodes stay separated.
pub fn html_to_text(html: &str) -> String {
    let html = RE_SCRIPT.replace_all(html, "");
    let html = RE_STYLE.replace_all(&html, "");
    let html = RE_COMMENT.replace_all(&html, "");
    let text = RE_TAG.replace_all(&html, " ");

    let mut text = text.into_owned();
    for (entity, c) in HTML_ENTITIES.iter() {
        if text.contains(entity) {
            text = text.replace(entity, c);
        }
    }
    text
}

/// Remove leftover tags, banners and noise lines from extracted text.
pub fn clean_text_content(content: &str) -> String {
    let mut content = RE_TAG.replace_all(content, "").into_owned();
    for banner in RE_BANNERS.iter() {
        content = banner.replace_all(&content, "").into_owned();
    }

    let content = RE_BLANK_LINES.replace_all(&content, "\n");
    let content = RE_SPACES.replace_all(&content, " ");

    content
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_LEN)
        .collect::<Vec<_>>()
        .join("\n")
}
