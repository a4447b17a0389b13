//! HTML page extraction: turn one fetched page into blocks, image
//! references and outbound links.
//!
//! Only the page's main content area is read. Within it, headings become
//! bold blocks sized by level (`h1` = 24 down to `h6` = 9), while paragraphs,
//! lists and blockquotes become body blocks at size 12. Text blocks and images
//! share one running position counter so the image associator can place each
//! image relative to the surrounding text.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

use super::urls::{resolve_link, same_domain};
use crate::model::Block;
use crate::pipeline::clean::{clean_text, squash_whitespace};

/// Size given to paragraphs, lists and blockquotes.
pub const BODY_SIZE: f64 = 12.0;

/// Texts shorter than this many characters are dropped.
pub const MIN_TEXT_CHARS: usize = 3;

const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript", "template"];

static MAIN_CANDIDATES: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["main", "article", "[role=main]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static RE_CONTENT_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(content|main|article|post)").unwrap());

/// An image referenced by a page, at its place in the text flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub url: Url,
    pub position_key: f64,
}

/// Everything extracted from one HTML page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub title: String,
    pub blocks: Vec<Block>,
    pub images: Vec<ImageRef>,
    pub links: Vec<Url>,
}

/// Options controlling link extraction.
#[derive(Debug, Clone, Copy)]
pub struct LinkPolicy<'a> {
    /// Collect links at all (false at max depth).
    pub collect: bool,
    /// When set, only links on this URL's host and port are kept.
    pub restrict_to: Option<&'a Url>,
}

/// Extract blocks, images and links from `html` fetched from `page_url`.
pub fn extract_page(html: &str, page_url: &Url, page_index: usize, links: LinkPolicy<'_>) -> PageContent {
    let document = Html::parse_document(html);
    let title = page_title(&document, page_url);

    let mut walker = Walker {
        base: page_url,
        page_index,
        position: 0,
        blocks: Vec::new(),
        images: Vec::new(),
        seen_images: HashSet::new(),
    };
    let root = main_content(&document);
    walker.walk_children(root);

    let links = if links.collect {
        extract_links(root, page_url, links.restrict_to)
    } else {
        Vec::new()
    };

    PageContent {
        title,
        blocks: walker.blocks,
        images: walker.images,
        links,
    }
}

/// `<title>` text, else the URL path, else the host.
pub fn page_title(document: &Html, page_url: &Url) -> String {
    let from_tag = document
        .select(&TITLE)
        .next()
        .map(|t| squash_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());
    if let Some(title) = from_tag {
        return title;
    }
    let path = page_url.path();
    if path.is_empty() || path == "/" {
        page_url.host_str().unwrap_or("/").to_string()
    } else {
        path.to_string()
    }
}

fn main_content(document: &Html) -> ElementRef<'_> {
    for selector in MAIN_CANDIDATES.iter() {
        if let Some(el) = document.select(selector).find(|el| !inside_skipped(el)) {
            return el;
        }
    }
    let hinted = document.select(&DIV).find(|div| {
        let v = div.value();
        !inside_skipped(div)
            && (v.attr("class").is_some_and(|c| RE_CONTENT_HINT.is_match(c))
                || v.attr("id").is_some_and(|id| RE_CONTENT_HINT.is_match(id)))
    });
    if let Some(div) = hinted {
        return div;
    }
    document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element())
}

fn inside_skipped(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| SKIPPED_TAGS.contains(&a.value().name()))
}

fn extract_links(root: ElementRef<'_>, base: &Url, restrict_to: Option<&Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in root.select(&ANCHOR) {
        if inside_skipped(&a) {
            continue;
        }
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(base, href) else {
            continue;
        };
        if restrict_to.is_some_and(|start| !same_domain(start, &url)) {
            continue;
        }
        let key = super::urls::normalize_url(&url);
        if seen.insert(key) {
            out.push(url);
        }
    }
    out
}

struct Walker<'u> {
    base: &'u Url,
    page_index: usize,
    position: usize,
    blocks: Vec<Block>,
    images: Vec<ImageRef>,
    seen_images: HashSet<String>,
}

impl Walker<'_> {
    fn walk_children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            if let Some(el) = ElementRef::wrap(child) {
                self.visit(el);
            }
        }
    }

    fn visit(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED_TAGS.contains(&name) {
            return;
        }
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = f64::from(name.as_bytes()[1] - b'0');
                let text = squash_whitespace(&el.text().collect::<String>());
                self.push_text(text, 24.0 - (level - 1.0) * 3.0, true);
                self.collect_images(el);
            }
            "p" => {
                let text = clean_text(&inline_text(el));
                self.push_text(text, BODY_SIZE, false);
                self.collect_images(el);
            }
            "ul" | "ol" => {
                let ordered = name == "ol";
                let lines: Vec<String> = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|li| li.value().name() == "li")
                    .map(|li| squash_whitespace(&li.text().collect::<String>()))
                    .filter(|t| !t.is_empty())
                    .enumerate()
                    .map(|(i, t)| {
                        if ordered {
                            format!("{}. {}", i + 1, t)
                        } else {
                            format!("- {}", t)
                        }
                    })
                    .collect();
                self.push_text(lines.join("\n"), BODY_SIZE, false);
                self.collect_images(el);
            }
            "blockquote" => {
                let text = squash_whitespace(&el.text().collect::<String>());
                if text.chars().count() >= MIN_TEXT_CHARS {
                    self.push_text(format!("> {}", text), BODY_SIZE, false);
                }
                self.collect_images(el);
            }
            "img" => self.push_image(el),
            _ => self.walk_children(el),
        }
    }

    fn push_text(&mut self, text: String, size: f64, bold: bool) {
        if text.chars().count() < MIN_TEXT_CHARS {
            return;
        }
        self.blocks.push(Block::text(
            text,
            size,
            bold,
            self.page_index,
            self.position as f64,
        ));
        self.position += 1;
    }

    fn collect_images(&mut self, el: ElementRef<'_>) {
        for node in el.descendants() {
            if let Some(img) = ElementRef::wrap(node) {
                if img.value().name() == "img" {
                    self.push_image(img);
                }
            }
        }
    }

    fn push_image(&mut self, img: ElementRef<'_>) {
        let v = img.value();
        let Some(src) = v
            .attr("src")
            .filter(|s| !s.trim().is_empty())
            .or_else(|| v.attr("data-src"))
        else {
            return;
        };
        let src = src.trim();
        if src.to_ascii_lowercase().starts_with("data:") {
            return;
        }
        let Ok(url) = self.base.join(src) else {
            return;
        };
        if !matches!(url.scheme(), "http" | "https") || url.path().to_ascii_lowercase().ends_with(".svg") {
            return;
        }
        if !self.seen_images.insert(url.as_str().to_string()) {
            return;
        }
        self.blocks.push(Block::image(
            url.as_str(),
            self.page_index,
            self.position as f64,
        ));
        self.images.push(ImageRef {
            url,
            position_key: self.position as f64,
        });
        self.position += 1;
    }
}

/// Paragraph text with `<br>` kept as line breaks.
fn inline_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(&t.replace('\n', " ")),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockKind;

    fn page() -> Url {
        Url::parse("https://cafe.test/menu/").unwrap()
    }

    fn extract(html: &str) -> PageContent {
        extract_page(
            html,
            &page(),
            0,
            LinkPolicy {
                collect: true,
                restrict_to: Some(&page()),
            },
        )
    }

    fn texts(content: &PageContent) -> Vec<&str> {
        content
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Text)
            .map(|b| b.text_str())
            .collect()
    }

    #[test]
    fn headings_and_body_sizes() {
        let c = extract(
            "<html><body><h1>Our Menu</h1><p>Fresh every day.</p><h3>Drinks</h3><p>Coffee and tea.</p></body></html>",
        );
        let sizes: Vec<f64> = c.blocks.iter().map(|b| b.font_size).collect();
        assert_eq!(sizes, vec![24.0, 12.0, 18.0, 12.0]);
        assert!(c.blocks[0].is_bold);
        assert!(!c.blocks[1].is_bold);
    }

    #[test]
    fn main_content_wins_over_body() {
        let c = extract(
            "<body><p>Outside text</p><main><p>Inside text</p></main></body>",
        );
        assert_eq!(texts(&c), vec!["Inside text"]);
    }

    #[test]
    fn content_div_is_detected() {
        let c = extract(
            r#"<body><div class="sidebar"><p>Ads here</p></div><div id="post-body"><p>Story text</p></div></body>"#,
        );
        assert_eq!(texts(&c), vec!["Story text"]);
    }

    #[test]
    fn chrome_elements_are_skipped() {
        let c = extract(
            "<body><nav><p>Home About</p></nav><header><h1>Site</h1></header><p>Real content</p><footer><p>Copyright</p></footer><script>var x = 1;</script></body>",
        );
        assert_eq!(texts(&c), vec!["Real content"]);
    }

    #[test]
    fn lists_and_quotes_are_rendered() {
        let c = extract(
            "<body><ul><li>Espresso</li><li>Latte</li></ul><ol><li>Grind</li><li>Brew</li></ol><blockquote>Best in town</blockquote></body>",
        );
        assert_eq!(
            texts(&c),
            vec!["- Espresso\n- Latte", "1. Grind\n2. Brew", "> Best in town"]
        );
    }

    #[test]
    fn short_texts_are_dropped() {
        let c = extract("<body><p>Hi</p><p>Hello</p></body>");
        assert_eq!(texts(&c), vec!["Hello"]);
    }

    #[test]
    fn images_share_the_position_counter() {
        let c = extract(
            r#"<body><h2>Cakes</h2><img src="/img/cake.jpg"><p>Chocolate cake.</p><img data-src="tart.png"></body>"#,
        );
        assert_eq!(c.images.len(), 2);
        assert_eq!(c.images[0].url.as_str(), "https://cafe.test/img/cake.jpg");
        assert_eq!(c.images[0].position_key, 1.0);
        assert_eq!(c.images[1].url.as_str(), "https://cafe.test/menu/tart.png");
        assert_eq!(c.images[1].position_key, 3.0);
        assert_eq!(c.blocks[2].position_key, 2.0);
    }

    #[test]
    fn images_inside_paragraphs_follow_the_text() {
        let c = extract(r#"<body><p>Our terrace <img src="/t.jpg"></p></body>"#);
        assert_eq!(texts(&c), vec!["Our terrace"]);
        assert_eq!(c.images[0].position_key, 1.0);
    }

    #[test]
    fn data_svg_and_duplicate_images_are_skipped() {
        let c = extract(
            r#"<body><img src="data:image/png;base64,AAAA"><img src="/logo.svg"><img src="/a.jpg"><img src="/a.jpg"></body>"#,
        );
        assert_eq!(c.images.len(), 1);
    }

    #[test]
    fn links_are_filtered_and_deduplicated() {
        let c = extract(
            r##"<body>
                <a href="/about">About</a>
                <a href="/about/#team">Team</a>
                <a href="#top">Top</a>
                <a href="mailto:hi@cafe.test">Mail</a>
                <a href="https://other.test/">Other</a>
                <a href="specials">Specials</a>
            </body>"##,
        );
        let links: Vec<&str> = c.links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec!["https://cafe.test/about", "https://cafe.test/menu/specials"]
        );
    }

    #[test]
    fn cross_domain_links_kept_when_unrestricted() {
        let c = extract_page(
            r#"<body><a href="https://other.test/x">x</a></body>"#,
            &page(),
            0,
            LinkPolicy {
                collect: true,
                restrict_to: None,
            },
        );
        assert_eq!(c.links.len(), 1);
    }

    #[test]
    fn no_links_when_not_collecting() {
        let c = extract_page(
            r#"<body><a href="/about">About</a></body>"#,
            &page(),
            0,
            LinkPolicy {
                collect: false,
                restrict_to: None,
            },
        );
        assert!(c.links.is_empty());
    }

    #[test]
    fn title_falls_back_to_path() {
        let c = extract("<html><head><title>  Café   Menu </title></head><body></body></html>");
        assert_eq!(c.title, "Café Menu");
        let untitled = extract("<body><p>Body text</p></body>");
        assert_eq!(untitled.title, "/menu/");
    }

    #[test]
    fn paragraph_line_breaks_survive() {
        let c = extract("<body><p>Open daily<br>8am to 6pm</p></body>");
        assert_eq!(texts(&c), vec!["Open daily\n8am to 6pm"]);
    }
}
