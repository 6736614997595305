use leptos::prelude::*;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

// Copies the block's code and flashes "Copied" on the button.
const COPY_SCRIPT: &str = "const b=this;navigator.clipboard.writeText(b.closest('figure').querySelector('code').textContent).then(()=>{b.textContent='Copied';setTimeout(()=>{b.textContent='Copy'},1500)})";

/// Renders a bot reply. Styling for the generated tags lives under
/// `.markdown-content` in `style/tailwind.css`.
#[component]
pub fn MarkdownRenderer(
    #[prop(into)] content: Signal<String>,
    #[prop(optional)] class: &'static str,
) -> impl IntoView {
    let rendered_html = Memo::new(move |_| content.with(|text| markdown_to_html(text)));

    view! {
        <div
            class=format!("markdown-content {} min-w-0 max-w-full overflow-hidden", class)
            inner_html=move || rendered_html.get()
        ></div>
    }
}

struct CodeBlock {
    lang: String,
    code: String,
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut code_block: Option<CodeBlock> = None;
    let events = Parser::new_ext(markdown, options).filter_map(|event| match event {
        Event::Start(Tag::CodeBlock(kind)) => {
            let lang = match kind {
                CodeBlockKind::Fenced(info) => {
                    info.split_whitespace().next().unwrap_or_default().to_string()
                }
                CodeBlockKind::Indented => String::new(),
            };
            code_block = Some(CodeBlock {
                lang,
                code: String::new(),
            });
            None
        }
        Event::Text(text) if code_block.is_some() => {
            if let Some(block) = code_block.as_mut() {
                block.code.push_str(&text);
            }
            None
        }
        Event::End(TagEnd::CodeBlock) => code_block
            .take()
            .map(|block| Event::Html(render_code_block(&block).into())),
        // the model's raw markup is shown, never interpreted
        Event::Html(raw) | Event::InlineHtml(raw) => Some(Event::Text(raw)),
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) => Some(Event::Html(render_link_open(&dest_url, &title).into())),
        Event::End(TagEnd::Link) => Some(Event::Html(CowStr::Borrowed("</a>"))),
        other => Some(other),
    });

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events);
    html_output
}

fn render_code_block(block: &CodeBlock) -> String {
    let label = if block.lang.is_empty() {
        "text".to_string()
    } else {
        escape(&block.lang)
    };
    let lang_class = if block.lang.is_empty() {
        String::new()
    } else {
        format!(r#" class="language-{}""#, escape(&block.lang))
    };

    let mut out = String::from(r#"<figure class="code-block">"#);
    out.push_str(&format!(
        r#"<figcaption><span>{label}</span><button type="button" onclick="{COPY_SCRIPT}">Copy</button></figcaption>"#
    ));
    out.push_str(&format!(
        "<pre><code{lang_class}>{}</code></pre></figure>\n",
        escape(&block.code)
    ));
    out
}

fn render_link_open(dest_url: &str, title: &str) -> String {
    let href = if is_script_url(dest_url) { "#" } else { dest_url };
    let mut out = format!(r#"<a href="{}""#, escape(href));
    if !title.is_empty() {
        out.push_str(&format!(r#" title="{}""#, escape(title)));
    }
    out.push_str(r#" target="_blank" rel="noopener noreferrer">"#);
    out
}

fn is_script_url(url: &str) -> bool {
    let scheme = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .take(11)
        .collect::<String>()
        .to_ascii_lowercase();
    scheme.starts_with("javascript:") || scheme.starts_with("vbscript:") || scheme.starts_with("data:")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let html = markdown_to_html("# Hello\n\nThis is **bold** and *italic* text.");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn test_fenced_code_block_gets_label_and_copy_button() {
        let html = markdown_to_html("```rust\nfn main() {}\n```");
        assert!(html.contains(r#"<figure class="code-block">"#));
        assert!(html.contains("<span>rust</span>"));
        assert!(html.contains(r#"<code class="language-rust">fn main() {}"#));
        assert!(html.contains("navigator.clipboard.writeText"));
        assert!(html.contains(">Copy</button>"));
    }

    #[test]
    fn test_code_block_keeps_indentation_and_escapes() {
        let markdown = "```python\ndef hello():\n    if a < b:\n        print(\"x\")\n```";
        let html = markdown_to_html(markdown);
        assert!(html.contains("\n    if a &lt; b:"));
        assert!(html.contains("\n        print(&quot;x&quot;)"));
    }

    #[test]
    fn test_indented_code_block_is_labelled_text() {
        let html = markdown_to_html("    let x = 1;\n");
        assert!(html.contains("<span>text</span>"));
        assert!(html.contains("<pre><code>let x = 1;"));
    }

    #[test]
    fn test_raw_html_is_shown_as_text() {
        let html = markdown_to_html("Use `<div>` here. <script>alert(1)</script>\n\n<b>bold?</b>");
        assert!(html.contains("<code>&lt;div&gt;</code>"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;bold?"));
    }

    #[test]
    fn test_links_open_in_new_tab_with_escaped_attributes() {
        let html = markdown_to_html(r#"[docs](https://example.com/?a=1&b=2 'say "hi"')"#);
        assert!(html.contains(r#"href="https://example.com/?a=1&amp;b=2""#));
        assert!(html.contains(r#"title="say &quot;hi&quot;""#));
        assert!(html.contains(r#"target="_blank" rel="noopener noreferrer">docs</a>"#));
    }

    #[test]
    fn test_script_links_are_neutralised() {
        let html = markdown_to_html("[click](javascript:alert(1)) and [x]( JavaScript:void(0))");
        assert!(!html.to_ascii_lowercase().contains("javascript:"));
        assert!(html.contains(r##"href="#""##));
    }
}
