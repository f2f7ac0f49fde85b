use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Renders user-written markdown. Raw HTML is shown as text rather than
/// passed through, and links or images with a script-capable scheme point
/// nowhere.
pub fn render(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES)
        .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            _ => event,
        });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

/// Relative URLs and http(s)/mailto pass; anything else becomes `#`.
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    // browsers ignore tabs and newlines inside a scheme
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();

    let scheme = match cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(i) if cleaned[i..].starts_with(':') => Some(cleaned[..i].to_ascii_lowercase()),
        _ => None,
    };

    match scheme {
        Some(scheme) if !SAFE_SCHEMES.contains(&scheme.as_str()) => CowStr::Borrowed("#"),
        _ => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_emphasis() {
        assert_eq!(render("hello *there*"), "<p>hello <em>there</em></p>\n");
    }

    #[test]
    fn escapes_raw_html() {
        let html = render("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let inline = render("hi <b onclick=x>there</b>");
        assert!(!inline.contains("<b "));
    }

    #[test]
    fn script_links_point_nowhere() {
        assert_eq!(
            render("[click](javascript:alert(document.cookie))"),
            "<p><a href=\"#\">click</a></p>\n"
        );
        assert!(!render("[x](JaVaScRiPt:alert(1))").contains("alert"));
        assert!(!render("[x](javascript&#58;alert(1))").contains("alert"));
        assert!(!render("<vbscript:msgbox(1)>").contains("vbscript"));

        let image = render("![pic](data:text/html;base64,PHNjcmlwdD4=)");
        assert!(image.contains("src=\"#\""));
        assert!(!image.contains("data:"));
    }

    #[test]
    fn ordinary_links_survive() {
        assert!(render("[site](https://home.iitd.ac.in)").contains("href=\"https://home.iitd.ac.in\""));
        assert!(render("[me](mailto:cs1200123@iitd.ac.in)").contains("href=\"mailto:cs1200123@iitd.ac.in\""));
        assert!(render("[post](/api/posts/1?x=a:b)").contains("href=\"/api/posts/1?x=a:b\""));
    }
}
