//! Small helpers for the server-rendered pages.

pub fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Percent, formatted for inline CSS (`12.5%`).
pub fn percent(fraction: f64) -> String {
    let value = (fraction * 100.0 * 1000.0).round() / 1000.0;
    format!("{value}%")
}

const BASE_STYLE: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; color: #1f2937; background: #f3f4f6; }
main { max-width: 1100px; margin: 0 auto; padding: 24px; }
a { color: #2563eb; }
h1 { font-size: 1.6rem; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,.12); padding: 16px; margin-bottom: 16px; }
.muted { color: #6b7280; }
.warning { color: #b45309; }
.error { color: #b91c1c; }
button, .button { display: inline-block; padding: 6px 14px; border-radius: 6px; border: 1px solid #d1d5db; background: #fff; cursor: pointer; font: inherit; text-decoration: none; color: inherit; }
button.primary, .button.primary { background: #2563eb; border-color: #2563eb; color: #fff; }
button:disabled { opacity: .5; cursor: not-allowed; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #e5e7eb; }
"#;

/// Full HTML document with the shared stylesheet.
pub fn document(title: &str, head: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{BASE_STYLE}</style>
{head}
  </head>
  <body>
{body}
  </body>
</html>
"#,
        title = escape(title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_markup_and_quotes() {
        assert_eq!(
            escape(r#"<a href="x">Tom's & Jerry</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom&#39;s &amp; Jerry&lt;/a&gt;"
        );
    }

    #[test]
    fn percent_rounds_float_noise() {
        assert_eq!(percent(0.1), "10%");
        assert_eq!(percent(0.125), "12.5%");
        assert_eq!(percent(0.30000000000000004), "30%");
    }

    #[test]
    fn document_escapes_title() {
        let html = document("A < B", "", "<p>x</p>");
        assert!(html.contains("<title>A &lt; B</title>"));
        assert!(html.contains("<p>x</p>"));
    }
}
