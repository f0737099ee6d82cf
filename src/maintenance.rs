// ABOUTME: Maintenance page rendering for `web disable`.
// ABOUTME: The page is plain HTML; web servers serve it while the file exists.

/// Why and until when the site is down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notice {
    pub reason: Option<String>,
    pub deadline: Option<String>,
}

/// Produces the page written to `shared/system/<basename>.html`.
pub trait MaintenancePage {
    fn render(&self, notice: &Notice) -> String;
}

/// A minimal self-contained page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPage;

impl MaintenancePage for DefaultPage {
    fn render(&self, notice: &Notice) -> String {
        let reason = notice.reason.as_deref().unwrap_or("maintenance");
        let deadline = notice.deadline.as_deref().unwrap_or("shortly");
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>System down for maintenance</title>
  <style>
    body {{ font-family: sans-serif; text-align: center; margin-top: 10em; color: #333; }}
  </style>
</head>
<body>
  <h1>We're currently down for {}.</h1>
  <p>We'll be back {}.</p>
</body>
</html>
"#,
            escape_html(reason),
            escape_html(deadline)
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Web server rules that serve the page with a 503 while it exists.
pub fn rewrite_rules(basename: &str) -> String {
    format!(
        "ErrorDocument 503 /system/{basename}.html\n\
         RewriteEngine On\n\
         RewriteCond %{{REQUEST_URI}} !\\.(css|gif|jpg|png)$\n\
         RewriteCond %{{DOCUMENT_ROOT}}/system/{basename}.html -f\n\
         RewriteCond %{{SCRIPT_FILENAME}} !{basename}.html\n\
         RewriteRule ^.*$  -  [redirect=503,last]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_reason_given() {
        let page = DefaultPage.render(&Notice::default());
        assert!(page.contains("down for maintenance."));
        assert!(page.contains("back shortly."));
    }

    #[test]
    fn reason_is_escaped() {
        let page = DefaultPage.render(&Notice {
            reason: Some("<b>upgrades</b>".to_string()),
            deadline: Some("12pm Central Time".to_string()),
        });
        assert!(page.contains("&lt;b&gt;upgrades&lt;/b&gt;"));
        assert!(page.contains("back 12pm Central Time."));
    }

    #[test]
    fn rules_name_the_page() {
        let rules = rewrite_rules("offline");
        assert!(rules.starts_with("ErrorDocument 503 /system/offline.html"));
        assert!(rules.contains("%{DOCUMENT_ROOT}/system/offline.html -f"));
    }
}
