//! Report writers: HTML report directory, application value CSV and the
//! diff report.

pub mod appvals;
pub mod diff;
pub mod html;

use std::fs;
use std::path::{Component, Path};

use crate::diagnostics::Diagnostics;
use crate::error::{SmapsError, SmapsResult};
use crate::ingest::generator;
use crate::table::escape_html;

pub use appvals::{save_appvals, write_appvals};
pub use diff::{render_diff_html, save_diff, write_diff_csv};
pub use html::{render_app_page, render_navigation, render_object_page, save_html_report, stat_table, ReportPaths};

/// Common page prologue.
pub(crate) fn page_header(title: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 6px; }}
        h2 {{ color: #555; margin-top: 24px; }}
        table {{ border-collapse: collapse; margin: 12px 0; }}
        th, td {{ padding: 3px 8px; }}
        a {{ color: #007bff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        .caveat {{ color: #666; font-style: italic; }}
        .footer {{ margin-top: 40px; padding-top: 12px; border-top: 1px solid #ddd; color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
"#
    )
}

/// Common page epilogue with the generator and a timestamp.
pub(crate) fn page_footer() -> String {
    format!(
        r#"<div class="footer">
    <p>Generated by {} on {}</p>
</div>
</body>
</html>
"#,
        generator(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Link to `target` usable from a page stored at `page`. Both paths are
/// taken relative to the same base.
pub fn relative_link(target: &Path, page: &Path) -> String {
    let names = |p: &Path| -> Vec<String> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    };
    let mut dest = names(target);
    let mut from = names(page);
    from.pop();

    let common = dest.iter().zip(&from).take_while(|(a, b)| a == b).count();
    dest.drain(..common);
    from.drain(..common);

    let mut parts: Vec<String> = vec!["..".to_string(); from.len()];
    parts.extend(dest);
    parts.join("/")
}

pub(crate) fn write_file(path: &Path, text: &str, diag: &Diagnostics) -> SmapsResult<()> {
    diag.debug(&format!("{}: writing ...", path.display()));
    fs::write(path, text).map_err(|e| SmapsError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_link() {
        assert_eq!(
            relative_link(Path::new("out/boot.dir/app001.html"), Path::new("out/boot.html")),
            "boot.dir/app001.html"
        );
        assert_eq!(
            relative_link(Path::new("out/boot.dir/obj002.html"), Path::new("out/boot.dir/app001.html")),
            "obj002.html"
        );
        assert_eq!(
            relative_link(Path::new("a/x.html"), Path::new("b/c/y.html")),
            "../../a/x.html"
        );
        assert_eq!(relative_link(Path::new("./r.dir/a.html"), Path::new("r.html")), "r.dir/a.html");
    }

    #[test]
    fn test_page_header_escapes_title() {
        let head = page_header("Object: /tmp/<odd>");
        assert!(head.contains("<title>Object: /tmp/&lt;odd&gt;</title>"));
    }
}
