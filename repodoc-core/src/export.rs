//! Local export of a rendered document into one of a fixed set of formats.

use docx_rs::{Docx, Paragraph, Run};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, TextItem,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::error::{DocgenError, Result};

/// Supported export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(alias = "md")]
    Markdown,
    #[serde(alias = "txt")]
    Text,
    Pdf,
    #[serde(alias = "htm")]
    Html,
    Json,
    Docx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 6] = [
        ExportFormat::Markdown,
        ExportFormat::Text,
        ExportFormat::Pdf,
        ExportFormat::Html,
        ExportFormat::Json,
        ExportFormat::Docx,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
            ExportFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = DocgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            "pdf" => Ok(ExportFormat::Pdf),
            "html" | "htm" => Ok(ExportFormat::Html),
            "json" => Ok(ExportFormat::Json),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(DocgenError::Export(format!(
                "unsupported export format '{other}'"
            ))),
        }
    }
}

/// Encode `content` in `format`.
pub fn encode(format: ExportFormat, content: &str) -> Result<Vec<u8>> {
    let bytes = match format {
        ExportFormat::Markdown | ExportFormat::Text => content.as_bytes().to_vec(),
        ExportFormat::Html => html_page(content).into_bytes(),
        ExportFormat::Json => {
            serde_json::to_vec_pretty(&serde_json::json!({ "documentation": content }))
                .map_err(|e| DocgenError::Export(e.to_string()))?
        }
        ExportFormat::Pdf => pdf_bytes(content)?,
        ExportFormat::Docx => docx_bytes(content)?,
    };
    debug!(%format, size = bytes.len(), "Encoded document");
    Ok(bytes)
}

/// Write `content` to `path` in `format`, appending the format's extension
/// when `path` does not already carry it. Returns the path written.
pub fn export_to_path(path: &Path, format: ExportFormat, content: &str) -> Result<PathBuf> {
    let target = with_extension(path, format);
    let bytes = encode(format, content)?;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, bytes)?;
    info!(path = %target.display(), %format, "Exported documentation");
    Ok(target)
}

fn with_extension(path: &Path, format: ExportFormat) -> PathBuf {
    let suffix = format!(".{}", format.extension());
    let raw = path.to_string_lossy();
    if raw.ends_with(&suffix) {
        path.to_path_buf()
    } else {
        PathBuf::from(format!("{raw}{suffix}"))
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn html_page(content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Documentation Export</title>\n\
         <style> pre {{ font-family: Consolas, monospace; white-space: pre-wrap; }} </style>\n\
         </head>\n<body>\n<pre>{}</pre>\n</body>\n</html>",
        escape_html(content)
    )
}

// Builtin PDF fonts only cover printable ASCII.
static NON_PRINTABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x20-\x7E\n]").expect("static pattern compiles"));

const PAGE_WIDTH: Mm = Mm(215.9);
const PAGE_HEIGHT: Mm = Mm(279.4);
const FONT_SIZE: f32 = 10.0;
const LEADING: f32 = 14.5;
const TOP: f32 = 700.0;
const BOTTOM: f32 = 50.0;
const LEFT: f32 = 25.0;

fn pdf_bytes(content: &str) -> Result<Vec<u8>> {
    let ascii = NON_PRINTABLE.replace_all(&content.replace('\t', "   "), "").into_owned();
    let lines: Vec<&str> = ascii.split('\n').collect();
    let per_page = ((TOP - BOTTOM) / LEADING).ceil() as usize;

    let pages: Vec<PdfPage> = lines
        .chunks(per_page)
        .map(|chunk| {
            let mut ops = vec![
                Op::StartTextSection,
                Op::SetTextCursor {
                    pos: Point {
                        x: Pt(LEFT),
                        y: Pt(TOP),
                    },
                },
                Op::SetFontSizeBuiltinFont {
                    size: Pt(FONT_SIZE),
                    font: BuiltinFont::Helvetica,
                },
                Op::SetLineHeight { lh: Pt(LEADING) },
            ];
            for line in chunk {
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text((*line).to_string())],
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::AddLineBreak);
            }
            ops.push(Op::EndTextSection);
            PdfPage::new(PAGE_WIDTH, PAGE_HEIGHT, ops)
        })
        .collect();

    if pages.is_empty() {
        return Err(DocgenError::Export("nothing to render".to_string()));
    }

    let mut warnings = Vec::new();
    let bytes = PdfDocument::new("Documentation Export")
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);
    debug!(warnings = warnings.len(), "Rendered PDF");
    Ok(bytes)
}

/// One paragraph per line of `content`.
fn docx_bytes(content: &str) -> Result<Vec<u8>> {
    let docx = content.lines().fold(Docx::new(), |docx, line| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)))
    });
    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| DocgenError::Export(format!("docx encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(".PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("DOCX".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert!("odt".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn appends_extension_only_when_missing() {
        assert_eq!(
            with_extension(Path::new("out/docs"), ExportFormat::Markdown),
            PathBuf::from("out/docs.md")
        );
        assert_eq!(
            with_extension(Path::new("out/docs.html"), ExportFormat::Html),
            PathBuf::from("out/docs.html")
        );
        assert_eq!(
            with_extension(Path::new("docs.md"), ExportFormat::Json),
            PathBuf::from("docs.md.json")
        );
    }

    #[test]
    fn html_escapes_content() {
        let html = String::from_utf8(encode(ExportFormat::Html, "<b>&\"'").unwrap()).unwrap();
        assert!(html.contains("<pre>&lt;b&gt;&amp;&quot;&#39;</pre>"));
    }

    #[test]
    fn json_wraps_documentation_field() {
        let bytes = encode(ExportFormat::Json, "# Docs").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["documentation"], "# Docs");
    }

    #[test]
    fn docx_export_writes_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let content = "# Documentation\n\n## File: a.py\nline one";
        let path = export_to_path(&dir.path().join("docs"), ExportFormat::Docx, content).unwrap();
        assert_eq!(path, dir.path().join("docs.docx"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn pdf_export_writes_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let content: String = (0..120).map(|i| format!("line {i} \u{2713}\n")).collect();
        let path = export_to_path(&dir.path().join("docs"), ExportFormat::Pdf, &content).unwrap();
        assert_eq!(path, dir.path().join("docs.pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..4], b"%PDF");
    }
}
