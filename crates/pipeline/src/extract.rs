use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use quire_core::{page_sort_key, Document, PageText};
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub const DOCX_PAGE_CHARS: usize = 2000;

static DOCX_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("valid paragraph regex")
});
static DOCX_PARAGRAPH_PROPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:pPr\b.*?</w:pPr>").expect("valid paragraph properties regex")
});
// Text runs and the break/tab elements between them, in document order.
static DOCX_RUN_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(br|cr|tab)(?:\s[^>]*)?/>")
        .expect("valid run content regex")
});

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("no page files found in {0}")]
    NoPages(PathBuf),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("CSV extraction failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV file {0} has no header and no rows")]
    EmptyCsv(String),
    #[error("path has no file name: {0}")]
    NoFileName(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn extract_document(path: &Path) -> Result<Document, ExtractionError> {
    // `..`, `.` and trailing components have no usable name until resolved.
    let resolved = std::fs::canonicalize(path)?;
    let path = resolved.as_path();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ExtractionError::NoFileName(path.to_path_buf()))?;

    if path.is_dir() {
        let pages = extract_page_dir(path)?;
        return Ok(Document::new(filename, pages));
    }

    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let pages = match ext.as_str() {
        "md" | "markdown" | "txt" => single_page(std::fs::read_to_string(path)?),
        "csv" => single_page(csv_to_markdown(&filename, File::open(path)?)?),
        "pdf" => extract_pdf(&std::fs::read(path)?)?,
        "docx" => extract_docx(File::open(path)?)?,
        other => return Err(ExtractionError::UnsupportedType(other.to_string())),
    };

    debug!(filename = %filename, pages = pages.len(), "extracted document");
    Ok(Document::new(filename, pages))
}

fn single_page(text: String) -> Vec<PageText> {
    vec![PageText {
        page_number: 1,
        text,
    }]
}

fn extract_page_dir(dir: &Path) -> Result<Vec<PageText>, ExtractionError> {
    let nested = dir.join("pages");
    let root = if nested.is_dir() { nested } else { dir.to_path_buf() };

    let mut files = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .map(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (page_sort_key(&name), name, path)
        })
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(ExtractionError::NoPages(root));
    }
    files.sort();

    files
        .into_iter()
        .enumerate()
        .map(|(idx, (_, _, path))| {
            Ok(PageText {
                page_number: idx + 1,
                text: std::fs::read_to_string(&path)?,
            })
        })
        .collect()
}

pub fn csv_to_markdown<R: Read>(filename: &str, reader: R) -> Result<String, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut headers = reader
        .headers()?
        .iter()
        .map(escape_cell)
        .collect::<Vec<_>>();
    let rows = reader
        .records()
        .map(|record| record.map(|record| record.iter().map(escape_cell).collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() && headers.iter().all(String::is_empty) {
        return Err(ExtractionError::EmptyCsv(filename.to_string()));
    }

    // Ragged rows widen the table; short rows and the header are padded.
    let width = rows
        .iter()
        .map(Vec::len)
        .fold(headers.len(), usize::max);
    headers.resize(width, String::new());

    let mut out = format!("# CSV Content: {filename}\n\n");
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(width)));

    for mut cells in rows {
        cells.resize(width, String::new());
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    Ok(out)
}

fn escape_cell(cell: &str) -> String {
    cell.trim().replace('|', "\\|").replace('\n', " ")
}

pub fn extract_pdf(bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| ExtractionError::Pdf(err.to_string()))?;

    let pages = text
        .split('\x0C')
        .filter(|page| !page.trim().is_empty())
        .enumerate()
        .map(|(idx, page)| PageText {
            page_number: idx + 1,
            text: page.to_string(),
        })
        .collect::<Vec<_>>();

    if pages.is_empty() {
        return Err(ExtractionError::Pdf("no text layer found".to_string()));
    }
    Ok(pages)
}

pub fn extract_docx<R: Read + std::io::Seek>(reader: R) -> Result<Vec<PageText>, ExtractionError> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|err| ExtractionError::Docx(err.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| ExtractionError::Docx(err.to_string()))?
        .read_to_string(&mut xml)?;

    Ok(paginate_paragraphs(docx_paragraphs(&xml)))
}

fn docx_paragraphs(xml: &str) -> Vec<String> {
    DOCX_PARAGRAPH
        .captures_iter(xml)
        .map(|paragraph| {
            let body = DOCX_PARAGRAPH_PROPS.replace_all(&paragraph[1], "");
            DOCX_RUN_CONTENT
                .captures_iter(&body)
                .map(|run| match (run.get(1), run.get(2)) {
                    (Some(text), _) => unescape_xml(text.as_str()),
                    (None, Some(tag)) if tag.as_str() == "tab" => "\t".to_string(),
                    _ => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect()
}

fn paginate_paragraphs(paragraphs: Vec<String>) -> Vec<PageText> {
    let mut pages = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        current.push_str(&paragraph);
        current.push('\n');
        if current.chars().count() > DOCX_PAGE_CHARS {
            pages.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }

    pages
        .into_iter()
        .enumerate()
        .map(|(idx, text)| PageText {
            page_number: idx + 1,
            text,
        })
        .collect()
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn page_directory_is_ordered_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let doc_dir = dir.path().join("annual_report");
        std::fs::create_dir_all(doc_dir.join("pages")).unwrap();
        for (name, body) in [("page10.md", "ten"), ("page2.md", "two"), ("page1.md", "one")] {
            std::fs::write(doc_dir.join("pages").join(name), body).unwrap();
        }
        std::fs::write(doc_dir.join("pages").join("notes.txt"), "ignored").unwrap();

        let document = extract_document(&doc_dir).unwrap();

        assert_eq!(document.filename, "annual_report");
        let texts = document.pages.iter().map(|page| page.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["one", "two", "ten"]);
        assert_eq!(document.pages[2].page_number, 3);
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract_document(dir.path()),
            Err(ExtractionError::NoPages(_))
        ));
    }

    #[test]
    fn csv_renders_markdown_table() {
        let data = "name,notes\nalpha,first | row\nbeta\n";
        let markdown = csv_to_markdown("people.csv", data.as_bytes()).unwrap();

        assert_eq!(
            markdown,
            "# CSV Content: people.csv\n\n| name | notes |\n| --- | --- |\n| alpha | first \\| row |\n| beta |  |\n"
        );
    }

    #[test]
    fn csv_rows_wider_than_header_keep_every_cell() {
        let data = "name,notes\nalpha,first,late addition\nbeta,second\n";
        let markdown = csv_to_markdown("p.csv", data.as_bytes()).unwrap();

        assert_eq!(
            markdown,
            "# CSV Content: p.csv\n\n| name | notes |  |\n| --- | --- | --- |\n| alpha | first | late addition |\n| beta | second |  |\n"
        );
    }

    #[test]
    fn empty_csv_is_rejected() {
        assert!(matches!(
            csv_to_markdown("blank.csv", "".as_bytes()),
            Err(ExtractionError::EmptyCsv(name)) if name == "blank.csv"
        ));
        assert!(csv_to_markdown("header_only.csv", "name,notes\n".as_bytes()).is_ok());
    }

    #[test]
    fn parent_components_resolve_to_a_real_name() {
        let dir = tempfile::tempdir().unwrap();
        let doc_dir = dir.path().join("annual_report");
        std::fs::create_dir_all(doc_dir.join("pages")).unwrap();
        std::fs::write(doc_dir.join("pages").join("page1.md"), "one").unwrap();
        std::fs::create_dir_all(doc_dir.join("drafts")).unwrap();

        let document = extract_document(&doc_dir.join("drafts").join("..")).unwrap();

        assert_eq!(document.filename, "annual_report");
        assert_eq!(quire_core::document_name(&document.filename), "annual_report");
    }

    #[test]
    fn docx_breaks_and_tabs_separate_runs() {
        let xml = "<w:p><w:r><w:t>first line</w:t><w:br/><w:t>second line</w:t></w:r></w:p>\
                   <w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
                   <w:r><w:t>key</w:t><w:tab/><w:t>value</w:t><w:cr/><w:t>next</w:t></w:r></w:p>";

        assert_eq!(
            docx_paragraphs(xml),
            vec!["first line\nsecond line", "key\tvalue\nnext"]
        );
    }

    #[test]
    fn unsupported_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, b"binary").unwrap();

        match extract_document(&path) {
            Err(ExtractionError::UnsupportedType(ext)) => assert_eq!(ext, "pptx"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn docx_paragraphs_are_paged() {
        let paragraph = format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", "x".repeat(900));
        let xml = format!(
            "<w:document><w:body><w:p><w:pPr/><w:r><w:t xml:space=\"preserve\">Fish &amp; chips</w:t></w:r></w:p>{}</w:body></w:document>",
            paragraph.repeat(4)
        );

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.set_position(0);

        let pages = extract_docx(buffer).unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages[0].text.starts_with("Fish & chips\n"));
        assert_eq!(pages[1].text, format!("{}\n", "x".repeat(900)));
    }
}
