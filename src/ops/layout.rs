//! Plain-text page layout and PDF assembly shared by the txt and docx paths.
//!
//! Pages are US Letter with a fixed margin. Each input line is truncated to
//! [`MAX_LINE_CHARS`] and placed [`LINE_HEIGHT`] points below the previous
//! one; a new page starts when the next line would cross the bottom margin.

use crate::error::OpError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;
pub const MARGIN: i64 = 50;
pub const LINE_HEIGHT: i64 = 15;
pub const FONT_SIZE: i64 = 12;
pub const MAX_LINE_CHARS: usize = 100;

/// A line positioned on a page; `y` is the baseline in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub y: i64,
    pub text: String,
}

/// Lay lines out onto pages. Always returns at least one (possibly empty) page.
pub fn paginate<I, S>(lines: I) -> Vec<Vec<PlacedLine>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = top;

    // Fixed capacity of 46 lines per page. This equals
    // ceil(n * LINE_HEIGHT / usable height) pages for n up to 368 lines;
    // beyond that the ratio estimate runs one page short.
    for line in lines {
        if y - LINE_HEIGHT < MARGIN {
            pages.push(std::mem::take(&mut current));
            y = top;
        }
        current.push(PlacedLine {
            y,
            text: truncate_line(line.as_ref()),
        });
        y -= LINE_HEIGHT;
    }

    pages.push(current);
    pages
}

/// Render lines into a Helvetica text PDF.
pub fn render_text_pdf<I, S>(lines: I) -> Result<Vec<u8>, OpError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    render_pages(paginate(lines))
}

/// Render already positioned lines, one PDF page per entry.
pub(crate) fn render_pages(pages: Vec<Vec<PlacedLine>>) -> Result<Vec<u8>, OpError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut operations = Vec::with_capacity(page.len() * 5);
        for line in page {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), int(FONT_SIZE)]));
            operations.push(Operation::new("Td", vec![int(MARGIN), int(line.y)]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(&line.text))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box(PAGE_WIDTH, PAGE_HEIGHT),
        }));
    }

    finish_document(doc, pages_id, page_ids)
}

/// Write the page tree and catalog, then serialize the document.
pub(crate) fn finish_document(
    mut doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
) -> Result<Vec<u8>, OpError> {
    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.into_iter().map(Object::from).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

pub(crate) fn int(value: i64) -> Object {
    Object::Integer(value)
}

pub(crate) fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![int(0), int(0), int(width), int(height)])
}

fn truncate_line(line: &str) -> String {
    line.trim_end_matches(['\r', '\n'])
        .chars()
        .take(MAX_LINE_CHARS)
        .collect()
}

/// Standard fonts only cover Latin-1; anything else becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) <= 0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Number of pages and drawn lines per page in a rendered PDF.
    pub(crate) fn drawn_lines_per_page(pdf: &[u8]) -> Vec<usize> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
                content
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .count()
            })
            .collect()
    }

    #[test]
    fn test_lines_per_page_matches_usable_height() {
        let usable = PAGE_HEIGHT - 2 * MARGIN;
        let per_page = (usable / LINE_HEIGHT) as usize;
        assert_eq!(per_page, 46);

        let lines: Vec<String> = (0..per_page).map(|i| format!("line {i}")).collect();
        assert_eq!(paginate(&lines).len(), 1);

        let lines: Vec<String> = (0..=per_page).map(|i| format!("line {i}")).collect();
        let pages = paginate(&lines);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].len(), 1);
        assert_eq!(pages[1][0].y, PAGE_HEIGHT - MARGIN);
    }

    #[test]
    fn test_page_count_tracks_height_ratio_up_to_368_lines() {
        let usable = PAGE_HEIGHT - 2 * MARGIN;
        let lines = vec!["x"; 400];
        for n in 1..=400usize {
            let pages = paginate(&lines[..n]).len() as i64;
            let ratio = (n as i64 * LINE_HEIGHT + usable - 1) / usable;
            if n <= 368 {
                assert_eq!(pages, ratio, "{n} lines");
            } else {
                assert!(pages - ratio <= 1, "{n} lines");
            }
        }
        assert_eq!(paginate(&lines[..369]).len(), 9);
    }

    #[test]
    fn test_no_line_below_bottom_margin() {
        let lines = vec!["x"; 500];
        for page in paginate(&lines) {
            for line in page {
                assert!(line.y - LINE_HEIGHT >= MARGIN, "line at y={}", line.y);
            }
        }
    }

    #[test]
    fn test_empty_input_gives_one_empty_page() {
        let pages = paginate(Vec::<String>::new());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());

        let pdf = render_text_pdf(Vec::<String>::new()).unwrap();
        assert_eq!(drawn_lines_per_page(&pdf), vec![0]);
    }

    #[test]
    fn test_lines_are_truncated_not_wrapped() {
        let long = "é".repeat(250);
        let pages = paginate([long.as_str()]);
        assert_eq!(pages[0].len(), 1);
        assert_eq!(pages[0][0].text.chars().count(), MAX_LINE_CHARS);
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(encode_win_ansi("a\tb"), b"a b".to_vec());
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_rendered_pdf_has_letter_pages() {
        let pdf = render_text_pdf(["hello", "world"]).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box: Vec<i64> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect();
        assert_eq!(media_box, vec![0, 0, PAGE_WIDTH, PAGE_HEIGHT]);
        assert_eq!(drawn_lines_per_page(&pdf), vec![2]);
    }
}
