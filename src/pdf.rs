//! Invoice PDF rendering.
//!
//! Deterministic single-pass layout over static page geometry: a header with
//! the invoice identity, a line-item table that flows onto additional pages
//! when needed, and a totals block. The `paid` variant draws a large diagonal
//! PAID watermark under the page content.
//!
//! Rendering is pure computation over the document data; callers that treat a
//! failed render as non-fatal catch the returned error and log it.

use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb, TextMatrix,
};

use crate::errors::{ServiceError, ServiceResult};

/// Everything needed to render one invoice document.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub center_name: String,
    pub invoice_date: NaiveDate,
    pub cycle_number: u8,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_net_amount: f64,
    pub total_center_share: f64,
    pub items: Vec<InvoiceLine>,
    /// Draw the PAID watermark on every page.
    pub paid: bool,
}

/// One line item of an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub student_name: String,
    pub registration_number: String,
    pub course_name: String,
    pub transaction_date: NaiveDate,
    pub fee_term: String,
    pub fee_paid: f64,
    pub net_amount: f64,
    pub center_share: f64,
}

/// Format a date for the document: `DD.MM.YYYY`.
pub fn format_document_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Format an amount for the document: `INR` with two decimals.
pub fn format_currency(amount: f64) -> String {
    format!("INR {:.2}", amount)
}

fn pdf_err(e: printpdf::Error) -> ServiceError {
    ServiceError::PdfError(e.to_string())
}

/// Render an invoice into PDF bytes.
pub fn render_invoice_pdf(invoice: &InvoiceDocument) -> ServiceResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Invoice {}", invoice.invoice_number),
        Mm(210.0),
        Mm(297.0),
        "invoice",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let mut current = doc.get_page(page).get_layer(layer);
    if invoice.paid {
        draw_paid_watermark(&current, &bold);
    }
    draw_header(&current, &font, &bold, invoice);

    let mut y = Mm(232.0);
    y = draw_table_header(&current, &bold, y);

    for item in &invoice.items {
        if y.0 < 25.0 {
            current = start_continuation_page(&doc, invoice, &bold);
            y = draw_table_header(&current, &bold, Mm(270.0));
        }
        draw_item_row(&current, &font, item, y);
        y = Mm(y.0 - 6.0);
    }

    draw_rule(&current, Mm(y.0 + 4.0));
    y = Mm(y.0 - 4.0);
    current.use_text(
        format!("Total Net Amount: {}", format_currency(invoice.total_net_amount)),
        10.0,
        Mm(116.0),
        y,
        &bold,
    );
    y = Mm(y.0 - 6.0);
    current.use_text(
        format!(
            "Total Center Share: {}",
            format_currency(invoice.total_center_share)
        ),
        10.0,
        Mm(116.0),
        y,
        &bold,
    );

    doc.save_to_bytes().map_err(pdf_err)
}

fn draw_header(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    bold: &IndirectFontRef,
    invoice: &InvoiceDocument,
) {
    layer.use_text("INVOICE", 20.0, Mm(86.0), Mm(277.0), bold);
    layer.use_text(invoice.center_name.as_str(), 13.0, Mm(15.0), Mm(265.0), bold);
    layer.use_text(
        format!("Invoice No: {}", invoice.invoice_number),
        10.0,
        Mm(15.0),
        Mm(257.0),
        font,
    );
    layer.use_text(
        format!(
            "Invoice Date: {}",
            format_document_date(invoice.invoice_date)
        ),
        10.0,
        Mm(15.0),
        Mm(251.0),
        font,
    );
    layer.use_text(
        format!(
            "Billing Cycle: Cycle {} ({} - {})",
            invoice.cycle_number,
            format_document_date(invoice.period_start),
            format_document_date(invoice.period_end)
        ),
        10.0,
        Mm(15.0),
        Mm(245.0),
        font,
    );
    draw_rule(layer, Mm(241.0));
}

/// Draw the column captions at `y` and return the y of the first data row.
fn draw_table_header(layer: &PdfLayerReference, bold: &IndirectFontRef, y: Mm) -> Mm {
    layer.use_text("Student", 8.0, Mm(15.0), y, bold);
    layer.use_text("Reg. No", 8.0, Mm(52.0), y, bold);
    layer.use_text("Course", 8.0, Mm(82.0), y, bold);
    layer.use_text("Date", 8.0, Mm(116.0), y, bold);
    layer.use_text("Term", 8.0, Mm(136.0), y, bold);
    layer.use_text("Fee Paid", 8.0, Mm(152.0), y, bold);
    layer.use_text("Net", 8.0, Mm(168.0), y, bold);
    layer.use_text("Share", 8.0, Mm(184.0), y, bold);
    draw_rule(layer, Mm(y.0 - 2.0));
    Mm(y.0 - 6.0)
}

fn draw_item_row(layer: &PdfLayerReference, font: &IndirectFontRef, item: &InvoiceLine, y: Mm) {
    layer.use_text(truncate(&item.student_name, 22), 8.0, Mm(15.0), y, font);
    layer.use_text(truncate(&item.registration_number, 16), 8.0, Mm(52.0), y, font);
    layer.use_text(truncate(&item.course_name, 20), 8.0, Mm(82.0), y, font);
    layer.use_text(
        format_document_date(item.transaction_date),
        8.0,
        Mm(116.0),
        y,
        font,
    );
    layer.use_text(item.fee_term.as_str(), 8.0, Mm(136.0), y, font);
    layer.use_text(format!("{:.2}", item.fee_paid), 8.0, Mm(152.0), y, font);
    layer.use_text(format!("{:.2}", item.net_amount), 8.0, Mm(168.0), y, font);
    layer.use_text(format!("{:.2}", item.center_share), 8.0, Mm(184.0), y, font);
}

fn start_continuation_page(
    doc: &PdfDocumentReference,
    invoice: &InvoiceDocument,
    bold: &IndirectFontRef,
) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), "invoice");
    let layer = doc.get_page(page).get_layer(layer);
    if invoice.paid {
        draw_paid_watermark(&layer, bold);
    }
    layer.use_text(
        format!("Invoice {} (continued)", invoice.invoice_number),
        10.0,
        Mm(15.0),
        Mm(280.0),
        bold,
    );
    layer
}

fn draw_rule(layer: &PdfLayerReference, y: Mm) {
    let line = Line {
        points: vec![
            (Point::new(Mm(15.0), y), false),
            (Point::new(Mm(195.0), y), false),
        ],
        is_closed: false,
    };
    layer.set_outline_color(Color::Rgb(Rgb::new(0.45, 0.45, 0.45, None)));
    layer.set_outline_thickness(0.5);
    layer.add_line(line);
}

/// Large diagonal PAID mark, drawn before the page content so the text of
/// the invoice stays readable on top of it.
fn draw_paid_watermark(layer: &PdfLayerReference, bold: &IndirectFontRef) {
    layer.set_fill_color(Color::Rgb(Rgb::new(0.78, 0.90, 0.78, None)));
    layer.begin_text_section();
    layer.set_font(bold, 96.0);
    layer.set_text_matrix(TextMatrix::TranslateRotate(
        Mm(40.0).into_pt(),
        Mm(100.0).into_pt(),
        40.0,
    ));
    layer.write_text("PAID", bold);
    layer.end_text_section();
    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invoice(items: usize, paid: bool) -> InvoiceDocument {
        let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        InvoiceDocument {
            invoice_number: "HVI/INV/25-26/001".to_string(),
            center_name: "Harbor View Institute".to_string(),
            invoice_date: date,
            cycle_number: 1,
            period_start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            total_net_amount: 100.0 * items as f64,
            total_center_share: 80.0 * items as f64,
            items: (0..items)
                .map(|i| InvoiceLine {
                    student_name: format!("Student {i}"),
                    registration_number: format!("REG-{i:04}"),
                    course_name: "Applied Data Science".to_string(),
                    transaction_date: date,
                    fee_term: "Full".to_string(),
                    fee_paid: 118.0,
                    net_amount: 100.0,
                    center_share: 80.0,
                })
                .collect(),
            paid,
        }
    }

    #[test]
    fn renders_a_pdf() {
        let bytes = render_invoice_pdf(&sample_invoice(3, false)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn paid_watermark_changes_the_document() {
        let plain = render_invoice_pdf(&sample_invoice(3, false)).unwrap();
        let paid = render_invoice_pdf(&sample_invoice(3, true)).unwrap();
        assert_ne!(plain, paid);
    }

    #[test]
    fn long_item_lists_flow_onto_continuation_pages() {
        let short = render_invoice_pdf(&sample_invoice(2, false)).unwrap();
        let long = render_invoice_pdf(&sample_invoice(90, false)).unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn document_formatting_helpers() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_document_date(date), "07.03.2025");
        assert_eq!(format_currency(1234.5), "INR 1234.50");
    }

    #[test]
    fn truncate_keeps_short_values_intact() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long student name", 10), "a very lo.");
    }
}
