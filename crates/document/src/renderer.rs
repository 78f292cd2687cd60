//! PDF rendering of a submission record

use crate::errors::RenderError;
use crate::layout::{
    Canvas, Font, CLOSING_BLOCK_THRESHOLD, CONTENT_WIDTH, MARGIN_LEFT, PAGE_HEIGHT, PAGE_WIDTH,
};
use crate::signature::{decode_data_uri, SignatureImage};
use crate::text::{chars_per_line, wrap};
use chrono::{Local, NaiveDate};
use gutachten_common::submission::SubmissionRecord;
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, instrument, warn};

const BUSINESS_NAME: &str = "Kfz-Sachverständigenbüro Bielefeld";
const BUSINESS_ADDRESS: &str = "Musterstraße 12, 33602 Bielefeld";
const BUSINESS_PHONE: &str = "Tel. 0521 123456";
const BUSINESS_EMAIL: &str = "info@gutachten-bielefeld.de";

const TITLE: &str = "Gutachtenauftrag";

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 12.0;

const SIGNATURE_X: f32 = 300.0;
const SIGNATURE_MAX_WIDTH: f32 = 200.0;
const SIGNATURE_MAX_HEIGHT: f32 = 80.0;
const SIGNATURE_RESOURCE: &str = "Im1";

/// A rendered PDF ready for upload
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub signature_embedded: bool,
}

impl RenderedDocument {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Turns a validated record into a document
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, record: &SubmissionRecord) -> Result<RenderedDocument, RenderError>;
}

/// `Gutachten_{order}.pdf` with path-hostile characters replaced
pub fn document_file_name(order_number: &str) -> String {
    let safe: String = order_number
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Gutachten_{}.pdf", safe)
}

/// Renders with lopdf using the standard Helvetica fonts
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    /// Fixed date for the place/date line; today when unset
    issue_date: Option<NaiveDate>,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue_date(date: NaiveDate) -> Self {
        Self {
            issue_date: Some(date),
        }
    }

    fn letterhead(&self, canvas: &mut Canvas) {
        canvas.line(Font::Bold, 16.0, BUSINESS_NAME);
        canvas.line(Font::Regular, 9.0, BUSINESS_ADDRESS);
        canvas.line(
            Font::Regular,
            9.0,
            &format!("{}  |  {}", BUSINESS_PHONE, BUSINESS_EMAIL),
        );
        canvas.advance(4.0);
        canvas.rule(MARGIN_LEFT, MARGIN_LEFT + CONTENT_WIDTH);
        canvas.advance(24.0);
    }

    fn heading(&self, canvas: &mut Canvas, text: &str) {
        canvas.advance(10.0);
        // keep a heading together with its first lines
        canvas.ensure_space(HEADING_SIZE * 4.0);
        canvas.line(Font::Bold, HEADING_SIZE, text);
        canvas.rule(MARGIN_LEFT, MARGIN_LEFT + CONTENT_WIDTH);
        canvas.advance(6.0);
    }

    fn optional(canvas: &mut Canvas, label: &str, value: Option<&str>) {
        if let Some(value) = value {
            canvas.labeled(BODY_SIZE, label, value);
        }
    }

    fn body(&self, canvas: &mut Canvas, record: &SubmissionRecord) {
        canvas.line(Font::Bold, 18.0, TITLE);
        canvas.advance(4.0);
        canvas.labeled(BODY_SIZE, "Auftragsnummer", &record.order_number);
        if record.cession {
            canvas.advance(4.0);
            canvas.line(
                Font::Bold,
                BODY_SIZE,
                "Abtretungserklärung: Der Auftraggeber hat die Abtretung erklärt.",
            );
        }

        self.heading(canvas, "Auftraggeber");
        let client = &record.client;
        canvas.labeled(BODY_SIZE, "Name", &client.name);
        canvas.labeled(BODY_SIZE, "Anschrift", &client.address);
        Self::optional(canvas, "E-Mail", client.email.as_deref());
        Self::optional(canvas, "Telefon", client.phone.as_deref());
        canvas.labeled(BODY_SIZE, "Kennzeichen", &client.plate);

        if record.vehicle.has_any() {
            self.heading(canvas, "Fahrzeugdaten");
            let vehicle = &record.vehicle;
            Self::optional(canvas, "Kilometerstand", vehicle.odometer.as_deref());
            Self::optional(canvas, "Bereifung", vehicle.tires.as_deref());
            Self::optional(canvas, "FIN", vehicle.vin.as_deref());
        }

        self.heading(canvas, "Unfalldaten");
        let incident = &record.incident;
        canvas.labeled(BODY_SIZE, "Datum", &incident.date_display());
        Self::optional(canvas, "Uhrzeit", incident.time.as_deref());
        canvas.labeled(BODY_SIZE, "Ort", &incident.location);
        if let Some(description) = incident.description.as_deref() {
            canvas.advance(4.0);
            canvas.line(Font::Bold, BODY_SIZE, "Unfallhergang:");
            self.paragraph(canvas, description);
        }

        if let Some(notes) = record.notes.as_deref() {
            self.heading(canvas, "Bemerkungen");
            self.paragraph(canvas, notes);
        }
    }

    fn paragraph(&self, canvas: &mut Canvas, text: &str) {
        for line in wrap(text, chars_per_line(CONTENT_WIDTH, BODY_SIZE)) {
            canvas.line(Font::Regular, BODY_SIZE, &line);
        }
    }

    fn closing(&self, canvas: &mut Canvas, record: &SubmissionRecord, signature: Option<&SignatureImage>) {
        if canvas.cursor() > CLOSING_BLOCK_THRESHOLD {
            canvas.new_page();
        }

        let date = self
            .issue_date
            .unwrap_or_else(|| Local::now().date_naive())
            .format("%d.%m.%Y");

        canvas.advance(24.0);
        canvas.labeled(
            BODY_SIZE,
            "Ort, Datum",
            &format!("{}, {}", record.incident.location, date),
        );
        canvas.advance(6.0);

        let top = canvas.cursor();
        if let Some(signature) = signature {
            let (width, height) = signature.fit_within(SIGNATURE_MAX_WIDTH, SIGNATURE_MAX_HEIGHT);
            // bottom-align the image on the signature line
            let offset = SIGNATURE_MAX_HEIGHT - height;
            canvas.image(SIGNATURE_RESOURCE, SIGNATURE_X, top + offset, width, height);
        }
        canvas.advance(SIGNATURE_MAX_HEIGHT + 4.0);
        canvas.rule(SIGNATURE_X, SIGNATURE_X + SIGNATURE_MAX_WIDTH + 45.0);
        canvas.advance(4.0);
        canvas.text_at(Font::Regular, 8.0, SIGNATURE_X, "Unterschrift Auftraggeber");
        canvas.advance(12.0);
    }

    fn assemble(
        &self,
        canvas: Canvas,
        signature: Option<&SignatureImage>,
    ) -> Result<Vec<u8>, RenderError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! {
                Font::Regular.resource_name() => regular_id,
                Font::Bold.resource_name() => bold_id,
            },
        };
        if let Some(signature) = signature {
            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => signature.width as i64,
                    "Height" => signature.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                signature.rgb.clone(),
            );
            let image_id = doc.add_object(image);
            resources.set(
                "XObject",
                dictionary! { SIGNATURE_RESOURCE => image_id },
            );
        }
        let resources_id = doc.add_object(resources);

        let mut kids: Vec<Object> = Vec::new();
        for operations in canvas.into_pages() {
            let content = Content { operations }
                .encode()
                .map_err(|e| RenderError::Encode(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let media_box: Vec<Object> = vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()];
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => media_box,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl DocumentRenderer for PdfRenderer {
    #[instrument(skip_all, fields(order_number = %record.order_number))]
    fn render(&self, record: &SubmissionRecord) -> Result<RenderedDocument, RenderError> {
        let signature = record
            .signature
            .as_deref()
            .and_then(|uri| match decode_data_uri(uri) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "Signature could not be decoded, rendering without it");
                    None
                }
            });

        let mut canvas = Canvas::new();
        self.letterhead(&mut canvas);
        self.body(&mut canvas, record);
        self.closing(&mut canvas, record, signature.as_ref());

        let page_count = canvas.page_count();
        let bytes = self.assemble(canvas, signature.as_ref())?;

        debug!(pages = page_count, size = bytes.len(), "Document rendered");

        Ok(RenderedDocument {
            file_name: document_file_name(&record.order_number),
            bytes,
            page_count,
            signature_embedded: signature.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::tests::sample_data_uri;
    use gutachten_common::submission::{fields as names, FormFields};

    fn record(extra: &[(&str, &str)]) -> SubmissionRecord {
        let mut fields: FormFields = [
            (names::ORDER_NUMBER, "GA-2025-42"),
            (names::CLIENT_NAME, "Max Müller"),
            (names::CLIENT_ADDRESS, "Teststraße 1, 33602 Bielefeld"),
            (names::CLIENT_CONTACT, "max@test.de / 0151123456"),
            (names::CLIENT_PLATE, "BI-XX 123"),
            (names::INCIDENT_DATE, "2025-01-01"),
            (names::INCIDENT_LOCATION, "Bielefeld"),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra {
            fields.insert(*k, *v);
        }
        SubmissionRecord::from_fields(&fields).unwrap()
    }

    fn renderer() -> PdfRenderer {
        PdfRenderer::with_issue_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
    }

    fn image_count(bytes: &[u8]) -> usize {
        let doc = Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .filter(|obj| match obj {
                Object::Stream(stream) => matches!(
                    stream.dict.get(b"Subtype"),
                    Ok(Object::Name(name)) if name == b"Image"
                ),
                _ => false,
            })
            .count()
    }

    #[test]
    fn test_renders_single_page_pdf() {
        let doc = renderer().render(&record(&[])).unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.file_name, "Gutachten_GA-2025-42.pdf");
        assert!(!doc.signature_embedded);

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_long_description_paginates() {
        let description = "Der Unfallgegner fuhr beim Abbiegen auf das stehende Fahrzeug auf.\n".repeat(80);
        let doc = renderer()
            .render(&record(&[(names::INCIDENT_DESCRIPTION, description.as_str())]))
            .unwrap();
        assert!(doc.page_count > 1);

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), doc.page_count);
    }

    #[test]
    fn test_closing_block_moves_to_new_page() {
        // pushes the cursor past the closing threshold but not off page one
        let description = "Zeile\n".repeat(25);
        let doc = renderer()
            .render(&record(&[(names::INCIDENT_DESCRIPTION, description.as_str())]))
            .unwrap();
        assert_eq!(doc.page_count, 2);
    }

    #[test]
    fn test_signature_is_embedded() {
        let uri = sample_data_uri();
        let doc = renderer()
            .render(&record(&[(names::SIGNATURE, uri.as_str())]))
            .unwrap();
        assert!(doc.signature_embedded);
        assert_eq!(image_count(&doc.bytes), 1);
    }

    #[test]
    fn test_bad_signature_does_not_abort() {
        let doc = renderer()
            .render(&record(&[(names::SIGNATURE, "data:image/png;base64,kaputt")]))
            .unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert!(!doc.signature_embedded);
        assert_eq!(image_count(&doc.bytes), 0);
    }

    #[test]
    fn test_optional_sections_render() {
        let doc = renderer()
            .render(&record(&[
                (names::VEHICLE_VIN, "WVWZZZ1JZXW000001"),
                (names::VEHICLE_ODOMETER, "120000"),
                (names::INCIDENT_TIME, "14:30"),
                (names::NOTES, "Rückruf erbeten"),
                (names::CESSION, "ja"),
            ]))
            .unwrap();
        assert!(doc.size() > 0);
        assert_eq!(doc.page_count, 1);
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(document_file_name("GA/2025 7"), "Gutachten_GA_2025_7.pdf");
        assert_eq!(document_file_name("../x"), "Gutachten____x.pdf");
    }
}
