//! Image-per-page PDF construction with lopdf.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// A page image ready to embed.
#[derive(Debug)]
pub(crate) struct PageImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) jpeg: Vec<u8>,
}

/// Decodes a captured page, flattens transparency onto white and re-encodes
/// it as JPEG at `quality`.
pub(crate) fn encode_page(raw: &[u8], quality: u8) -> Result<PageImage, image::ImageError> {
    let rgba = image::load_from_memory(raw)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.put_pixel(x, y, Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]));
    }

    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality))?;
    Ok(PageImage {
        width,
        height,
        jpeg,
    })
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u16::from(channel);
    let a = u16::from(alpha);
    let blended = (c * a + 255 * (255 - a) + 127) / 255;
    u8::try_from(blended).unwrap_or(u8::MAX)
}

/// Accumulates pages into a single-section document.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Appends a page sized to the image's pixel dimensions with the image
    /// covering it.
    pub(crate) fn add_image_page(&mut self, page: PageImage) {
        let width = i64::from(page.width);
        let height = i64::from(page.height);

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        ));

        let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q");
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let media_box = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ];
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => media_box,
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
        });
        self.kids.push(Object::Reference(page_id));
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Finishes the page tree and catalog.
    pub(crate) fn finish(mut self) -> Document {
        let count = i64::try_from(self.kids.len()).unwrap_or(i64::MAX);
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, pixel);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_over_white_blends() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(100, 255), 100);
        assert_eq!(over_white(0, 128), 127);
    }

    #[test]
    fn test_encode_page_keeps_dimensions_and_emits_jpeg() {
        let page = encode_page(&png(30, 20, Rgba([10, 20, 30, 255])), 90).unwrap();
        assert_eq!((page.width, page.height), (30, 20));
        assert_eq!(&page.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_page_rejects_non_image() {
        assert!(encode_page(b"not an image", 90).is_err());
    }

    #[test]
    fn test_builder_sets_media_box_per_page() {
        let mut builder = PdfBuilder::new();
        builder.add_image_page(encode_page(&png(30, 20, Rgba([0, 0, 0, 255])), 80).unwrap());
        builder.add_image_page(encode_page(&png(15, 40, Rgba([0, 0, 0, 0])), 80).unwrap());
        assert_eq!(builder.page_count(), 2);

        let mut doc = builder.finish();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        let pages = reloaded.get_pages();
        assert_eq!(pages.len(), 2);

        let widths: Vec<i64> = pages
            .values()
            .map(|id| {
                let page = reloaded.get_dictionary(*id).unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                media_box[2].as_i64().unwrap()
            })
            .collect();
        assert_eq!(widths, [30, 15]);
    }
}
