//! Low-level PDF assembly via `lopdf`.
//!
//! Each frame becomes one page whose media box matches the frame's
//! pixel dimensions exactly; the frame itself is embedded as a
//! zlib-compressed DeviceRGB image XObject painted over the full page.
//! Writing is create-or-append: an existing document at the output
//! path gains pages at the end of its page tree, a missing one is
//! created first.

use std::io::Write as _;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::PdfError;

/// Appends `frames` as pages to the PDF at `path`, in order.
///
/// The document is loaded (or created), extended, and saved back in
/// one shot; on any error the file keeps its previous contents and the
/// caller keeps its batch.
pub fn append_frames(frames: &[DynamicImage], path: &Path) -> Result<(), PdfError> {
    if frames.is_empty() {
        return Ok(());
    }

    let mut doc = if path.exists() {
        log::debug!(
            "Appending {} page(s) to existing PDF {}",
            frames.len(),
            path.display()
        );
        Document::load(path)?
    } else {
        log::debug!("Creating PDF {}", path.display());
        new_document()
    };

    let pages_id = pages_root(&doc)?;

    let mut new_kids = Vec::with_capacity(frames.len());
    for frame in frames {
        new_kids.push(Object::Reference(append_page(&mut doc, pages_id, frame)?));
    }

    let added = new_kids.len() as i64;
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    let count = pages.get(b"Count").and_then(|c| c.as_i64()).unwrap_or(0);
    pages.set("Count", count + added);
    pages.get_mut(b"Kids")?.as_array_mut()?.extend(new_kids);

    doc.save(path)?;
    Ok(())
}

/// Minimal empty document: a catalog pointing at an empty page tree.
fn new_document() -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(vec![]),
            "Count" => 0i64,
        }),
    );
    doc.trailer.set("Root", catalog_id);
    doc
}

/// The root page-tree node of `doc`.
fn pages_root(doc: &Document) -> Result<ObjectId, PdfError> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_object(root_id)?.as_dict()?;
    Ok(catalog.get(b"Pages")?.as_reference()?)
}

/// Adds one page carrying `frame` and returns its object id. The
/// caller is responsible for linking it into the page tree.
fn append_page(
    doc: &mut Document,
    pages_id: ObjectId,
    frame: &DynamicImage,
) -> Result<ObjectId, PdfError> {
    let width = frame.width() as i64;
    let height = frame.height() as i64;

    let image_id = doc.add_object(image_xobject(frame)?);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0i64.into(),
                    0i64.into(),
                    height.into(),
                    0i64.into(),
                    0i64.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0i64.into(), 0i64.into(), width.into(), height.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
        "Contents" => content_id,
    });
    Ok(page_id)
}

/// Frame pixels as a FlateDecode DeviceRGB image stream.
fn image_xobject(frame: &DynamicImage) -> Result<Stream, PdfError> {
    let rgb = frame.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw())?;
    let data = encoder.finish()?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        },
        data,
    ))
}
