//! Step text and proof-of-concept images for one finding instance.
//!
//! Two placements exist. When the steps marker sits inside a text box in the
//! cell, the images go into that text box and the step text goes into the cell
//! itself. Otherwise each step is written into the cell followed by its image.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::config::ImageSize;
use crate::docx::body::{
    RunStyle, element_at, element_at_mut, empty_paragraph, for_each_paragraph_mut,
    paragraph_with, text_box_paths, text_run,
};
use crate::docx::{A, PIC, R, W, WP};
use crate::model::Finding;
use crate::xml::Element;

use super::placeholder::STEPS_MARKERS;
use super::{Context, Warning, text};

const PICTURE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

/// Formats Word renders inline.
const EMBEDDABLE: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

struct StepImage {
    path: PathBuf,
    data: Vec<u8>,
    format: ImageFormat,
}

pub(crate) fn has_steps_marker(el: &Element) -> bool {
    let mut found = false;
    el.walk(&mut |e| {
        if !found && e.is(W, "p") {
            let content = text::logical_text(e);
            found = STEPS_MARKERS.iter().any(|m| content.contains(m));
        }
    });
    found
}

fn clear_markers(el: &mut Element) {
    for_each_paragraph_mut(el, &mut |p| {
        for marker in STEPS_MARKERS {
            text::replace(p, marker, "");
        }
    });
}

/// Drop the runs of every paragraph holding a steps marker.
fn clear_marker_paragraphs(el: &mut Element) {
    for_each_paragraph_mut(el, &mut |p| {
        let content = text::logical_text(p);
        if STEPS_MARKERS.iter().any(|m| content.contains(m)) {
            text::clear_runs(p);
        }
    });
}

fn asset_folder(finding: &Finding, ctx: &Context) -> Option<PathBuf> {
    let base = ctx.config.asset_base.as_deref()?;
    match &finding.poc_folder {
        Some(folder) => {
            let direct = base.join(folder);
            if direct.is_dir() {
                Some(direct)
            } else {
                ctx.resolver.resolve(base, folder)
            }
        }
        None => ctx.resolver.resolve(base, &finding.id),
    }
}

fn load_image(path: &Path, ctx: &mut Context) -> Option<StepImage> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Could not read {}: {e}", path.display());
            ctx.outcome.warnings.push(Warning::UnreadableImage {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
            return None;
        }
    };
    let reason = match image::guess_format(&data) {
        Ok(format) if EMBEDDABLE.contains(&format) => {
            return Some(StepImage {
                path: path.to_path_buf(),
                data,
                format,
            });
        }
        Ok(format) => format!("{format:?} images are not supported in documents"),
        Err(e) => e.to_string(),
    };
    log::warn!("Skipping {}: {reason}", path.display());
    ctx.outcome.warnings.push(Warning::UnreadableImage {
        path: path.to_path_buf(),
        reason,
    });
    None
}

/// `<folder>/<n>.<ext>` for each step, trying the configured extensions in order.
fn step_images(finding: &Finding, folder: Option<&Path>, ctx: &mut Context) -> Vec<Option<StepImage>> {
    let mut images = Vec::with_capacity(finding.steps.len());
    for step in 1..=finding.steps.len() {
        let found = folder.and_then(|dir| {
            ctx.config
                .image_extensions
                .iter()
                .map(|ext| dir.join(format!("{step}.{ext}")))
                .find(|p| p.is_file())
        });
        match found {
            Some(path) => images.push(load_image(&path, ctx)),
            None => {
                log::debug!("No image for {} step {step}", finding.id);
                if folder.is_some() {
                    ctx.outcome.warnings.push(Warning::MissingImage {
                        finding: finding.id.clone(),
                        step,
                    });
                }
                images.push(None);
            }
        }
    }
    images
}

/// An inline picture run at the configured fixed size.
fn picture_run(rid: &str, id: u32, name: &str, size: ImageSize) -> Element {
    let cx = size.width_emu.to_string();
    let cy = size.height_emu.to_string();

    let pic = Element::new(PIC, "pic")
        .declaring(PIC)
        .with_child(
            Element::new(PIC, "nvPicPr")
                .with_child(
                    Element::new(PIC, "cNvPr")
                        .with_plain_attr("id", "0")
                        .with_plain_attr("name", name),
                )
                .with_child(Element::new(PIC, "cNvPicPr")),
        )
        .with_child(
            Element::new(PIC, "blipFill")
                .with_child(Element::new(A, "blip").with_attr(R, "embed", rid))
                .with_child(Element::new(A, "stretch").with_child(Element::new(A, "fillRect"))),
        )
        .with_child(
            Element::new(PIC, "spPr")
                .with_child(
                    Element::new(A, "xfrm")
                        .with_child(
                            Element::new(A, "off")
                                .with_plain_attr("x", "0")
                                .with_plain_attr("y", "0"),
                        )
                        .with_child(
                            Element::new(A, "ext")
                                .with_plain_attr("cx", cx.as_str())
                                .with_plain_attr("cy", cy.as_str()),
                        ),
                )
                .with_child(
                    Element::new(A, "prstGeom")
                        .with_plain_attr("prst", "rect")
                        .with_child(Element::new(A, "avLst")),
                ),
        );

    let inline = Element::new(WP, "inline")
        .declaring(A)
        .with_plain_attr("distT", "0")
        .with_plain_attr("distB", "0")
        .with_plain_attr("distL", "0")
        .with_plain_attr("distR", "0")
        .with_child(
            Element::new(WP, "extent")
                .with_plain_attr("cx", cx.as_str())
                .with_plain_attr("cy", cy.as_str()),
        )
        .with_child(
            Element::new(WP, "docPr")
                .with_plain_attr("id", id.to_string())
                .with_plain_attr("name", format!("Picture {id}")),
        )
        .with_child(
            Element::new(WP, "cNvGraphicFramePr").with_child(
                Element::new(A, "graphicFrameLocks").with_plain_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(
            Element::new(A, "graphic").with_child(
                Element::new(A, "graphicData")
                    .with_plain_attr("uri", PICTURE_URI)
                    .with_child(pic),
            ),
        );

    Element::new(W, "r").with_child(Element::new(W, "drawing").with_child(inline))
}

/// Embed the image in the package and return the paragraph showing it.
fn image_paragraph(image: StepImage, ctx: &mut Context) -> Option<Element> {
    let extension = image.format.extensions_str().first()?;
    let name = image
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    let rid = ctx
        .package
        .add_image(image.data, extension, image.format.to_mime_type());
    let id = ctx.package.next_drawing_id();
    ctx.outcome.images_inserted += 1;
    log::debug!("Embedded {} as {rid}", image.path.display());
    Some(paragraph_with(picture_run(&rid, id, &name, ctx.config.image_size)))
}

fn step_paragraph(n: usize, step: &str, font: Option<&str>) -> Element {
    paragraph_with(text_run(
        &format!("Step {n}: {step}"),
        RunStyle {
            bold: true,
            font,
            ..Default::default()
        },
    ))
}

/// Replace the steps marker in `cell` with the finding's steps and images.
pub(crate) fn insert_steps(cell: &mut Element, finding: &Finding, ctx: &mut Context) {
    let folder = asset_folder(finding, ctx);
    let images = step_images(finding, folder.as_deref(), ctx);
    let config = ctx.config;
    let font = config.value_font.as_deref();

    let containers: Vec<Vec<usize>> = text_box_paths(cell)
        .into_iter()
        .filter(|path| element_at(cell, path).is_some_and(has_steps_marker))
        .collect();

    if !finding.steps.is_empty() && folder.is_some() && !containers.is_empty() {
        log::debug!("Placing {} images for {} in a text box", images.len(), finding.id);
        for path in &containers {
            if let Some(container) = element_at_mut(cell, path) {
                clear_marker_paragraphs(container);
            }
        }
        let mut pictures = Vec::new();
        for image in images.into_iter().flatten() {
            if let Some(p) = image_paragraph(image, ctx) {
                if !pictures.is_empty() {
                    pictures.push(paragraph_with(Element::new(W, "r")));
                }
                pictures.push(p);
            }
        }
        if let Some(container) = element_at_mut(cell, &containers[0]) {
            for p in pictures {
                container.push(p);
            }
        }
        clear_markers(cell);
        let count = finding.steps.len();
        for (i, step) in finding.steps.iter().enumerate() {
            cell.push(step_paragraph(i + 1, step, font));
            if i + 1 < count {
                cell.push(empty_paragraph());
            }
        }
        return;
    }

    clear_markers(cell);
    let count = finding.steps.len();
    for (i, (step, image)) in finding.steps.iter().zip(images).enumerate() {
        cell.push(step_paragraph(i + 1, step, font));
        if let Some(p) = image.and_then(|img| image_paragraph(img, ctx)) {
            cell.push(p);
        }
        if i + 1 < count {
            cell.push(empty_paragraph());
        }
    }
}
