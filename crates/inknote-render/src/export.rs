//! Page export: rasterize to PNG and wrap the raster in a one-page PDF.

use crate::raster::{CpuRaster, Surface};
use crate::scene::paint_page;
use crate::target::RenderResult;
use inknote_core::model::Page;

/// Default longest edge of a page thumbnail in pixels.
pub const THUMBNAIL_MAX_EDGE: u32 = 256;

/// Rasterize a full page at its native size.
///
/// The returned raster still accepts bitmap registrations, so hosts that
/// want images in the output register them before calling this.
pub fn rasterize_page(page: &Page, raster: &mut CpuRaster) {
    paint_page(raster, page);
}

/// Render a page and return it PNG-encoded at native size.
pub fn export_png(page: &Page) -> RenderResult<Vec<u8>> {
    let mut raster = CpuRaster::new(page.width.ceil() as u32, page.height.ceil() as u32)?;
    paint_page(&mut raster, page);
    encode_png(raster.surface())
}

/// Render a page, downscale to at most `max_edge` on the longest side and
/// return it PNG-encoded. Used for the page thumbnails pushed to the store.
pub fn page_thumbnail_png(page: &Page, max_edge: u32) -> RenderResult<Vec<u8>> {
    let mut raster = CpuRaster::new(page.width.ceil() as u32, page.height.ceil() as u32)?;
    paint_page(&mut raster, page);
    let surface = raster.into_surface();

    let scale = max_edge as f64 / page.width.max(page.height);
    if scale >= 1.0 {
        return encode_png(&surface);
    }
    let tw = ((page.width * scale).round() as u32).max(1);
    let th = ((page.height * scale).round() as u32).max(1);
    encode_png(&downsample(&surface, tw, th)?)
}

/// PNG-encode a surface.
pub fn encode_png(surface: &Surface) -> RenderResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, surface.width(), surface.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(surface.data())?;
        writer.finish()?;
    }
    Ok(out)
}

/// Box-filter downscale.
fn downsample(src: &Surface, width: u32, height: u32) -> RenderResult<Surface> {
    let sx = src.width() as f64 / width as f64;
    let sy = src.height() as f64 / height as f64;
    let mut data = vec![0u8; (width * height * 4) as usize];
    for y in 0..height {
        let row0 = (y as f64 * sy).floor() as u32;
        let row1 = (((y + 1) as f64 * sy).ceil() as u32).min(src.height()).max(row0 + 1);
        for x in 0..width {
            let col0 = (x as f64 * sx).floor() as u32;
            let col1 = (((x + 1) as f64 * sx).ceil() as u32).min(src.width()).max(col0 + 1);
            let mut acc = [0u64; 4];
            for ry in row0..row1 {
                for rx in col0..col1 {
                    let px = src.pixel(rx, ry);
                    acc[0] += px.r as u64;
                    acc[1] += px.g as u64;
                    acc[2] += px.b as u64;
                    acc[3] += px.a as u64;
                }
            }
            let count = ((row1 - row0) * (col1 - col0)) as u64;
            let i = ((y * width + x) * 4) as usize;
            for c in 0..4 {
                data[i + c] = (acc[c] / count) as u8;
            }
        }
    }
    Surface::from_raw(width, height, data)
}

/// Export a page as a minimal single-page PDF: the rasterized page embedded
/// as a DeviceRGB image XObject scaled to the media box.
pub fn export_pdf(page: &Page) -> RenderResult<Vec<u8>> {
    let mut raster = CpuRaster::new(page.width.ceil() as u32, page.height.ceil() as u32)?;
    paint_page(&mut raster, page);
    let surface = raster.into_surface();

    // Strip alpha; the raster is fully opaque after the background clear.
    let mut rgb = Vec::with_capacity((surface.width() * surface.height() * 3) as usize);
    for px in surface.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }

    let (w, h) = (page.width, page.height);
    let content = format!("q\n{w} 0 0 {h} 0 0 cm\n/Im0 Do\nQ\n");

    let mut pdf = Vec::new();
    let mut offsets = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");

    let push_obj = |pdf: &mut Vec<u8>, offsets: &mut Vec<usize>, body: &[u8]| {
        offsets.push(pdf.len());
        pdf.extend_from_slice(body);
    };

    push_obj(&mut pdf, &mut offsets, b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    push_obj(
        &mut pdf,
        &mut offsets,
        b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n",
    );
    push_obj(
        &mut pdf,
        &mut offsets,
        format!(
            "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] \
             /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>\nendobj\n"
        )
        .as_bytes(),
    );

    offsets.push(pdf.len());
    pdf.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length {} >>\nstream\n",
            surface.width(),
            surface.height(),
            rgb.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&rgb);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    push_obj(
        &mut pdf,
        &mut offsets,
        format!(
            "5 0 obj\n<< /Length {} >>\nstream\n{content}endstream\nendobj\n",
            content.len()
        )
        .as_bytes(),
    );

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            offsets.len() + 1
        )
        .as_bytes(),
    );
    Ok(pdf)
}
