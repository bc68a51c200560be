//! PNG export with the view state embedded as tEXt chunks.

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use tilebrot_core::ViewState;

use crate::error::RenderError;
use crate::surface::RenderBuffer;

const SOFTWARE: &str = "Tilebrot";

/// Write a composited buffer as an RGBA PNG.
///
/// The view is stored both as the query string (`Tilebrot.View`) and as
/// individual fields so the image can be reopened at the same spot.
pub fn export_png(buffer: &RenderBuffer, view: &ViewState, path: &Path) -> crate::Result<()> {
    if buffer.width == 0 || buffer.height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: buffer.width,
            height: buffer.height,
        });
    }

    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), SOFTWARE.to_string())?;
    encoder.add_text_chunk("Description".to_string(), describe(view))?;
    for (key, value) in metadata_pairs(buffer, view) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&buffer.to_rgba_bytes())?;

    debug!(
        width = buffer.width,
        height = buffer.height,
        path = %path.display(),
        "Exported PNG"
    );
    Ok(())
}

fn describe(view: &ViewState) -> String {
    format!(
        "Mandelbrot - Center: {} {}i, Units/pixel: {}, Iterations: {}",
        view.center_x, view.center_y, view.scale, view.max_iterations
    )
}

fn metadata_pairs(buffer: &RenderBuffer, view: &ViewState) -> Vec<(String, String)> {
    vec![
        ("Tilebrot.View".into(), view.to_query()),
        ("Tilebrot.CenterRe".into(), view.center_x.to_string()),
        ("Tilebrot.CenterIm".into(), view.center_y.to_string()),
        ("Tilebrot.Scale".into(), view.scale.to_string()),
        ("Tilebrot.MaxIterations".into(), view.max_iterations.to_string()),
        (
            "Tilebrot.Resolution".into(),
            format!("{}x{}", buffer.width, buffer.height),
        ),
    ]
}
