// ============================================================================
// IO — image loading, PNG/JPEG export, and native file dialogs
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use rfd::FileDialog;

/// Raster formats the open dialog offers.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tga", "gif"];

/// Synchronously load any supported image as RGBA.  Used by both the CLI
/// path and the GUI after the dialog returns.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

/// Encode and write an image to a file, format chosen by extension
/// (PNG unless the path says .jpg/.jpeg).  Standalone so it can run on a
/// background thread.
pub fn encode_and_write(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => {
            // JPEG has no alpha; composite assumes an opaque page
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, 90);
            encoder.encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )?;
        }
        _ => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}

/// Native open dialog for a source photo.
pub fn pick_image_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Native save dialog for the composed page.
pub fn pick_save_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("PNG Image", &["png"])
        .add_filter("JPEG Image", &["jpg", "jpeg"])
        .set_file_name("fortune-teller.png")
        .save_file()
}
