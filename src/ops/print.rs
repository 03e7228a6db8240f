// ============================================================================
// PRINT — save the composed page to a temp PNG and open with the OS viewer
// ============================================================================

use std::path::PathBuf;

use image::RgbaImage;

/// "Print" by saving the page raster to a temp file and handing it to the OS
/// default viewer, which owns the actual print dialog.
pub fn print_page(page: &RgbaImage) -> Result<(), String> {
    let path = std::env::temp_dir().join("foldfe_print.png");
    page.save(&path)
        .map_err(|e| format!("Failed to save print image: {}", e))?;
    open_with_os(&path)
}

#[cfg(target_os = "windows")]
fn open_with_os(path: &PathBuf) -> Result<(), String> {
    std::process::Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(path)
        .spawn()
        .map_err(|e| format!("Failed to open image: {}", e))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn open_with_os(path: &PathBuf) -> Result<(), String> {
    std::process::Command::new("open")
        .arg(path)
        .spawn()
        .map_err(|e| format!("Failed to open image: {}", e))?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_with_os(path: &PathBuf) -> Result<(), String> {
    std::process::Command::new("xdg-open")
        .arg(path)
        .spawn()
        .map_err(|e| format!("Failed to open image: {}", e))?;
    Ok(())
}
