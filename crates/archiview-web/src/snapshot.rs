//! Still capture of the viewer canvas

use archiview_core::{EventEmitter, ImageFormat, ViewerEvent};
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use bevy::render::view::screenshot::{Screenshot, ScreenshotCaptured};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, warn};

use crate::viewer::BevyViewer;

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapshotRequest>().add_systems(
            Update,
            take_snapshot.after(crate::viewer::dispatch_viewer_commands),
        );
    }
}

#[derive(Resource, Default)]
pub struct SnapshotRequest {
    pub requested: Option<ImageFormat>,
}

fn take_snapshot(
    mut commands: Commands,
    mut request: ResMut<SnapshotRequest>,
    viewer: Res<BevyViewer>,
) {
    let Some(format) = request.requested.take() else {
        return;
    };
    let Some(emitter) = viewer.emitter().cloned() else {
        warn!("Snapshot requested without a model session");
        return;
    };

    debug!(token = %emitter.token(), "Capturing snapshot");
    commands
        .spawn(Screenshot::primary_window())
        .observe(move |captured: On<ScreenshotCaptured>| {
            deliver_capture(&emitter, format, &captured.image);
        });
}

fn deliver_capture(emitter: &EventEmitter, format: ImageFormat, image: &Image) {
    let size = image.texture_descriptor.size;
    let bgra = matches!(
        image.texture_descriptor.format,
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb
    );

    let result = match (format, image.data.as_deref()) {
        (ImageFormat::Png, Some(data)) => encode_png(size.width, size.height, bgra, data),
        (_, None) => Err("Screenshot contained no pixel data".to_string()),
    };
    if let Err(e) = &result {
        warn!(error = %e, "Snapshot encoding failed");
    }
    emitter.emit(ViewerEvent::Snapshot(result));
}

/// Encode 8-bit RGBA (or BGRA) pixels as PNG
pub fn encode_png(width: u32, height: u32, bgra: bool, data: &[u8]) -> Result<Vec<u8>, String> {
    let expected = width as usize * height as usize * 4;
    if data.len() != expected {
        return Err(format!(
            "Unexpected pixel buffer size {} for {}x{}",
            data.len(),
            width,
            height
        ));
    }

    let mut pixels = data.to_vec();
    if bgra {
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_png_header() {
        let data = vec![255u8; 2 * 3 * 4];
        let png = encode_png(2, 3, false, &data).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);
        // IHDR width and height
        assert_eq!(u32::from_be_bytes([png[16], png[17], png[18], png[19]]), 2);
        assert_eq!(u32::from_be_bytes([png[20], png[21], png[22], png[23]]), 3);
    }

    #[test]
    fn test_bgra_is_swizzled() {
        let bgra = [0u8, 0, 255, 255];
        let rgba = [255u8, 0, 0, 255];
        assert_eq!(
            encode_png(1, 1, true, &bgra).unwrap(),
            encode_png(1, 1, false, &rgba).unwrap()
        );
    }

    #[test]
    fn test_wrong_buffer_size() {
        assert!(encode_png(4, 4, false, &[0u8; 10]).is_err());
    }
}
