//! Frame capture to a numbered PNG sequence.

use std::path::{Path, PathBuf};

use futures_intrusive::channel::shared::oneshot_channel;

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};

/// Row pitch for a texture-to-buffer copy, padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * bytes_per_pixel).div_ceil(align) * align
}

/// Strip row padding from a readback buffer.
pub fn depad_rows(data: &[u8], tight_bpr: usize, padded_bpr: usize, height: usize) -> Vec<u8> {
    let mut tight = Vec::with_capacity(tight_bpr * height);
    for row in 0..height {
        let start = row * padded_bpr;
        tight.extend_from_slice(&data[start..start + tight_bpr]);
    }
    tight
}

pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// `None` means the `map_async` callback was dropped without running.
fn mapping_result(received: Option<Result<(), wgpu::BufferAsyncError>>) -> RenderResult<()> {
    received
        .ok_or_else(|| RenderError::Capture("map_async callback dropped".to_string()))?
        .map_err(|e| RenderError::Capture(e.to_string()))
}

pub fn frame_file_name(frame: u32) -> String {
    format!("output{:04}.png", frame)
}

/// Writes the presented frame to `dir/outputNNNN.png` while enabled.
#[derive(Debug, Clone)]
pub struct FrameCapture {
    enabled: bool,
    frame_number: u32,
    dir: PathBuf,
}

impl FrameCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: false,
            frame_number: 0,
            dir: dir.into(),
        }
    }

    /// Toggle capture; the frame counter restarts at zero either way.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.frame_number = 0;
        self.enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&mut self) -> PathBuf {
        let path = self.dir.join(frame_file_name(self.frame_number));
        self.frame_number += 1;
        path
    }

    /// Read back `texture` and write it as the next PNG. Returns the written path.
    pub fn capture(&mut self, ctx: &RenderContext, texture: &wgpu::Texture) -> RenderResult<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let swizzle = match texture.format() {
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            other => return Err(RenderError::Capture(format!("unsupported format {:?}", other))),
        };
        let (width, height) = (texture.width(), texture.height());
        let padded_bpr = padded_bytes_per_row(width, 4);
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Staging"),
            size: padded_bpr as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device.poll(wgpu::Maintain::Wait);
        mapping_result(pollster::block_on(receiver.receive()))?;

        let mut pixels = {
            let data = slice.get_mapped_range();
            depad_rows(&data, width as usize * 4, padded_bpr as usize, height as usize)
        };
        staging.unmap();
        if swizzle {
            bgra_to_rgba(&mut pixels);
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| RenderError::Capture(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.next_path();
        let image = image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Capture("readback size mismatch".to_string()))?;
        image
            .save(&path)
            .map_err(|e| RenderError::Capture(format!("{}: {}", path.display(), e)))?;
        log::debug!("Captured {}", path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(800, 4), 3328);
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
    }

    #[test]
    fn depad_drops_row_tails() {
        let data = [1, 2, 9, 9, 3, 4, 9, 9];
        assert_eq!(depad_rows(&data, 2, 4, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn swizzle_swaps_red_and_blue() {
        let mut px = [10, 20, 30, 255, 1, 2, 3, 4];
        bgra_to_rgba(&mut px);
        assert_eq!(px, [30, 20, 10, 255, 3, 2, 1, 4]);
    }

    #[test]
    fn mapped_buffer_reports_ok() {
        let (sender, receiver) = oneshot_channel::<Result<(), wgpu::BufferAsyncError>>();
        assert!(sender.send(Ok(())).is_ok());
        assert!(mapping_result(pollster::block_on(receiver.receive())).is_ok());
    }

    #[test]
    fn dropped_callback_is_a_capture_error() {
        let (sender, receiver) = oneshot_channel::<Result<(), wgpu::BufferAsyncError>>();
        drop(sender);
        let err = mapping_result(pollster::block_on(receiver.receive())).unwrap_err();
        assert!(matches!(err, RenderError::Capture(_)));
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(frame_file_name(0), "output0000.png");
        assert_eq!(frame_file_name(42), "output0042.png");
    }

    #[test]
    fn toggle_restarts_numbering() {
        let mut capture = FrameCapture::new("result");
        assert!(capture.toggle());
        assert_eq!(capture.next_path(), Path::new("result").join("output0000.png"));
        assert_eq!(capture.next_path(), Path::new("result").join("output0001.png"));
        assert!(!capture.toggle());
        assert!(capture.toggle());
        assert_eq!(capture.next_path(), Path::new("result").join("output0000.png"));
    }
}
