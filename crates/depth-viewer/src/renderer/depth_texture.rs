//! Ingests per-frame 16-bit depth images into an RG8 GPU texture.

use artrack::{DepthImage, DepthUnavailable};

/// Placeholder allocation used until the first real depth image arrives, so
/// every bind group referencing the texture is valid from frame one. Matches
/// the depth stream resolution of common tracking stacks.
const DEFAULT_SIZE: (u32, u32) = (160, 120);

/// Owns the GPU depth texture and keeps it in sync with the frame source.
///
/// The texture packs each 16-bit millimetre value across the R (low byte)
/// and G (high byte) channels; shaders reconstruct it from normalized
/// samples. The allocation is reused across frames and replaced only when
/// the incoming image dimensions differ.
pub struct DepthTextureIngestor {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    /// Bumped whenever the texture is re-allocated; consumers key their
    /// bind groups on this and rebuild when it moves.
    generation: u64,
}

impl DepthTextureIngestor {
    pub fn new(device: &wgpu::Device) -> Self {
        let (texture, view) = allocate(device, DEFAULT_SIZE.0, DEFAULT_SIZE.1);
        Self {
            texture,
            view,
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
            generation: 0,
        }
    }

    /// Uploads this tick's depth image.
    ///
    /// `DepthUnavailable` is an expected, frequent condition near session
    /// start: the previously published texture stays untouched and remains
    /// correct enough for occlusion at display rate. Must run on the thread
    /// owning `queue`.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        depth: Result<DepthImage, DepthUnavailable>,
    ) -> Result<(), DepthUnavailable> {
        let image = depth?;

        if needs_realloc((self.width, self.height), (image.width, image.height)) {
            log::info!(
                "depth texture re-allocated: {}x{} -> {}x{}",
                self.width,
                self.height,
                image.width,
                image.height
            );
            let (texture, view) = allocate(device, image.width, image.height);
            self.texture = texture;
            self.view = view;
            self.width = image.width;
            self.height = image.height;
            self.generation += 1;
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 2),
                rows_per_image: Some(image.height),
            },
            wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Published dimensions of the current allocation.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn allocate(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Ingest Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rg8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// True when the incoming image cannot reuse the current allocation.
fn needs_realloc(current: (u32, u32), incoming: (u32, u32)) -> bool {
    current != incoming
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realloc_only_on_dimension_change() {
        assert!(!needs_realloc((160, 120), (160, 120)));
        assert!(needs_realloc((160, 120), (320, 240)));
        assert!(needs_realloc((160, 120), (120, 160)));
    }
}
