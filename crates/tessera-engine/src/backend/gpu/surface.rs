use std::sync::Arc;

use winit::window::Window;

use crate::coords::Viewport;
use crate::error::RenderError;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Out of memory; the draw fails with an allocation error.
    Fatal,
}

/// A window surface bound to one canvas.
pub(crate) struct BoundSurface {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    /// wgpu refuses 0x0 configurations; stays `false` until a non-empty size arrives.
    pub configured: bool,
}

impl BoundSurface {
    pub fn configure(&mut self, device: &wgpu::Device, viewport: Viewport) {
        if viewport.is_empty() {
            self.configured = false;
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        self.surface.configure(device, &self.config);
        self.configured = true;
    }

    pub fn handle_error(
        &mut self,
        device: &wgpu::Device,
        err: wgpu::SurfaceError,
    ) -> SurfaceErrorAction {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                if self.configured {
                    self.surface.configure(device, &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(f) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Some(f);
        }
    }

    caps.formats.first().copied()
}

/// Translucent canvases need a premultiplied compositor mode; opaque ones ask
/// for `Opaque` so the compositor can skip blending.
pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    translucent: bool,
) -> wgpu::CompositeAlphaMode {
    let wanted: &[wgpu::CompositeAlphaMode] = if translucent {
        &[wgpu::CompositeAlphaMode::PreMultiplied, wgpu::CompositeAlphaMode::PostMultiplied]
    } else {
        &[wgpu::CompositeAlphaMode::Opaque]
    };

    wanted
        .iter()
        .copied()
        .find(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn surface_allocation_error(err: impl std::fmt::Display) -> RenderError {
    RenderError::allocation(format!("window surface: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: &[wgpu::TextureFormat], alpha: &[wgpu::CompositeAlphaMode]) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats: formats.to_vec(),
            alpha_modes: alpha.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn srgb_format_preferred_when_available() {
        let c = caps(
            &[wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8UnormSrgb],
            &[],
        );
        assert_eq!(choose_surface_format(&c, true), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(choose_surface_format(&c, false), Some(wgpu::TextureFormat::Bgra8Unorm));
        assert_eq!(choose_surface_format(&caps(&[], &[]), true), None);
    }

    #[test]
    fn alpha_mode_follows_translucency() {
        let c = caps(
            &[],
            &[wgpu::CompositeAlphaMode::Opaque, wgpu::CompositeAlphaMode::PreMultiplied],
        );
        assert_eq!(choose_alpha_mode(&c, true), wgpu::CompositeAlphaMode::PreMultiplied);
        assert_eq!(choose_alpha_mode(&c, false), wgpu::CompositeAlphaMode::Opaque);

        let opaque_only = caps(&[], &[wgpu::CompositeAlphaMode::Opaque]);
        assert_eq!(choose_alpha_mode(&opaque_only, true), wgpu::CompositeAlphaMode::Opaque);
        assert_eq!(choose_alpha_mode(&caps(&[], &[]), false), wgpu::CompositeAlphaMode::Auto);
    }
}
