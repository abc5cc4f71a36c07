use crate::foundation::core::DocumentSource;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::surface::engine::{
    CaptureLane, LaneClock, RenderEngine, Surface, SurfaceSpec, fit_to_viewport,
};
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::time::Duration;

// Avoid pathological allocations for absurd viewport * scale combinations.
const MAX_DIM: u32 = 16_384;

/// In-process engine for static SVG documents, rasterized with `resvg`.
///
/// The document is laid out like a browser would show it: user units map 1:1 to CSS pixels,
/// the viewport clips at `(width, height)` and the canvas is white. SVG documents rendered this
/// way carry no timeline, so every simulated timestamp produces the same pixels.
#[derive(Clone, Debug, Default)]
pub struct SvgEngine {
    _priv: (),
}

impl SvgEngine {
    /// Create the engine. System fonts are loaded per opened document.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderEngine for SvgEngine {
    fn name(&self) -> &str {
        "svg"
    }

    fn open_surface(
        &self,
        spec: &SurfaceSpec,
        load_timeout: Duration,
    ) -> FramecastResult<Box<dyn Surface>> {
        let document = spec.source.to_string();
        let DocumentSource::File(path) = &spec.source else {
            return Err(FramecastError::load_failed(
                document,
                "the svg engine only loads local files",
            ));
        };

        let (sw, sh) = spec.scaled_size();
        if sw > MAX_DIM || sh > MAX_DIM {
            return Err(FramecastError::validation(format!(
                "scaled surface too large: {sw}x{sh} (max {MAX_DIM}x{MAX_DIM})"
            )));
        }

        let (tx, rx) = mpsc::channel();
        let path = path.clone();
        std::thread::Builder::new()
            .name("framecast-svg-load".to_string())
            .spawn(move || {
                let _ = tx.send(load_tree(&path));
            })
            .map_err(|e| FramecastError::load_failed(&document, format!("spawn loader: {e}")))?;

        let tree = match rx.recv_timeout(load_timeout) {
            Ok(res) => res.map_err(|reason| FramecastError::load_failed(&document, reason))?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(FramecastError::DocumentLoadTimeout {
                    document,
                    timeout: load_timeout,
                });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(FramecastError::load_failed(
                    document,
                    "svg loader thread exited without a result",
                ));
            }
        };

        Ok(Box::new(SvgSurface {
            tree: Arc::new(tree),
            spec: spec.clone(),
            clock: LaneClock::new(),
        }))
    }
}

struct SvgSurface {
    tree: Arc<usvg::Tree>,
    spec: SurfaceSpec,
    clock: LaneClock,
}

impl Surface for SvgSurface {
    fn advance_to(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()> {
        self.clock.set(lane, timestamp_ms)
    }

    fn capture_still(&self, lane: CaptureLane) -> FramecastResult<image::RgbaImage> {
        let _t = self.clock.get(lane)?;
        let (sw, sh) = self.spec.scaled_size();
        let mut pixmap = resvg::tiny_skia::Pixmap::new(sw, sh)
            .ok_or_else(|| FramecastError::validation("failed to allocate svg pixmap"))?;
        pixmap.fill(resvg::tiny_skia::Color::WHITE);

        let scale = self.spec.device_scale_factor as f32;
        let xform = resvg::tiny_skia::Transform::from_scale(scale, scale);
        resvg::render(&self.tree, xform, &mut pixmap.as_mut());

        // Opaque canvas: premultiplied and straight RGBA8 coincide.
        let img = image::RgbaImage::from_raw(sw, sh, pixmap.take())
            .ok_or_else(|| FramecastError::validation("svg pixmap size mismatch"))?;
        fit_to_viewport(img, &self.spec)
    }

    fn close(&mut self) -> FramecastResult<()> {
        Ok(())
    }
}

fn load_tree(path: &Path) -> Result<usvg::Tree, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("read '{}': {e}", path.display()))?;
    let resources_dir = std::path::absolute(path)
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    let fontdb = build_fontdb(resources_dir.as_deref());
    let opts = usvg::Options {
        resources_dir,
        fontdb,
        ..Default::default()
    };
    usvg::Tree::from_data(&bytes, &opts).map_err(|e| format!("parse svg: {e}"))
}

fn build_fontdb(resources_dir: Option<&Path>) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = resources_dir {
        load_fonts_from_dir(&mut db, dir);
        load_fonts_from_dir(&mut db, &dir.join("fonts"));
    }
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        let _ = db.load_font_file(&path);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/svg.rs"]
mod tests;
