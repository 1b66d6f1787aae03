use std::path::Path;
use std::sync::Arc;

use crate::color::Color;
use crate::context::{Context, ContextParams};
use crate::foundation::core::{Point, Rect};
use crate::foundation::error::{StrataError, StrataResult};
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{TaskGraph, TaskId, TaskKind, TaskSurface};
use crate::surface::{Interpolation, Surface};
use crate::{layer_common, param};

/// A bitmap file stretched from `tl` (its first pixel) to `br`.
#[derive(Clone, Debug)]
pub struct Import {
    base: LayerBase,
    pub composite: Composite,
    pub tl: Point,
    pub br: Point,
    filename: String,
    surface: Option<Arc<Surface>>,
}

impl Default for Import {
    fn default() -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::default(),
            tl: Point::new(-0.5, 0.5),
            br: Point::new(0.5, -0.5),
            filename: String::new(),
            surface: None,
        }
    }
}

impl ParamTable for Import {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Import>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("tl", tl),
            param!("br", br),
            ParamDesc {
                name: "filename",
                get: |l| Value::String(l.filename.clone()),
                set: |l, v| {
                    l.load(String::try_from(v)?);
                    Ok(())
                },
            },
        ];
        TABLE
    }
}

fn read_bitmap(path: &Path) -> StrataResult<Surface> {
    let bytes = std::fs::read(path)
        .map_err(|e| StrataError::resource(format!("read '{}': {e}", path.display())))?;
    Surface::decode(&bytes)
}

impl Import {
    /// An import layer showing `surface` directly.
    pub fn from_surface(surface: Surface, tl: Point, br: Point) -> Self {
        Self {
            tl,
            br,
            surface: Some(Arc::new(surface)),
            ..Self::default()
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn surface(&self) -> Option<&Arc<Surface>> {
        self.surface.as_ref()
    }

    /// Replaces the bitmap with the file at `filename`. Unreadable files leave the layer
    /// transparent.
    pub fn load(&mut self, filename: String) {
        self.surface = None;
        if !filename.is_empty() {
            match read_bitmap(Path::new(&filename)) {
                Ok(s) => self.surface = Some(Arc::new(s)),
                Err(e) => tracing::warn!(file = %filename, error = %e, "import failed, layer left empty"),
            }
        }
        self.filename = filename;
    }

    fn task(&self, interpolation: Interpolation) -> Option<TaskSurface> {
        let surface = self.surface.clone()?;
        Some(TaskSurface::between(surface, self.tl, self.br, interpolation))
    }

    fn own_color(&self, pos: Point) -> Color {
        let Some(t) = self.task(Interpolation::Linear) else {
            return Color::alpha();
        };
        if t.bounds().area() <= 0.0 {
            return Color::alpha();
        }
        let (u, v) = t.pixel_coords(pos);
        t.surface.sampler(t.interpolation).sample(u, v)
    }
}

impl Layer for Import {
    layer_common!("import");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.composite.blend(self.own_color(pos), context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self
            .task(Interpolation::Nearest)
            .map_or(Rect::ZERO, |t| t.bounds());
        self.composite.full_bounding_rect(own, context)
    }

    fn build_composite_task(&self, _params: &ContextParams, graph: &mut TaskGraph) -> Option<TaskId> {
        let t = self.task(graph.interpolation())?;
        Some(graph.add_leaf(TaskKind::Surface(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_renders_transparent() {
        let mut layer = Import::default();
        layer
            .set_param("filename", Value::String("/nonexistent/strata.png".into()))
            .unwrap();
        assert!(layer.surface().is_none());
        assert_eq!(layer.filename(), "/nonexistent/strata.png");
        let ctx = Context::empty(ContextParams::default(), 0);
        assert_eq!(layer.get_color(&ctx, Point::ZERO), Color::alpha());
        let mut graph = TaskGraph::new();
        assert!(layer.build_composite_task(ctx.params(), &mut graph).is_none());
    }

    #[test]
    fn surface_maps_onto_its_rectangle() {
        let s = Surface::from_fn(2, 1, |x, _| if x == 0 { Color::red() } else { Color::blue() });
        let layer = Import::from_surface(s, Point::new(0.0, 0.0), Point::new(2.0, 1.0));
        let ctx = Context::empty(ContextParams::default(), 0);
        assert_eq!(layer.get_color(&ctx, Point::new(0.5, 0.5)), Color::red());
        assert_eq!(layer.get_color(&ctx, Point::new(1.5, 0.5)), Color::blue());
        assert_eq!(layer.get_full_bounding_rect(&ctx), Rect::new(0.0, 0.0, 2.0, 1.0));
    }

    #[test]
    fn first_row_sits_at_the_top_corner() {
        let s = Surface::from_fn(1, 2, |_, y| if y == 0 { Color::red() } else { Color::blue() });
        let layer = Import::from_surface(s, Point::new(0.0, 1.0), Point::new(1.0, 0.0));
        let ctx = Context::empty(ContextParams::default(), 0);
        assert_eq!(layer.get_color(&ctx, Point::new(0.5, 0.75)), Color::red());
        assert_eq!(layer.get_color(&ctx, Point::new(0.5, 0.25)), Color::blue());
        assert_eq!(layer.get_full_bounding_rect(&ctx), Rect::new(0.0, 0.0, 1.0, 1.0));

        let mut graph = TaskGraph::new();
        let id = layer.build_composite_task(ctx.params(), &mut graph).unwrap();
        let TaskKind::Surface(t) = &graph.get(id).unwrap().kind else {
            panic!("expected a surface leaf");
        };
        assert_eq!(t.pixel_coords(Point::new(0.5, 0.75)), (0.5, 0.5));
    }
}
