use super::{MAX_TARGET_DIM, SubCoords, Task, snap_to_grid};
use crate::foundation::core::{
    Point, Rect, Vec2, rect_expand_point, rect_intersect, rect_is_finite, rect_is_valid,
};
use crate::surface::Interpolation;

/// Triangle with deformed world `positions` and bind-pose texture coordinates `tex`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshTriangle {
    pub positions: [Point; 3],
    pub tex: [Point; 3],
}

fn signed_area(p: &[Point; 3]) -> f64 {
    0.5 * ((p[1] - p[0]).cross(p[2] - p[0]))
}

fn bbox(points: &[Point]) -> Rect {
    points
        .iter()
        .fold(Rect::ZERO, |acc, p| rect_expand_point(acc, *p))
}

impl MeshTriangle {
    pub fn new(positions: [Point; 3], tex: [Point; 3]) -> Self {
        Self { positions, tex }
    }

    /// Barycentric weights of `p`, or `None` when outside or degenerate.
    pub fn barycentric(&self, p: Point) -> Option<[f64; 3]> {
        const EPS: f64 = 1e-12;
        let [a, b, c] = self.positions;
        let area = (b - a).cross(c - a);
        if !area.is_finite() || area.abs() < EPS {
            return None;
        }
        let w0 = (b - p).cross(c - p) / area;
        let w1 = (c - p).cross(a - p) / area;
        let w2 = 1.0 - w0 - w1;
        let tol = -1e-9;
        (w0 >= tol && w1 >= tol && w2 >= tol).then_some([w0, w1, w2])
    }

    pub fn tex_at(&self, w: [f64; 3]) -> Point {
        let [a, b, c] = self.tex;
        Point::new(
            a.x * w[0] + b.x * w[1] + c.x * w[2],
            a.y * w[0] + b.y * w[1] + c.y * w[2],
        )
    }
}

/// Renders its texture sub-task through a triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskMesh {
    pub triangles: Vec<MeshTriangle>,
    pub interpolation: Interpolation,
}

impl TaskMesh {
    pub fn new(triangles: Vec<MeshTriangle>, interpolation: Interpolation) -> Self {
        Self {
            triangles,
            interpolation,
        }
    }

    /// Texture point shown at world point `p`. Later triangles cover earlier ones.
    pub fn point(&self, p: Point) -> Option<Point> {
        self.triangles
            .iter()
            .rev()
            .find_map(|t| t.barycentric(p).map(|w| t.tex_at(w)))
    }

    pub fn bounds(&self) -> Rect {
        let all: Vec<Point> = self.triangles.iter().flat_map(|t| t.positions).collect();
        bbox(&all)
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        let visible: Vec<&MeshTriangle> = self
            .triangles
            .iter()
            .filter(|t| rect_is_valid(&rect_intersect(bbox(&t.positions), task.source_rect)))
            .collect();
        let tex: Vec<Point> = visible.iter().flat_map(|t| t.tex).collect();
        let want = bbox(&tex);

        // Finest texture density any visible triangle needs.
        let ratio = visible
            .iter()
            .filter_map(|t| {
                let k = (signed_area(&t.tex) / signed_area(&t.positions)).abs().sqrt();
                (k.is_finite() && k > 0.0).then_some(k)
            })
            .fold(f64::INFINITY, f64::min);
        let parent_px = task.pixel_size();
        let mut px = if ratio.is_finite() {
            Vec2::new(parent_px.x * ratio, parent_px.y * ratio)
        } else {
            parent_px
        };
        let margin = f64::from(self.interpolation.margin() + 1);

        subs.iter()
            .map(|b| {
                let want = rect_intersect(want, *b);
                if !rect_is_finite(&want) {
                    return None;
                }
                let limit = f64::from(MAX_TARGET_DIM) - 2.0 * margin - 2.0;
                let k = (want.width() / px.x / limit).max(want.height() / px.y / limit);
                if k > 1.0 {
                    px *= k;
                }
                snap_to_grid(
                    want.inflate(margin * px.x, margin * px.y),
                    Point::ZERO,
                    px,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(offset: Vec2) -> Vec<MeshTriangle> {
        let p = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let d = |q: Point| q + offset;
        vec![
            MeshTriangle::new([d(p[0]), d(p[1]), d(p[2])], [p[0], p[1], p[2]]),
            MeshTriangle::new([d(p[0]), d(p[2]), d(p[3])], [p[0], p[2], p[3]]),
        ]
    }

    #[test]
    fn translated_mesh_maps_back_to_bind_pose() {
        let mesh = TaskMesh::new(quad(Vec2::new(2.0, 0.0)), Interpolation::Linear);
        let t = mesh.point(Point::new(2.25, 0.75)).unwrap();
        assert!((t - Point::new(0.25, 0.75)).hypot() < 1e-12);
        assert_eq!(mesh.point(Point::new(0.5, 0.5)), None);
        assert_eq!(mesh.bounds(), Rect::new(2.0, 0.0, 3.0, 1.0));
    }

    #[test]
    fn degenerate_triangle_is_skipped() {
        let flat = MeshTriangle::new(
            [Point::ZERO, Point::new(1.0, 0.0), Point::new(2.0, 0.0)],
            [Point::ZERO; 3],
        );
        assert_eq!(flat.barycentric(Point::new(0.5, 0.0)), None);
    }
}
