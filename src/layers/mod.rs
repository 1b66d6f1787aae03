//! The layer catalogue and a name-based constructor.

mod bevel;
mod blur;
mod checkerboard;
mod color;
mod distort;
mod fractal;
mod import;
mod motion_blur;
mod outline;
mod region;
mod skeleton;
mod solid_color;
mod transform;

pub use bevel::Bevel;
pub use blur::{Blur, RadialBlur};
pub use checkerboard::Checkerboard;
pub use color::{Clamp, ColorCorrect, Halftone, LumaKey};
pub use distort::{CurveWarp, SphereDistort, Twirl, Warp};
pub use fractal::{Escape, Julia, Mandelbrot, Shading};
pub use import::Import;
pub use motion_blur::{MotionBlur, PULL_QUALITY, Subsampling};
pub use outline::Outline;
pub use region::Region;
pub use skeleton::{Bone, BoneShape, SkeletonDeformation};
pub use solid_color::SolidColor;
pub use transform::{Rotate, Stretch, Translate};

use crate::foundation::error::{StrataError, StrataResult};
use crate::layer::param::params_from_json;
use crate::layer::{Duplicate, Layer, PasteCanvas, Switch};

/// Registry names accepted by [`create_layer`].
pub const LAYER_NAMES: &[&str] = &[
    "bevel",
    "blur",
    "checkerboard",
    "clamp",
    "color_correct",
    "curve_warp",
    "duplicate",
    "group",
    "halftone",
    "import",
    "julia",
    "luma_key",
    "mandelbrot",
    "motion_blur",
    "outline",
    "polygon",
    "radial_blur",
    "region",
    "rotate",
    "skeleton_deformation",
    "solid_color",
    "spherize",
    "stretch",
    "switch",
    "translate",
    "twirl",
    "warp",
];

/// A layer of kind `name` with default parameters.
///
/// Older spellings (`paste_canvas`, `sphere_distort`, `SolidColor`, ...) are accepted.
pub fn create_layer(name: &str) -> StrataResult<Box<dyn Layer>> {
    let layer: Box<dyn Layer> = match name {
        "bevel" => Box::new(Bevel::default()),
        "blur" => Box::new(Blur::default()),
        "checkerboard" | "checker_board" => Box::new(Checkerboard::default()),
        "clamp" => Box::new(Clamp::default()),
        "color_correct" | "colorcorrect" => Box::new(ColorCorrect::default()),
        "curve_warp" | "curvewarp" => Box::new(CurveWarp::default()),
        "duplicate" => Box::new(Duplicate::default()),
        "group" | "paste_canvas" | "PasteCanvas" => Box::new(PasteCanvas::default()),
        "halftone" | "halftone3" => Box::new(Halftone::default()),
        "import" => Box::new(Import::default()),
        "julia" => Box::new(Julia::default()),
        "luma_key" | "lumakey" => Box::new(LumaKey::default()),
        "mandelbrot" => Box::new(Mandelbrot::default()),
        "motion_blur" | "MotionBlur" => Box::new(MotionBlur::default()),
        "outline" => Box::new(Outline::default()),
        "polygon" => Box::new(Region::polygon_default()),
        "radial_blur" => Box::new(RadialBlur::default()),
        "region" => Box::new(Region::default()),
        "rotate" => Box::new(Rotate::default()),
        "skeleton_deformation" => Box::new(SkeletonDeformation::default()),
        "solid_color" | "SolidColor" => Box::new(SolidColor::default()),
        "spherize" | "sphere_distort" => Box::new(SphereDistort::default()),
        "stretch" => Box::new(Stretch::default()),
        "switch" => Box::new(Switch::default()),
        "translate" => Box::new(Translate::default()),
        "twirl" => Box::new(Twirl::default()),
        "warp" => Box::new(Warp::default()),
        _ => {
            return Err(StrataError::validation(format!(
                "unknown layer kind '{name}'"
            )));
        }
    };
    Ok(layer)
}

/// [`create_layer`] followed by parameters from a JSON object keyed by parameter name.
pub fn create_layer_from_json(
    name: &str,
    version: Option<&str>,
    params: &serde_json::Value,
) -> StrataResult<Box<dyn Layer>> {
    let mut layer = create_layer(name)?;
    params_from_json(layer.as_mut(), version, params)?;
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_name_constructs() {
        for name in LAYER_NAMES {
            let layer = create_layer(name).unwrap();
            assert!(layer.base().active, "{name}");
            for p in layer.param_names() {
                assert!(layer.get_param(p).is_some(), "{name}.{p}");
            }
        }
        assert_eq!(create_layer("paste_canvas").unwrap().name(), "group");
        assert_eq!(create_layer("polygon").unwrap().name(), "region");
        assert!(create_layer("nope").is_err());
    }

    #[test]
    fn parameters_round_trip_through_the_table() {
        for name in LAYER_NAMES {
            let mut layer = create_layer(name).unwrap();
            for p in layer.param_names() {
                let v = layer.get_param(p).unwrap();
                layer.set_param(p, v.clone()).unwrap();
                assert_eq!(layer.get_param(p), Some(v), "{name}.{p}");
            }
        }
    }
}
