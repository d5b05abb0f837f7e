/// Paints: solid colors, gradients and image patterns

use glam::{Affine2, Vec2};

use crate::vg::color::Color;
use crate::vg::types::ImageId;

/// Half-extent used to turn a linear gradient into a very large box gradient
const LINEAR_GRADIENT_LARGE: f32 = 1e5;

/// How a fill or stroke is colored
///
/// Every paint is a rounded-box gradient in its own space: `xform` maps
/// paint space to user space, `extent` is the box half-size, `radius` its
/// corner radius and `feather` the blur width between `inner_color` and
/// `outer_color`. An image pattern samples `image` over `extent` instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub xform: Affine2,
    pub extent: Vec2,
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<ImageId>,
}

impl Paint {
    /// Uniform color
    pub fn color(color: Color) -> Self {
        Self {
            xform: Affine2::IDENTITY,
            extent: Vec2::ZERO,
            radius: 0.0,
            feather: 1.0,
            inner_color: color,
            outer_color: color,
            image: None,
        }
    }

    /// Linear gradient from `start` (inner color) to `end` (outer color)
    pub fn linear_gradient(start: Vec2, end: Vec2, inner: Color, outer: Color) -> Self {
        let delta = end - start;
        let length = delta.length();
        let dir = if length > 0.0001 { delta / length } else { Vec2::Y };

        let xform = Affine2::from_cols_array(&[
            dir.y,
            -dir.x,
            dir.x,
            dir.y,
            start.x - dir.x * LINEAR_GRADIENT_LARGE,
            start.y - dir.y * LINEAR_GRADIENT_LARGE,
        ]);

        Self {
            xform,
            extent: Vec2::new(LINEAR_GRADIENT_LARGE, LINEAR_GRADIENT_LARGE + length * 0.5),
            radius: 0.0,
            feather: length.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Radial gradient around `center` between two radii
    pub fn radial_gradient(center: Vec2, inner_radius: f32, outer_radius: f32, inner: Color, outer: Color) -> Self {
        let radius = (inner_radius + outer_radius) * 0.5;
        Self {
            xform: Affine2::from_translation(center),
            extent: Vec2::splat(radius),
            radius,
            feather: (outer_radius - inner_radius).max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Feathered rounded rectangle, useful for drop shadows
    pub fn box_gradient(
        origin: Vec2,
        size: Vec2,
        radius: f32,
        feather: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        Self {
            xform: Affine2::from_translation(origin + size * 0.5),
            extent: size * 0.5,
            radius,
            feather: feather.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Image repeated over a `size` rectangle whose corner is `origin`, rotated by `angle`
    pub fn image_pattern(origin: Vec2, size: Vec2, angle: f32, image: ImageId, alpha: f32) -> Self {
        let mut xform = Affine2::from_angle(angle);
        xform.translation = origin;
        let tint = Color::rgbaf(1.0, 1.0, 1.0, alpha);
        Self {
            xform,
            extent: size,
            radius: 0.0,
            feather: 0.0,
            inner_color: tint,
            outer_color: tint,
            image: Some(image),
        }
    }

    /// Paint with both colors' alpha multiplied by `alpha`
    pub(crate) fn with_alpha_scale(mut self, alpha: f32) -> Self {
        self.inner_color.a *= alpha;
        self.outer_color.a *= alpha;
        self
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self::color(Color::BLACK)
    }
}
