//! Light sources
//!
//! Lamps do not produce geometry. Drawing a lamp loads its parameters into the
//! light unit the World assigned to it for the current membership.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::foundation::collections::EntityId;
use crate::foundation::math::{transform_point, Color, Mat4, Vec3};
use crate::scene::entity::attached_matrix;
use crate::scene::part::{replace_attachment, scrub};
use crate::scene::{AttachRef, DrawContext, Drawable, DualBuffer, EntityCore, Part, UpdateFlags};

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampKind {
    /// Parallel rays along `direction`
    Directional,
    /// Omnidirectional source at `position`
    Point,
    /// Cone from `position` along `direction`
    Spot,
}

/// Distance falloff coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }
}

/// Everything a backend needs to configure one light unit
#[derive(Debug, Clone, PartialEq)]
pub struct LampParams {
    /// Light kind
    pub kind: LampKind,
    /// Position (point and spot lamps)
    pub position: Vec3,
    /// Direction (directional and spot lamps)
    pub direction: Vec3,
    /// Ambient contribution
    pub ambient: Color,
    /// Diffuse contribution
    pub diffuse: Color,
    /// Specular contribution
    pub specular: Color,
    /// Distance falloff
    pub attenuation: Attenuation,
    /// Cone half-angle in degrees (spot lamps)
    pub spot_cutoff: f32,
    /// Intensity falloff inside the cone (spot lamps)
    pub spot_exponent: f32,
}

impl LampParams {
    /// Directional light shining along `direction`
    pub fn directional(direction: Vec3, color: Color) -> Self {
        Self {
            kind: LampKind::Directional,
            position: Vec3::zeros(),
            direction: normalized_or_down(direction),
            ambient: Color::BLACK,
            diffuse: color,
            specular: color,
            attenuation: Attenuation::default(),
            spot_cutoff: 180.0,
            spot_exponent: 0.0,
        }
    }

    /// Point light at `position`
    pub fn point(position: Vec3, color: Color) -> Self {
        Self { kind: LampKind::Point, position, ..Self::directional(-Vec3::z(), color) }
    }

    /// Spot light at `position` aimed along `direction`
    pub fn spot(position: Vec3, direction: Vec3, color: Color, cutoff: f32) -> Self {
        Self {
            kind: LampKind::Spot,
            position,
            direction: normalized_or_down(direction),
            spot_cutoff: cutoff.clamp(0.0, 90.0),
            ..Self::directional(direction, color)
        }
    }

    /// Parameters after applying an attach overlay
    fn transformed(&self, matrix: &Mat4) -> Self {
        let direction = matrix.transform_vector(&self.direction);
        Self {
            position: transform_point(matrix, &self.position),
            direction: normalized_or_down(direction),
            ..self.clone()
        }
    }
}

fn normalized_or_down(direction: Vec3) -> Vec3 {
    direction.try_normalize(1e-6).unwrap_or_else(|| -Vec3::y())
}

#[derive(Debug, Clone)]
struct LampAttributes {
    params: LampParams,
    attached: Option<AttachRef>,
}

/// A light source
pub struct Lamp {
    core: EntityCore,
    attrs: DualBuffer<LampAttributes>,
}

impl Lamp {
    /// Create a shared lamp
    pub fn new(name: impl Into<String>, params: LampParams) -> Arc<Self> {
        Arc::new(Self {
            core: EntityCore::new(name),
            attrs: DualBuffer::new(LampAttributes { params, attached: None }),
        })
    }

    /// Stable identifier
    pub fn id(&self) -> EntityId {
        self.core.id()
    }

    /// Lamp name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Raw parameters
    pub fn params(&self) -> LampParams {
        self.attrs.with_raw(|attrs| attrs.params.clone())
    }

    /// Raw attach link
    pub fn attached(&self) -> Option<AttachRef> {
        self.attrs.with_raw(|attrs| attrs.attached.clone())
    }

    /// Replace all parameters
    pub fn set_params(&self, params: LampParams) -> bool {
        self.change_params(|current| {
            if *current == params {
                return false;
            }
            *current = params;
            true
        })
    }

    /// Move the lamp
    pub fn set_position(&self, position: Vec3) -> bool {
        self.change_params(|params| {
            if params.position == position {
                return false;
            }
            params.position = position;
            true
        })
    }

    /// Re-aim the lamp
    pub fn set_direction(&self, direction: Vec3) -> bool {
        let direction = normalized_or_down(direction);
        self.change_params(|params| {
            if params.direction == direction {
                return false;
            }
            params.direction = direction;
            true
        })
    }

    /// Set ambient, diffuse and specular contributions
    pub fn set_colors(&self, ambient: Color, diffuse: Color, specular: Color) -> bool {
        self.change_params(|params| {
            if (params.ambient, params.diffuse, params.specular) == (ambient, diffuse, specular) {
                return false;
            }
            params.ambient = ambient;
            params.diffuse = diffuse;
            params.specular = specular;
            true
        })
    }

    /// Set distance falloff
    pub fn set_attenuation(&self, attenuation: Attenuation) -> bool {
        self.change_params(|params| {
            if params.attenuation == attenuation {
                return false;
            }
            params.attenuation = attenuation;
            true
        })
    }

    /// Set cone cutoff (degrees) and exponent
    pub fn set_spot(&self, cutoff: f32, exponent: f32) -> bool {
        let cutoff = cutoff.clamp(0.0, 90.0);
        self.change_params(|params| {
            if params.spot_cutoff == cutoff && params.spot_exponent == exponent {
                return false;
            }
            params.spot_cutoff = cutoff;
            params.spot_exponent = exponent;
            true
        })
    }

    fn change_params(&self, apply: impl FnOnce(&mut LampParams) -> bool) -> bool {
        let changed = self.attrs.modify(|attrs| apply(&mut attrs.params));
        if changed {
            self.core.mark(UpdateFlags::LIGHTING);
        }
        changed
    }

    /// Carry the lamp along with `target`
    pub fn attach(&self, target: &Arc<Part>) -> bool {
        let link = AttachRef::new(target);
        self.change_attachment(|slot| replace_attachment(slot, Some(link)))
    }

    /// Drop any attach overlay
    pub fn detach(&self) -> bool {
        self.change_attachment(|slot| replace_attachment(slot, None))
    }

    /// Drop the attach overlay if it points at one of `removed`
    pub fn scrub_attachment(&self, removed: &HashSet<EntityId>) -> bool {
        self.change_attachment(|slot| scrub(slot, removed))
    }

    fn change_attachment(&self, apply: impl FnOnce(&mut Option<AttachRef>) -> bool) -> bool {
        let changed = self.attrs.modify(|attrs| apply(&mut attrs.attached));
        if changed {
            self.core.mark(UpdateFlags::ATTACHMENT);
        }
        changed
    }

    /// Pure parameters in world space
    pub fn world_params(&self) -> LampParams {
        let attrs = self.attrs.pure();
        match &attrs.attached {
            Some(link) => attrs.params.transformed(&attached_matrix(Some(link))),
            None => attrs.params.clone(),
        }
    }
}

impl Drawable for Lamp {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn synchronize_self(&self) -> bool {
        let flags = self.core.synchronize();
        self.attrs.update() || !flags.is_empty()
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        ctx.backend.debug_marker(self.name());
        ctx.backend.apply_lamp(ctx.light_unit, &self.world_params());
    }

    fn is_visible(&self) -> bool {
        !self.core.is_hidden_pure()
    }
}

impl fmt::Debug for Lamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lamp")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .finish()
    }
}
