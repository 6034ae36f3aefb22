use glam::Vec3;

/// Unpacks `0xRRGGBB` into sRGB-encoded components in `0.0..=1.0`.
pub fn rgb_from_hex(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Sky/ground gradient lighting, picked by the surface normal's Y.
    Hemisphere {
        sky: [f32; 3],
        ground: [f32; 3],
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
    },
}

impl Light {
    pub fn hemisphere(sky: u32, ground: u32, intensity: f32) -> Self {
        Light::Hemisphere {
            sky: rgb_from_hex(sky),
            ground: rgb_from_hex(ground),
            intensity,
        }
    }

    pub fn directional(color: u32, intensity: f32, position: Vec3) -> Self {
        Light::Directional {
            color: rgb_from_hex(color),
            intensity,
            position,
        }
    }

    /// Unit vector pointing from the surface towards the light.
    pub fn direction_to_light(&self) -> Option<Vec3> {
        match self {
            Light::Directional { position, .. } => position.try_normalize(),
            Light::Hemisphere { .. } => None,
        }
    }
}
