//! Surface materials and the pairwise contact coefficient tables.

/// Surface material of a body. Each pair of materials indexes the
/// restitution and friction tables below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Material {
    #[default]
    Steel,
    Wood,
    Rubber,
    Plastic,
    Stone,
}

pub const MATERIAL_COUNT: usize = 5;

/// Coefficient of restitution per material pair. Symmetric, values in [0, 1].
const RESTITUTION: [[f32; MATERIAL_COUNT]; MATERIAL_COUNT] = [
    [0.60, 0.40, 0.75, 0.55, 0.45],
    [0.40, 0.35, 0.65, 0.45, 0.30],
    [0.75, 0.65, 0.85, 0.70, 0.60],
    [0.55, 0.45, 0.70, 0.50, 0.40],
    [0.45, 0.30, 0.60, 0.40, 0.25],
];

/// Static friction coefficient per material pair. Symmetric, values in [0, 1].
const STATIC_FRICTION: [[f32; MATERIAL_COUNT]; MATERIAL_COUNT] = [
    [0.45, 0.50, 0.80, 0.40, 0.55],
    [0.50, 0.55, 0.85, 0.45, 0.60],
    [0.80, 0.85, 0.95, 0.75, 0.90],
    [0.40, 0.45, 0.75, 0.35, 0.50],
    [0.55, 0.60, 0.90, 0.50, 0.70],
];

/// Dynamic friction coefficient per material pair. Symmetric, values in
/// [0, 1], everywhere below the static table.
const DYNAMIC_FRICTION: [[f32; MATERIAL_COUNT]; MATERIAL_COUNT] = [
    [0.30, 0.35, 0.65, 0.28, 0.40],
    [0.35, 0.40, 0.70, 0.32, 0.45],
    [0.65, 0.70, 0.80, 0.60, 0.75],
    [0.28, 0.32, 0.60, 0.25, 0.35],
    [0.40, 0.45, 0.75, 0.35, 0.55],
];

impl Material {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Restitution for a contact between two materials.
#[inline]
pub fn restitution(a: Material, b: Material) -> f32 {
    RESTITUTION[a.index()][b.index()]
}

/// Static friction for a contact between two materials.
#[inline]
pub fn static_friction(a: Material, b: Material) -> f32 {
    STATIC_FRICTION[a.index()][b.index()]
}

/// Dynamic friction for a contact between two materials.
#[inline]
pub fn dynamic_friction(a: Material, b: Material) -> f32 {
    DYNAMIC_FRICTION[a.index()][b.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Material; MATERIAL_COUNT] = [
        Material::Steel,
        Material::Wood,
        Material::Rubber,
        Material::Plastic,
        Material::Stone,
    ];

    #[test]
    fn test_tables_symmetric() {
        for a in ALL {
            for b in ALL {
                assert_eq!(restitution(a, b), restitution(b, a));
                assert_eq!(static_friction(a, b), static_friction(b, a));
                assert_eq!(dynamic_friction(a, b), dynamic_friction(b, a));
            }
        }
    }

    #[test]
    fn test_tables_in_unit_range() {
        for a in ALL {
            for b in ALL {
                for value in [
                    restitution(a, b),
                    static_friction(a, b),
                    dynamic_friction(a, b),
                ] {
                    assert!((0.0..=1.0).contains(&value));
                }
            }
        }
    }

    #[test]
    fn test_dynamic_below_static() {
        for a in ALL {
            for b in ALL {
                assert!(dynamic_friction(a, b) < static_friction(a, b));
            }
        }
    }
}
