//! Procedural background: floating H₂ molecules and an energy particle cloud.
//!
//! Purely decorative. Nothing here is pickable or tied to ledger data; the
//! scene controller owns the meshes and releases them with the rest of the
//! scene.
//!
//! Motion per element, keyed by its index `i` and the global clock:
//! - Rotation: constant increment, slightly faster for higher `i`
//! - Bob: `sin(phase + i)` vertical drift around the spawn point
//! - Pulse: `1 + 0.1·sin(2·phase + i)` uniform scale

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BackgroundParams;
use crate::render::mesh::{Geometry, Mesh, MeshHandle, MeshStore, Transform};
use crate::render::rgba;

/// Clock multiplier turning elapsed seconds into motion phase.
const PHASE_RATE: f32 = 0.6;

const MOLECULE_SPIN: f32 = 0.3;
const MOLECULE_SPIN_STEP: f32 = 0.006;
const MOLECULE_BOB: f32 = 0.12;
const MOLECULE_SWAY: f32 = 0.06;
const PULSE: f32 = 0.1;

const PARTICLE_BOB: f32 = 0.06;
const PARTICLE_SWAY: f32 = 0.03;
const CLOUD_SPIN: f32 = 0.06;

#[derive(Debug, Clone)]
struct Molecule {
    handle: MeshHandle,
    home: Vec3,
}

#[derive(Debug, Clone)]
struct ParticleCloud {
    handle: MeshHandle,
    home: Vec<Vec3>,
}

/// Handles and spawn state for the decorative field.
#[derive(Debug, Clone, Default)]
pub struct ProceduralBackground {
    molecules: Vec<Molecule>,
    cloud: Option<ParticleCloud>,
}

impl ProceduralBackground {
    /// Scatter molecules and particles into `store`. Same seed, same field.
    pub fn generate(params: &BackgroundParams, store: &mut MeshStore) -> Self {
        if !params.enabled {
            return Self::default();
        }
        let mut rng = StdRng::seed_from_u64(params.seed);

        let atom_color = rgba(0x22c55e, 0.8);
        let bond_color = rgba(0x06b6d4, 0.4);

        let molecules = (0..params.molecule_count)
            .map(|_| {
                let home = scatter(&mut rng, params.molecule_extent);
                let rotation = Vec3::new(
                    rng.random_range(0.0..std::f32::consts::PI),
                    rng.random_range(0.0..std::f32::consts::PI),
                    rng.random_range(0.0..std::f32::consts::PI),
                );
                let mesh = Mesh::new(
                    Geometry::Molecule {
                        atom_radius: 0.08,
                        separation: 0.3,
                        bond_radius: 0.02,
                        bond_color,
                    },
                    atom_color,
                    Transform {
                        position: home,
                        rotation,
                        scale: 1.0,
                    },
                );
                Molecule {
                    handle: store.insert(mesh),
                    home,
                }
            })
            .collect();

        let cloud = (params.particle_count > 0).then(|| {
            let mut home = Vec::with_capacity(params.particle_count);
            let mut colors = Vec::with_capacity(params.particle_count);
            for _ in 0..params.particle_count {
                home.push(scatter(&mut rng, params.particle_extent));
                // Green-blue band
                let hue = rng.random_range(0.3..0.4);
                colors.push(hsl_to_rgb(hue, 0.8, 0.6));
            }
            let mesh = Mesh::new(
                Geometry::Points {
                    positions: home.clone(),
                    colors,
                    size_px: 2.0,
                },
                [1.0, 1.0, 1.0, 0.8],
                Transform::default(),
            );
            ParticleCloud {
                handle: store.insert(mesh),
                home,
            }
        });

        log::debug!(
            "background generated: {} molecules, {} particles",
            params.molecule_count,
            params.particle_count
        );
        Self { molecules, cloud }
    }

    /// Advance every element to `elapsed`; `dt` drives the rotation increments.
    pub fn animate(&self, store: &mut MeshStore, elapsed: f32, dt: f32) {
        let phase = elapsed * PHASE_RATE;

        for (i, m) in self.molecules.iter().enumerate() {
            let Some(mesh) = store.get_mut(m.handle) else {
                continue;
            };
            let fi = i as f32;
            let t = &mut mesh.transform;
            let spin = MOLECULE_SPIN + fi * MOLECULE_SPIN_STEP;
            t.rotation.x += spin * dt;
            t.rotation.y += (spin + 0.18) * dt;
            t.position = m.home
                + Vec3::new(
                    (phase * 0.7 + fi).cos() * MOLECULE_SWAY,
                    (phase + fi).sin() * MOLECULE_BOB,
                    0.0,
                );
            t.scale = 1.0 + (phase * 2.0 + fi).sin() * PULSE;
        }

        if let Some(cloud) = &self.cloud {
            if let Some(mesh) = store.get_mut(cloud.handle) {
                mesh.transform.rotation.y += CLOUD_SPIN * dt;
                if let Geometry::Points { positions, .. } = &mut mesh.geometry {
                    for (i, (p, home)) in positions.iter_mut().zip(&cloud.home).enumerate() {
                        let k = i as f32 * 0.1;
                        p.x = home.x + (phase * 0.5 + k).cos() * PARTICLE_SWAY;
                        p.y = home.y + (phase + k).sin() * PARTICLE_BOB;
                    }
                }
            }
        }
    }

    pub fn handles(&self) -> impl Iterator<Item = MeshHandle> + '_ {
        self.molecules
            .iter()
            .map(|m| m.handle)
            .chain(self.cloud.as_ref().map(|c| c.handle))
    }

    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    pub fn particle_count(&self) -> usize {
        self.cloud.as_ref().map_or(0, |c| c.home.len())
    }
}

/// Uniform point in a cube of edge `extent` centred on the origin.
fn scatter(rng: &mut StdRng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.random_range(-0.5..0.5) * extent,
        rng.random_range(-0.5..0.5) * extent,
        rng.random_range(-0.5..0.5) * extent,
    )
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |mut t: f32| {
        t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    [channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(store: &MeshStore, bg: &ProceduralBackground) -> Vec<Vec3> {
        bg.handles()
            .map(|h| store.get(h).unwrap().transform.position)
            .collect()
    }

    #[test]
    fn generates_configured_counts_within_volume() {
        let params = BackgroundParams::default();
        let mut store = MeshStore::new();
        let bg = ProceduralBackground::generate(&params, &mut store);
        assert_eq!(bg.molecule_count(), 40);
        assert_eq!(bg.particle_count(), 200);
        assert_eq!(store.len(), 41);

        let half = params.molecule_extent * 0.5;
        for m in &bg.molecules {
            assert!(m.home.abs().max_element() <= half);
        }
        let half = params.particle_extent * 0.5;
        let cloud = bg.cloud.as_ref().unwrap();
        assert!(cloud.home.iter().all(|p| p.abs().max_element() <= half));
    }

    #[test]
    fn same_seed_same_field() {
        let params = BackgroundParams::default();
        let mut a = MeshStore::new();
        let mut b = MeshStore::new();
        let bg_a = ProceduralBackground::generate(&params, &mut a);
        let bg_b = ProceduralBackground::generate(&params, &mut b);
        assert_eq!(positions(&a, &bg_a), positions(&b, &bg_b));
    }

    #[test]
    fn disabled_background_is_empty() {
        let params = BackgroundParams {
            enabled: false,
            ..Default::default()
        };
        let mut store = MeshStore::new();
        let bg = ProceduralBackground::generate(&params, &mut store);
        assert!(store.is_empty());
        assert_eq!(bg.handles().count(), 0);
    }

    #[test]
    fn motion_stays_near_home_and_desynchronizes() {
        let params = BackgroundParams {
            particle_count: 0,
            ..Default::default()
        };
        let mut store = MeshStore::new();
        let bg = ProceduralBackground::generate(&params, &mut store);
        bg.animate(&mut store, 1.5, 0.016);

        let scales: Vec<f32> = bg
            .handles()
            .map(|h| store.get(h).unwrap().transform.scale)
            .collect();
        assert!(scales.iter().all(|s| (0.89..=1.11).contains(s)));
        assert_ne!(scales[0], scales[1]);

        for m in &bg.molecules {
            let p = store.get(m.handle).unwrap().transform.position;
            assert!((p - m.home).length() <= MOLECULE_BOB + MOLECULE_SWAY + 1e-5);
        }
    }

    #[test]
    fn hsl_primaries() {
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-5 && red[1].abs() < 1e-5 && red[2].abs() < 1e-5);
        let green = hsl_to_rgb(1.0 / 3.0, 1.0, 0.5);
        assert!((green[1] - 1.0).abs() < 1e-5);
    }
}
