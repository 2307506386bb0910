use crate::constants::*;
use crate::error::{LbError, LbResult};
use std::collections::BTreeMap;

// --------------------------------------------------------------- STRUCT: IndicatorCuboid

/// Axis-aligned box in lattice units. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorCuboid {
    extent: [Float; 3],
    origin: [Float; 3],
}

impl IndicatorCuboid {
    pub fn new(extent: [Float; 3], origin: [Float; 3]) -> Self {
        IndicatorCuboid { extent, origin }
    }

    /// # Examples
    /// ```
    /// # use lbtwophase::geometry::IndicatorCuboid;
    /// let bottom = IndicatorCuboid::new([13.0, 2.0, 13.0], [-2.0, -2.0, -2.0]);
    ///
    /// assert!(bottom.contains([0.0, 0.0, 0.0]));
    /// assert!(bottom.contains([10.0, 0.0, 10.0]));
    /// assert!(!bottom.contains([0.0, 1.0, 0.0]));
    /// ```
    pub fn contains(&self, point: [Float; 3]) -> bool {
        (0..3).all(|x| {
            point[x] >= self.origin[x] - INDICATOR_EPSILON
                && point[x] <= self.origin[x] + self.extent[x] + INDICATOR_EPSILON
        })
    }
}

// -------------------------------------------------------------------- STRUCT: RenameRule

/// Moves every voxel currently at `from` (and inside `indicator`, if any) to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameRule {
    pub from: MaterialId,
    pub to: MaterialId,
    pub indicator: Option<IndicatorCuboid>,
}

impl RenameRule {
    pub fn everywhere(from: MaterialId, to: MaterialId) -> Self {
        RenameRule {
            from,
            to,
            indicator: None,
        }
    }

    pub fn inside(from: MaterialId, to: MaterialId, indicator: IndicatorCuboid) -> Self {
        RenameRule {
            from,
            to,
            indicator: Some(indicator),
        }
    }
}

// ---------------------------------------------------------------------- STRUCT: Geometry

#[derive(Debug, Clone)]
pub struct Geometry {
    n: [usize; 3],
    periodic: [bool; 3],
    materials: Vec<MaterialId>,
}

impl Geometry {
    pub fn new(n: [usize; 3], periodic: [bool; 3]) -> Self {
        let num_voxels = n.iter().product::<usize>();
        Geometry {
            n,
            periodic,
            materials: vec![NO_DYNAMICS; num_voxels],
        }
    }

    pub fn get_n(&self) -> &[usize; 3] {
        &self.n
    }

    pub fn get_periodic(&self) -> &[bool; 3] {
        &self.periodic
    }

    pub fn get_number_of_voxels(&self) -> usize {
        self.materials.len()
    }

    pub fn get_index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.n[0] * (y + self.n[1] * z)
    }

    pub fn get_position(&self, index: usize) -> [usize; 3] {
        let x = index % self.n[0];
        let y = (index / self.n[0]) % self.n[1];
        let z = index / (self.n[0] * self.n[1]);
        [x, y, z]
    }

    pub fn get_material(&self, x: usize, y: usize, z: usize) -> MaterialId {
        self.materials[self.get_index(x, y, z)]
    }

    pub fn get_materials(&self) -> &[MaterialId] {
        &self.materials
    }

    /// Neighbour position along `offset`, wrapping periodic axes. `None` when
    /// the neighbour lies outside a non-periodic boundary.
    pub fn get_neighbor(&self, position: [usize; 3], offset: [i32; 3]) -> Option<[usize; 3]> {
        let mut neighbor = [0; 3];
        for x in 0..3 {
            let n_x = self.n[x] as i64;
            let p = position[x] as i64 + offset[x] as i64;
            neighbor[x] = if (0..n_x).contains(&p) {
                p as usize
            } else if self.periodic[x] {
                p.rem_euclid(n_x) as usize
            } else {
                return None;
            };
        }
        Some(neighbor)
    }

    pub fn rename(&mut self, rule: &RenameRule) -> usize {
        let mut count = 0;
        for index in 0..self.materials.len() {
            if self.materials[index] != rule.from {
                continue;
            }
            let inside = match &rule.indicator {
                Some(indicator) => {
                    let [x, y, z] = self.get_position(index);
                    indicator.contains([x as Float, y as Float, z as Float])
                }
                None => true,
            };
            if inside {
                self.materials[index] = rule.to;
                count += 1;
            }
        }
        count
    }

    /// Applies the rules in order; later rules see the result of earlier ones.
    pub fn classify(&mut self, rules: &[RenameRule]) {
        rules.iter().for_each(|rule| {
            let count = self.rename(rule);
            log::debug!("rename {} -> {}: {count} voxels", rule.from, rule.to);
        });
    }

    /// Sets to [`NO_DYNAMICS`] every boundary voxel without a fluid voxel in
    /// its 26-neighbourhood. Returns the number of removed voxels.
    pub fn inner_clean(&mut self, boundary: &[MaterialId], fluid: &[MaterialId]) -> usize {
        let removed = (0..self.materials.len())
            .filter(|&index| boundary.contains(&self.materials[index]))
            .filter(|&index| {
                let position = self.get_position(index);
                !NEIGHBORHOOD.iter().any(|&offset| {
                    self.get_neighbor(position, offset)
                        .map(|[x, y, z]| fluid.contains(&self.get_material(x, y, z)))
                        .unwrap_or(false)
                })
            })
            .collect::<Vec<usize>>();
        removed.iter().for_each(|&index| {
            self.materials[index] = NO_DYNAMICS;
        });
        removed.len()
    }

    pub fn check_for_errors(&self, referenced: &[MaterialId]) -> LbResult<()> {
        let counts = self.get_material_counts();
        for material in referenced {
            if counts.get(material).copied().unwrap_or(0) == 0 {
                return Err(LbError::EmptyMaterial(*material));
            }
        }
        Ok(())
    }

    pub fn get_material_counts(&self) -> BTreeMap<MaterialId, usize> {
        let mut counts = BTreeMap::new();
        self.materials.iter().for_each(|&material| {
            *counts.entry(material).or_insert(0) += 1;
        });
        counts
    }

    pub fn print(&self) {
        log::info!(
            "Geometry: {}x{}x{} voxels, periodic {:?}",
            self.n[0],
            self.n[1],
            self.n[2],
            self.periodic
        );
        self.get_material_counts()
            .iter()
            .for_each(|(material, count)| log::info!("  material {material}: {count} voxels"));
    }
}

const NEIGHBORHOOD: [[i32; 3]; 26] = {
    let mut offsets = [[0; 3]; 26];
    let mut k = 0;
    let mut x = -1;
    while x <= 1 {
        let mut y = -1;
        while y <= 1 {
            let mut z = -1;
            while z <= 1 {
                if !(x == 0 && y == 0 && z == 0) {
                    offsets[k] = [x, y, z];
                    k += 1;
                }
                z += 1;
            }
            y += 1;
        }
        x += 1;
    }
    offsets
};

#[cfg(test)]
mod tests {
    use super::*;

    fn rayleigh_taylor_rules(n: [usize; 3]) -> Vec<RenameRule> {
        let [nx, ny, nz] = n.map(|n_x| n_x as Float);
        vec![
            RenameRule::everywhere(NO_DYNAMICS, BULK),
            RenameRule::inside(
                BULK,
                UPPER,
                IndicatorCuboid::new([nx + 3.0, (ny / 2.0).floor() + 2.0, nz + 3.0], [
                    -2.0,
                    ny / 2.0,
                    -2.0,
                ]),
            ),
            RenameRule::inside(
                BULK,
                BOTTOM,
                IndicatorCuboid::new([nx + 3.0, 2.0, nz + 3.0], [-2.0; 3]),
            ),
            RenameRule::inside(
                UPPER,
                TOP,
                IndicatorCuboid::new([nx + 3.0, 2.0, nz + 3.0], [-2.0, ny - 1.0, -2.0]),
            ),
        ]
    }

    #[test]
    fn test_rename_everywhere() {
        let mut geometry = Geometry::new([4, 5, 6], [true, false, true]);

        let count = geometry.rename(&RenameRule::everywhere(NO_DYNAMICS, BULK));

        assert_eq!(count, 120);
        assert!(geometry.get_materials().iter().all(|&m| m == BULK));
    }

    #[test]
    fn test_classify_rayleigh_taylor_bands() {
        let n = [6, 35, 5];
        let mut geometry = Geometry::new(n, [true, false, true]);

        geometry.classify(&rayleigh_taylor_rules(n));

        assert_eq!(geometry.get_material(0, 0, 0), BOTTOM);
        assert_eq!(geometry.get_material(3, 1, 2), BULK);
        assert_eq!(geometry.get_material(3, 17, 2), BULK);
        assert_eq!(geometry.get_material(3, 18, 2), UPPER);
        assert_eq!(geometry.get_material(5, 33, 4), UPPER);
        assert_eq!(geometry.get_material(5, 34, 4), TOP);
    }

    #[test]
    fn test_later_rules_overwrite_earlier_ones() {
        let mut geometry = Geometry::new([3, 3, 3], [true, true, true]);
        let everything = IndicatorCuboid::new([4.0; 3], [-1.0; 3]);

        geometry.classify(&[
            RenameRule::everywhere(NO_DYNAMICS, BULK),
            RenameRule::inside(BULK, UPPER, everything),
            RenameRule::inside(UPPER, TOP, everything),
        ]);

        assert!(geometry.get_materials().iter().all(|&m| m == TOP));
    }

    #[test]
    fn test_inner_clean_removes_boundary_without_fluid_neighbor() {
        let mut geometry = Geometry::new([3, 6, 3], [true, false, true]);
        geometry.classify(&[
            RenameRule::everywhere(NO_DYNAMICS, BULK),
            RenameRule::inside(
                BULK,
                BOTTOM,
                IndicatorCuboid::new([5.0, 1.0, 5.0], [-1.0, 0.0, -1.0]),
            ),
        ]);
        assert_eq!(geometry.get_material(1, 0, 1), BOTTOM);
        assert_eq!(geometry.get_material(1, 1, 1), BOTTOM);

        let removed = geometry.inner_clean(&[BOTTOM], &[BULK]);

        assert_eq!(removed, 9);
        assert_eq!(geometry.get_material(1, 0, 1), NO_DYNAMICS);
        assert_eq!(geometry.get_material(1, 1, 1), BOTTOM);
    }

    #[test]
    fn test_inner_clean_keeps_rayleigh_taylor_walls() {
        let n = [4, 35, 4];
        let mut geometry = Geometry::new(n, [true, false, true]);
        geometry.classify(&rayleigh_taylor_rules(n));

        let removed = geometry.inner_clean(&[BOTTOM, TOP], &[BULK, UPPER]);

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_check_for_errors_reports_empty_material() {
        let mut geometry = Geometry::new([2, 2, 2], [true, true, true]);
        geometry.classify(&[RenameRule::everywhere(NO_DYNAMICS, BULK)]);

        assert!(geometry.check_for_errors(&[BULK]).is_ok());
        assert!(matches!(
            geometry.check_for_errors(&[BULK, TOP]),
            Err(LbError::EmptyMaterial(TOP))
        ));
    }

    #[test]
    fn test_get_neighbor_wraps_periodic_axes_only() {
        let geometry = Geometry::new([4, 4, 4], [true, false, true]);

        assert_eq!(geometry.get_neighbor([0, 1, 3], [-1, 0, 1]), Some([3, 1, 0]));
        assert_eq!(geometry.get_neighbor([0, 0, 0], [0, -1, 0]), None);
        assert_eq!(geometry.get_neighbor([0, 3, 0], [0, 1, 0]), None);
    }
}
