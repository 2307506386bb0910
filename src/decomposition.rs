use crate::constants::*;
use crate::error::{LbError, LbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    #[default]
    Fail,
    Shrink,
}

// --------------------------------------------------------------------- STRUCT: Partition

/// Slab `start..end` of the split axis owned by one worker. The neighbours are
/// the ranks whose boundary layers fill this slab's lower and upper halo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    rank: usize,
    axis: usize,
    start: usize,
    end: usize,
    lower: Option<usize>,
    upper: Option<usize>,
}

impl Partition {
    pub fn get_rank(&self) -> usize {
        self.rank
    }

    pub fn get_axis(&self) -> usize {
        self.axis
    }

    pub fn get_start(&self) -> usize {
        self.start
    }

    pub fn get_end(&self) -> usize {
        self.end
    }

    pub fn get_number_of_layers(&self) -> usize {
        self.end - self.start
    }

    pub fn get_lower_neighbor(&self) -> Option<usize> {
        self.lower
    }

    pub fn get_upper_neighbor(&self) -> Option<usize> {
        self.upper
    }

    pub fn owns(&self, position: &[usize; 3]) -> bool {
        (self.start..self.end).contains(&position[self.axis])
    }
}

// ----------------------------------------------------------------- STRUCT: Decomposition

#[derive(Debug, Clone)]
pub struct Decomposition {
    n: [usize; 3],
    periodic: [bool; 3],
    axis: usize,
    partitions: Vec<Partition>,
}

impl Decomposition {
    pub fn get_n(&self) -> &[usize; 3] {
        &self.n
    }

    pub fn get_periodic(&self) -> &[bool; 3] {
        &self.periodic
    }

    pub fn get_axis(&self) -> usize {
        self.axis
    }

    pub fn get_partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn get_number_of_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Rank of the partition owning a global position, `None` outside the grid.
    pub fn get_owner(&self, position: &[usize; 3]) -> Option<usize> {
        if (0..3).any(|x| position[x] >= self.n[x]) {
            return None;
        }
        self.partitions
            .iter()
            .find(|partition| partition.owns(position))
            .map(Partition::get_rank)
    }
}

/// Longest axis; ties prefer a periodic axis, then the lowest index.
///
/// # Examples
/// ```
/// # use lbtwophase::decomposition::select_split_axis;
/// assert_eq!(select_split_axis(&[70, 35, 70], &[true, false, true]), 0);
/// assert_eq!(select_split_axis(&[10, 10, 10], &[false, false, true]), 2);
/// assert_eq!(select_split_axis(&[10, 20, 10], &[true, false, true]), 1);
/// ```
pub fn select_split_axis(n: &[usize; 3], periodic: &[bool; 3]) -> usize {
    (0..3)
        .max_by(|&a, &b| {
            n[a].cmp(&n[b])
                .then(periodic[a].cmp(&periodic[b]))
                .then(b.cmp(&a))
        })
        .unwrap_or(0)
}

/// Splits the grid into slabs along [`select_split_axis`]. The first
/// `layers % workers` slabs get one extra layer.
///
/// # Examples
/// ```
/// # use lbtwophase::decomposition::{decompose, CapacityPolicy};
/// let decomposition = decompose([10, 35, 4], [true, false, true], 4, CapacityPolicy::Fail).unwrap();
/// let layers = decomposition
///     .get_partitions()
///     .iter()
///     .map(|partition| partition.get_number_of_layers())
///     .collect::<Vec<usize>>();
///
/// assert_eq!(decomposition.get_axis(), 1);
/// assert_eq!(layers, vec![9, 9, 9, 8]);
/// ```
pub fn decompose(
    n: [usize; 3],
    periodic: [bool; 3],
    workers: usize,
    policy: CapacityPolicy,
) -> LbResult<Decomposition> {
    if n.iter().any(|&n_x| n_x == 0) {
        return Err(LbError::invalid_parameter(format!(
            "grid extents must be positive, got {n:?}"
        )));
    }
    if workers == 0 {
        return Err(LbError::invalid_parameter("at least one worker is required"));
    }
    let axis = select_split_axis(&n, &periodic);
    let layers = n[axis];
    let workers = if workers > layers {
        match policy {
            CapacityPolicy::Fail => {
                return Err(LbError::Capacity {
                    workers,
                    layers,
                    axis,
                });
            }
            CapacityPolicy::Shrink => {
                log::warn!("Reducing the number of workers from {workers} to {layers}");
                layers
            }
        }
    } else {
        workers
    };

    let base = layers / workers;
    let remainder = layers % workers;
    let mut start = 0;
    let partitions = (0..workers)
        .map(|rank| {
            let end = start + base + usize::from(rank < remainder);
            let lower = match rank {
                0 if periodic[axis] => Some(workers - 1),
                0 => None,
                _ => Some(rank - 1),
            };
            let upper = match rank + 1 {
                next if next < workers => Some(next),
                _ if periodic[axis] => Some(0),
                _ => None,
            };
            let partition = Partition {
                rank,
                axis,
                start,
                end,
                lower,
                upper,
            };
            start = end;
            partition
        })
        .collect::<Vec<Partition>>();

    partitions.iter().for_each(|partition| {
        log::debug!(
            "partition {}: layers {}..{} along axis {}, neighbors {:?}/{:?}",
            partition.rank,
            partition.start,
            partition.end,
            axis,
            partition.lower,
            partition.upper
        );
    });

    Ok(Decomposition {
        n,
        periodic,
        axis,
        partitions,
    })
}

/// Local extents of a partition including one halo layer on each side of the
/// split axis.
pub(crate) fn get_local_n(n: &[usize; 3], partition: &Partition) -> [usize; 3] {
    let mut local_n = *n;
    local_n[partition.axis] = partition.get_number_of_layers() + 2 * HALO_DEPTH;
    local_n
}
