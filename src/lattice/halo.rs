use super::block::BlockLattice;
use crate::constants::*;
use crate::error::{LbError, LbResult};
use crate::velocity_set::Populations;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloField {
    PostCollision,
    PostStream,
}

/// Halo of the receiving partition that a message fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloSide {
    Lower,
    Upper,
}

// ------------------------------------------------------------------- STRUCT: HaloMessage

#[derive(Debug, Clone)]
pub struct HaloMessage {
    pub from: usize,
    pub to: usize,
    pub side: HaloSide,
    pub field: HaloField,
    pub layer: Vec<Populations>,
}

impl BlockLattice {
    fn get_field(&self, field: HaloField) -> &Vec<Populations> {
        match field {
            HaloField::PostCollision => &self.f_star,
            HaloField::PostStream => &self.f,
        }
    }

    fn get_field_mut(&mut self, field: HaloField) -> &mut Vec<Populations> {
        match field {
            HaloField::PostCollision => &mut self.f_star,
            HaloField::PostStream => &mut self.f,
        }
    }

    /// Boundary layers of this partition, addressed to the neighbours whose
    /// halo they fill.
    pub(crate) fn pack_halo_messages(&self, field: HaloField) -> Vec<HaloMessage> {
        let values = self.get_field(field);
        let pack = |layer: usize| {
            self.grid
                .get_layer_indices(layer)
                .iter()
                .map(|&index| values[index])
                .collect::<Vec<Populations>>()
        };
        let mut messages = Vec::with_capacity(2);
        if let Some(upper) = self.upper {
            messages.push(HaloMessage {
                from: self.rank,
                to: upper,
                side: HaloSide::Lower,
                field,
                layer: pack(self.grid.get_layers()),
            });
        }
        if let Some(lower) = self.lower {
            messages.push(HaloMessage {
                from: self.rank,
                to: lower,
                side: HaloSide::Upper,
                field,
                layer: pack(HALO_DEPTH),
            });
        }
        messages
    }

    pub(crate) fn unpack_halo_message(&mut self, message: HaloMessage) -> LbResult<()> {
        let (expected_sender, layer) = match message.side {
            HaloSide::Lower => (self.lower, 0),
            HaloSide::Upper => (self.upper, self.grid.get_layers() + HALO_DEPTH),
        };
        if message.to != self.rank || expected_sender != Some(message.from) {
            return Err(LbError::Communication {
                from: message.from,
                to: self.rank,
                reason: format!(
                    "unexpected {:?} halo message addressed to partition {}",
                    message.side, message.to
                ),
            });
        }
        let indices = self.grid.get_layer_indices(layer);
        if indices.len() != message.layer.len() {
            return Err(LbError::Communication {
                from: message.from,
                to: self.rank,
                reason: format!(
                    "expected {} voxels in the halo layer, received {}",
                    indices.len(),
                    message.layer.len()
                ),
            });
        }
        let values = self.get_field_mut(message.field);
        indices
            .iter()
            .zip(message.layer)
            .for_each(|(&index, populations)| {
                values[index] = populations;
            });
        Ok(())
    }
}

/// Packs every boundary layer, then delivers the messages. No partition reads
/// another partition's arrays.
pub(crate) fn exchange(blocks: &mut [BlockLattice], field: HaloField) -> LbResult<()> {
    let messages = blocks
        .par_iter()
        .flat_map_iter(|block| block.pack_halo_messages(field))
        .collect::<Vec<HaloMessage>>();
    let mut inboxes = (0..blocks.len()).map(|_| Vec::new()).collect::<Vec<_>>();
    for message in messages {
        match inboxes.get_mut(message.to) {
            Some(inbox) => inbox.push(message),
            None => {
                return Err(LbError::Communication {
                    from: message.from,
                    to: message.to,
                    reason: "no such partition".to_string(),
                });
            }
        }
    }
    blocks
        .par_iter_mut()
        .zip(inboxes.into_par_iter())
        .try_for_each(|(block, inbox)| {
            inbox
                .into_iter()
                .try_for_each(|message| block.unpack_halo_message(message))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{CapacityPolicy, decompose};
    use crate::geometry::{Geometry, RenameRule};
    use crate::lattice::Dynamics;
    use crate::velocity_set::Q;
    use std::collections::BTreeMap;

    fn blocks(n: [usize; 3], periodic: [bool; 3], workers: usize) -> Vec<BlockLattice> {
        let mut geometry = Geometry::new(n, periodic);
        geometry.classify(&[RenameRule::everywhere(NO_DYNAMICS, BULK)]);
        let decomposition = decompose(n, periodic, workers, CapacityPolicy::Fail).unwrap();
        let dynamics = BTreeMap::from([(BULK, Dynamics::ForcedBgk { omega: 1.0 })]);
        decomposition
            .get_partitions()
            .iter()
            .map(|partition| BlockLattice::new(partition, &geometry, &dynamics))
            .collect()
    }

    fn tag_owned_voxels(blocks: &mut [BlockLattice]) {
        blocks.iter_mut().for_each(|block| {
            for index in block.get_owned_indices() {
                let position = block.get_global_position(index).unwrap();
                let global_index = block.grid.get_global_index(position);
                block.f_star[index] = [global_index as Float; Q];
            }
        });
    }

    #[test]
    fn test_exchange_fills_halo_with_neighbor_layers() {
        let mut blocks = blocks([9, 3, 2], [true, false, true], 3);
        tag_owned_voxels(&mut blocks);

        exchange(&mut blocks, HaloField::PostCollision).unwrap();

        for block in &blocks {
            for index in 0..block.get_number_of_voxels() {
                let position = block.get_global_position(index).unwrap();
                let global_index = block.grid.get_global_index(position);
                assert_eq!(block.f_star[index][0], global_index as Float);
            }
        }
    }

    #[test]
    fn test_single_partition_exchanges_with_itself() {
        let mut blocks = blocks([5, 2, 2], [true, true, true], 1);
        tag_owned_voxels(&mut blocks);

        exchange(&mut blocks, HaloField::PostCollision).unwrap();

        let block = &blocks[0];
        let halo = block.grid.get_index([0, 1, 1]);
        assert_eq!(block.get_global_position(halo), Some([4, 1, 1]));
        assert_eq!(block.f_star[halo][3], block.grid.get_global_index([4, 1, 1]) as Float);
    }

    #[test]
    fn test_malformed_message_is_rejected() {
        let mut blocks = blocks([8, 3, 3], [true, false, false], 2);
        let mut message = blocks[0].pack_halo_messages(HaloField::PostStream).remove(0);
        message.layer.pop();

        let result = blocks[1].unpack_halo_message(message);

        assert!(matches!(result, Err(LbError::Communication { from: 0, to: 1, .. })));
    }

    #[test]
    fn test_message_from_wrong_sender_is_rejected() {
        let mut blocks = blocks([12, 3, 3], [false, false, false], 3);
        let message = blocks[0].pack_halo_messages(HaloField::PostStream).remove(0);
        assert_eq!(message.to, 1);

        let result = blocks[2].unpack_halo_message(message);

        assert!(matches!(result, Err(LbError::Communication { .. })));
    }
}
