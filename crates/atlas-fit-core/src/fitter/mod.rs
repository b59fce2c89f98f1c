//! Search-side data structures.
//!
//! Both linked chains the search walks (unfitted areas, free regions) are
//! arenas indexed by `u32`, threaded through a `next` field with a sentinel
//! head at index 0. The sentinel removes every "is this the first element"
//! branch: splicing in or out always goes through a predecessor index.

mod globals;
mod search;

pub(crate) use globals::SharedBest;
pub(crate) use search::Fitter;

use crate::model::OutImage;

/// End-of-chain marker.
pub(crate) const NIL: u32 = u32::MAX;
/// Index of the sentinel head in both arenas.
pub(crate) const SENTINEL: u32 = 0;

/// One node of the unfitted-area chain. Index 0 is the sentinel whose fields
/// other than `next` are meaningless.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AreaNode {
    pub width: i32,
    pub height: i32,
    pub next: u32,
}

/// A free, axis-aligned sub-rectangle of one output image, available to
/// receive a placement. Regions from all images share a single chain kept
/// ascending by height.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FreeRegion {
    pub out_image: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub next: u32,
}

/// Provisional placement of one area, indexed like the sorted input list.
/// Copied to the caller's `FitArea`s once a complete placement wins.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FittedArea {
    pub out_image: i32,
    pub out_x: i32,
    pub out_y: i32,
}

/// Worker-local pruning bound, a snapshot of the shared best that may lag
/// behind until the next budget refill.
///
/// The starting size sits one below the shared no-solution bound so that a
/// refill against an empty shared best never reads as a foreign improvement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalBound {
    pub out_size: i32,
    pub image_count: i32,
}

pub(crate) const LOCAL_UNBOUNDED_SIZE: i32 = i32::MAX - 1;

impl LocalBound {
    pub fn unbounded() -> Self {
        Self {
            out_size: LOCAL_UNBOUNDED_SIZE,
            image_count: i32::MAX,
        }
    }
}

/// Mutable state of one packing attempt: provisional placements, the free
/// region arena and chain, the output images built so far, and the running
/// summed size.
///
/// The region arena is laid out as sentinel + seed regions + three transient
/// slots per stack depth (two split children and one new-image region), so a
/// frame's scratch regions live at a fixed place and need no allocation.
#[derive(Debug, Clone)]
pub(crate) struct FitData {
    pub fitted: Vec<FittedArea>,
    pub regions: Vec<FreeRegion>,
    base_len: usize,
    pub out_images: Vec<OutImage>,
    pub out_size: i32,
    pub bound: LocalBound,
}

impl FitData {
    /// Seeds the attempt: one free region per initial image, chained in seed
    /// order. A zero-sized seed image opens the full `max_w` x `max_h`
    /// region; a preseeded image is bounded by its own dimensions.
    pub fn new(seed_images: &[OutImage], area_count: usize, max_w: i32, max_h: i32) -> Self {
        let base_len = 1 + seed_images.len();
        let mut regions = Vec::with_capacity(base_len + 3 * area_count);
        regions.push(FreeRegion::default()); // sentinel
        for (i, img) in seed_images.iter().enumerate() {
            let next = if i + 1 < seed_images.len() {
                (i + 2) as u32
            } else {
                NIL
            };
            regions.push(FreeRegion {
                out_image: i as i32,
                x: 0,
                y: 0,
                width: if img.width != 0 { img.width } else { max_w },
                height: if img.height != 0 { img.height } else { max_h },
                next,
            });
        }
        regions[SENTINEL as usize].next = if seed_images.is_empty() { NIL } else { 1 };
        regions.resize(base_len + 3 * area_count, FreeRegion::default());

        let out_size = seed_images.iter().map(|img| img.size).sum();

        Self {
            fitted: vec![FittedArea::default(); area_count],
            regions,
            base_len,
            out_images: seed_images.to_vec(),
            out_size,
            bound: LocalBound::unbounded(),
        }
    }

    pub fn image_count(&self) -> i32 {
        self.out_images.len() as i32
    }

    /// Arena slot for split child `k` (0 or 1) of the frame at `depth`.
    pub fn child_slot(&self, depth: usize, k: usize) -> u32 {
        (self.base_len + 3 * depth + k) as u32
    }

    /// Arena slot for the new-image region of the frame at `depth`.
    pub fn new_image_slot(&self, depth: usize) -> u32 {
        (self.base_len + 3 * depth + 2) as u32
    }

    /// Inserts the region at `slot` into the chain before the first region
    /// whose height strictly exceeds it (equal heights keep insertion order).
    /// Returns the predecessor so a later unlink needs no second scan.
    pub fn insert_region(&mut self, slot: u32) -> u32 {
        let h = self.regions[slot as usize].height;
        let mut prev = SENTINEL;
        let mut cur = self.regions[SENTINEL as usize].next;
        while cur != NIL {
            if self.regions[cur as usize].height > h {
                break;
            }
            prev = cur;
            cur = self.regions[cur as usize].next;
        }
        self.regions[slot as usize].next = cur;
        self.regions[prev as usize].next = slot;
        prev
    }

    /// Unlinks the region following `prev` from the chain.
    pub fn unlink_after(&mut self, prev: u32) {
        let victim = self.regions[prev as usize].next;
        self.regions[prev as usize].next = self.regions[victim as usize].next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_heights(fd: &FitData) -> Vec<i32> {
        let mut out = Vec::new();
        let mut cur = fd.regions[SENTINEL as usize].next;
        while cur != NIL {
            out.push(fd.regions[cur as usize].height);
            cur = fd.regions[cur as usize].next;
        }
        out
    }

    #[test]
    fn seed_regions_follow_image_order() {
        let seeds = vec![OutImage::new(100, 40), OutImage::new(0, 0)];
        let fd = FitData::new(&seeds, 3, 512, 256);
        assert_eq!(chain_heights(&fd), vec![40, 256]);
        assert_eq!(fd.regions[1].width, 100);
        assert_eq!(fd.regions[2].width, 512);
        assert_eq!(fd.out_size, 4000);
    }

    #[test]
    fn insert_keeps_heights_ascending_and_equal_heights_stable() {
        let mut fd = FitData::new(&[OutImage::default()], 4, 64, 50);
        // seed region height is 50; slots hold heights 20, 50, 70
        let s20 = fd.child_slot(0, 0);
        let s50 = fd.child_slot(0, 1);
        let s70 = fd.new_image_slot(0);
        fd.regions[s20 as usize].height = 20;
        fd.regions[s50 as usize].height = 50;
        fd.regions[s70 as usize].height = 70;

        let p20 = fd.insert_region(s20);
        assert_eq!(p20, SENTINEL);
        let p50 = fd.insert_region(s50);
        // equal height goes after the existing 50
        assert_eq!(p50, 1);
        fd.insert_region(s70);
        assert_eq!(chain_heights(&fd), vec![20, 50, 50, 70]);
    }

    #[test]
    fn unlink_after_restores_prior_chain() {
        let mut fd = FitData::new(&[OutImage::default()], 2, 64, 50);
        let slot = fd.child_slot(0, 0);
        fd.regions[slot as usize].height = 10;
        let before = chain_heights(&fd);
        let prev = fd.insert_region(slot);
        fd.unlink_after(prev);
        assert_eq!(chain_heights(&fd), before);
    }
}
