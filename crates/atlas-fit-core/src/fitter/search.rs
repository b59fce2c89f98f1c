use tracing::debug;

use super::globals::{Refill, SharedBest};
use super::{AreaNode, FitData, FittedArea, FreeRegion, NIL, SENTINEL};
use crate::model::OutImage;

/// Where a suspended frame resumes once the frame below it returns: each
/// placement tries two alternative splits of its host region, and the frame
/// has to unwind the children of whichever split it recursed into last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    FirstSplit,
    SecondSplit,
}

/// One logical recursion level, kept on an explicit stack so the search
/// never touches the native call stack and budget accounting stays in one
/// loop.
#[derive(Debug, Clone, Copy)]
struct EvalFrame {
    resume: Resume,
    /// Area under evaluation and its predecessor in the unfitted chain.
    area: u32,
    prev_area: u32,
    /// Free region under trial and its predecessor in the region chain.
    out_area: u32,
    prev_out_area: u32,
    /// Predecessors of the split children currently linked into the chain.
    prev_children: [u32; 2],
    child_count: usize,
    first_child_count: usize,
    /// Free regions legally attempted for this area so far.
    tried: i32,
    remain_right: i32,
    remain_bottom: i32,
    /// The region under trial belongs to an image synthesized for it.
    image_added: bool,
    /// The trial grew its image; restore from the save on backtrack.
    restore_image: bool,
    image_save: OutImage,
    out_size_save: i32,
    /// Minimum width/height among remaining unfitted areas. Split children
    /// narrower or shorter than this can never host anything.
    min_area_width: i32,
    min_area_height: i32,
}

impl EvalFrame {
    fn enter(area: u32) -> Self {
        Self {
            resume: Resume::FirstSplit,
            area,
            prev_area: SENTINEL,
            out_area: NIL,
            prev_out_area: SENTINEL,
            prev_children: [NIL; 2],
            child_count: 0,
            first_child_count: 0,
            tried: 0,
            remain_right: 0,
            remain_bottom: 0,
            image_added: false,
            restore_image: false,
            image_save: OutImage::default(),
            out_size_save: 0,
            min_area_width: 0,
            min_area_height: 0,
        }
    }
}

/// Control state of the flattened search loop.
enum Step {
    /// Evaluate the current frame's next unfitted area.
    NextArea,
    /// Try the current free region for the detached area.
    TryRegion,
    /// A trial finished; clean up and move to the next region.
    RegionDone,
    /// All regions tried; relink the area and advance the frame.
    AreaDone,
    /// The frame is exhausted; return to the parent.
    Pop,
}

/// One search worker. Owns its unfitted chain and evaluation stack, borrows
/// the shared best-fit record, and draws the call budget in slices.
pub(crate) struct Fitter<'a> {
    max_image_width: i32,
    max_image_height: i32,
    max_image_size: i32,
    shared: &'a SharedBest,
    calls_left: i32,
    areas: Vec<AreaNode>,
    stack: Vec<EvalFrame>,
}

impl<'a> Fitter<'a> {
    /// `dims` is the sorted area list; node `i + 1` of the arena is area `i`.
    /// `rotation` rotates the initial chain so parallel workers root the
    /// search at different areas.
    pub fn new(
        max_image_width: i32,
        max_image_height: i32,
        max_image_size: i32,
        shared: &'a SharedBest,
        dims: &[(i32, i32)],
        rotation: usize,
    ) -> Self {
        let n = dims.len();
        let mut areas = Vec::with_capacity(n + 1);
        areas.push(AreaNode::default());
        for &(width, height) in dims {
            areas.push(AreaNode {
                width,
                height,
                next: NIL,
            });
        }
        let mut prev = SENTINEL as usize;
        for i in 0..n {
            let idx = 1 + (rotation + i) % n;
            areas[prev].next = idx as u32;
            prev = idx;
        }
        areas[prev].next = NIL;

        Self {
            max_image_width,
            max_image_height,
            max_image_size,
            shared,
            calls_left: 0,
            areas,
            stack: Vec::with_capacity(n),
        }
    }

    fn push_frame(&mut self) {
        let head = self.areas[SENTINEL as usize].next;
        self.stack.push(EvalFrame::enter(head));
    }

    /// Runs the packing search to completion or budget exhaustion.
    ///
    /// Every complete placement reached is offered to the shared best; the
    /// worker's local bounds resync at each budget refill.
    pub fn run(&mut self, fd: &mut FitData) {
        self.push_frame();
        let mut step = Step::NextArea;
        loop {
            match step {
                Step::NextArea => {
                    let d = self.stack.len() - 1;
                    if self.stack[d].area == NIL {
                        step = Step::Pop;
                        continue;
                    }
                    if fd.out_size >= fd.bound.out_size
                        || fd.image_count() > fd.bound.image_count
                    {
                        step = Step::Pop;
                        continue;
                    }
                    if self.calls_left == 0 {
                        match self.shared.refill(&mut fd.bound) {
                            Refill::Granted(calls) => self.calls_left = calls,
                            Refill::Tightened => {
                                step = Step::Pop;
                                continue;
                            }
                            Refill::Exhausted => {
                                debug!("shared call budget exhausted");
                                return;
                            }
                        }
                    }
                    self.calls_left -= 1;
                    // detach the area for the duration of its trials
                    let area = self.stack[d].area as usize;
                    let area_next = self.areas[area].next;
                    let prev = self.stack[d].prev_area as usize;
                    self.areas[prev].next = area_next;
                    let first_region = fd.regions[SENTINEL as usize].next;
                    let frame = &mut self.stack[d];
                    frame.prev_out_area = SENTINEL;
                    frame.out_area = first_region;
                    frame.tried = 0;
                    step = Step::TryRegion;
                }

                Step::TryRegion => {
                    let d = self.stack.len() - 1;
                    let area = self.stack[d].area as usize;
                    let aw = self.areas[area].width;
                    let ah = self.areas[area].height;

                    if self.stack[d].out_area == NIL {
                        if self.stack[d].tried > 0
                            || fd.image_count() == fd.bound.image_count
                        {
                            step = Step::AreaDone;
                            continue;
                        }
                        // no legal attempt anywhere: open a fresh image big
                        // enough for this area
                        let slot = fd.new_image_slot(d);
                        fd.regions[slot as usize] = FreeRegion {
                            out_image: fd.image_count(),
                            x: 0,
                            y: 0,
                            width: aw.max(self.max_image_width),
                            height: ah.max(self.max_image_height),
                            next: NIL,
                        };
                        let prev = fd.insert_region(slot);
                        fd.out_images.push(OutImage::default());
                        let frame = &mut self.stack[d];
                        frame.prev_out_area = prev;
                        frame.out_area = slot;
                        frame.image_added = true;
                    } else {
                        self.stack[d].image_added = false;
                    }

                    let host = self.stack[d].out_area as usize;
                    let region = fd.regions[host];
                    let remain_right = region.width - aw;
                    let remain_bottom = region.height - ah;
                    {
                        let frame = &mut self.stack[d];
                        frame.remain_right = remain_right;
                        frame.remain_bottom = remain_bottom;
                    }
                    if remain_right < 0 || remain_bottom < 0 {
                        let next = region.next;
                        let frame = &mut self.stack[d];
                        frame.prev_out_area = frame.out_area;
                        frame.out_area = next;
                        step = Step::TryRegion;
                        continue;
                    }

                    if !self.check_area_fit_against_best(
                        fd,
                        region.x + aw,
                        region.y + ah,
                        region.out_image,
                        d,
                    ) {
                        step = Step::RegionDone;
                        continue;
                    }

                    fd.fitted[area - 1] = FittedArea {
                        out_image: region.out_image,
                        out_x: region.x,
                        out_y: region.y,
                    };

                    if self.areas[SENTINEL as usize].next == NIL {
                        // complete placement: offer it and keep backtracking
                        self.shared.offer(
                            fd.out_size,
                            fd.image_count(),
                            &fd.fitted,
                            &fd.out_images,
                            &mut fd.bound,
                        );
                        self.restore_image_if_needed(fd, d);
                        step = Step::RegionDone;
                        continue;
                    }

                    // smallest remaining demand gates which children are
                    // worth chaining at all
                    let mut min_w = i32::MAX;
                    let mut min_h = i32::MAX;
                    let mut scan = self.areas[SENTINEL as usize].next;
                    while scan != NIL {
                        let node = self.areas[scan as usize];
                        min_w = min_w.min(node.width);
                        min_h = min_h.min(node.height);
                        scan = node.next;
                    }
                    {
                        let frame = &mut self.stack[d];
                        frame.min_area_width = min_w;
                        frame.min_area_height = min_h;
                    }

                    // take the host region out while its children are live
                    let prev = self.stack[d].prev_out_area as usize;
                    fd.regions[prev].next = fd.regions[host].next;

                    // first split: full-height right child, bottom child as
                    // wide as the placed area
                    let mut count = 0usize;
                    if remain_right > 0 && remain_right >= min_w && region.height >= min_h {
                        let slot = fd.child_slot(d, 0);
                        fd.regions[slot as usize] = FreeRegion {
                            out_image: region.out_image,
                            x: region.x + aw,
                            y: region.y,
                            width: remain_right,
                            height: region.height,
                            next: NIL,
                        };
                        self.stack[d].prev_children[0] = fd.insert_region(slot);
                        count = 1;
                    }
                    if aw > 0 && remain_bottom > 0 && aw >= min_w && remain_bottom >= min_h {
                        let slot = fd.child_slot(d, 1);
                        fd.regions[slot as usize] = FreeRegion {
                            out_image: region.out_image,
                            x: region.x,
                            y: region.y + ah,
                            width: aw,
                            height: remain_bottom,
                            next: NIL,
                        };
                        self.stack[d].prev_children[count] = fd.insert_region(slot);
                        count += 1;
                    }
                    {
                        let frame = &mut self.stack[d];
                        frame.child_count = count;
                        frame.first_child_count = count;
                        frame.resume = Resume::FirstSplit;
                    }
                    self.push_frame();
                    step = Step::NextArea;
                }

                Step::RegionDone => {
                    let d = self.stack.len() - 1;
                    if self.stack[d].image_added {
                        // the synthesized image was the last possible option
                        // for this area
                        let host = self.stack[d].out_area as usize;
                        let prev = self.stack[d].prev_out_area as usize;
                        fd.regions[prev].next = fd.regions[host].next;
                        fd.out_images.pop();
                        step = Step::AreaDone;
                        continue;
                    }
                    if fd.out_size >= fd.bound.out_size
                        || fd.image_count() > fd.bound.image_count
                    {
                        step = Step::AreaDone;
                        continue;
                    }
                    let next = fd.regions[self.stack[d].out_area as usize].next;
                    let frame = &mut self.stack[d];
                    frame.prev_out_area = frame.out_area;
                    frame.out_area = next;
                    step = Step::TryRegion;
                }

                Step::AreaDone => {
                    let d = self.stack.len() - 1;
                    // restore the chain exactly as the parent linked it
                    let area = self.stack[d].area;
                    let prev = self.stack[d].prev_area as usize;
                    self.areas[prev].next = area;
                    let next = self.areas[area as usize].next;
                    let frame = &mut self.stack[d];
                    frame.prev_area = area;
                    frame.area = next;
                    step = Step::NextArea;
                }

                Step::Pop => {
                    self.stack.pop();
                    if self.stack.is_empty() {
                        if self.calls_left > 0 {
                            self.shared.hand_back(self.calls_left);
                            self.calls_left = 0;
                        }
                        return;
                    }
                    let d = self.stack.len() - 1;
                    // unwind the children of the split just explored, newest
                    // first
                    while self.stack[d].child_count > 0 {
                        self.stack[d].child_count -= 1;
                        let prev = self.stack[d].prev_children[self.stack[d].child_count];
                        fd.unlink_after(prev);
                    }
                    if self.stack[d].resume == Resume::FirstSplit
                        && fd.out_size < fd.bound.out_size
                        && fd.image_count() <= fd.bound.image_count
                    {
                        // second split: right child capped at the area's
                        // height, full-width bottom child
                        let area = self.stack[d].area as usize;
                        let aw = self.areas[area].width;
                        let ah = self.areas[area].height;
                        let host = self.stack[d].out_area as usize;
                        let region = fd.regions[host];
                        let remain_right = self.stack[d].remain_right;
                        let remain_bottom = self.stack[d].remain_bottom;
                        let min_w = self.stack[d].min_area_width;
                        let min_h = self.stack[d].min_area_height;
                        let mut count = 0usize;
                        if remain_right > 0 && ah > 0 && remain_right >= min_w && ah >= min_h {
                            let slot = fd.child_slot(d, 0);
                            fd.regions[slot as usize] = FreeRegion {
                                out_image: region.out_image,
                                x: region.x + aw,
                                y: region.y,
                                width: remain_right,
                                height: ah,
                                next: NIL,
                            };
                            self.stack[d].prev_children[0] = fd.insert_region(slot);
                            count = 1;
                        }
                        if remain_bottom > 0 && region.width >= min_w && remain_bottom >= min_h {
                            let slot = fd.child_slot(d, 1);
                            fd.regions[slot as usize] = FreeRegion {
                                out_image: region.out_image,
                                x: region.x,
                                y: region.y + ah,
                                width: region.width,
                                height: remain_bottom,
                                next: NIL,
                            };
                            self.stack[d].prev_children[count] = fd.insert_region(slot);
                            count += 1;
                        }
                        self.stack[d].child_count = count;
                        if count + self.stack[d].first_child_count > 0 {
                            self.stack[d].resume = Resume::SecondSplit;
                            self.push_frame();
                            step = Step::NextArea;
                            continue;
                        }
                        // neither split chained a child; recursing again
                        // would repeat the first run
                    }
                    // both splits done: put the host region back and undo
                    // any provisional image growth
                    let host = self.stack[d].out_area;
                    let prev = self.stack[d].prev_out_area as usize;
                    fd.regions[prev].next = host;
                    self.restore_image_if_needed(fd, d);
                    step = Step::RegionDone;
                }
            }
        }
    }

    fn restore_image_if_needed(&mut self, fd: &mut FitData, d: usize) {
        if self.stack[d].restore_image {
            let host = self.stack[d].out_area as usize;
            let image = fd.regions[host].out_image as usize;
            fd.out_images[image] = self.stack[d].image_save;
            fd.out_size = self.stack[d].out_size_save;
        }
    }

    /// Commits the image growth a placement implies, provided the grown
    /// image stays inside the size cap and the summed output size can still
    /// beat the best bound. Returns whether the placement may proceed.
    ///
    /// A size-cap overflow does not count as a tried region: a fresh image
    /// is still a legal follow-up there, unlike the worse-than-best case.
    fn check_area_fit_against_best(
        &mut self,
        fd: &mut FitData,
        new_right: i32,
        new_bottom: i32,
        image: i32,
        d: usize,
    ) -> bool {
        let img = fd.out_images[image as usize];
        let mut grew = false;
        let mut width = new_right;
        let mut height = new_bottom;
        if width > img.width {
            grew = true;
        } else {
            width = img.width;
        }
        if height > img.height {
            grew = true;
        } else {
            height = img.height;
        }
        if grew {
            let new_size = width as i64 * height as i64;
            if new_size > self.max_image_size as i64 {
                return false;
            }
            let new_out_size = fd.out_size as i64 + new_size - img.size as i64;
            if new_out_size >= fd.bound.out_size as i64 {
                self.stack[d].tried += 1;
                return false;
            }
            let frame = &mut self.stack[d];
            frame.image_save = img;
            frame.out_size_save = fd.out_size;
            frame.restore_image = true;
            fd.out_images[image as usize] = OutImage {
                width,
                height,
                size: new_size as i32,
            };
            fd.out_size = new_out_size as i32;
        } else {
            self.stack[d].restore_image = false;
        }
        self.stack[d].tried += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitter_with_frame(shared: &SharedBest) -> Fitter<'_> {
        let mut fitter = Fitter::new(100, 100, 2500, shared, &[(10, 10), (5, 5)], 0);
        fitter.push_frame();
        fitter
    }

    #[test]
    fn size_cap_rejection_is_not_a_tried_region() {
        let shared = SharedBest::new(10);
        let mut fitter = fitter_with_frame(&shared);
        let mut fd = FitData::new(&[OutImage::default()], 2, 100, 100);
        // 60x60 = 3600 exceeds the 2500 cap: infeasible here, not tried
        assert!(!fitter.check_area_fit_against_best(&mut fd, 60, 60, 0, 0));
        assert_eq!(fitter.stack[0].tried, 0);
        // worse than the best bound: counted as tried
        fd.bound.out_size = 100;
        assert!(!fitter.check_area_fit_against_best(&mut fd, 20, 20, 0, 0));
        assert_eq!(fitter.stack[0].tried, 1);
    }

    #[test]
    fn growth_commit_and_restore_round_trip() {
        let shared = SharedBest::new(10);
        let mut fitter = fitter_with_frame(&shared);
        let mut fd = FitData::new(&[OutImage::default()], 2, 100, 100);
        fitter.stack[0].out_area = 1; // seed region hosts the trial
        assert!(fitter.check_area_fit_against_best(&mut fd, 40, 30, 0, 0));
        assert_eq!(fd.out_images[0], OutImage::new(40, 30));
        assert_eq!(fd.out_size, 1200);
        assert!(fitter.stack[0].restore_image);
        fitter.restore_image_if_needed(&mut fd, 0);
        assert_eq!(fd.out_images[0], OutImage::default());
        assert_eq!(fd.out_size, 0);
        // a placement inside current bounds commits nothing
        fd.out_images[0] = OutImage::new(50, 50);
        fd.out_size = 2500;
        assert!(fitter.check_area_fit_against_best(&mut fd, 20, 20, 0, 0));
        assert!(!fitter.stack[0].restore_image);
        assert_eq!(fd.out_size, 2500);
    }
}
