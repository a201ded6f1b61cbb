//! Rectangle packing into fixed-size pages.
//!
//! Boxes are placed largest first (by area, then height, then width; equal
//! boxes in input order) at the first row-major position whose cells are all
//! free.
//! A box that fits no existing page opens a new one. Results come back in
//! input order and are deterministic for identical inputs.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::error::{DataError, Result};
use crate::image::{ImageRef, ImageStore};

/// Where a box landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub page: usize,
    pub x: u32,
    pub y: u32,
}

/// One page's occupancy bitmask.
#[derive(Debug, Clone)]
pub struct Page {
    w: u32,
    h: u32,
    words_per_row: usize,
    bits: Vec<u64>,
    avail_area: u64,
}

impl Page {
    pub fn new(w: u32, h: u32) -> Self {
        let words_per_row = (w as usize).div_ceil(64);
        Self {
            w,
            h,
            words_per_row,
            bits: vec![0; words_per_row * h as usize],
            avail_area: w as u64 * h as u64,
        }
    }

    pub fn avail_area(&self) -> u64 {
        self.avail_area
    }

    fn row_clear(&self, y: u32, x: u32, w: u32) -> bool {
        let row = &self.bits[y as usize * self.words_per_row..][..self.words_per_row];
        let mut i = x;
        let end = x + w;
        while i < end {
            let word = (i / 64) as usize;
            let bit = i % 64;
            let n = (64 - bit).min(end - i);
            let mask = if n == 64 { u64::MAX } else { ((1u64 << n) - 1) << bit };
            if row[word] & mask != 0 {
                return false;
            }
            i += n;
        }
        true
    }

    fn fill_row(&mut self, y: u32, x: u32, w: u32) {
        let start = y as usize * self.words_per_row;
        let mut i = x;
        let end = x + w;
        while i < end {
            let word = (i / 64) as usize;
            let bit = i % 64;
            let n = (64 - bit).min(end - i);
            let mask = if n == 64 { u64::MAX } else { ((1u64 << n) - 1) << bit };
            self.bits[start + word] |= mask;
            i += n;
        }
    }

    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        (y..y + h).all(|row| self.row_clear(row, x, w))
    }

    /// Claim the first free `w x h` region in row-major order.
    pub fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w > self.w || h > self.h {
            return None;
        }
        for y in 0..=self.h - h {
            for x in 0..=self.w - w {
                if self.is_free(x, y, w, h) {
                    for row in y..y + h {
                        self.fill_row(row, x, w);
                    }
                    self.avail_area -= w as u64 * h as u64;
                    return Some((x, y));
                }
            }
        }
        None
    }
}

/// Packs boxes into pages of `page_size`, working in units of `res` pixels.
#[derive(Debug)]
pub struct BoxPacker {
    res: u32,
    page_size: (u32, u32),
    pages: Vec<Page>,
}

impl BoxPacker {
    pub fn new(page_size: (u32, u32), res: u32) -> Self {
        let res = res.max(1);
        let page_size = (page_size.0.div_ceil(res), page_size.1.div_ceil(res));
        Self {
            res,
            page_size,
            pages: vec![Page::new(page_size.0, page_size.1)],
        }
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Place `boxes`, returning one placement per input in input order.
    pub fn place(&mut self, boxes: &[(u32, u32)]) -> Result<Vec<Placement>> {
        let res = self.res;
        let cells: Vec<(u32, u32)> = boxes
            .iter()
            .map(|&(w, h)| (w.div_ceil(res), h.div_ceil(res)))
            .collect();

        let mut order: Vec<usize> = (0..cells.len()).collect();
        order.sort_by(|&a, &b| {
            let key = |i: usize| {
                let (w, h) = cells[i];
                (w as u64 * h as u64, h, w)
            };
            // Largest first; equal sizes keep declaration order.
            key(b).cmp(&key(a)).then(a.cmp(&b))
        });

        let mut result = vec![None; cells.len()];
        for i in order {
            let (w, h) = cells[i];
            if w > self.page_size.0 || h > self.page_size.1 {
                return Err(DataError::pack(format!(
                    "box is too large to fit on a page ({}x{} > {}x{})",
                    boxes[i].0,
                    boxes[i].1,
                    self.page_size.0 * res,
                    self.page_size.1 * res
                )));
            }
            let area = w as u64 * h as u64;
            let mut placed = None;
            for (j, page) in self.pages.iter_mut().enumerate().rev() {
                if page.avail_area() < area {
                    continue;
                }
                if let Some(pos) = page.place(w, h) {
                    placed = Some((j, pos));
                    break;
                }
            }
            let (j, (x, y)) = match placed {
                Some(p) => p,
                None => {
                    let mut page = Page::new(self.page_size.0, self.page_size.1);
                    let pos = page
                        .place(w, h)
                        .ok_or_else(|| DataError::pack("box does not fit on an empty page"))?;
                    self.pages.push(page);
                    debug!("packer opened page {}", self.pages.len() - 1);
                    (self.pages.len() - 1, pos)
                }
            };
            result[i] = Some(Placement {
                page: j,
                x: x * res,
                y: y * res,
            });
        }
        Ok(result.into_iter().flatten().collect())
    }
}

/// Pack boxes into as many pages as needed.
pub fn pack_boxes(
    page_size: (u32, u32),
    boxes: &[(u32, u32)],
    res: u32,
) -> Result<(usize, Vec<Placement>)> {
    let mut p = BoxPacker::new(page_size, res);
    let placements = p.place(boxes)?;
    Ok((p.num_pages(), placements))
}

/// Like [`pack_boxes`] for `n` unit boxes: fills rows left to right.
pub fn pack_boxes_uniform(page_size: (u32, u32), n: usize) -> (usize, Vec<Placement>) {
    let (w, h) = (page_size.0 as usize, page_size.1 as usize);
    let per_page = (w * h).max(1);
    let placements = (0..n)
        .map(|i| {
            let idx = i % per_page;
            Placement {
                page: i / per_page,
                x: (idx % w.max(1)) as u32,
                y: (idx / w.max(1)) as u32,
            }
        })
        .collect();
    (n.div_ceil(per_page), placements)
}

/// Keep the first value for each key. Returns the kept indices and, for
/// every input, the position of its representative in the kept list.
pub fn dedupe<T, K: Eq + Hash>(vals: &[T], key: impl Fn(&T) -> K) -> (Vec<usize>, Vec<usize>) {
    let mut seen: HashMap<K, usize> = HashMap::new();
    let mut kept = Vec::new();
    let mut map = Vec::with_capacity(vals.len());
    for (i, v) in vals.iter().enumerate() {
        let next = kept.len();
        let idx = *seen.entry(key(v)).or_insert(next);
        if idx == next {
            kept.push(i);
        }
        map.push(idx);
    }
    (kept, map)
}

/// Records image placements, then composes one sheet per page.
pub struct ImagePacker {
    boxes: BoxPacker,
    page_px: (u32, u32),
    images: Vec<(ImageRef, Placement)>,
}

impl ImagePacker {
    pub fn new(page_px: (u32, u32), res: u32) -> Self {
        Self {
            boxes: BoxPacker::new(page_px, res),
            page_px,
            images: Vec::new(),
        }
    }

    pub fn place(&mut self, store: &ImageStore, imgs: &[ImageRef]) -> Result<Vec<Placement>> {
        let sizes: Vec<_> = imgs.iter().map(|i| store.size(*i)).collect();
        let placements = self.boxes.place(&sizes)?;
        self.images
            .extend(imgs.iter().copied().zip(placements.iter().copied()));
        Ok(placements)
    }

    pub fn num_pages(&self) -> usize {
        self.boxes.num_pages()
    }

    pub fn build_sheets(&self, store: &mut ImageStore) -> Vec<ImageRef> {
        (0..self.num_pages())
            .map(|page| {
                let children: Vec<_> = self
                    .images
                    .iter()
                    .filter(|(_, p)| p.page == page)
                    .map(|(img, p)| (*img, (p.x as i32, p.y as i32)))
                    .collect();
                store.sheet(&children, self.page_px)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn overlaps(a: (Placement, (u32, u32)), b: (Placement, (u32, u32))) -> bool {
        let ((pa, (wa, ha)), (pb, (wb, hb))) = (a, b);
        pa.page == pb.page
            && pa.x < pb.x + wb
            && pb.x < pa.x + wa
            && pa.y < pb.y + hb
            && pb.y < pa.y + ha
    }

    #[test]
    fn test_small_page_layout() {
        let boxes = [(2, 2), (1, 1), (1, 2), (2, 1)];
        let (pages, placed) = pack_boxes((3, 3), &boxes, 1).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(placed[0], Placement { page: 0, x: 0, y: 0 });
        assert_eq!(placed[2], Placement { page: 0, x: 2, y: 0 });
        assert_eq!(placed[3], Placement { page: 0, x: 0, y: 2 });
        assert_eq!(placed[1], Placement { page: 0, x: 2, y: 2 });
    }

    #[test]
    fn test_equal_boxes_keep_declaration_order() {
        let (pages, placed) = pack_boxes((64, 16), &[(16, 16); 3], 16).unwrap();
        assert_eq!(pages, 1);
        let xs: Vec<u32> = placed.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0, 16, 32]);
        assert!(placed.iter().all(|p| p.y == 0 && p.page == 0));
    }

    #[test]
    fn test_overflow_opens_new_page() {
        let (pages, placed) = pack_boxes((2, 2), &[(2, 2), (2, 2), (1, 1)], 1).unwrap();
        assert_eq!(pages, 3);
        assert_eq!(placed[0].page, 0);
        assert_eq!(placed[1].page, 1);
        assert_eq!(placed[2].page, 2);
    }

    #[test]
    fn test_res_coarsens_and_scales_back() {
        let (_, placed) = pack_boxes((64, 64), &[(20, 20), (10, 30)], 16).unwrap();
        for p in &placed {
            assert_eq!(p.x % 16, 0);
            assert_eq!(p.y % 16, 0);
        }
    }

    #[test]
    fn test_too_large_is_pack_error() {
        let err = pack_boxes((4, 4), &[(5, 1)], 1).unwrap_err();
        assert_eq!(err.code(), "outpost::pack");
    }

    #[test]
    fn test_wide_pages_cross_word_boundaries() {
        let boxes = vec![(70, 1); 4];
        let (pages, placed) = pack_boxes((140, 2), &boxes, 1).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(placed[0], Placement { page: 0, x: 0, y: 0 });
        assert_eq!(placed[1], Placement { page: 0, x: 70, y: 0 });
        assert_eq!(placed[2], Placement { page: 0, x: 0, y: 1 });
    }

    #[test]
    fn test_uniform() {
        let (pages, placed) = pack_boxes_uniform((2, 2), 5);
        assert_eq!(pages, 2);
        assert_eq!(placed[3], Placement { page: 0, x: 1, y: 1 });
        assert_eq!(placed[4], Placement { page: 1, x: 0, y: 0 });
    }

    #[test]
    fn test_dedupe() {
        let vals = ["a", "b", "a", "c", "b"];
        let (kept, map) = dedupe(&vals, |s| *s);
        assert_eq!(kept, vec![0, 1, 3]);
        assert_eq!(map, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn test_image_packer_builds_sheets() {
        let mut store = ImageStore::in_memory();
        let a = store.blank((32, 32));
        let b = store.blank((64, 32));
        let mut packer = ImagePacker::new((64, 64), 32);
        let placed = packer.place(&store, &[a, b]).unwrap();
        assert_eq!(placed[1], Placement { page: 0, x: 0, y: 0 });
        let sheets = packer.build_sheets(&mut store);
        assert_eq!(sheets.len(), 1);
        assert_eq!(store.size(sheets[0]), (64, 64));
    }

    proptest! {
        #[test]
        fn prop_no_overlap_and_in_bounds(
            boxes in proptest::collection::vec((1u32..6, 1u32..6), 0..40),
        ) {
            let (pages, placed) = pack_boxes((8, 8), &boxes, 1).unwrap();
            prop_assert_eq!(placed.len(), boxes.len());
            for (i, p) in placed.iter().enumerate() {
                prop_assert!(p.page < pages);
                prop_assert!(p.x + boxes[i].0 <= 8);
                prop_assert!(p.y + boxes[i].1 <= 8);
                for j in 0..i {
                    prop_assert!(!overlaps((*p, boxes[i]), (placed[j], boxes[j])));
                }
            }
        }

        #[test]
        fn prop_deterministic(
            boxes in proptest::collection::vec((1u32..6, 1u32..6), 0..30),
        ) {
            let a = pack_boxes((8, 8), &boxes, 1).unwrap();
            let b = pack_boxes((8, 8), &boxes, 1).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
