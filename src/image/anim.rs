use crate::error::{DataError, Result};

use super::{ImageRef, ImageStore, PixelOp, Rect};

/// A sequence of equally sized frames played at `rate` frames per second.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anim {
    pub frames: Vec<ImageRef>,
    pub rate: u8,
    pub oneshot: bool,
}

impl Anim {
    pub fn new(frames: Vec<ImageRef>, rate: u8, oneshot: bool) -> Self {
        Self {
            frames,
            rate,
            oneshot,
        }
    }

    /// Split a horizontal strip into `count` frames of `frame_size`.
    pub fn from_strip(
        store: &mut ImageStore,
        strip: ImageRef,
        frame_size: (u32, u32),
        count: usize,
        rate: u8,
        oneshot: bool,
    ) -> Self {
        let frames = (0..count)
            .map(|i| {
                let rect = Rect::new((i as u32 * frame_size.0) as i32, 0, frame_size.0, frame_size.1);
                store.crop(strip, rect)
            })
            .collect();
        Self::new(frames, rate, oneshot)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first frame, used wherever a still depiction is needed.
    pub fn still(&self) -> Option<ImageRef> {
        self.frames.first().copied()
    }

    /// Common frame size. Fails on an empty animation or mismatched frames.
    pub fn frame_size(&self, store: &ImageStore) -> Result<(u32, u32)> {
        let first = self
            .still()
            .ok_or_else(|| DataError::image("animation has no frames"))?;
        let size = store.size(first);
        for f in &self.frames[1..] {
            if store.size(*f) != size {
                return Err(DataError::image(format!(
                    "animation frames differ in size: {:?} vs {:?}",
                    store.size(*f),
                    size
                )));
            }
        }
        Ok(size)
    }

    /// Lay frames out left to right in one image.
    pub fn flatten(&self, store: &mut ImageStore) -> Result<ImageRef> {
        let (w, h) = self.frame_size(store)?;
        let children: Vec<_> = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| (*f, ((i as u32 * w) as i32, 0)))
            .collect();
        Ok(store.sheet(&children, (w * self.frames.len() as u32, h)))
    }

    /// Crop every frame to the union of the frames' bounding boxes.
    pub fn autocrop(&self, store: &mut ImageStore) -> Result<(Anim, (i32, i32))> {
        self.frame_size(store)?;
        let mut union: Option<Rect> = None;
        for f in &self.frames {
            if let Some(b) = store.bounds(*f)? {
                union = Some(match union {
                    Some(u) => u.union(b),
                    None => b,
                });
            }
        }
        let rect = union.unwrap_or_default();
        let frames = self.frames.iter().map(|f| store.crop(*f, rect)).collect();
        Ok((Anim::new(frames, self.rate, self.oneshot), (rect.x, rect.y)))
    }

    /// Apply `ops` to every frame.
    pub fn map_frames(&self, store: &mut ImageStore, ops: &[PixelOp]) -> Anim {
        let frames = self.frames.iter().map(|f| store.modify_all(*f, ops)).collect();
        Anim::new(frames, self.rate, self.oneshot)
    }
}
