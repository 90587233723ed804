use gpui::{Bounds, Pixels, point, px};
use gpui_component::VirtualListScrollHandle;

/// Distance from the tail, in pixels, that still counts as "at the bottom".
const TAIL_THRESHOLD: f32 = 24.0;
/// Offset changes smaller than this are treated as layout jitter.
const SCROLL_EPSILON: f32 = 1.0;

/// Tail-follow decision for a transcript that grows at the bottom.
///
/// Offsets use gpui's convention: scrolling down makes `offset` negative and
/// the tail sits at `-max_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowState {
    following: bool,
    pending_jump: bool,
    last_offset: f32,
    last_max: f32,
}

impl Default for FollowState {
    fn default() -> Self {
        Self {
            following: true,
            pending_jump: false,
            last_offset: 0.0,
            last_max: 0.0,
        }
    }
}

impl FollowState {
    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Forces the next frame to land on the tail and resume following.
    pub fn jump_to_tail(&mut self) {
        self.pending_jump = true;
        self.following = true;
    }

    /// Content grew; keep the tail in view only if the reader was there.
    pub fn content_grew(&mut self) {
        if self.following || near_tail(self.last_offset, self.last_max) {
            self.pending_jump = true;
        }
    }

    /// Records the scroll position observed this frame.
    pub fn observe(&mut self, offset: f32, max: f32) {
        let moved = offset - self.last_offset;
        let resized = (max - self.last_max).abs() > SCROLL_EPSILON;

        if self.pending_jump || (resized && near_tail(self.last_offset, self.last_max)) {
            self.following = true;
        } else if self.following {
            if moved > SCROLL_EPSILON && !resized {
                self.following = false;
            }
        } else if moved < -SCROLL_EPSILON && !resized && near_tail(offset, max) {
            self.following = true;
        }

        self.last_offset = offset;
        self.last_max = max;
    }

    /// Returns the offset to scroll to this frame, if any.
    pub fn take_target(&mut self, max: f32) -> Option<f32> {
        let target = (self.following || self.pending_jump).then(|| -max.max(0.0));
        self.pending_jump = false;
        target
    }
}

fn near_tail(offset: f32, max: f32) -> bool {
    max <= 0.0 || (offset + max).abs() <= TAIL_THRESHOLD
}

/// Binds [`FollowState`] to the message list's virtual scroll handle.
pub struct ScrollManager {
    handle: VirtualListScrollHandle,
    follow: FollowState,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            handle: VirtualListScrollHandle::new(),
            follow: FollowState::default(),
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.handle
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.handle.bounds()
    }

    pub fn jump_to_tail(&mut self) {
        self.follow.jump_to_tail();
    }

    pub fn content_grew(&mut self) {
        self.follow.content_grew();
    }

    /// Called once per frame before the list paints.
    pub fn sync(&mut self) {
        let offset = self.handle.offset();
        let max = f32::from(self.handle.max_offset().height);
        self.follow.observe(f32::from(offset.y), max);

        if let Some(target) = self.follow.take_target(max) {
            self.handle.set_offset(point(offset.x, px(target)));
        }
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}
