// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;
use tracing::info;

/// The renderer's view of the window. It never owns the window; it only
/// asks for the framebuffer size and parks on the event queue.
pub trait WindowHost {
    fn framebuffer_size(&self) -> RenderSize;

    /// Block until at least one window event has been processed.
    fn wait_events(&mut self);

    /// Set once the user asked to close; waits give up when this is true.
    fn is_closing(&self) -> bool {
        false
    }
}

/// Park on window events while the framebuffer is zero-sized.
///
/// Returns `None` if the window started closing during the wait.
pub fn wait_for_nonzero_extent(host: &mut dyn WindowHost) -> Option<RenderSize> {
    let mut size = host.framebuffer_size();
    if size.is_empty() {
        info!("framebuffer is 0x0, waiting for events");
    }
    while size.is_empty() {
        if host.is_closing() {
            return None;
        }
        host.wait_events();
        size = host.framebuffer_size();
    }
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedHost {
        sizes: Vec<RenderSize>,
        waits: usize,
        close_after: Option<usize>,
    }

    impl WindowHost for ScriptedHost {
        fn framebuffer_size(&self) -> RenderSize {
            let i = self.waits.min(self.sizes.len() - 1);
            self.sizes[i]
        }
        fn wait_events(&mut self) {
            self.waits += 1;
        }
        fn is_closing(&self) -> bool {
            self.close_after.is_some_and(|n| self.waits >= n)
        }
    }

    #[test]
    fn returns_immediately_when_visible() {
        let mut host = ScriptedHost {
            sizes: vec![RenderSize::new(640, 480)],
            waits: 0,
            close_after: None,
        };
        assert_eq!(wait_for_nonzero_extent(&mut host), Some(RenderSize::new(640, 480)));
        assert_eq!(host.waits, 0);
    }

    #[test]
    fn blocks_on_events_until_restored() {
        let mut host = ScriptedHost {
            sizes: vec![
                RenderSize::new(0, 0),
                RenderSize::new(0, 0),
                RenderSize::new(1024, 0),
                RenderSize::new(1024, 768),
            ],
            waits: 0,
            close_after: None,
        };
        assert_eq!(wait_for_nonzero_extent(&mut host), Some(RenderSize::new(1024, 768)));
        assert_eq!(host.waits, 3);
    }

    #[test]
    fn gives_up_when_closing() {
        let mut host = ScriptedHost {
            sizes: vec![RenderSize::new(0, 0)],
            waits: 0,
            close_after: Some(2),
        };
        assert_eq!(wait_for_nonzero_extent(&mut host), None);
        assert_eq!(host.waits, 2);
    }
}
