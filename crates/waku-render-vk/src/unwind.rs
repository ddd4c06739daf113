// SPDX-License-Identifier: CEPL-1.0
//! Teardown for half-built objects.

/// Destroy steps registered while building something out of several Vulkan
/// objects. Dropping the guard runs them newest first; [`Unwind::disarm`]
/// forgets them once the whole thing exists. An early `?` between creates
/// therefore releases exactly what was made so far, children before parents.
pub(crate) struct Unwind<'a, C: ?Sized> {
    ctx: &'a C,
    steps: Vec<Box<dyn FnOnce(&C) + 'a>>,
}

impl<'a, C: ?Sized> Unwind<'a, C> {
    pub(crate) fn new(ctx: &'a C) -> Self {
        Self {
            ctx,
            steps: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, step: impl FnOnce(&C) + 'a) {
        self.steps.push(Box::new(step));
    }

    /// Success: keep everything.
    pub(crate) fn disarm(mut self) {
        self.steps.clear();
    }
}

impl<C: ?Sized> Drop for Unwind<'_, C> {
    fn drop(&mut self) {
        while let Some(step) = self.steps.pop() {
            step(self.ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::cell::RefCell;

    type Log = RefCell<Vec<&'static str>>;

    /// Stand-in for a multi-object create: `fail_at` makes that step error.
    fn build(log: &Log, fail_at: Option<usize>) -> Result<()> {
        let mut guard = Unwind::new(log);
        for (i, name) in ["swapchain", "view", "depth"].into_iter().enumerate() {
            if fail_at == Some(i) {
                bail!("{name} failed");
            }
            log.borrow_mut().push(name);
            guard.push(move |l: &Log| l.borrow_mut().push(name));
        }
        guard.disarm();
        Ok(())
    }

    #[test]
    fn failure_destroys_made_objects_newest_first() {
        let log = Log::default();
        assert!(build(&log, Some(2)).is_err());
        assert_eq!(*log.borrow(), ["swapchain", "view", "view", "swapchain"]);
    }

    #[test]
    fn failure_on_first_create_destroys_nothing() {
        let log = Log::default();
        assert!(build(&log, Some(0)).is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn success_keeps_everything() {
        let log = Log::default();
        build(&log, None).unwrap();
        assert_eq!(*log.borrow(), ["swapchain", "view", "depth"]);
    }
}
