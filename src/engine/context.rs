use crate::device::session::DeviceSession;
use crate::images::ImageCollection;

/// Everything an acquisition mutates. Owned by the engine and touched only
/// from the task that pumps its events.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub device: Option<DeviceSession>,
    pub images: ImageCollection,
    pub acquiring: bool,
    pub cancel_requested: bool,
    pub cancel_issued: bool,
    pub last_page: Option<u32>,
}

impl SessionContext {
    pub fn begin(&mut self) {
        self.acquiring = true;
        self.cancel_requested = false;
        self.cancel_issued = false;
        self.last_page = None;
    }

    /// True when `page` was already delivered in this acquisition or comes
    /// out of order.
    pub fn is_stale_page(&self, page: u32) -> bool {
        self.last_page.is_some_and(|last| page <= last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_per_acquisition_flags() {
        let mut ctx = SessionContext {
            cancel_requested: true,
            cancel_issued: true,
            last_page: Some(4),
            ..Default::default()
        };
        ctx.begin();
        assert!(ctx.acquiring);
        assert!(!ctx.cancel_requested);
        assert!(!ctx.cancel_issued);
        assert!(!ctx.is_stale_page(0));
    }

    #[test]
    fn repeated_or_earlier_pages_are_stale() {
        let ctx = SessionContext {
            last_page: Some(2),
            ..Default::default()
        };
        assert!(ctx.is_stale_page(2));
        assert!(ctx.is_stale_page(1));
        assert!(!ctx.is_stale_page(3));
    }
}
