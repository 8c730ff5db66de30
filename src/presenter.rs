use crate::images::AcquiredImage;

/// One-way notifications from the engine to whatever shows them.
/// Implementations must not block.
pub trait Presenter: Send {
    fn progress_changed(&mut self, percent: u8);
    fn image_ready(&mut self, image: &AcquiredImage);
    fn error_occurred(&mut self, message: &str);
    /// A setting was skipped; the acquisition goes on.
    fn warning(&mut self, message: &str);
    fn device_notice(&mut self, message: &str);
    fn acquisition_finished(&mut self);
}

/// Renders notifications as log lines.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn progress_changed(&mut self, percent: u8) {
        tracing::debug!("Progress {percent}%");
    }

    fn image_ready(&mut self, image: &AcquiredImage) {
        tracing::info!(
            "Page {} acquired: {}x{} {:?} at {} dpi ({})",
            image.page_index + 1,
            image.width(),
            image.height(),
            image.pixel_type,
            image.resolution.x,
            image.acquired_at.format("%H:%M:%S")
        );
    }

    fn error_occurred(&mut self, message: &str) {
        tracing::error!("{message}");
    }

    fn warning(&mut self, message: &str) {
        tracing::warn!("{message}");
    }

    fn device_notice(&mut self, message: &str) {
        tracing::info!("{message}");
    }

    fn acquisition_finished(&mut self) {
        tracing::info!("Acquisition finished");
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Notification {
        Progress(u8),
        Image(u32),
        Error(String),
        Warning(String),
        Notice(String),
        Finished,
    }

    /// Presenter that records everything; clones share the log.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingPresenter {
        log: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingPresenter {
        pub fn notifications(&self) -> Vec<Notification> {
            self.log.lock().unwrap().clone()
        }

        pub fn errors(&self) -> Vec<String> {
            self.filter(|n| match n {
                Notification::Error(m) => Some(m.clone()),
                _ => None,
            })
        }

        pub fn warnings(&self) -> Vec<String> {
            self.filter(|n| match n {
                Notification::Warning(m) => Some(m.clone()),
                _ => None,
            })
        }

        pub fn notices(&self) -> Vec<String> {
            self.filter(|n| match n {
                Notification::Notice(m) => Some(m.clone()),
                _ => None,
            })
        }

        pub fn finished_count(&self) -> usize {
            self.notifications()
                .iter()
                .filter(|n| **n == Notification::Finished)
                .count()
        }

        fn filter<F: Fn(&Notification) -> Option<String>>(&self, f: F) -> Vec<String> {
            self.notifications().iter().filter_map(f).collect()
        }

        fn push(&self, n: Notification) {
            self.log.lock().unwrap().push(n);
        }
    }

    impl Presenter for RecordingPresenter {
        fn progress_changed(&mut self, percent: u8) {
            self.push(Notification::Progress(percent));
        }

        fn image_ready(&mut self, image: &AcquiredImage) {
            self.push(Notification::Image(image.page_index));
        }

        fn error_occurred(&mut self, message: &str) {
            self.push(Notification::Error(message.to_string()));
        }

        fn warning(&mut self, message: &str) {
            self.push(Notification::Warning(message.to_string()));
        }

        fn device_notice(&mut self, message: &str) {
            self.push(Notification::Notice(message.to_string()));
        }

        fn acquisition_finished(&mut self) {
            self.push(Notification::Finished);
        }
    }
}
