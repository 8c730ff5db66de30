use serde::{Deserialize, Serialize};

use crate::device::models::{PixelType, TransferMode, TransferSettings};

/// Parameters for one scan. Fields missing from a profile take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionRequest {
    pub pixel_type: PixelType,
    pub resolution: f32,
    pub transfer_mode: TransferMode,
    pub duplex: bool,
    pub feeder: bool,
    pub show_ui: bool,
    pub modal_ui: bool,
    pub show_indicators: bool,
    pub disable_after_acquire: bool,
    pub show_selection_dialog: bool,
}

impl Default for AcquisitionRequest {
    fn default() -> Self {
        Self {
            pixel_type: PixelType::Bw,
            resolution: 150.0,
            transfer_mode: TransferMode::Native,
            duplex: true,
            feeder: true,
            show_ui: false,
            modal_ui: false,
            show_indicators: false,
            disable_after_acquire: true,
            show_selection_dialog: false,
        }
    }
}

impl AcquisitionRequest {
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            mode: self.transfer_mode,
            show_ui: self.show_ui,
            modal_ui: self.modal_ui,
            show_indicators: self.show_indicators,
            disable_after_acquire: self.disable_after_acquire,
        }
    }
}
