#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    ManagerOpening,
    DeviceOpening,
    Configuring,
    Transferring,
    Finishing,
    Aborting,
}

impl AcquisitionState {
    pub fn can_transition_to(self, next: AcquisitionState) -> bool {
        use AcquisitionState::*;
        matches!(
            (self, next),
            (Idle, ManagerOpening)
                | (ManagerOpening, DeviceOpening)
                | (ManagerOpening, Idle)
                | (DeviceOpening, Configuring)
                | (DeviceOpening, Idle)
                | (Configuring, Transferring)
                | (Configuring, Aborting)
                | (Configuring, Idle)
                | (Transferring, Finishing)
                | (Transferring, Aborting)
                | (Aborting, Finishing)
                | (Aborting, Idle)
                | (Finishing, Idle)
        )
    }
}
